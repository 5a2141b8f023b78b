use kira_mirna_graph::uniprot::{parse_entry_text, parse_idmapping_accession};

const ENTRY: &str = "ID   P53_HUMAN               Reviewed;         393 AA.
AC   P04637; Q15086;
GN   Name=TP53 {ECO:0000312|HGNC:HGNC:11998}; Synonyms=P53;
OS   Homo sapiens (Human).
DR   Ensembl; ENST00000269305.9; ENSP00000269305.4; ENSG00000141510.17.
DR   GeneID; 7157; -.
";

#[test]
fn entry_text_fields() {
    let record = parse_entry_text(ENTRY, Some("ENSG00000141510")).unwrap();
    assert_eq!(record.symbol.as_deref(), Some("TP53"));
    assert_eq!(record.geneid.as_deref(), Some("7157"));
    assert_eq!(record.species.as_deref(), Some("Homo sapiens"));
    assert_eq!(record.ensembl.as_deref(), Some("ENSG00000141510"));
}

#[test]
fn entry_without_gene_name_is_absent() {
    let entry = "ID   X_HUMAN\nOS   Homo sapiens (Human).\n";
    assert_eq!(parse_entry_text(entry, None), None);
}

#[test]
fn idmapping_first_accession() {
    let tsv = "From\tEntry\tEntry Name\nENSG00000141510\tP04637\tP53_HUMAN\n";
    assert_eq!(parse_idmapping_accession(tsv).as_deref(), Some("P04637"));
    assert_eq!(parse_idmapping_accession("From\tEntry\n"), None);
    assert_eq!(
        parse_idmapping_accession("From\tTo\nENSG00000141510\tP04637\n").as_deref(),
        Some("P04637")
    );
}
