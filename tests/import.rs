use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_mirna_graph::app::{App, ProgressEvent, ProgressSink};
use kira_mirna_graph::config::ResolvedConfig;
use kira_mirna_graph::domain::{Score, Species};
use kira_mirna_graph::error::KiraError;
use kira_mirna_graph::gene::{GeneLookup, GeneRecord};
use kira_mirna_graph::graph::{GraphStore, JsonGraph};
use kira_mirna_graph::import::mirtarbase::MirTarBaseOptions;
use kira_mirna_graph::import::pictar::PicTarOptions;
use kira_mirna_graph::import::rna22::Rna22Options;
use kira_mirna_graph::import::targetscan::TargetScanOptions;
use kira_mirna_graph::import::{Checkpoint, ImportSummary};
use kira_mirna_graph::store::Store;

const MIRBASE_DAT: &str = "\
ID   hsa-mir-23a       standard; RNA; HSA; 73 BP.
AC   MI0000079;
FT   miRNA           45..65
FT                   /accession=\"MIMAT0000078\"
FT                   /product=\"hsa-miR-23a-3p\"
//
ID   hsa-mir-23b       standard; RNA; HSA; 97 BP.
AC   MI0000439;
FT   miRNA           58..78
FT                   /accession=\"MIMAT0000418\"
FT                   /product=\"hsa-miR-23b-3p\"
//
ID   hsa-let-7a-1      standard; RNA; HSA; 80 BP.
AC   MI0000060;
FT   miRNA           6..27
FT                   /accession=\"MIMAT0000062\"
FT                   /product=\"hsa-let-7a-5p\"
//
ID   mmu-mir-1a-1      standard; RNA; MMU; 71 BP.
AC   MI0000139;
FT   miRNA           44..65
FT                   /accession=\"MIMAT0000123\"
FT                   /product=\"mmu-miR-1a-3p\"
//
";

const TARGETSCAN_TSV: &str = "\
miR Family\tGene ID\tGene Symbol\tTranscript ID\tSpecies ID\tPCT
miR-23-3p\tENSG00000141510.11\tTP53\tENST00000269305.4\t9606\t0.45
miR-23-3p\tENSG00000141510.11\tTP53\tENST00000269305.4\t9606\t0.30
let-7a-5p\tENSG00000141510.11\tTP53\tENST00000269305.4\t10090\t0.10
miR-23-3p\tENSG00000141510.11\tTP53\tENST00000269305.4\t9606\tn/a
";

#[derive(Clone, Default)]
struct MockLookup {
    records: HashMap<String, GeneRecord>,
    calls: Arc<Mutex<usize>>,
}

impl MockLookup {
    fn with(mut self, id: &str, record: GeneRecord) -> Self {
        self.records.insert(id.to_string(), record);
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn answer(&self, id: &str) -> Result<Option<GeneRecord>, KiraError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.records.get(id).cloned())
    }
}

impl GeneLookup for MockLookup {
    fn name(&self) -> &str {
        "mock"
    }

    fn by_refseq(&self, refseq: &str) -> Result<Option<GeneRecord>, KiraError> {
        self.answer(refseq)
    }

    fn by_gene_id(&self, geneid: &str) -> Result<Option<GeneRecord>, KiraError> {
        self.answer(geneid)
    }

    fn by_ensembl(
        &self,
        ensembl: &str,
        _species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        self.answer(ensembl)
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn tp53() -> GeneRecord {
    GeneRecord {
        symbol: Some("TP53".to_string()),
        ensembl: Some("ENSG00000141510".to_string()),
        geneid: Some("7157".to_string()),
        species: Some("Homo sapiens".to_string()),
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    store: Store,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = Store::new_with_paths(root.join("project"), root.join("cache"));
        Self { dir, store }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn app(
        &self,
        ncbi: MockLookup,
        ensembl: MockLookup,
        uniprot: MockLookup,
    ) -> App<MockLookup, MockLookup, MockLookup> {
        App::new(
            self.store.clone(),
            ResolvedConfig::default(),
            ncbi,
            ensembl,
            uniprot,
        )
    }

    fn load_mirbase(&self) {
        let dat = self.write("miRNA.dat", MIRBASE_DAT);
        let app = self.app(MockLookup::default(), MockLookup::default(), MockLookup::default());
        app.import_mirbase(&dat, "hsa", None, &RecordingSink::default())
            .unwrap();
    }

    fn graph(&self) -> JsonGraph {
        JsonGraph::open(&self.store.graph_path()).unwrap()
    }
}

#[test]
fn mirbase_loads_one_species_once() {
    let fixture = Fixture::new();
    let dat = fixture.write("miRNA.dat", MIRBASE_DAT);
    let app = fixture.app(MockLookup::default(), MockLookup::default(), MockLookup::default());

    let first = app
        .import_mirbase(&dat, "hsa", None, &RecordingSink::default())
        .unwrap();
    assert_eq!(first.summary.rows_read, 4);
    assert_eq!(first.summary.filtered, 1);
    assert_eq!(first.summary.nodes_created, 6);

    let second = app
        .import_mirbase(&dat, "hsa", Some("Human"), &RecordingSink::default())
        .unwrap();
    assert_eq!(second.summary.nodes_created, 0);

    let graph = fixture.graph();
    let id = graph.find_mirna("hsa-miR-23a-3p").unwrap();
    let node = graph.mirna(id).unwrap();
    assert_eq!(node.accession.as_deref(), Some("MIMAT0000078"));
    assert_eq!(node.species, "Homo sapiens");
    assert!(graph.find_mirna("mmu-miR-1a-3p").is_none());
}

#[test]
fn targetscan_family_rows_merge_to_minimum() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write("targetscan.txt", TARGETSCAN_TSV);
    let ensembl = MockLookup::default().with("ENSG00000141510", tp53());
    let app = fixture.app(MockLookup::default(), ensembl.clone(), MockLookup::default());

    let report = app
        .import_targetscan(
            &data,
            "hsa",
            &TargetScanOptions::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(
        report.summary,
        ImportSummary {
            rows_read: 4,
            rows_processed: 2,
            edges_created: 2,
            edges_updated: 2,
            nodes_created: 1,
            filtered: 1,
            skipped_malformed: 1,
            ..ImportSummary::default()
        }
    );
    assert_eq!(ensembl.calls(), 1);
    let info = report.relation_info.unwrap();
    assert_eq!((info.min, info.max), (0.30, 0.45));
    assert!(!fixture.store.checkpoint_path("TargetScan").as_std_path().exists());

    let graph = fixture.graph();
    let predictions = graph.predictions("hsa-miR-23b-3p");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].gene, "TP53");
    assert_eq!(predictions[0].score, Score::Numeric(0.30));
    let edge = graph.edges().next().unwrap().1;
    assert_eq!(edge.source_mirnas, vec!["miR-23-3p"]);
    assert_eq!(edge.source_targets, vec!["ENSG00000141510.11"]);
}

#[test]
fn targetscan_unresolved_target_becomes_placeholder() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write("targetscan.txt", TARGETSCAN_TSV);
    let app = fixture.app(MockLookup::default(), MockLookup::default(), MockLookup::default());

    let report = app
        .import_targetscan(
            &data,
            "hsa",
            &TargetScanOptions {
                min_pct: Some(0.4),
                seed_matches: Vec::new(),
            },
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.filtered, 2);
    assert_eq!(report.summary.edges_created, 2);
    let graph = fixture.graph();
    assert_eq!(graph.predictions("hsa-miR-23a-3p")[0].gene, "ENSG00000141510");
}

#[test]
fn targetscan_missing_columns_is_fatal() {
    let fixture = Fixture::new();
    let data = fixture.write("targetscan.txt", "Gene ID\tPCT\nENSG1\t0.1\n");
    let app = fixture.app(MockLookup::default(), MockLookup::default(), MockLookup::default());

    let err = app
        .import_targetscan(
            &data,
            "hsa",
            &TargetScanOptions::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap_err();
    assert_matches!(err, KiraError::MissingColumns { .. });
}

#[test]
fn missing_input_file_is_reported() {
    let fixture = Fixture::new();
    let app = fixture.app(MockLookup::default(), MockLookup::default(), MockLookup::default());
    let err = app
        .import_rna22(
            Path::new("/nonexistent/rna22.tsv"),
            "RNA22",
            &Rna22Options::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap_err();
    assert_matches!(err, KiraError::InputNotFound(_));
}

fn checkpoint_after_row(fixture: &Fixture, data: &Path, last_row: usize) {
    let checkpoint = Checkpoint {
        relation: "TargetScan".to_string(),
        data_file: data.display().to_string(),
        last_row,
        summary: ImportSummary {
            rows_read: last_row,
            ..ImportSummary::default()
        },
        stats: HashMap::new(),
        saved_at: "2026-01-01T00:00:00Z".to_string(),
    };
    Store::write_json_atomic(&fixture.store.checkpoint_path("TargetScan"), &checkpoint).unwrap();
}

#[test]
fn checkpoint_resumes_after_last_row() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write("targetscan.txt", TARGETSCAN_TSV);
    checkpoint_after_row(&fixture, &data, 3);
    let ensembl = MockLookup::default().with("ENSG00000141510", tp53());
    let app = fixture.app(MockLookup::default(), ensembl.clone(), MockLookup::default());
    let sink = RecordingSink::default();

    let report = app
        .import_targetscan(&data, "hsa", &TargetScanOptions::default(), false, &sink)
        .unwrap();

    assert_eq!(report.resumed_after, Some(3));
    assert_eq!(report.summary.rows_read, 4);
    assert_eq!(report.summary.skipped_malformed, 1);
    assert_eq!(report.summary.edges_created, 0);
    assert_eq!(ensembl.calls(), 0);
    assert!(
        sink.messages
            .lock()
            .unwrap()
            .iter()
            .any(|message| message.contains("resuming after row 3"))
    );
}

#[test]
fn restart_ignores_checkpoint() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write("targetscan.txt", TARGETSCAN_TSV);
    checkpoint_after_row(&fixture, &data, 3);
    let ensembl = MockLookup::default().with("ENSG00000141510", tp53());
    let app = fixture.app(MockLookup::default(), ensembl, MockLookup::default());

    let report = app
        .import_targetscan(
            &data,
            "hsa",
            &TargetScanOptions::default(),
            true,
            &RecordingSink::default(),
        )
        .unwrap();
    assert_eq!(report.resumed_after, None);
    assert_eq!(report.summary.edges_created, 2);
}

#[test]
fn mirtarbase_always_creates_and_keeps_placeholders() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "hsa_MTI.csv",
        "\
miRTarBase ID,miRNA,Species (miRNA),Target Gene,Target Gene (Entrez ID),Species (Target Gene),Experiments,Support Type,References (PMID)
MIRT000002,hsa-miR-23a-3p,Homo sapiens,TP53,7157,Homo sapiens,Luciferase reporter assay,Functional MTI,19536157
MIRT000003,mmu-miR-1a-3p,Mus musculus,Kcnj2,16518,Mus musculus,qRT-PCR,Functional MTI,1234
MIRT000004,hsa-miR-23a-3p,Homo sapiens,TP53,abc,Homo sapiens,Western blot,Functional MTI,1
MIRT000005,hsa-miR-9999,Homo sapiens,FOO,999999,Homo sapiens,Western blot,Functional MTI,2
MIRT000006,hsa-let-7a-5p,Homo sapiens,BAR,424242,Homo sapiens,\"Western blot, qPCR\",Functional MTI,3
MIRT000002,hsa-miR-23a-3p,Homo sapiens,TP53,7157,Homo sapiens,Western blot,Functional MTI,19536157
",
    );
    let ncbi = MockLookup::default().with("7157", tp53());
    let app = fixture.app(ncbi.clone(), MockLookup::default(), MockLookup::default());

    let report = app
        .import_mirtarbase(
            &data,
            "hsa",
            &MirTarBaseOptions::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.rows_read, 6);
    assert_eq!(report.summary.filtered, 1);
    assert_eq!(report.summary.skipped_malformed, 1);
    assert_eq!(report.summary.skipped_unresolved_mirna, 1);
    assert_eq!(report.summary.edges_created, 3);
    assert_eq!(ncbi.calls(), 2);
    let info = report.relation_info.unwrap();
    assert_eq!((info.min, info.max), (0.0, 0.0));

    let graph = fixture.graph();
    let placeholder = graph.predictions("hsa-let-7a-5p");
    assert_eq!(placeholder.len(), 1);
    assert_eq!(placeholder[0].gene, "BAR");
    assert_eq!(placeholder[0].score, Score::Text("3".to_string()));
    assert_eq!(graph.predictions("hsa-miR-23a-3p").len(), 2);
}

#[test]
fn pictar_keeps_maximum_and_skips_unknown_refseq() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "pictar.bed",
        "\
track name=pictar description=\"PicTar\"
chr17\t7565097\t7565104\tNM_000546:hsa-miR-23a-3p\t2.5
chr17\t7565197\t7565204\tNM_000546:hsa-miR-23a-3p\t4.0
chr1\t300\t307\tNM_999999:hsa-miR-23a-3p\t1.0
chr1\t300\t307\tbadname\t1.0
",
    );
    let ncbi = MockLookup::default().with("NM_000546", tp53());
    let app = fixture.app(ncbi.clone(), MockLookup::default(), MockLookup::default());

    let report = app
        .import_pictar(
            &data,
            "PicTar4",
            Some("hsa"),
            &PicTarOptions::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.relation, "PicTar4");
    assert_eq!(report.summary.rows_read, 4);
    assert_eq!(report.summary.edges_created, 1);
    assert_eq!(report.summary.edges_updated, 1);
    assert_eq!(report.summary.skipped_unresolved_target, 1);
    assert_eq!(report.summary.skipped_malformed, 1);
    assert_eq!(ncbi.calls(), 2);
    let predictions = fixture.graph().predictions("hsa-miR-23a-3p");
    assert_eq!(predictions[0].score, Score::Numeric(4.0));
    assert_eq!(predictions[0].relation, "PicTar4");
}

#[test]
fn rna22_first_write_wins() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "rna22.tsv",
        "\
mirna\ttarget\tscore
hsa-miR-23a-3p\tENSG00000141510_ENST00000269305\t0.01
hsa-miR-23a-3p\tENSG00000141510\t0.005
hsa-let-7a-5p\tENSG00000000001_ENST00000000001\t0.02
",
    );
    let ncbi = MockLookup::default().with("ENSG00000141510", tp53());
    let uniprot = MockLookup::default();
    let ensembl = MockLookup::default();
    let app = fixture.app(ncbi, ensembl.clone(), uniprot.clone());

    let report = app
        .import_rna22(
            &data,
            "RNA22",
            &Rna22Options::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.edges_created, 1);
    assert_eq!(report.summary.edges_existing, 1);
    assert_eq!(report.summary.skipped_unresolved_target, 1);
    assert_eq!((uniprot.calls(), ensembl.calls()), (1, 1));
    let info = report.relation_info.unwrap();
    assert_eq!((info.min, info.max), (0.005, 0.01));
    let predictions = fixture.graph().predictions("hsa-miR-23a-3p");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].score, Score::Numeric(0.01));
}

#[test]
fn progress_is_reported_at_the_configured_interval() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write("targetscan.txt", TARGETSCAN_TSV);
    let config = ResolvedConfig {
        progress_interval: 2,
        ..ResolvedConfig::default()
    };
    let app = App::new(
        fixture.store.clone(),
        config,
        MockLookup::default(),
        MockLookup::default(),
        MockLookup::default(),
    );
    let sink = RecordingSink::default();

    app.import_targetscan(&data, "hsa", &TargetScanOptions::default(), false, &sink)
        .unwrap();

    let messages = sink.messages.lock().unwrap();
    let periodic = messages
        .iter()
        .filter(|message| message.contains("skipped"))
        .count();
    assert_eq!(periodic, 2);
}

#[test]
fn targetscan_asks_ncbi_before_ensembl() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write("targetscan.txt", TARGETSCAN_TSV);
    let ncbi = MockLookup::default().with("ENSG00000141510", tp53());
    let ensembl = MockLookup::default().with(
        "ENSG00000141510",
        GeneRecord {
            symbol: Some("TP53-ALT".to_string()),
            ensembl: Some("ENSG00000141510".to_string()),
            geneid: Some("999999".to_string()),
            species: Some("Homo sapiens".to_string()),
        },
    );
    let app = fixture.app(ncbi.clone(), ensembl.clone(), MockLookup::default());

    let report = app
        .import_targetscan(
            &data,
            "hsa",
            &TargetScanOptions::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.edges_created, 2);
    assert_eq!((ncbi.calls(), ensembl.calls()), (1, 0));
    let predictions = fixture.graph().predictions("hsa-miR-23a-3p");
    assert_eq!(predictions[0].gene, "TP53");
}

#[test]
fn rna22_short_rows_are_malformed() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "rna22.tsv",
        "\
mirna\ttarget\tstart\tend\tfolding\tscore
hsa-miR-23a-3p\tENSG00000141510
",
    );
    let ncbi = MockLookup::default().with("ENSG00000141510", tp53());
    let app = fixture.app(ncbi.clone(), MockLookup::default(), MockLookup::default());

    let report = app
        .import_rna22(
            &data,
            "RNA22",
            &Rna22Options::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.rows_read, 1);
    assert_eq!(report.summary.skipped_malformed, 1);
    assert_eq!(report.summary.edges_created, 0);
    assert_eq!(ncbi.calls(), 0);
    assert_eq!(fixture.graph().edges().count(), 0);
}

#[test]
fn rna22_threshold_and_pair_average() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "rna22.tsv",
        "\
mirna\ttarget\tscore
hsa-miR-23a-3p\tENSG00000141510_ENST00000269305\t-30.0
hsa_miR_23a_3p\tENSG00000141510\t-20.0
hsa-miR-23a-3p\tENSG00000141510\t-10.0
hsa-miR-23a-3p\tENSG00000141510
",
    );
    let ncbi = MockLookup::default().with("ENSG00000141510", tp53());
    let app = fixture.app(ncbi.clone(), MockLookup::default(), MockLookup::default());

    let report = app
        .import_rna22(
            &data,
            "RNA22",
            &Rna22Options {
                max_score: Some(-15.0),
                average: true,
            },
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.rows_read, 4);
    assert_eq!(report.summary.filtered, 1);
    assert_eq!(report.summary.skipped_malformed, 1);
    assert_eq!(report.summary.edges_created, 1);
    assert_eq!(ncbi.calls(), 1);
    let predictions = fixture.graph().predictions("hsa-miR-23a-3p");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].score, Score::Numeric(-25.0));
}

#[test]
fn pictar_percentile_cutoff_keeps_top_scores() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "pictar.bed",
        "\
track name=pictar
chr17\t100\t107\tNM_000546:hsa-miR-23a-3p\t2.0
chr17\t200\t207\tNM_000546:hsa-miR-23a-3p\t4.0
chr17\t300\t307\tNM_000546:hsa-miR-23a-3p\t1.0
chr17\t400\t407\tNM_000546:hsa-miR-23a-3p\t3.0
",
    );
    let ncbi = MockLookup::default().with("NM_000546", tp53());
    let app = fixture.app(ncbi, MockLookup::default(), MockLookup::default());

    let report = app
        .import_pictar(
            &data,
            "PicTar4",
            Some("hsa"),
            &PicTarOptions {
                min_score: None,
                min_percentile: Some(75.0),
            },
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.rows_read, 4);
    assert_eq!(report.summary.filtered, 2);
    assert_eq!(report.summary.edges_created, 1);
    assert_eq!(report.summary.edges_updated, 1);
    let predictions = fixture.graph().predictions("hsa-miR-23a-3p");
    assert_eq!(predictions[0].score, Score::Numeric(4.0));

    let err = app
        .import_pictar(
            &data,
            "PicTar4",
            Some("hsa"),
            &PicTarOptions {
                min_score: None,
                min_percentile: Some(150.0),
            },
            true,
            &RecordingSink::default(),
        )
        .unwrap_err();
    assert_matches!(err, KiraError::InvalidOption(_));
}

const MIRTARBASE_HEADER: &str = "miRTarBase ID,miRNA,Species (miRNA),Target Gene,Target Gene (Entrez ID),Species (Target Gene),Experiments,Support Type,References (PMID)";

#[test]
fn mirtarbase_strong_evidence_filter() {
    let fixture = Fixture::new();
    fixture.load_mirbase();
    let data = fixture.write(
        "hsa_MTI.csv",
        &format!(
            "{MIRTARBASE_HEADER}
MIRT000001,hsa-miR-23a-3p,Homo sapiens,TP53,7157,Homo sapiens,Luciferase reporter assay,Functional MTI,1
MIRT000002,hsa-miR-23a-3p,Homo sapiens,TP53,7157,Homo sapiens,Microarray,Functional MTI (Weak),2
MIRT000003,hsa-miR-23a-3p,Homo sapiens,TP53,7157,Homo sapiens,Western blot,Functional MTI (Weak),3
"
        ),
    );
    let ncbi = MockLookup::default().with("7157", tp53());
    let app = fixture.app(ncbi, MockLookup::default(), MockLookup::default());

    let report = app
        .import_mirtarbase(
            &data,
            "hsa",
            &MirTarBaseOptions {
                strong_evidence: true,
                support_types: Vec::new(),
            },
            false,
            &RecordingSink::default(),
        )
        .unwrap();

    assert_eq!(report.summary.rows_read, 3);
    assert_eq!(report.summary.filtered, 2);
    assert_eq!(report.summary.edges_created, 1);
    let predictions = fixture.graph().predictions("hsa-miR-23a-3p");
    assert_eq!(predictions.len(), 1);
    assert_eq!(predictions[0].score, Score::Text("1".to_string()));
}

#[test]
fn mirtarbase_header_must_have_nine_columns() {
    let fixture = Fixture::new();
    let data = fixture.write(
        "hsa_MTI.csv",
        &format!(
            "{MIRTARBASE_HEADER},Extra\nMIRT000001,hsa-miR-23a-3p,Homo sapiens,TP53,7157,Homo sapiens,qRT-PCR,Functional MTI,1,x\n"
        ),
    );
    let app = fixture.app(MockLookup::default(), MockLookup::default(), MockLookup::default());

    let err = app
        .import_mirtarbase(
            &data,
            "hsa",
            &MirTarBaseOptions::default(),
            false,
            &RecordingSink::default(),
        )
        .unwrap_err();
    assert_matches!(err, KiraError::MissingColumns { columns, .. } if columns.contains("header has 10"));
}
