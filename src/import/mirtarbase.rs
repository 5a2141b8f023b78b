use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read};

use crate::domain::{RelationKind, RelationSpec, Score, Species};
use crate::error::KiraError;
use crate::gene::{GeneIdKind, GeneRecord, GeneResolution, normalize_gene_id};
use crate::import::{ImportContext, SkipReason, delimited_reader, field, read_headers};
use crate::reconcile::{Observation, Provenance};

pub const MIRTARBASE_COLUMNS: usize = 9;

const ID: usize = 0;
const MIRNA: usize = 1;
const TARGET_SYMBOL: usize = 3;
const GENE_ID: usize = 4;
const EXPERIMENTS: usize = 6;
const SUPPORT_TYPE: usize = 7;
const PMID: usize = 8;

/// Experiment types that count as strong validation, matched as substrings
/// of the lowercased experiments column.
pub const STRONG_EXPERIMENTS: [&str; 9] = [
    "luciferase reporter assay",
    "western blot",
    "qrt-pcr",
    "rt-qpcr",
    "clip-seq",
    "par-clip",
    "rip-seq",
    "degradome-seq",
    "pasilc",
];
pub const WEAK_SUPPORT: &str = "functional mti (weak)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirTarBaseOptions {
    /// Keep only rows backed by a strong experiment and not marked as weak
    /// support.
    pub strong_evidence: bool,
    /// Allowed support types, e.g. `Functional MTI`. Empty keeps all.
    pub support_types: Vec<String>,
}

impl MirTarBaseOptions {
    pub fn accepts(&self, experiments: &str, support_type: &str) -> bool {
        let support = support_type.trim().to_lowercase();
        if self.strong_evidence {
            let experiments = experiments.to_lowercase();
            if !STRONG_EXPERIMENTS
                .iter()
                .any(|keyword| experiments.contains(keyword))
                || support.contains(WEAK_SUPPORT)
            {
                return false;
            }
        }
        self.support_types.is_empty()
            || self
                .support_types
                .iter()
                .any(|wanted| wanted.trim().eq_ignore_ascii_case(&support))
    }
}

/// Tab when the header line contains one, comma otherwise.
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') { b'\t' } else { b',' }
}

pub fn run(
    ctx: &mut ImportContext<'_, '_>,
    mut input: Box<dyn BufRead>,
    species: &Species,
    relation: &RelationSpec,
    options: &MirTarBaseOptions,
) -> Result<(), KiraError> {
    let file = ctx.data_file().to_string();
    let mut first_line = String::new();
    input
        .read_line(&mut first_line)
        .map_err(|err| KiraError::Filesystem(format!("read {file}: {err}")))?;
    let delimiter = detect_delimiter(&first_line);
    let input: Box<dyn BufRead> = Box::new(Cursor::new(first_line).chain(input));

    let mut reader = delimited_reader(input, delimiter);
    let header = read_headers(&mut reader, &file)?;
    if header.len() != MIRTARBASE_COLUMNS {
        return Err(KiraError::MissingColumns {
            file,
            columns: format!(
                "expected {MIRTARBASE_COLUMNS} columns, header has {}",
                header.len()
            ),
        });
    }

    ctx.register_database(RelationKind::MirTarBase);
    let mirna_prefix = format!("{}-", species.prefix);
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        if ctx.already_done(row) {
            continue;
        }
        ctx.summary.rows_read += 1;
        match record {
            Ok(record) => {
                process_row(ctx, row, &record, species, &mirna_prefix, relation, options)
            }
            Err(err) => ctx.skip(row, SkipReason::Malformed, &err.to_string()),
        }
        ctx.row_finished(row)?;
    }
    Ok(())
}

fn process_row(
    ctx: &mut ImportContext<'_, '_>,
    row: usize,
    record: &csv::StringRecord,
    species: &Species,
    mirna_prefix: &str,
    relation: &RelationSpec,
    options: &MirTarBaseOptions,
) {
    if record.len() < MIRTARBASE_COLUMNS {
        ctx.skip(row, SkipReason::Malformed, "too few columns");
        return;
    }
    let mirna_input = field(record, MIRNA);
    if !mirna_input.to_lowercase().starts_with(mirna_prefix) {
        ctx.summary.filtered += 1;
        return;
    }
    if !options.accepts(field(record, EXPERIMENTS), field(record, SUPPORT_TYPE)) {
        ctx.summary.filtered += 1;
        return;
    }
    let gene_input = field(record, GENE_ID);
    let Some(geneid) = normalize_gene_id(gene_input, GeneIdKind::GeneId) else {
        ctx.skip(row, SkipReason::Malformed, "invalid GeneID");
        return;
    };

    let resolution = ctx.resolve_mirna(mirna_input, &species.prefix);
    let Some(from) = resolution
        .first()
        .and_then(|mirna| ctx.graph.find_mirna(&mirna.name))
    else {
        ctx.skip(row, SkipReason::UnresolvedMirna, mirna_input);
        return;
    };

    let symbol = Some(field(record, TARGET_SYMBOL)).filter(|symbol| !symbol.is_empty());
    let target = match ctx.resolve_gene(&geneid, GeneIdKind::GeneId, Some(species)) {
        GeneResolution::Resolved(record) => record,
        GeneResolution::Unresolved => {
            GeneRecord::placeholder(None, Some(&geneid), symbol, Some(species))
        }
    };
    let Some(to) = ctx.merge_target(row, &target) else {
        return;
    };

    let evidence = [
        ("mirtarbase_id", ID),
        ("experiments", EXPERIMENTS),
        ("support_type", SUPPORT_TYPE),
    ]
    .into_iter()
    .map(|(key, idx)| (key.to_string(), field(record, idx).to_string()))
    .filter(|(_, value)| !value.is_empty())
    .collect::<BTreeMap<_, _>>();

    let recorded = ctx.record_edge(
        row,
        Observation {
            relation,
            from,
            to,
            score: Score::Text(field(record, PMID).to_string()),
            provenance: Provenance {
                source_mirna: mirna_input.to_string(),
                source_target: gene_input.to_string(),
            },
            evidence,
        },
    );
    if recorded {
        ctx.summary.rows_processed += 1;
    }
}
