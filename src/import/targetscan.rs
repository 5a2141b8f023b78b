use std::collections::BTreeMap;
use std::io::BufRead;

use tracing::debug;

use crate::domain::{MirnaId, RelationKind, RelationSpec, Score, Species};
use crate::error::KiraError;
use crate::gene::{GeneIdKind, GeneRecord, GeneResolution, normalize_gene_id};
use crate::import::{
    HeaderIndex, ImportContext, SkipReason, field, parse_score, read_headers, tsv_reader,
};
use crate::reconcile::{Observation, Provenance};

const MIR_FAMILY: &str = "mir family";
const GENE_ID: &str = "gene id";
const SPECIES_ID: &str = "species id";
const PCT: &str = "pct";
const SEED_MATCH: &str = "seed match";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetScanOptions {
    /// Rows with a PCT below this value are filtered out.
    pub min_pct: Option<f64>,
    /// Allowed seed match types, e.g. `8mer`, `7mer-m8`. Empty keeps all.
    pub seed_matches: Vec<String>,
}

struct Columns {
    family: usize,
    gene: usize,
    species: usize,
    pct: usize,
    seed: Option<usize>,
}

impl Columns {
    fn required_width(&self) -> usize {
        [self.family, self.gene, self.species, self.pct]
            .into_iter()
            .max()
            .unwrap_or_default()
            + 1
    }
}

pub fn run(
    ctx: &mut ImportContext<'_, '_>,
    input: Box<dyn BufRead>,
    species: &Species,
    relation: &RelationSpec,
    options: &TargetScanOptions,
) -> Result<(), KiraError> {
    let file = ctx.data_file().to_string();
    let mut reader = tsv_reader(input);
    let header = read_headers(&mut reader, &file)?;
    let mut required = vec![MIR_FAMILY, GENE_ID, SPECIES_ID, PCT];
    if !options.seed_matches.is_empty() {
        required.push(SEED_MATCH);
    }
    let index = HeaderIndex::new(&file, &header, &required)?;
    let columns = Columns {
        family: index.position(MIR_FAMILY).unwrap_or_default(),
        gene: index.position(GENE_ID).unwrap_or_default(),
        species: index.position(SPECIES_ID).unwrap_or_default(),
        pct: index.position(PCT).unwrap_or_default(),
        seed: index.position(SEED_MATCH),
    };
    let taxid = species.taxid.to_string();
    let seeds = options
        .seed_matches
        .iter()
        .map(|seed| seed.trim().to_lowercase())
        .collect::<Vec<_>>();

    ctx.register_database(RelationKind::TargetScan);
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        if ctx.already_done(row) {
            continue;
        }
        ctx.summary.rows_read += 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                ctx.skip(row, SkipReason::Malformed, &err.to_string());
                ctx.row_finished(row)?;
                continue;
            }
        };
        process_row(ctx, row, &record, &columns, species, &taxid, relation, options, &seeds);
        ctx.row_finished(row)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn process_row(
    ctx: &mut ImportContext<'_, '_>,
    row: usize,
    record: &csv::StringRecord,
    columns: &Columns,
    species: &Species,
    taxid: &str,
    relation: &RelationSpec,
    options: &TargetScanOptions,
    seeds: &[String],
) {
    if record.len() < columns.required_width() {
        ctx.skip(row, SkipReason::Malformed, "too few columns");
        return;
    }
    if field(record, columns.species) != taxid {
        ctx.summary.filtered += 1;
        return;
    }
    let Some(pct) = parse_score(field(record, columns.pct)) else {
        ctx.skip(row, SkipReason::Malformed, "PCT is not a number");
        return;
    };
    if options.min_pct.is_some_and(|min| pct < min) {
        ctx.summary.filtered += 1;
        return;
    }
    let seed = columns
        .seed
        .map(|idx| field(record, idx).to_string())
        .filter(|seed| !seed.is_empty());
    if !seeds.is_empty() {
        let allowed = seed
            .as_deref()
            .is_some_and(|seed| seeds.iter().any(|wanted| wanted.eq_ignore_ascii_case(seed)));
        if !allowed {
            ctx.summary.filtered += 1;
            return;
        }
    }

    let ensembl_input = field(record, columns.gene).to_string();
    let Some(ensembl) = normalize_gene_id(&ensembl_input, GeneIdKind::Ensembl) else {
        ctx.skip(row, SkipReason::Malformed, "missing Ensembl gene id");
        return;
    };

    let mut sources: Vec<(String, Vec<MirnaId>)> = Vec::new();
    for entry in field(record, columns.family).split('/') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let resolution = ctx.resolve_mirna(entry, &species.prefix);
        let ids = resolution
            .matches
            .iter()
            .filter_map(|mirna| ctx.graph.find_mirna(&mirna.name))
            .collect::<Vec<_>>();
        if ids.is_empty() {
            ctx.skip(row, SkipReason::UnresolvedMirna, entry);
            continue;
        }
        sources.push((entry.to_string(), ids));
    }
    if sources.is_empty() {
        return;
    }

    let target = match ctx.resolve_gene(&ensembl, GeneIdKind::Ensembl, Some(species)) {
        GeneResolution::Resolved(record) => record,
        GeneResolution::Unresolved => {
            debug!(row, ensembl = %ensembl, "creating placeholder target");
            GeneRecord::placeholder(Some(&ensembl), None, None, Some(species))
        }
    };
    let Some(target_id) = ctx.merge_target(row, &target) else {
        return;
    };

    let mut evidence = BTreeMap::new();
    if let Some(seed) = seed {
        evidence.insert("seed_match".to_string(), seed);
    }
    let mut recorded = false;
    for (source, ids) in sources {
        for from in ids {
            recorded |= ctx.record_edge(
                row,
                Observation {
                    relation,
                    from,
                    to: target_id,
                    score: Score::Numeric(pct),
                    provenance: Provenance {
                        source_mirna: source.clone(),
                        source_target: ensembl_input.clone(),
                    },
                    evidence: evidence.clone(),
                },
            );
        }
    }
    if recorded {
        ctx.summary.rows_processed += 1;
    }
}
