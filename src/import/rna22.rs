use std::collections::BTreeMap;
use std::io::BufRead;

use tracing::debug;

use crate::domain::{RelationKind, RelationSpec, Score, Species};
use crate::error::KiraError;
use crate::gene::{GeneIdKind, GeneResolution, normalize_gene_id};
use crate::import::{ImportContext, SkipReason, field, parse_score, read_headers, tsv_reader};
use crate::reconcile::{Observation, Provenance};

/// Raw RNA22 prediction exports carry at least this many columns; narrower
/// files are the aggregated `miRNA, target, score` triples.
pub const RAW_LAYOUT_COLUMNS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rna22Layout {
    Raw,
    Aggregated,
}

impl Rna22Layout {
    pub fn from_header_width(width: usize) -> Self {
        if width >= RAW_LAYOUT_COLUMNS {
            Rna22Layout::Raw
        } else {
            Rna22Layout::Aggregated
        }
    }

    fn score_column(&self) -> usize {
        match self {
            Rna22Layout::Raw => 5,
            Rna22Layout::Aggregated => 2,
        }
    }

    fn min_columns(&self) -> usize {
        self.score_column() + 1
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rna22Options {
    /// Rows scoring above this value are filtered out. RNA22 scores are
    /// folding energies, so more negative is better.
    pub max_score: Option<f64>,
    /// Collapse all rows of one (miRNA, gene) pair into a single edge scored
    /// with their mean.
    pub average: bool,
}

impl Rna22Options {
    fn rejects(&self, score: f64) -> bool {
        self.max_score.is_some_and(|max| score > max)
    }
}

/// Species prefix of a qualified miRNA name, e.g. `hsa` for `hsa-miR-21-5p`.
pub fn species_prefix(mirna: &str) -> Option<String> {
    let (prefix, rest) = mirna.trim().split_once('-')?;
    (!prefix.is_empty() && !rest.is_empty()).then(|| prefix.to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
struct Rna22Row {
    mirna: String,
    target: String,
    ensembl: String,
    prefix: String,
    score: f64,
}

impl Rna22Row {
    fn parse(record: &csv::StringRecord, layout: Rna22Layout) -> Result<Self, &'static str> {
        if record.len() < layout.min_columns() {
            return Err("too few columns");
        }
        let mirna = field(record, 0);
        let target = field(record, 1);
        let score =
            parse_score(field(record, layout.score_column())).ok_or("score is not a number")?;
        let prefix = species_prefix(mirna).ok_or("miRNA name has no species prefix")?;
        let ensembl =
            normalize_gene_id(target, GeneIdKind::Ensembl).ok_or("missing target id")?;
        Ok(Self {
            mirna: mirna.to_string(),
            target: target.to_string(),
            ensembl,
            prefix,
            score,
        })
    }

    fn pair_key(&self) -> (String, String) {
        (self.mirna.to_lowercase().replace('_', "-"), self.ensembl.clone())
    }
}

/// Running mean of one (miRNA, gene) pair; the first row supplies the names.
struct PairMean {
    first: Rna22Row,
    sum: f64,
    count: usize,
}

impl PairMean {
    fn into_row(self) -> Rna22Row {
        Rna22Row {
            score: self.sum / self.count as f64,
            ..self.first
        }
    }
}

pub fn run(
    ctx: &mut ImportContext<'_, '_>,
    input: Box<dyn BufRead>,
    species_table: &[Species],
    relation: &RelationSpec,
    options: &Rna22Options,
) -> Result<(), KiraError> {
    let file = ctx.data_file().to_string();
    let mut reader = tsv_reader(input);
    let header = read_headers(&mut reader, &file)?;
    let layout = Rna22Layout::from_header_width(header.len());
    if header.len() < Rna22Layout::Aggregated.min_columns() {
        return Err(KiraError::MissingColumns {
            file,
            columns: "miRNA, target, score".to_string(),
        });
    }
    debug!(?layout, average = options.average, "RNA22 layout");

    ctx.register_database(RelationKind::Rna22);
    if options.average {
        return run_averaged(ctx, reader, layout, species_table, relation, options);
    }
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        if ctx.already_done(row) {
            continue;
        }
        ctx.summary.rows_read += 1;
        let parsed = record
            .map_err(|err| err.to_string())
            .and_then(|record| Rna22Row::parse(&record, layout).map_err(str::to_string));
        match parsed {
            Ok(entry) if options.rejects(entry.score) => ctx.summary.filtered += 1,
            Ok(entry) => process_row(ctx, row, entry, species_table, relation),
            Err(reason) => ctx.skip(row, SkipReason::Malformed, &reason),
        }
        ctx.row_finished(row)?;
    }
    Ok(())
}

/// Reads the whole file first, then writes one edge per pair. Row numbers
/// for checkpoints count pairs in sorted order. Counters of the reading pass
/// are already part of a resumed checkpoint and are not added again.
fn run_averaged(
    ctx: &mut ImportContext<'_, '_>,
    mut reader: csv::Reader<Box<dyn BufRead>>,
    layout: Rna22Layout,
    species_table: &[Species],
    relation: &RelationSpec,
    options: &Rna22Options,
) -> Result<(), KiraError> {
    let counting = ctx.resumed_after().is_none();
    let mut pairs: BTreeMap<(String, String), PairMean> = BTreeMap::new();
    for (idx, record) in reader.records().enumerate() {
        if counting {
            ctx.summary.rows_read += 1;
        }
        let parsed = record
            .map_err(|err| err.to_string())
            .and_then(|record| Rna22Row::parse(&record, layout).map_err(str::to_string));
        match parsed {
            Ok(entry) if options.rejects(entry.score) => {
                if counting {
                    ctx.summary.filtered += 1;
                }
            }
            Ok(entry) => {
                let score = entry.score;
                let mean = pairs.entry(entry.pair_key()).or_insert_with(|| PairMean {
                    first: entry,
                    sum: 0.0,
                    count: 0,
                });
                mean.sum += score;
                mean.count += 1;
            }
            Err(reason) => {
                if counting {
                    ctx.skip(idx + 1, SkipReason::Malformed, &reason);
                }
            }
        }
    }
    debug!(pairs = pairs.len(), "RNA22 pairs averaged");

    for (idx, mean) in pairs.into_values().enumerate() {
        let row = idx + 1;
        if ctx.already_done(row) {
            continue;
        }
        process_row(ctx, row, mean.into_row(), species_table, relation);
        ctx.row_finished(row)?;
    }
    Ok(())
}

fn process_row(
    ctx: &mut ImportContext<'_, '_>,
    row: usize,
    entry: Rna22Row,
    species_table: &[Species],
    relation: &RelationSpec,
) {
    let species = Species::find(species_table, &entry.prefix).ok();
    if species.is_none() {
        debug!(row, prefix = %entry.prefix, "species prefix not configured");
    }

    let resolution = ctx.resolve_mirna(&entry.mirna, &entry.prefix);
    let Some(from) = resolution
        .first()
        .and_then(|mirna| ctx.graph.find_mirna(&mirna.name))
    else {
        ctx.skip(row, SkipReason::UnresolvedMirna, &entry.mirna);
        return;
    };

    let mut target = match ctx.resolve_gene(&entry.ensembl, GeneIdKind::Ensembl, species) {
        GeneResolution::Resolved(record) => record,
        GeneResolution::Unresolved => {
            ctx.skip(row, SkipReason::UnresolvedTarget, &entry.ensembl);
            return;
        }
    };
    if target.species.is_none() {
        target.species = species.map(|species| species.name.clone());
    }
    let Some(to) = ctx.merge_target(row, &target) else {
        return;
    };

    let recorded = ctx.record_edge(
        row,
        Observation {
            relation,
            from,
            to,
            score: Score::Numeric(entry.score),
            provenance: Provenance {
                source_mirna: entry.mirna,
                source_target: entry.target,
            },
            evidence: BTreeMap::new(),
        },
    );
    if recorded {
        ctx.summary.rows_processed += 1;
    }
}
