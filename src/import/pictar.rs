use std::collections::BTreeMap;
use std::io::{self, BufRead};

use tracing::info;

use crate::domain::{RelationKind, RelationSpec, Score, Species};
use crate::error::KiraError;
use crate::gene::{GeneIdKind, GeneResolution};
use crate::import::{ImportContext, SkipReason, parse_score};
use crate::reconcile::{Observation, Provenance};

pub const DEFAULT_PICTAR_SPECIES: &str = "mmu";

const BED_MIN_COLUMNS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PicTarOptions {
    /// Sites scoring below this value are filtered out.
    pub min_score: Option<f64>,
    /// Keep sites scoring at or above this percentile (0 to 100) of all
    /// well-formed scores in the file, e.g. 90 keeps the top tenth.
    pub min_percentile: Option<f64>,
}

/// Score at `percentile` of an ascending list, using the nearest-rank method.
pub fn percentile_score(sorted: &[f64], percentile: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[idx])
}

/// Target and miRNA packed into the BED name column as `RefSeq:miRNA`.
#[derive(Debug, Clone, PartialEq)]
pub struct PicTarSite {
    pub refseq: String,
    pub mirna: String,
    pub score: f64,
    pub location: String,
}

/// Parses one BED line. `Ok(None)` marks track and comment lines.
pub fn parse_bed_line(line: &str) -> Result<Option<PicTarSite>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with("track") || line.starts_with('#') {
        return Ok(None);
    }
    let columns = line.split('\t').collect::<Vec<_>>();
    if columns.len() < BED_MIN_COLUMNS {
        return Err(format!("expected {BED_MIN_COLUMNS} BED columns, found {}", columns.len()));
    }
    let parts = columns[3].split(':').collect::<Vec<_>>();
    let [refseq, mirna] = parts.as_slice() else {
        return Err(format!("name column `{}` is not RefSeq:miRNA", columns[3]));
    };
    let (refseq, mirna) = (refseq.trim(), mirna.trim());
    if refseq.is_empty() || mirna.is_empty() {
        return Err(format!("name column `{}` is not RefSeq:miRNA", columns[3]));
    }
    let score = parse_score(columns[4])
        .ok_or_else(|| format!("score `{}` is not a number", columns[4]))?;
    Ok(Some(PicTarSite {
        refseq: refseq.to_string(),
        mirna: mirna.to_string(),
        score,
        location: format!("{}:{}-{}", columns[0], columns[1], columns[2]),
    }))
}

pub fn run(
    ctx: &mut ImportContext<'_, '_>,
    input: Box<dyn BufRead>,
    species: &Species,
    relation: &RelationSpec,
    options: &PicTarOptions,
) -> Result<(), KiraError> {
    let (lines, rank_cutoff): (Box<dyn Iterator<Item = io::Result<String>>>, _) =
        match options.min_percentile {
            Some(percentile) => {
                if !(0.0..=100.0).contains(&percentile) {
                    return Err(KiraError::InvalidOption(format!(
                        "percentile {percentile} is outside 0..=100"
                    )));
                }
                let buffered = input.lines().collect::<io::Result<Vec<_>>>().map_err(|err| {
                    KiraError::Filesystem(format!("read {}: {err}", ctx.data_file()))
                })?;
                let cutoff = file_percentile(&buffered, percentile);
                info!(percentile, ?cutoff, "PicTar percentile cutoff");
                (Box::new(buffered.into_iter().map(Ok::<_, io::Error>)), cutoff)
            }
            None => (Box::new(input.lines()), None),
        };
    let min_score = match (options.min_score, rank_cutoff) {
        (Some(score), Some(cutoff)) => Some(score.max(cutoff)),
        (score, cutoff) => score.or(cutoff),
    };

    ctx.register_database(RelationKind::PicTar);
    for (idx, line) in lines.enumerate() {
        let row = idx + 1;
        if ctx.already_done(row) {
            continue;
        }
        let line = line.map_err(|err| KiraError::Filesystem(format!("read line {row}: {err}")))?;
        let site = match parse_bed_line(&line) {
            Ok(Some(site)) => site,
            Ok(None) => continue,
            Err(reason) => {
                ctx.summary.rows_read += 1;
                ctx.skip(row, SkipReason::Malformed, &reason);
                ctx.row_finished(row)?;
                continue;
            }
        };
        ctx.summary.rows_read += 1;
        if min_score.is_some_and(|min| site.score < min) {
            ctx.summary.filtered += 1;
        } else {
            process_site(ctx, row, site, species, relation);
        }
        ctx.row_finished(row)?;
    }
    Ok(())
}

fn file_percentile(lines: &[String], percentile: f64) -> Option<f64> {
    let mut scores = lines
        .iter()
        .filter_map(|line| parse_bed_line(line).ok().flatten())
        .map(|site| site.score)
        .collect::<Vec<_>>();
    scores.sort_by(f64::total_cmp);
    percentile_score(&scores, percentile)
}

fn process_site(
    ctx: &mut ImportContext<'_, '_>,
    row: usize,
    site: PicTarSite,
    species: &Species,
    relation: &RelationSpec,
) {
    let resolution = ctx.resolve_mirna(&site.mirna, &species.prefix);
    let Some(from) = resolution
        .first()
        .and_then(|mirna| ctx.graph.find_mirna(&mirna.name))
    else {
        ctx.skip(row, SkipReason::UnresolvedMirna, &site.mirna);
        return;
    };

    let target = match ctx.resolve_gene(&site.refseq, GeneIdKind::RefSeq, Some(species)) {
        GeneResolution::Resolved(record) if record.geneid.is_some() => record,
        _ => {
            ctx.skip(row, SkipReason::UnresolvedTarget, &site.refseq);
            return;
        }
    };
    let Some(to) = ctx.merge_target(row, &target) else {
        return;
    };

    let evidence = BTreeMap::from([("location".to_string(), site.location)]);
    let recorded = ctx.record_edge(
        row,
        Observation {
            relation,
            from,
            to,
            score: Score::Numeric(site.score),
            provenance: Provenance {
                source_mirna: site.mirna,
                source_target: site.refseq,
            },
            evidence,
        },
    );
    if recorded {
        ctx.summary.rows_processed += 1;
    }
}
