use std::io::BufRead;
use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{MirnaKind, Species};
use crate::error::KiraError;
use crate::gene::ResolverStats;
use crate::graph::{DatabaseInfo, GraphStore, MirnaNode};
use crate::import::{ImportReport, ImportSummary};

pub const MIRBASE_NAME: &str = "miRBase";
pub const MIRBASE_URL: &str = "https://www.mirbase.org";

static ACCESSION_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/accession="([^"]+)""#).expect("static accession regex")
});
static PRODUCT_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/product="([^"]+)""#).expect("static product regex"));

/// One `ID` .. `//` entry of a miRBase flat file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirbaseEntry {
    pub id: String,
    pub accession: Option<String>,
    pub products: Vec<MatureProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatureProduct {
    pub name: String,
    pub accession: Option<String>,
}

/// Streams entries out of an EMBL-style miRBase `.dat` file.
pub struct MirbaseReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    pending_id: Option<String>,
}

impl<R: BufRead> MirbaseReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
            line_no: 0,
            pending_id: None,
        }
    }

    fn next_entry(&mut self) -> Result<Option<MirbaseEntry>, KiraError> {
        let mut entry = self.pending_id.take().map(|id| MirbaseEntry {
            id,
            ..MirbaseEntry::default()
        });
        let mut pending_accession: Option<String> = None;
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.map_err(|err| KiraError::MalformedRow {
                line: self.line_no,
                reason: err.to_string(),
            })?;

            if line.starts_with("ID") {
                let Some(id) = line.split_whitespace().nth(1) else {
                    return Err(KiraError::MalformedRow {
                        line: self.line_no,
                        reason: "ID line without identifier".to_string(),
                    });
                };
                if let Some(open) = entry.take() {
                    warn!(line = self.line_no, id = %open.id, "entry without terminator");
                    self.pending_id = Some(id.to_string());
                    return Ok(Some(open));
                }
                entry = Some(MirbaseEntry {
                    id: id.to_string(),
                    ..MirbaseEntry::default()
                });
                continue;
            }

            let Some(current) = entry.as_mut() else {
                continue;
            };
            if line.starts_with("//") {
                return Ok(entry);
            }
            if line.starts_with("AC") {
                current.accession = line
                    .split_whitespace()
                    .nth(1)
                    .map(|acc| acc.trim_end_matches(';').to_string());
            } else if let Some(caps) = ACCESSION_QUALIFIER.captures(&line) {
                pending_accession = Some(caps[1].to_string());
            } else if let Some(caps) = PRODUCT_QUALIFIER.captures(&line) {
                current.products.push(MatureProduct {
                    name: caps[1].to_string(),
                    accession: pending_accession.take(),
                });
            }
        }
        Ok(entry)
    }
}

impl<R: BufRead> Iterator for MirbaseReader<R> {
    type Item = Result<MirbaseEntry, KiraError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// Loads hairpin and mature miRNA nodes of one species. Names already in the
/// graph are left untouched.
pub fn run(
    graph: &mut dyn GraphStore,
    input: Box<dyn BufRead>,
    species: &Species,
    data_file: &str,
    sink: &dyn ProgressSink,
    progress_interval: usize,
) -> Result<ImportReport, KiraError> {
    let started = Instant::now();
    let mut summary = ImportSummary::default();
    graph.put_database_info(DatabaseInfo {
        name: MIRBASE_NAME.to_string(),
        link: MIRBASE_URL.to_string(),
    })?;

    let prefix = format!("{}-", species.prefix);
    for entry in MirbaseReader::new(input) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "unreadable miRBase entry");
                summary.skipped_malformed += 1;
                continue;
            }
        };
        summary.rows_read += 1;
        if !entry.id.starts_with(&prefix) {
            summary.filtered += 1;
            continue;
        }

        let mut nodes = vec![MirnaNode::new(
            &entry.id,
            entry.accession.as_deref(),
            &species.name,
            MirnaKind::Hairpin,
        )];
        nodes.extend(entry.products.iter().map(|product| {
            MirnaNode::new(
                &product.name,
                product.accession.as_deref(),
                &species.name,
                MirnaKind::Mature,
            )
        }));
        for node in nodes {
            let name = node.name.clone();
            match graph.merge_mirna(node) {
                Ok((_, true)) => summary.nodes_created += 1,
                Ok((_, false)) => debug!(name = %name, "miRNA already present"),
                Err(err) => {
                    warn!(name = %name, error = %err, "failed to store miRNA");
                    summary.skipped_store_error += 1;
                }
            }
        }
        summary.rows_processed += 1;

        if progress_interval > 0 && summary.rows_read % progress_interval == 0 {
            sink.event(ProgressEvent {
                message: format!(
                    "miRBase: {} entries read, {} nodes created",
                    summary.rows_read, summary.nodes_created
                ),
                elapsed: Some(started.elapsed()),
            });
        }
    }
    graph.flush()?;

    sink.event(ProgressEvent {
        message: format!(
            "miRBase: finished, {} {} entries, {} nodes created",
            summary.rows_processed, species.prefix, summary.nodes_created
        ),
        elapsed: Some(started.elapsed()),
    });
    Ok(ImportReport {
        relation: MIRBASE_NAME.to_string(),
        data_file: data_file.to_string(),
        resumed_after: None,
        summary,
        relation_info: None,
        gene_lookups: ResolverStats::default(),
        elapsed_ms: started.elapsed().as_millis(),
    })
}
