use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{RelationKind, Species, TargetId};
use crate::error::KiraError;
use crate::gene::{GeneIdKind, GeneRecord, GeneResolution, GeneResolver, ResolverStats};
use crate::graph::{DatabaseInfo, GraphStore, RelationGeneralInfo};
use crate::mirna::{MirnaResolution, MirnaResolver};
use crate::reconcile::{EdgeOutcome, EdgeReconciler, Observation, ScoreRange};
use crate::store::Store;

pub mod mirbase;
pub mod mirtarbase;
pub mod pictar;
pub mod rna22;
pub mod targetscan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    UnresolvedMirna,
    UnresolvedTarget,
    StoreError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub rows_processed: usize,
    pub edges_created: usize,
    pub edges_updated: usize,
    pub edges_existing: usize,
    pub nodes_created: usize,
    pub filtered: usize,
    pub skipped_malformed: usize,
    pub skipped_unresolved_mirna: usize,
    pub skipped_unresolved_target: usize,
    pub skipped_store_error: usize,
}

impl ImportSummary {
    pub fn skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Malformed => self.skipped_malformed += 1,
            SkipReason::UnresolvedMirna => self.skipped_unresolved_mirna += 1,
            SkipReason::UnresolvedTarget => self.skipped_unresolved_target += 1,
            SkipReason::StoreError => self.skipped_store_error += 1,
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped_malformed
            + self.skipped_unresolved_mirna
            + self.skipped_unresolved_target
            + self.skipped_store_error
    }

    fn record(&mut self, outcome: EdgeOutcome) {
        match outcome {
            EdgeOutcome::Created(_) => self.edges_created += 1,
            EdgeOutcome::Updated(_) => self.edges_updated += 1,
            EdgeOutcome::AlreadyExists(_) => self.edges_existing += 1,
        }
    }
}

/// Durable resume point written while an import is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub relation: String,
    pub data_file: String,
    pub last_row: usize,
    pub summary: ImportSummary,
    pub stats: HashMap<String, ScoreRange>,
    pub saved_at: String,
}

impl Checkpoint {
    pub fn load(path: &Utf8Path) -> Result<Option<Self>, KiraError> {
        Store::read_json(path)
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub label: String,
    pub data_file: String,
    pub progress_interval: usize,
    pub checkpoint_interval: usize,
    pub checkpoint_path: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub relation: String,
    pub data_file: String,
    pub resumed_after: Option<usize>,
    pub summary: ImportSummary,
    pub relation_info: Option<RelationGeneralInfo>,
    pub gene_lookups: ResolverStats,
    pub elapsed_ms: u128,
}

/// Everything a per-source driver needs while walking its input: the graph,
/// both resolvers, the reconciler and the run bookkeeping.
pub struct ImportContext<'a, 'g> {
    pub graph: &'a mut dyn GraphStore,
    genes: &'a mut GeneResolver<'g>,
    mirnas: &'a mut MirnaResolver,
    reconciler: EdgeReconciler,
    sink: &'a dyn ProgressSink,
    settings: RunSettings,
    pub summary: ImportSummary,
    resume_after: usize,
    started: Instant,
}

impl<'a, 'g> ImportContext<'a, 'g> {
    pub fn new(
        graph: &'a mut dyn GraphStore,
        genes: &'a mut GeneResolver<'g>,
        mirnas: &'a mut MirnaResolver,
        sink: &'a dyn ProgressSink,
        settings: RunSettings,
    ) -> Self {
        Self {
            graph,
            genes,
            mirnas,
            reconciler: EdgeReconciler::new(),
            sink,
            settings,
            summary: ImportSummary::default(),
            resume_after: 0,
            started: Instant::now(),
        }
    }

    pub fn label(&self) -> &str {
        &self.settings.label
    }

    pub fn data_file(&self) -> &str {
        &self.settings.data_file
    }

    pub fn reconciler(&self) -> &EdgeReconciler {
        &self.reconciler
    }

    /// Restores counters and score statistics from a checkpoint taken on the
    /// same relation and input file. Returns whether the checkpoint applied.
    pub fn resume(&mut self, checkpoint: Checkpoint) -> bool {
        if checkpoint.relation != self.settings.label
            || checkpoint.data_file != self.settings.data_file
        {
            warn!(
                relation = %checkpoint.relation,
                data_file = %checkpoint.data_file,
                "ignoring checkpoint for a different run"
            );
            return false;
        }
        self.resume_after = checkpoint.last_row;
        self.summary = checkpoint.summary;
        self.reconciler = EdgeReconciler::with_stats(checkpoint.stats);
        self.progress(format!(
            "{}: resuming after row {}",
            self.settings.label, self.resume_after
        ));
        true
    }

    pub fn resumed_after(&self) -> Option<usize> {
        (self.resume_after > 0).then_some(self.resume_after)
    }

    pub fn already_done(&self, row: usize) -> bool {
        row <= self.resume_after
    }

    pub fn progress(&self, message: String) {
        self.sink.event(ProgressEvent {
            message,
            elapsed: Some(self.started.elapsed()),
        });
    }

    pub fn register_database(&mut self, kind: RelationKind) {
        let info = DatabaseInfo {
            name: kind.database_name().to_string(),
            link: kind.database_url().to_string(),
        };
        if let Err(err) = self.graph.put_database_info(info) {
            warn!(error = %err, "failed to record database info");
        }
    }

    pub fn skip(&mut self, row: usize, reason: SkipReason, detail: &str) {
        match reason {
            SkipReason::Malformed => warn!(row, detail, "skipping malformed row"),
            _ => info!(row, ?reason, detail, "skipping row"),
        }
        self.summary.skip(reason);
    }

    pub fn resolve_mirna(&mut self, name: &str, species_prefix: &str) -> MirnaResolution {
        self.mirnas.resolve(&*self.graph, name, species_prefix)
    }

    pub fn resolve_gene(
        &mut self,
        id: &str,
        kind: GeneIdKind,
        species: Option<&Species>,
    ) -> GeneResolution {
        self.genes.resolve(id, kind, species)
    }

    /// Materializes the target node, counting a store failure as a skip.
    pub fn merge_target(&mut self, row: usize, record: &GeneRecord) -> Option<TargetId> {
        match self.graph.merge_target(record) {
            Ok((id, created)) => {
                if created {
                    self.summary.nodes_created += 1;
                }
                Some(id)
            }
            Err(err) => {
                self.skip(row, SkipReason::StoreError, &err.to_string());
                None
            }
        }
    }

    pub fn record_edge(&mut self, row: usize, observation: Observation<'_>) -> bool {
        match self.reconciler.reconcile(&mut *self.graph, observation) {
            Ok(outcome) => {
                if let EdgeOutcome::AlreadyExists(_) = outcome {
                    info!(row, relation = %self.settings.label, "edge already exists");
                }
                self.summary.record(outcome);
                true
            }
            Err(err) => {
                self.skip(row, SkipReason::StoreError, &err.to_string());
                false
            }
        }
    }

    /// Bookkeeping after a row: periodic progress lines and checkpoints.
    pub fn row_finished(&mut self, row: usize) -> Result<(), KiraError> {
        if self.settings.progress_interval > 0 && row % self.settings.progress_interval == 0 {
            self.progress(format!(
                "{}: {} rows read, {} created, {} updated, {} skipped",
                self.settings.label,
                self.summary.rows_read,
                self.summary.edges_created,
                self.summary.edges_updated,
                self.summary.skipped_total()
            ));
        }
        if self.settings.checkpoint_interval > 0 && row % self.settings.checkpoint_interval == 0 {
            self.checkpoint(row)?;
        }
        Ok(())
    }

    fn checkpoint(&mut self, row: usize) -> Result<(), KiraError> {
        let Some(path) = self.settings.checkpoint_path.clone() else {
            return Ok(());
        };
        self.graph.flush()?;
        self.genes.flush()?;
        let checkpoint = Checkpoint {
            relation: self.settings.label.clone(),
            data_file: self.settings.data_file.clone(),
            last_row: row,
            summary: self.summary.clone(),
            stats: self.reconciler.stats().clone(),
            saved_at: Utc::now().to_rfc3339(),
        };
        Store::write_json_atomic(&path, &checkpoint)
    }

    /// Records the relation summary, flushes the graph and caches, and drops
    /// the checkpoint of a completed run.
    pub fn finish(self, source_url: &str, cutoff: f64) -> Result<ImportReport, KiraError> {
        let info = self
            .reconciler
            .finish(&self.settings.label, source_url, cutoff);
        self.graph.put_relation_info(info.clone())?;
        self.finish_without_relation(Some(info))
    }

    pub fn finish_without_relation(
        self,
        relation_info: Option<RelationGeneralInfo>,
    ) -> Result<ImportReport, KiraError> {
        self.graph.flush()?;
        self.genes.flush()?;
        if let Some(path) = &self.settings.checkpoint_path {
            Store::remove_file(path)?;
        }
        let report = ImportReport {
            relation: self.settings.label.clone(),
            data_file: self.settings.data_file.clone(),
            resumed_after: self.resumed_after(),
            summary: self.summary.clone(),
            relation_info,
            gene_lookups: self.genes.stats(),
            elapsed_ms: self.started.elapsed().as_millis(),
        };
        self.progress(format!(
            "{}: finished, {} rows read, {} processed",
            report.relation, report.summary.rows_read, report.summary.rows_processed
        ));
        Ok(report)
    }
}

/// Column positions resolved once from a header row.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    columns: BTreeMap<String, usize>,
    width: usize,
}

impl HeaderIndex {
    pub fn new(file: &str, header: &StringRecord, required: &[&str]) -> Result<Self, KiraError> {
        let columns = header
            .iter()
            .enumerate()
            .map(|(idx, name)| (normalize_header(name), idx))
            .fold(BTreeMap::new(), |mut map, (name, idx)| {
                map.entry(name).or_insert(idx);
                map
            });
        let missing = required
            .iter()
            .filter(|name| !columns.contains_key(&normalize_header(name)))
            .copied()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(KiraError::MissingColumns {
                file: file.to_string(),
                columns: missing.join(", "),
            });
        }
        Ok(Self {
            columns,
            width: header.len(),
        })
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.get(&normalize_header(name)).copied()
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .trim_start_matches('#')
        .trim()
        .to_lowercase()
        .replace('_', " ")
}

pub fn tsv_reader(input: Box<dyn BufRead>) -> csv::Reader<Box<dyn BufRead>> {
    delimited_reader(input, b'\t')
}

pub fn delimited_reader(input: Box<dyn BufRead>, delimiter: u8) -> csv::Reader<Box<dyn BufRead>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .quoting(delimiter == b',')
        .from_reader(input)
}

pub fn read_headers(
    reader: &mut csv::Reader<Box<dyn BufRead>>,
    file: &str,
) -> Result<StringRecord, KiraError> {
    let header = reader
        .headers()
        .map_err(|err| KiraError::MissingColumns {
            file: file.to_string(),
            columns: format!("unreadable header ({err})"),
        })?
        .clone();
    if header.iter().all(|field| field.trim().is_empty()) {
        return Err(KiraError::MissingColumns {
            file: file.to_string(),
            columns: "header row".to_string(),
        });
    }
    Ok(header)
}

pub fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).map(str::trim).unwrap_or_default()
}

pub fn parse_score(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|score| score.is_finite())
}
