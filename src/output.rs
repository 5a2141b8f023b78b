use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CompactResult, PredictionsResult, ProgressEvent, ProgressSink, RelationsResult};
use crate::import::ImportReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Plain-text progress and summaries on stdout.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_report(report: &ImportReport) -> io::Result<()> {
        let summary = &report.summary;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Finished {} import from {}", report.relation, report.data_file)?;
        if let Some(row) = report.resumed_after {
            writeln!(stdout, "  resumed after row:          {row}")?;
        }
        writeln!(stdout, "  rows read:                  {}", summary.rows_read)?;
        writeln!(stdout, "  rows processed:             {}", summary.rows_processed)?;
        writeln!(stdout, "  rows filtered:              {}", summary.filtered)?;
        writeln!(stdout, "  nodes created:              {}", summary.nodes_created)?;
        writeln!(stdout, "  edges created:              {}", summary.edges_created)?;
        writeln!(stdout, "  edges updated:              {}", summary.edges_updated)?;
        writeln!(stdout, "  edges already present:      {}", summary.edges_existing)?;
        writeln!(stdout, "  skipped, malformed:         {}", summary.skipped_malformed)?;
        writeln!(
            stdout,
            "  skipped, unresolved miRNA:  {}",
            summary.skipped_unresolved_mirna
        )?;
        writeln!(
            stdout,
            "  skipped, unresolved target: {}",
            summary.skipped_unresolved_target
        )?;
        writeln!(stdout, "  skipped, store error:       {}", summary.skipped_store_error)?;
        writeln!(
            stdout,
            "  gene lookups:               {} remote, {} cached, {} failed",
            report.gene_lookups.lookups,
            report.gene_lookups.cache_hits,
            report.gene_lookups.collaborator_failures
        )?;
        if let Some(info) = &report.relation_info {
            writeln!(
                stdout,
                "  score range:                {} .. {} (cutoff {})",
                info.min, info.max, info.cutoff
            )?;
        }
        writeln!(stdout, "  elapsed:                    {} ms", report.elapsed_ms)
    }

    pub fn print_relations(result: &RelationsResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(
            stdout,
            "{} miRNAs, {} targets, {} edges",
            result.mirnas, result.targets, result.edges
        )?;
        for database in &result.databases {
            writeln!(stdout, "database {}\t{}", database.name, database.link)?;
        }
        for relation in &result.relations {
            writeln!(
                stdout,
                "relation {}\tmin={}\tmax={}\tcutoff={}\t{}\t{}",
                relation.name,
                relation.min,
                relation.max,
                relation.cutoff,
                relation.source_url,
                relation.updated_at
            )?;
        }
        Ok(())
    }

    pub fn print_predictions(result: &PredictionsResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        if result.predictions.is_empty() {
            return writeln!(stdout, "no predictions for {}", result.mirna);
        }
        for prediction in &result.predictions {
            writeln!(
                stdout,
                "{}\t{}\t{}\t{}",
                prediction.mirna, prediction.gene, prediction.relation, prediction.score
            )?;
        }
        Ok(())
    }

    pub fn print_compact(result: &CompactResult) -> io::Result<()> {
        writeln!(
            io::stdout(),
            "compacted {} to {} records",
            result.cache_path, result.records
        )
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let mut stdout = io::stdout().lock();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(stdout, "[{:>7.1}s] {}", elapsed.as_secs_f64(), event.message),
            None => writeln!(stdout, "{}", event.message),
        };
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &ImportReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_relations(result: &RelationsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_predictions(result: &PredictionsResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_compact(result: &CompactResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
