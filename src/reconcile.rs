use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EdgeId, MirnaId, RelationKind, RelationSpec, Score, ScoreConvention, TargetId};
use crate::error::KiraError;
use crate::graph::{EdgeRecord, GraphStore, RelationGeneralInfo};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub source_mirna: String,
    pub source_target: String,
}

#[derive(Debug, Clone)]
pub struct Observation<'a> {
    pub relation: &'a RelationSpec,
    pub from: MirnaId,
    pub to: TargetId,
    pub score: Score,
    pub provenance: Provenance,
    pub evidence: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeOutcome {
    Created(EdgeId),
    Updated(EdgeId),
    AlreadyExists(EdgeId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub observations: usize,
}

impl ScoreRange {
    pub fn observe(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
        self.observations += 1;
    }
}

/// Single write path for interaction edges. Applies the relation's merge
/// policy and tracks the running score range per relation label.
#[derive(Debug, Default)]
pub struct EdgeReconciler {
    stats: HashMap<String, ScoreRange>,
}

impl EdgeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats(stats: HashMap<String, ScoreRange>) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &HashMap<String, ScoreRange> {
        &self.stats
    }

    pub fn range(&self, relation: &str) -> ScoreRange {
        self.stats.get(relation).copied().unwrap_or_default()
    }

    pub fn reconcile(
        &mut self,
        graph: &mut dyn GraphStore,
        observation: Observation<'_>,
    ) -> Result<EdgeOutcome, KiraError> {
        let relation = observation.relation;
        if let Some(value) = observation.score.as_f64() {
            self.stats
                .entry(relation.label.clone())
                .or_default()
                .observe(value);
        }

        let merge_key = merge_key(&observation);
        let Some(key) = merge_key else {
            let id = graph.create_edge(new_edge(observation, None))?;
            return Ok(EdgeOutcome::Created(id));
        };
        let Some(existing_id) = graph.find_edge(&relation.label, &key) else {
            let id = graph.create_edge(new_edge(observation, Some(key)))?;
            return Ok(EdgeOutcome::Created(id));
        };

        if relation.kind == RelationKind::Rna22 || relation.convention == ScoreConvention::Categorical
        {
            debug!(relation = %relation.label, edge = existing_id.0, "edge already exists");
            return Ok(EdgeOutcome::AlreadyExists(existing_id));
        }

        let mut edge = graph.edge(existing_id).ok_or_else(|| {
            KiraError::StoreOperation(format!("edge {} vanished from index", existing_id.0))
        })?;
        let mut changed = false;
        if should_replace(relation.convention, &edge.score, &observation.score) {
            edge.score = observation.score.clone();
            changed = true;
        }
        changed |= push_unique(&mut edge.source_mirnas, &observation.provenance.source_mirna);
        changed |= push_unique(&mut edge.source_targets, &observation.provenance.source_target);
        for (key, value) in observation.evidence {
            edge.evidence.entry(key).or_insert(value);
        }
        if changed {
            graph.update_edge(existing_id, edge)?;
        }
        Ok(EdgeOutcome::Updated(existing_id))
    }

    /// Summary record for the relation; min and max fall back to 0.0 when no
    /// numeric score was observed.
    pub fn finish(&self, relation: &str, source_url: &str, cutoff: f64) -> RelationGeneralInfo {
        let range = self.range(relation);
        RelationGeneralInfo {
            name: relation.to_string(),
            source_url: source_url.to_string(),
            min: range.min.unwrap_or(0.0),
            max: range.max.unwrap_or(0.0),
            cutoff,
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

fn merge_key(observation: &Observation<'_>) -> Option<Vec<String>> {
    match observation.relation.kind {
        RelationKind::MirTarBase => None,
        RelationKind::PicTar => Some(vec![
            observation.from.0.to_string(),
            observation.to.0.to_string(),
            observation.provenance.source_mirna.to_lowercase(),
            observation.provenance.source_target.to_ascii_uppercase(),
        ]),
        RelationKind::TargetScan | RelationKind::Rna22 => Some(vec![
            observation.from.0.to_string(),
            observation.to.0.to_string(),
        ]),
    }
}

fn new_edge(observation: Observation<'_>, merge_key: Option<Vec<String>>) -> EdgeRecord {
    let mut source_mirnas = Vec::new();
    push_unique(&mut source_mirnas, &observation.provenance.source_mirna);
    let mut source_targets = Vec::new();
    push_unique(&mut source_targets, &observation.provenance.source_target);
    EdgeRecord {
        relation: observation.relation.label.clone(),
        kind: observation.relation.kind,
        from: observation.from,
        to: observation.to,
        score: observation.score,
        source_mirnas,
        source_targets,
        evidence: observation.evidence,
        merge_key,
    }
}

fn should_replace(convention: ScoreConvention, current: &Score, candidate: &Score) -> bool {
    match (current.as_f64(), candidate.as_f64()) {
        (Some(current), Some(candidate)) => convention.prefers(candidate, current),
        (None, Some(_)) => true,
        _ => false,
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || list.iter().any(|existing| existing == value) {
        return false;
    }
    list.push(value.to_string());
    true
}
