use std::collections::{BTreeMap, HashMap};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{EdgeId, MirnaId, MirnaKind, RelationKind, Score, TargetId, TargetKey};
use crate::error::KiraError;
use crate::gene::GeneRecord;
use crate::mirna::{CanonicalMirna, MirnaCatalog};
use crate::store::Store;

const NCBI_GENE_URL: &str = "https://www.ncbi.nlm.nih.gov/gene";
const MIRBASE_URL: &str = "https://www.mirbase.org/mature";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirnaNode {
    pub name: String,
    pub accession: Option<String>,
    pub species: String,
    pub kind: MirnaKind,
    pub mirbase_link: Option<String>,
}

impl MirnaNode {
    pub fn new(name: &str, accession: Option<&str>, species: &str, kind: MirnaKind) -> Self {
        Self {
            name: name.to_string(),
            accession: accession.map(|value| value.to_string()),
            species: species.to_string(),
            kind,
            mirbase_link: accession.map(|acc| format!("{MIRBASE_URL}/{acc}")),
        }
    }

    fn canonical(&self) -> CanonicalMirna {
        CanonicalMirna {
            name: self.name.clone(),
            accession: self.accession.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetNode {
    pub name: Option<String>,
    pub species: Option<String>,
    pub ensembl: Option<String>,
    pub geneid: Option<String>,
    pub ncbi_link: Option<String>,
}

impl TargetNode {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.geneid.clone())
            .or_else(|| self.ensembl.clone())
            .unwrap_or_default()
    }

    fn apply(&mut self, record: &GeneRecord) {
        if let Some(symbol) = &record.symbol {
            self.name = Some(symbol.clone());
        }
        if let Some(species) = &record.species {
            self.species = Some(species.clone());
        }
        if let Some(ensembl) = &record.ensembl {
            self.ensembl = Some(ensembl.clone());
        }
        if let Some(geneid) = &record.geneid {
            self.geneid = Some(geneid.clone());
            self.ncbi_link = Some(format!("{NCBI_GENE_URL}/{geneid}"));
        }
    }
}

/// Edge from a miRNA node to a target node. `merge_key` is absent for
/// relations that never merge (every observation is its own edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub relation: String,
    pub kind: RelationKind,
    pub from: MirnaId,
    pub to: TargetId,
    pub score: Score,
    #[serde(default)]
    pub source_mirnas: Vec<String>,
    #[serde(default)]
    pub source_targets: Vec<String>,
    #[serde(default)]
    pub evidence: BTreeMap<String, String>,
    #[serde(default)]
    pub merge_key: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationGeneralInfo {
    pub name: String,
    pub source_url: String,
    pub min: f64,
    pub max: f64,
    pub cutoff: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub mirna: String,
    pub gene: String,
    pub relation: String,
    pub score: Score,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub mirnas: usize,
    pub targets: usize,
    pub edges: usize,
    pub databases: Vec<DatabaseInfo>,
    pub relations: Vec<RelationGeneralInfo>,
}

/// Write side of the property graph used by the importers.
pub trait GraphStore: MirnaCatalog {
    /// Creates the node when its exact name is unknown. Existing nodes are
    /// returned untouched so an accession never changes once set.
    fn merge_mirna(&mut self, node: MirnaNode) -> Result<(MirnaId, bool), KiraError>;
    fn find_mirna(&self, name: &str) -> Option<MirnaId>;
    fn mirna(&self, id: MirnaId) -> Option<MirnaNode>;

    fn find_target(&self, key: &TargetKey) -> Option<TargetId>;
    /// MERGE on the strong key of `record`; attributes of an existing node are
    /// overwritten by the newest resolution.
    fn merge_target(&mut self, record: &GeneRecord) -> Result<(TargetId, bool), KiraError>;
    fn target(&self, id: TargetId) -> Option<TargetNode>;

    fn find_edge(&self, relation: &str, key: &[String]) -> Option<EdgeId>;
    fn edge(&self, id: EdgeId) -> Option<EdgeRecord>;
    fn create_edge(&mut self, edge: EdgeRecord) -> Result<EdgeId, KiraError>;
    fn update_edge(&mut self, id: EdgeId, edge: EdgeRecord) -> Result<(), KiraError>;

    fn put_database_info(&mut self, info: DatabaseInfo) -> Result<(), KiraError>;
    fn put_relation_info(&mut self, info: RelationGeneralInfo) -> Result<(), KiraError>;
    fn relation_info(&self, name: &str) -> Option<RelationGeneralInfo>;

    fn flush(&mut self) -> Result<(), KiraError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    mirnas: Vec<MirnaNode>,
    #[serde(default)]
    targets: Vec<TargetNode>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
    #[serde(default)]
    relations: BTreeMap<String, RelationGeneralInfo>,
    #[serde(default)]
    databases: Vec<DatabaseInfo>,
}

/// In-memory property graph persisted as one JSON snapshot.
#[derive(Debug, Default)]
pub struct JsonGraph {
    path: Option<Utf8PathBuf>,
    data: Snapshot,
    mirna_by_name: HashMap<String, MirnaId>,
    mirna_by_lower: HashMap<String, Vec<MirnaId>>,
    mirna_by_accession: HashMap<String, MirnaId>,
    target_by_geneid: HashMap<String, TargetId>,
    target_by_ensembl: HashMap<String, TargetId>,
    edge_by_key: HashMap<(String, Vec<String>), EdgeId>,
    edges_by_mirna: HashMap<MirnaId, Vec<EdgeId>>,
}

impl JsonGraph {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: &Utf8Path) -> Result<Self, KiraError> {
        let data = Store::read_json::<Snapshot>(path)
            .map_err(|err| KiraError::GraphOpen(err.to_string()))?
            .unwrap_or_default();
        let mut graph = Self {
            path: Some(path.to_path_buf()),
            data,
            ..Self::default()
        };
        graph.rebuild_indexes();
        debug!(
            graph = %path,
            mirnas = graph.data.mirnas.len(),
            targets = graph.data.targets.len(),
            edges = graph.data.edges.len(),
            "graph snapshot loaded"
        );
        Ok(graph)
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            mirnas: self.data.mirnas.len(),
            targets: self.data.targets.len(),
            edges: self.data.edges.len(),
            databases: self.data.databases.clone(),
            relations: self.data.relations.values().cloned().collect(),
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeRecord)> {
        self.data
            .edges
            .iter()
            .enumerate()
            .map(|(idx, edge)| (EdgeId(idx), edge))
    }

    pub fn edges_for_relation<'a>(
        &'a self,
        relation: &'a str,
    ) -> impl Iterator<Item = &'a EdgeRecord> + 'a {
        self.data
            .edges
            .iter()
            .filter(move |edge| edge.relation == relation)
    }

    /// All scored interactions recorded for miRNAs whose name matches
    /// `mirna` case-insensitively.
    pub fn predictions(&self, mirna: &str) -> Vec<Prediction> {
        let ids = self
            .mirna_by_lower
            .get(&mirna.trim().to_lowercase())
            .cloned()
            .unwrap_or_default();
        let mut out = Vec::new();
        for id in ids {
            let Some(node) = self.data.mirnas.get(id.0) else {
                continue;
            };
            for edge_id in self.edges_by_mirna.get(&id).into_iter().flatten() {
                let Some(edge) = self.data.edges.get(edge_id.0) else {
                    continue;
                };
                let gene = self
                    .data
                    .targets
                    .get(edge.to.0)
                    .map(|target| target.display_name())
                    .unwrap_or_default();
                out.push(Prediction {
                    mirna: node.name.clone(),
                    gene,
                    relation: edge.relation.clone(),
                    score: edge.score.clone(),
                });
            }
        }
        out
    }

    fn rebuild_indexes(&mut self) {
        self.mirna_by_name.clear();
        self.mirna_by_lower.clear();
        self.mirna_by_accession.clear();
        self.target_by_geneid.clear();
        self.target_by_ensembl.clear();
        self.edge_by_key.clear();
        self.edges_by_mirna.clear();

        for idx in 0..self.data.mirnas.len() {
            self.index_mirna(MirnaId(idx));
        }
        for idx in 0..self.data.targets.len() {
            self.index_target(TargetId(idx));
        }
        for (idx, edge) in self.data.edges.iter().enumerate() {
            if let Some(key) = &edge.merge_key {
                self.edge_by_key
                    .entry((edge.relation.clone(), key.clone()))
                    .or_insert(EdgeId(idx));
            }
            self.edges_by_mirna
                .entry(edge.from)
                .or_default()
                .push(EdgeId(idx));
        }
    }

    fn index_mirna(&mut self, id: MirnaId) {
        let Some(node) = self.data.mirnas.get(id.0) else {
            return;
        };
        self.mirna_by_name.entry(node.name.clone()).or_insert(id);
        let lower = self.mirna_by_lower.entry(node.name.to_lowercase()).or_default();
        if !lower.contains(&id) {
            lower.push(id);
        }
        if let Some(accession) = &node.accession {
            self.mirna_by_accession
                .entry(accession.to_ascii_uppercase())
                .or_insert(id);
        }
    }

    fn index_target(&mut self, id: TargetId) {
        let Some(node) = self.data.targets.get(id.0) else {
            return;
        };
        if let Some(geneid) = &node.geneid {
            self.target_by_geneid.entry(geneid.clone()).or_insert(id);
        }
        if let Some(ensembl) = &node.ensembl {
            // Nodes carrying a GeneID take over the Ensembl code from
            // Ensembl-only placeholders.
            let replace = match self.target_by_ensembl.get(ensembl) {
                None => true,
                Some(existing) => {
                    *existing != id
                        && node.geneid.is_some()
                        && self
                            .data
                            .targets
                            .get(existing.0)
                            .is_some_and(|other| other.geneid.is_none())
                }
            };
            if replace {
                self.target_by_ensembl.insert(ensembl.clone(), id);
            }
        }
    }

    fn check_endpoints(&self, edge: &EdgeRecord) -> Result<(), KiraError> {
        if edge.from.0 >= self.data.mirnas.len() {
            return Err(KiraError::StoreOperation(format!(
                "edge {} references unknown miRNA node {}",
                edge.relation, edge.from.0
            )));
        }
        if edge.to.0 >= self.data.targets.len() {
            return Err(KiraError::StoreOperation(format!(
                "edge {} references unknown target node {}",
                edge.relation, edge.to.0
            )));
        }
        Ok(())
    }
}

impl MirnaCatalog for JsonGraph {
    fn find_mirnas_by_name(&self, name: &str) -> Result<Vec<CanonicalMirna>, KiraError> {
        Ok(self
            .mirna_by_lower
            .get(&name.trim().to_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|id| self.data.mirnas.get(id.0))
            .map(|node| node.canonical())
            .collect())
    }

    fn find_mirna_by_accession(
        &self,
        accession: &str,
    ) -> Result<Option<CanonicalMirna>, KiraError> {
        Ok(self
            .mirna_by_accession
            .get(&accession.trim().to_ascii_uppercase())
            .and_then(|id| self.data.mirnas.get(id.0))
            .map(|node| node.canonical()))
    }
}

impl GraphStore for JsonGraph {
    fn merge_mirna(&mut self, node: MirnaNode) -> Result<(MirnaId, bool), KiraError> {
        if node.name.trim().is_empty() {
            return Err(KiraError::StoreOperation("miRNA without a name".to_string()));
        }
        if let Some(id) = self.mirna_by_name.get(&node.name) {
            return Ok((*id, false));
        }
        let id = MirnaId(self.data.mirnas.len());
        self.data.mirnas.push(node);
        self.index_mirna(id);
        Ok((id, true))
    }

    fn find_mirna(&self, name: &str) -> Option<MirnaId> {
        self.mirna_by_name.get(name).copied()
    }

    fn mirna(&self, id: MirnaId) -> Option<MirnaNode> {
        self.data.mirnas.get(id.0).cloned()
    }

    fn find_target(&self, key: &TargetKey) -> Option<TargetId> {
        match key {
            TargetKey::GeneId(geneid) => self.target_by_geneid.get(geneid).copied(),
            TargetKey::Ensembl(ensembl) => self.target_by_ensembl.get(ensembl).copied(),
        }
    }

    fn merge_target(&mut self, record: &GeneRecord) -> Result<(TargetId, bool), KiraError> {
        if record.strong_key().is_none() {
            return Err(KiraError::StoreOperation(
                "target without GeneID or Ensembl code".to_string(),
            ));
        }
        let existing = record
            .geneid
            .as_ref()
            .and_then(|geneid| self.target_by_geneid.get(geneid))
            .or_else(|| {
                record
                    .ensembl
                    .as_ref()
                    .and_then(|ensembl| self.target_by_ensembl.get(ensembl))
            })
            .copied();
        let existing = existing.filter(|id| {
            // An Ensembl match only merges when the GeneIDs do not disagree.
            let node = &self.data.targets[id.0];
            match (&node.geneid, &record.geneid) {
                (Some(known), Some(incoming)) => known == incoming,
                _ => true,
            }
        });

        let (id, created) = match existing {
            Some(id) => {
                self.data.targets[id.0].apply(record);
                (id, false)
            }
            None => {
                let mut node = TargetNode::default();
                node.apply(record);
                self.data.targets.push(node);
                (TargetId(self.data.targets.len() - 1), true)
            }
        };
        self.index_target(id);
        Ok((id, created))
    }

    fn target(&self, id: TargetId) -> Option<TargetNode> {
        self.data.targets.get(id.0).cloned()
    }

    fn find_edge(&self, relation: &str, key: &[String]) -> Option<EdgeId> {
        self.edge_by_key
            .get(&(relation.to_string(), key.to_vec()))
            .copied()
    }

    fn edge(&self, id: EdgeId) -> Option<EdgeRecord> {
        self.data.edges.get(id.0).cloned()
    }

    fn create_edge(&mut self, edge: EdgeRecord) -> Result<EdgeId, KiraError> {
        self.check_endpoints(&edge)?;
        let id = EdgeId(self.data.edges.len());
        if let Some(key) = &edge.merge_key {
            let index_key = (edge.relation.clone(), key.clone());
            if self.edge_by_key.contains_key(&index_key) {
                return Err(KiraError::StoreOperation(format!(
                    "edge {} already exists for key {}",
                    edge.relation,
                    key.join("|")
                )));
            }
            self.edge_by_key.insert(index_key, id);
        }
        self.edges_by_mirna.entry(edge.from).or_default().push(id);
        self.data.edges.push(edge);
        Ok(id)
    }

    fn update_edge(&mut self, id: EdgeId, edge: EdgeRecord) -> Result<(), KiraError> {
        self.check_endpoints(&edge)?;
        let current = self
            .data
            .edges
            .get_mut(id.0)
            .ok_or_else(|| KiraError::StoreOperation(format!("unknown edge {}", id.0)))?;
        if current.from != edge.from
            || current.to != edge.to
            || current.relation != edge.relation
            || current.merge_key != edge.merge_key
        {
            return Err(KiraError::StoreOperation(format!(
                "edge {} cannot change endpoints or merge key",
                id.0
            )));
        }
        *current = edge;
        Ok(())
    }

    fn put_database_info(&mut self, info: DatabaseInfo) -> Result<(), KiraError> {
        if !self.data.databases.contains(&info) {
            self.data.databases.push(info);
        }
        Ok(())
    }

    fn put_relation_info(&mut self, info: RelationGeneralInfo) -> Result<(), KiraError> {
        self.data.relations.insert(info.name.clone(), info);
        Ok(())
    }

    fn relation_info(&self, name: &str) -> Option<RelationGeneralInfo> {
        self.data.relations.get(name).cloned()
    }

    fn flush(&mut self) -> Result<(), KiraError> {
        match &self.path {
            Some(path) => Store::write_json_compact_atomic(path, &self.data)
                .map_err(|err| KiraError::StoreOperation(err.to_string())),
            None => Ok(()),
        }
    }
}
