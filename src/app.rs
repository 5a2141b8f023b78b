use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::cache::IdentifierCache;
use crate::config::ResolvedConfig;
use crate::domain::{RelationKind, RelationSpec, Species};
use crate::error::KiraError;
use crate::fs_util::open_input;
use crate::gene::{GENE_CACHE_KEY_WIDTH, GENE_CACHE_VALUE_WIDTH, GeneLookup, GeneResolver};
use crate::graph::{DatabaseInfo, GraphSummary, JsonGraph, Prediction, RelationGeneralInfo};
use crate::import::mirtarbase::MirTarBaseOptions;
use crate::import::pictar::{DEFAULT_PICTAR_SPECIES, PicTarOptions};
use crate::import::rna22::Rna22Options;
use crate::import::targetscan::TargetScanOptions;
use crate::import::{
    Checkpoint, ImportContext, ImportReport, RunSettings, mirbase, mirtarbase, pictar, rna22,
    targetscan,
};
use crate::mirna::{AliasTable, MirnaResolver};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct RelationsResult {
    pub mirnas: usize,
    pub targets: usize,
    pub edges: usize,
    pub databases: Vec<DatabaseInfo>,
    pub relations: Vec<RelationGeneralInfo>,
}

impl From<GraphSummary> for RelationsResult {
    fn from(summary: GraphSummary) -> Self {
        Self {
            mirnas: summary.mirnas,
            targets: summary.targets,
            edges: summary.edges,
            databases: summary.databases,
            relations: summary.relations,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionsResult {
    pub mirna: String,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactResult {
    pub cache_path: String,
    pub records: usize,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Entry point for every command: owns the store layout, the resolved
/// configuration and the three gene lookup services.
pub struct App<N: GeneLookup, E: GeneLookup, U: GeneLookup> {
    store: Store,
    config: ResolvedConfig,
    ncbi: N,
    ensembl: E,
    uniprot: U,
}

impl<N: GeneLookup, E: GeneLookup, U: GeneLookup> App<N, E, U> {
    pub fn new(store: Store, config: ResolvedConfig, ncbi: N, ensembl: E, uniprot: U) -> Self {
        Self {
            store,
            config,
            ncbi,
            ensembl,
            uniprot,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Lookup order used when resolving targets for a given source.
    pub fn gene_chain(&self, kind: RelationKind) -> Vec<&dyn GeneLookup> {
        match kind {
            RelationKind::TargetScan | RelationKind::Rna22 => {
                vec![&self.ncbi as &dyn GeneLookup, &self.uniprot, &self.ensembl]
            }
            RelationKind::PicTar | RelationKind::MirTarBase => vec![&self.ncbi as &dyn GeneLookup],
        }
    }

    pub fn import_mirbase(
        &self,
        data_file: &Path,
        species_prefix: &str,
        species_name: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ImportReport, KiraError> {
        let species = match (self.config.species(species_prefix), species_name) {
            (Ok(known), Some(name)) => Species::new(&known.prefix, name, known.taxid),
            (Ok(known), None) => known.clone(),
            (Err(_), Some(name)) => Species::new(&species_prefix.to_lowercase(), name, 0),
            (Err(err), None) => return Err(err),
        };
        let input = open_input(data_file)?;
        let mut graph = self.open_graph()?;
        mirbase::run(
            &mut graph,
            input,
            &species,
            &data_file.display().to_string(),
            sink,
            self.config.progress_interval,
        )
    }

    pub fn import_targetscan(
        &self,
        data_file: &Path,
        species_prefix: &str,
        options: &TargetScanOptions,
        restart: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ImportReport, KiraError> {
        let species = self.config.species(species_prefix)?.clone();
        let label = RelationKind::TargetScan.to_string();
        self.run_import(
            RelationKind::TargetScan,
            &label,
            data_file,
            restart,
            sink,
            |ctx, input, relation| targetscan::run(ctx, input, &species, relation, options),
        )
    }

    pub fn import_mirtarbase(
        &self,
        data_file: &Path,
        species_prefix: &str,
        options: &MirTarBaseOptions,
        restart: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ImportReport, KiraError> {
        let species = self.config.species(species_prefix)?.clone();
        let label = RelationKind::MirTarBase.to_string();
        self.run_import(
            RelationKind::MirTarBase,
            &label,
            data_file,
            restart,
            sink,
            |ctx, input, relation| mirtarbase::run(ctx, input, &species, relation, options),
        )
    }

    pub fn import_pictar(
        &self,
        data_file: &Path,
        relation_name: &str,
        species_prefix: Option<&str>,
        options: &PicTarOptions,
        restart: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ImportReport, KiraError> {
        let species = self
            .config
            .species(species_prefix.unwrap_or(DEFAULT_PICTAR_SPECIES))?
            .clone();
        self.run_import(
            RelationKind::PicTar,
            relation_name,
            data_file,
            restart,
            sink,
            |ctx, input, relation| pictar::run(ctx, input, &species, relation, options),
        )
    }

    pub fn import_rna22(
        &self,
        data_file: &Path,
        relation_name: &str,
        options: &Rna22Options,
        restart: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ImportReport, KiraError> {
        let species = self.config.species.clone();
        self.run_import(
            RelationKind::Rna22,
            relation_name,
            data_file,
            restart,
            sink,
            |ctx, input, relation| rna22::run(ctx, input, &species, relation, options),
        )
    }

    pub fn relations(&self) -> Result<RelationsResult, KiraError> {
        Ok(self.open_graph()?.summary().into())
    }

    pub fn predictions(&self, mirna: &str) -> Result<PredictionsResult, KiraError> {
        let graph = self.open_graph()?;
        Ok(PredictionsResult {
            mirna: mirna.to_string(),
            predictions: graph.predictions(mirna),
        })
    }

    /// Rewrites the gene cache keeping only the first record per key.
    pub fn compact_caches(&self) -> Result<CompactResult, KiraError> {
        let mut cache = self.open_gene_cache()?;
        let records = cache.compact()?;
        info!(cache = %cache.path(), records, "gene cache compacted");
        Ok(CompactResult {
            cache_path: cache.path().to_string(),
            records,
        })
    }

    fn run_import<F>(
        &self,
        kind: RelationKind,
        label: &str,
        data_file: &Path,
        restart: bool,
        sink: &dyn ProgressSink,
        driver: F,
    ) -> Result<ImportReport, KiraError>
    where
        F: FnOnce(&mut ImportContext<'_, '_>, Box<dyn BufRead>, &RelationSpec) -> Result<(), KiraError>,
    {
        let input = open_input(data_file)?;
        let mut graph = self.open_graph()?;
        let mut genes = GeneResolver::new(self.open_gene_cache()?, self.gene_chain(kind));
        let mut mirnas = MirnaResolver::new(self.load_aliases()?);
        let relation = self.config.relation(label, kind);

        let checkpoint_path = self.store.checkpoint_path(label);
        let checkpoint = if restart {
            Store::remove_file(&checkpoint_path)?;
            None
        } else {
            Checkpoint::load(&checkpoint_path)?
        };
        let settings = RunSettings {
            label: label.to_string(),
            data_file: data_file.display().to_string(),
            progress_interval: self.config.progress_interval,
            checkpoint_interval: self.config.checkpoint_interval,
            checkpoint_path: Some(checkpoint_path),
        };

        info!(relation = %label, data_file = %data_file.display(), "import started");
        let mut ctx = ImportContext::new(&mut graph, &mut genes, &mut mirnas, sink, settings);
        if let Some(checkpoint) = checkpoint {
            ctx.resume(checkpoint);
        }
        driver(&mut ctx, input, &relation)?;
        ctx.finish(
            &self.config.source_url(label, kind),
            self.config.cutoff(label),
        )
    }

    fn open_graph(&self) -> Result<JsonGraph, KiraError> {
        self.store.ensure_project_root()?;
        JsonGraph::open(&self.store.graph_path())
    }

    fn open_gene_cache(&self) -> Result<IdentifierCache, KiraError> {
        self.store.ensure_cache_root()?;
        IdentifierCache::open(
            &self.store.gene_cache_path(),
            GENE_CACHE_KEY_WIDTH,
            GENE_CACHE_VALUE_WIDTH,
        )
    }

    fn load_aliases(&self) -> Result<AliasTable, KiraError> {
        match &self.config.aliases_file {
            Some(path) => AliasTable::load(path),
            None => Ok(AliasTable::default()),
        }
    }
}
