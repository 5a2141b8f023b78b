use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{RelationKind, RelationSpec, ScoreConvention, Species};
use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-mg.json";
pub const DEFAULT_PROGRESS_INTERVAL: usize = 5_000;
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 50_000;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub graph_path: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub aliases_file: Option<String>,
    #[serde(default)]
    pub progress_interval: Option<usize>,
    #[serde(default)]
    pub checkpoint_interval: Option<usize>,
    #[serde(default)]
    pub species: Vec<SpeciesEntry>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SpeciesEntry {
    pub prefix: String,
    pub name: String,
    pub taxid: u32,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RelationEntry {
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub cutoff: Option<f64>,
    #[serde(default)]
    pub score_convention: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationSettings {
    pub source_url: Option<String>,
    pub cutoff: Option<f64>,
    pub convention: Option<ScoreConvention>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub graph_path: Option<Utf8PathBuf>,
    pub cache_dir: Option<Utf8PathBuf>,
    pub aliases_file: Option<PathBuf>,
    pub progress_interval: usize,
    pub checkpoint_interval: usize,
    pub species: Vec<Species>,
    pub relations: BTreeMap<String, RelationSettings>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            graph_path: None,
            cache_dir: None,
            aliases_file: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            species: Species::builtin(),
            relations: BTreeMap::new(),
        }
    }
}

impl ResolvedConfig {
    pub fn species(&self, prefix: &str) -> Result<&Species, KiraError> {
        Species::find(&self.species, prefix)
    }

    /// Relation as configured for `label`, falling back to the tool defaults.
    pub fn relation(&self, label: &str, kind: RelationKind) -> RelationSpec {
        let spec = RelationSpec::new(label, kind);
        match self.relations.get(label).and_then(|settings| settings.convention) {
            Some(convention) => spec.with_convention(convention),
            None => spec,
        }
    }

    pub fn source_url(&self, label: &str, kind: RelationKind) -> String {
        self.relations
            .get(label)
            .and_then(|settings| settings.source_url.clone())
            .unwrap_or_else(|| kind.default_source_url().to_string())
    }

    pub fn cutoff(&self, label: &str) -> f64 {
        self.relations
            .get(label)
            .and_then(|settings| settings.cutoff)
            .unwrap_or(0.0)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let defaults = ResolvedConfig::default();

        let mut species = defaults.species;
        for entry in config.species {
            let prefix = entry.prefix.trim().to_ascii_lowercase();
            if prefix.is_empty() {
                return Err(KiraError::ConfigParse("species entry without prefix".to_string()));
            }
            let resolved = Species::new(&prefix, entry.name.trim(), entry.taxid);
            match species.iter_mut().find(|known| known.prefix == prefix) {
                Some(known) => *known = resolved,
                None => species.push(resolved),
            }
        }

        let relations = config
            .relations
            .into_iter()
            .map(|(label, entry)| {
                let convention = entry
                    .score_convention
                    .as_deref()
                    .map(|value| {
                        value
                            .parse::<ScoreConvention>()
                            .map_err(|err| KiraError::ConfigParse(err.to_string()))
                    })
                    .transpose()?;
                Ok((
                    label,
                    RelationSettings {
                        source_url: entry.source_url,
                        cutoff: entry.cutoff,
                        convention,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, KiraError>>()?;

        let progress_interval = config
            .progress_interval
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_PROGRESS_INTERVAL);
        let checkpoint_interval = config
            .checkpoint_interval
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_CHECKPOINT_INTERVAL);

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            graph_path: config.graph_path.map(Utf8PathBuf::from),
            cache_dir: config.cache_dir.map(Utf8PathBuf::from),
            aliases_file: config.aliases_file.map(PathBuf::from),
            progress_interval,
            checkpoint_interval,
            species,
            relations,
        })
    }
}
