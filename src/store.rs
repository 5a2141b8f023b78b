use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::KiraError;

pub const GENE_CACHE_FILE: &str = "gene_lookup.tsv";

#[derive(Debug, Clone)]
pub struct Store {
    project_root: Utf8PathBuf,
    cache_root: Utf8PathBuf,
    graph_path: Option<Utf8PathBuf>,
}

impl Store {
    pub fn new() -> Result<Self, KiraError> {
        let cwd = std::env::current_dir().map_err(|err| KiraError::Filesystem(err.to_string()))?;
        let project_root = Utf8PathBuf::from_path_buf(cwd.join(".kira-mg"))
            .map_err(|_| KiraError::Filesystem("invalid project path".to_string()))?;

        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-mirna-graph"))
                    .ok()
            })
            .ok_or_else(|| {
                KiraError::Filesystem("unable to resolve cache directory".to_string())
            })?;

        Ok(Self {
            project_root,
            cache_root,
            graph_path: None,
        })
    }

    pub fn new_with_paths(project_root: Utf8PathBuf, cache_root: Utf8PathBuf) -> Self {
        Self {
            project_root,
            cache_root,
            graph_path: None,
        }
    }

    pub fn with_graph_path(mut self, path: Utf8PathBuf) -> Self {
        self.graph_path = Some(path);
        self
    }

    pub fn with_cache_root(mut self, path: Utf8PathBuf) -> Self {
        self.cache_root = path;
        self
    }

    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn graph_path(&self) -> Utf8PathBuf {
        self.graph_path
            .clone()
            .unwrap_or_else(|| self.project_root.join("graph.json"))
    }

    pub fn gene_cache_path(&self) -> Utf8PathBuf {
        self.cache_root.join(GENE_CACHE_FILE)
    }

    pub fn checkpoint_path(&self, relation: &str) -> Utf8PathBuf {
        let safe = relation
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
            .collect::<String>();
        self.project_root
            .join("checkpoints")
            .join(format!("{safe}.json"))
    }

    pub fn ensure_project_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.project_root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn ensure_cache_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), KiraError> {
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    /// Single-line variant for large snapshots rewritten at every checkpoint.
    pub fn write_json_compact_atomic<T: Serialize>(
        path: &Utf8Path,
        value: &T,
    ) -> Result<(), KiraError> {
        let content =
            serde_json::to_vec(value).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), KiraError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>, KiraError> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        let value = serde_json::from_str(&content)
            .map_err(|err| KiraError::Filesystem(format!("{path}: {err}")))?;
        Ok(Some(value))
    }

    pub fn remove_file(path: &Utf8Path) -> Result<(), KiraError> {
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}
