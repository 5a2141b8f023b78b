use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::error::KiraError;

pub const NOT_FOUND: &str = "NOT_FOUND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Found(Vec<String>),
    NotFound,
    Absent,
}

/// Append-only tab-separated memo of identifier lookups.
///
/// Every line holds `key_width` key columns followed by `value_width` value
/// columns. A negative result stores [`NOT_FOUND`] in every value column. When
/// a key appears more than once the earliest line is authoritative.
pub struct IdentifierCache {
    path: Utf8PathBuf,
    key_width: usize,
    value_width: usize,
    entries: HashMap<Vec<String>, Option<Vec<String>>>,
    order: Vec<Vec<String>>,
    writer: Option<BufWriter<File>>,
    skipped_lines: usize,
}

impl IdentifierCache {
    pub fn open(
        path: &Utf8Path,
        key_width: usize,
        value_width: usize,
    ) -> Result<Self, KiraError> {
        let mut cache = Self {
            path: path.to_path_buf(),
            key_width,
            value_width,
            entries: HashMap::new(),
            order: Vec::new(),
            writer: None,
            skipped_lines: 0,
        };
        if !path.as_std_path().exists() {
            return Ok(cache);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| KiraError::CacheOpen(format!("{path}: {err}")))?;
        for (idx, line) in content.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let columns = line.split('\t').collect::<Vec<_>>();
            if columns.len() != key_width + value_width {
                warn!(
                    cache = %path,
                    line = idx + 1,
                    columns = columns.len(),
                    "skipping malformed cache line"
                );
                cache.skipped_lines += 1;
                continue;
            }
            let key = columns[..key_width]
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>();
            let values = &columns[key_width..];
            let value = if values.first() == Some(&NOT_FOUND) {
                None
            } else {
                Some(values.iter().map(|value| value.to_string()).collect())
            };
            cache.remember(key, value);
        }
        debug!(cache = %path, entries = cache.entries.len(), "identifier cache loaded");
        Ok(cache)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn lookup(&self, key: &[&str]) -> CacheLookup {
        let key = key.iter().map(|value| clean_field(value)).collect::<Vec<_>>();
        match self.entries.get(&key) {
            Some(Some(values)) => CacheLookup::Found(values.clone()),
            Some(None) => CacheLookup::NotFound,
            None => CacheLookup::Absent,
        }
    }

    /// Appends a record. Passing `None` records a negative lookup.
    pub fn store(&mut self, key: &[&str], value: Option<&[String]>) -> Result<(), KiraError> {
        if key.len() != self.key_width {
            return Err(KiraError::CacheWrite(format!(
                "expected {} key columns, got {}",
                self.key_width,
                key.len()
            )));
        }
        if let Some(values) = value {
            if values.len() != self.value_width {
                return Err(KiraError::CacheWrite(format!(
                    "expected {} value columns, got {}",
                    self.value_width,
                    values.len()
                )));
            }
        }

        let key = key.iter().map(|value| clean_field(value)).collect::<Vec<_>>();
        let value = value.map(|values| {
            values
                .iter()
                .map(|value| clean_field(value))
                .collect::<Vec<_>>()
        });
        let line = format_line(&key, value.as_deref(), self.value_width);
        self.writer()?
            .write_all(line.as_bytes())
            .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
        self.remember(key, value);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), KiraError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
        }
        Ok(())
    }

    /// Rewrites the file so that every key appears exactly once.
    pub fn compact(&mut self) -> Result<usize, KiraError> {
        self.flush()?;
        self.writer = None;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| KiraError::CacheWrite("invalid cache path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
        let temp = Builder::new()
            .prefix("kira-mg-cache")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
        {
            let mut out = BufWriter::new(temp.as_file());
            for key in &self.order {
                let value = self.entries.get(key).and_then(|value| value.as_deref());
                out.write_all(format_line(key, value, self.value_width).as_bytes())
                    .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
            }
            out.flush()
                .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
        }
        temp.persist(self.path.as_std_path())
            .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
        self.skipped_lines = 0;
        Ok(self.order.len())
    }

    fn remember(&mut self, key: Vec<String>, value: Option<Vec<String>>) {
        if let Entry::Vacant(slot) = self.entries.entry(key.clone()) {
            slot.insert(value);
            self.order.push(key);
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, KiraError> {
        if self.writer.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent.as_std_path())
                    .map_err(|err| KiraError::CacheWrite(err.to_string()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path.as_std_path())
                .map_err(|err| KiraError::CacheWrite(format!("{}: {err}", self.path)))?;
            self.writer = Some(BufWriter::new(file));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| KiraError::CacheWrite("cache writer unavailable".to_string()))
    }
}

impl Drop for IdentifierCache {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            warn!(cache = %self.path, error = %err, "failed to flush identifier cache");
        }
    }
}

fn clean_field(value: &str) -> String {
    value
        .trim()
        .replace(['\t', '\n', '\r'], " ")
}

fn format_line(key: &[String], value: Option<&[String]>, value_width: usize) -> String {
    let mut columns = key.to_vec();
    match value {
        Some(values) => columns.extend(values.iter().cloned()),
        None => columns.extend(std::iter::repeat_n(NOT_FOUND.to_string(), value_width)),
    }
    let mut line = columns.join("\t");
    line.push('\n');
    line
}
