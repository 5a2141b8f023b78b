use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheLookup, IdentifierCache};
use crate::domain::{Species, TargetKey};
use crate::error::KiraError;

pub const GENE_CACHE_KEY_WIDTH: usize = 3;
pub const GENE_CACHE_VALUE_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneIdKind {
    RefSeq,
    GeneId,
    Symbol,
    Ensembl,
}

impl GeneIdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneIdKind::RefSeq => "refseq",
            GeneIdKind::GeneId => "geneid",
            GeneIdKind::Symbol => "symbol",
            GeneIdKind::Ensembl => "ensembl",
        }
    }
}

impl fmt::Display for GeneIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub symbol: Option<String>,
    pub ensembl: Option<String>,
    pub geneid: Option<String>,
    pub species: Option<String>,
}

impl GeneRecord {
    pub fn strong_key(&self) -> Option<TargetKey> {
        if let Some(geneid) = self.geneid.as_deref().filter(|id| !id.is_empty()) {
            return Some(TargetKey::GeneId(geneid.to_string()));
        }
        self.ensembl
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| TargetKey::Ensembl(id.to_string()))
    }

    /// Minimal node for a target no collaborator could resolve. Only identifiers
    /// that were present in the input row are carried over.
    pub fn placeholder(
        ensembl: Option<&str>,
        geneid: Option<&str>,
        symbol: Option<&str>,
        species: Option<&Species>,
    ) -> Self {
        Self {
            symbol: symbol.map(|value| value.to_string()),
            ensembl: ensembl.map(|value| value.to_string()),
            geneid: geneid.map(|value| value.to_string()),
            species: species.map(|value| value.name.clone()),
        }
    }

    pub fn to_cache_fields(&self) -> Vec<String> {
        [&self.symbol, &self.ensembl, &self.geneid, &self.species]
            .into_iter()
            .map(|value| value.clone().unwrap_or_default())
            .collect()
    }

    pub fn from_cache_fields(fields: &[String]) -> Self {
        let field = |idx: usize| {
            fields
                .get(idx)
                .filter(|value| !value.is_empty())
                .cloned()
        };
        Self {
            symbol: field(0),
            ensembl: field(1),
            geneid: field(2),
            species: field(3),
        }
    }

    fn complete_with(&mut self, kind: GeneIdKind, normalized: &str) {
        match kind {
            GeneIdKind::GeneId if self.geneid.is_none() => {
                self.geneid = Some(normalized.to_string())
            }
            GeneIdKind::Ensembl if self.ensembl.is_none() => {
                self.ensembl = Some(normalized.to_string())
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneResolution {
    Resolved(GeneRecord),
    Unresolved,
}

/// One external gene-lookup service. Each method answers `Ok(None)` when the
/// service has no record or does not support that identifier kind.
pub trait GeneLookup: Send + Sync {
    fn name(&self) -> &str;

    fn by_refseq(&self, _refseq: &str) -> Result<Option<GeneRecord>, KiraError> {
        Ok(None)
    }

    fn by_gene_id(&self, _geneid: &str) -> Result<Option<GeneRecord>, KiraError> {
        Ok(None)
    }

    fn by_symbol(
        &self,
        _symbol: &str,
        _species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        Ok(None)
    }

    fn by_ensembl(
        &self,
        _ensembl: &str,
        _species: Option<&Species>,
    ) -> Result<Option<GeneRecord>, KiraError> {
        Ok(None)
    }
}

pub fn normalize_gene_id(id: &str, kind: GeneIdKind) -> Option<String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = match kind {
        GeneIdKind::RefSeq => strip_version(trimmed).to_ascii_uppercase(),
        GeneIdKind::Ensembl => {
            let base = trimmed.split('_').next().unwrap_or(trimmed);
            strip_version(base).to_ascii_uppercase()
        }
        GeneIdKind::Symbol => trimmed.to_ascii_uppercase(),
        GeneIdKind::GeneId => canonical_gene_id(trimmed)?,
    };
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn strip_version(id: &str) -> &str {
    match id.rsplit_once('.') {
        Some((base, version)) if !version.is_empty() && version.chars().all(|ch| ch.is_ascii_digit()) => base,
        _ => id,
    }
}

fn canonical_gene_id(id: &str) -> Option<String> {
    if id.chars().all(|ch| ch.is_ascii_digit()) {
        let value = id.parse::<u64>().ok()?;
        return (value > 0).then(|| value.to_string());
    }
    let value = id.parse::<f64>().ok()?;
    if value.is_finite() && value > 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some((value as u64).to_string())
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ResolverStats {
    pub cache_hits: usize,
    pub lookups: usize,
    pub collaborator_failures: usize,
}

/// Normalizes an external gene identifier, consults the identifier cache and
/// falls back to an ordered chain of lookup services. Every chain outcome is
/// memoized, including misses.
pub struct GeneResolver<'a> {
    cache: IdentifierCache,
    chain: Vec<&'a dyn GeneLookup>,
    stats: ResolverStats,
}

impl<'a> GeneResolver<'a> {
    pub fn new(cache: IdentifierCache, chain: Vec<&'a dyn GeneLookup>) -> Self {
        Self {
            cache,
            chain,
            stats: ResolverStats::default(),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        self.stats
    }

    pub fn cache(&self) -> &IdentifierCache {
        &self.cache
    }

    pub fn flush(&mut self) -> Result<(), KiraError> {
        self.cache.flush()
    }

    pub fn into_cache(self) -> IdentifierCache {
        self.cache
    }

    pub fn resolve(
        &mut self,
        external_id: &str,
        kind: GeneIdKind,
        species: Option<&Species>,
    ) -> GeneResolution {
        let Some(normalized) = normalize_gene_id(external_id, kind) else {
            debug!(id = external_id, %kind, "identifier is not resolvable");
            return GeneResolution::Unresolved;
        };
        let context = species.map(|value| value.prefix.as_str()).unwrap_or("");
        let key = [kind.as_str(), normalized.as_str(), context];

        match self.cache.lookup(&key) {
            CacheLookup::Found(fields) => {
                self.stats.cache_hits += 1;
                return GeneResolution::Resolved(GeneRecord::from_cache_fields(&fields));
            }
            CacheLookup::NotFound => {
                self.stats.cache_hits += 1;
                return GeneResolution::Unresolved;
            }
            CacheLookup::Absent => {}
        }

        self.stats.lookups += 1;
        let found = self.query_chain(&normalized, kind, species);
        let fields = found.as_ref().map(|record| record.to_cache_fields());
        if let Err(err) = self.cache.store(&key, fields.as_deref()) {
            warn!(id = %normalized, %kind, error = %err, "failed to memoize gene lookup");
        }
        match found {
            Some(record) => GeneResolution::Resolved(record),
            None => GeneResolution::Unresolved,
        }
    }

    fn query_chain(
        &mut self,
        normalized: &str,
        kind: GeneIdKind,
        species: Option<&Species>,
    ) -> Option<GeneRecord> {
        for lookup in &self.chain {
            let answer = match kind {
                GeneIdKind::RefSeq => lookup.by_refseq(normalized),
                GeneIdKind::GeneId => lookup.by_gene_id(normalized),
                GeneIdKind::Symbol => lookup.by_symbol(normalized, species),
                GeneIdKind::Ensembl => lookup.by_ensembl(normalized, species),
            };
            match answer {
                Ok(Some(mut record)) => {
                    record.complete_with(kind, normalized);
                    if record.strong_key().is_some() {
                        debug!(id = normalized, %kind, service = lookup.name(), "gene resolved");
                        return Some(record);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    self.stats.collaborator_failures += 1;
                    warn!(
                        id = normalized,
                        %kind,
                        service = lookup.name(),
                        error = %err,
                        "gene lookup failed"
                    );
                }
            }
        }
        None
    }
}
