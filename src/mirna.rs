//! Matching of tool-reported microRNA names against the canonical miRBase
//! names already loaded into the graph.
//!
//! Resolution runs as an ordered pipeline. Each phase produces candidate
//! spellings, and the first phase with at least one canonical hit wins:
//!
//! 1. [`MatchPhase::Direct`]: the normalized name, its version-stripped form
//!    and their `-5p`/`-3p` arms.
//! 2. [`MatchPhase::FamilyExpansion`]: family letters `a..f` inserted before the
//!    arm when the name carries no family letter.
//! 3. [`MatchPhase::Alias`]: a static alias table mapping retired or
//!    tool-specific names to an accession or a canonical name.
//!
//! All canonical hits inside the winning phase are returned, since a single
//! family name legitimately denotes several mature miRNAs.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::KiraError;

const FAMILY_LETTERS: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];
const ARMS: [&str; 2] = ["-5p", "-3p"];
const STAR_SUFFIX: &str = "-star";

static SPECIES_QUALIFIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{3,4}-(?:mir|let|lin)-").expect("static species regex")
});
static FAMILY_PARTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?(?:mir|let|lin)-\d+)([a-z])?(-[35]p)?(.*)$").expect("static family regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalMirna {
    pub name: String,
    pub accession: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Direct,
    FamilyExpansion,
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirnaResolution {
    pub phase: Option<MatchPhase>,
    pub matches: Vec<CanonicalMirna>,
}

impl MirnaResolution {
    fn unmatched() -> Self {
        Self {
            phase: None,
            matches: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn first(&self) -> Option<&CanonicalMirna> {
        self.matches.first()
    }
}

/// Read side of the canonical miRNA store.
pub trait MirnaCatalog {
    /// Case-insensitive exact match on the canonical name.
    fn find_mirnas_by_name(&self, name: &str) -> Result<Vec<CanonicalMirna>, KiraError>;

    fn find_mirna_by_accession(&self, accession: &str)
    -> Result<Option<CanonicalMirna>, KiraError>;
}

/// Canonical spelling used for candidate generation. Idempotent.
pub fn normalize(name: &str, species_prefix: &str) -> String {
    let mut value = name.trim().to_lowercase();
    if let Some(stripped) = value.strip_suffix('*') {
        value = with_star(stripped);
    }
    value = value.replace('_', "-");
    if let Some(stripped) = value.strip_suffix(STAR_SUFFIX) {
        value = with_star(stripped);
    }
    if value.is_empty() {
        return value;
    }

    let prefix = species_prefix.trim().to_lowercase();
    if prefix.is_empty() || SPECIES_QUALIFIED.is_match(&value) {
        return value;
    }
    if let Some(rest) = value.strip_prefix(&format!("{prefix}-")) {
        value = rest.to_string();
    }
    if value.starts_with("mir-") || value.starts_with("let-") || value.starts_with("lin-") {
        format!("{prefix}-{value}")
    } else {
        format!("{prefix}-mir-{value}")
    }
}

/// A star marker with no stem left in front of it carries no name.
fn with_star(stem: &str) -> String {
    let stem = stem.trim_end_matches(['-', '_']);
    if stem.is_empty() {
        String::new()
    } else {
        format!("{stem}{STAR_SUFFIX}")
    }
}

fn has_arm(name: &str) -> bool {
    ARMS.iter().any(|arm| name.ends_with(arm))
}

fn is_star(name: &str) -> bool {
    name.ends_with(STAR_SUFFIX)
}

fn strip_tool_version(name: &str) -> Option<&str> {
    let (base, suffix) = name.rsplit_once('.')?;
    let is_version = (!suffix.is_empty() && suffix.chars().all(|ch| ch.is_ascii_digit()))
        || (suffix.len() == 1 && suffix.chars().all(|ch| ch.is_ascii_alphabetic()));
    is_version.then_some(base)
}

fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, candidate: String) {
    if !candidate.is_empty() && seen.insert(candidate.clone()) {
        out.push(candidate);
    }
}

pub fn direct_candidates(normalized: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    push_unique(&mut out, &mut seen, normalized.to_string());
    if let Some(base) = strip_tool_version(normalized) {
        push_unique(&mut out, &mut seen, base.to_string());
    }
    if let Some(base) = normalized.strip_suffix(STAR_SUFFIX) {
        // miRBase spelled passenger strands with a trailing asterisk.
        push_unique(&mut out, &mut seen, format!("{base}*"));
    }
    for candidate in out.clone() {
        if has_arm(&candidate) || is_star(&candidate) || candidate.ends_with('*') {
            continue;
        }
        for arm in ARMS {
            push_unique(&mut out, &mut seen, format!("{candidate}{arm}"));
        }
    }
    out
}

pub fn family_candidates(normalized: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let (base, star) = match normalized.strip_suffix(STAR_SUFFIX) {
        Some(base) => (base, true),
        None => (normalized, false),
    };
    let base = strip_tool_version(base).unwrap_or(base);

    if star && !has_arm(base) {
        for arm in ARMS {
            push_unique(&mut out, &mut seen, format!("{base}{arm}"));
        }
    }

    let Some(caps) = FAMILY_PARTS.captures(base) else {
        return out;
    };
    if caps.get(2).is_some() {
        return out;
    }
    let stem = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let arm = caps.get(3).map(|m| m.as_str());
    let rest = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
    for letter in FAMILY_LETTERS {
        match arm {
            Some(arm) => push_unique(&mut out, &mut seen, format!("{stem}{letter}{arm}{rest}")),
            None => {
                push_unique(&mut out, &mut seen, format!("{stem}{letter}{rest}"));
                if rest.is_empty() || star {
                    for arm in ARMS {
                        push_unique(&mut out, &mut seen, format!("{stem}{letter}{arm}"));
                    }
                }
            }
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AliasTarget {
    Accession(String),
    Name(String),
}

impl AliasTarget {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if is_accession(value) {
            Some(AliasTarget::Accession(value.to_ascii_uppercase()))
        } else {
            Some(AliasTarget::Name(value.to_lowercase()))
        }
    }
}

fn is_accession(value: &str) -> bool {
    let upper = value.to_ascii_uppercase();
    let digits = upper
        .strip_prefix("MIMAT")
        .or_else(|| upper.strip_prefix("MI"));
    matches!(digits, Some(rest) if !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
}

/// Static map from external miRNA names to canonical accessions or names.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, Vec<AliasTarget>>,
}

impl AliasTable {
    pub fn load(path: &Path) -> Result<Self, KiraError> {
        let content = fs::read_to_string(path)
            .map_err(|err| KiraError::Filesystem(format!("{}: {err}", path.display())))?;
        Ok(Self::parse(&content))
    }

    /// Accepts the miRBase `aliases.txt` layout (`ACC<TAB>name1;name2;`),
    /// two-column `name<TAB>accession-or-name` maps, and semicolon exports
    /// laid out as `id;old name;new accession;new name`.
    pub fn parse(content: &str) -> Self {
        let mut table = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((left, right)) = line.split_once('\t') {
                let right = right.split('\t').next().unwrap_or_default();
                if is_accession(left.trim()) && !is_accession(right.trim()) {
                    let target = AliasTarget::Accession(left.trim().to_ascii_uppercase());
                    for name in right.split(';') {
                        table.insert(name, target.clone());
                    }
                } else if let Some(target) = AliasTarget::parse(right) {
                    table.insert(left, target);
                }
                continue;
            }
            let parts = line.split(';').collect::<Vec<_>>();
            if parts.len() >= 4 {
                let target = AliasTarget::parse(parts[3]).or_else(|| AliasTarget::parse(parts[2]));
                if let Some(target) = target {
                    table.insert(parts[1], target);
                }
            }
        }
        table
    }

    pub fn insert(&mut self, name: &str, target: AliasTarget) {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        let targets = self.entries.entry(key).or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    pub fn get(&self, name: &str) -> &[AliasTarget] {
        self.entries
            .get(&name.trim().to_lowercase())
            .map(|targets| targets.as_slice())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct MirnaResolver {
    aliases: AliasTable,
    memo: HashMap<(String, String), MirnaResolution>,
}

impl MirnaResolver {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            aliases,
            memo: HashMap::new(),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn resolve(
        &mut self,
        catalog: &dyn MirnaCatalog,
        tool_name: &str,
        species_prefix: &str,
    ) -> MirnaResolution {
        let memo_key = (tool_name.trim().to_lowercase(), species_prefix.to_lowercase());
        if let Some(hit) = self.memo.get(&memo_key) {
            return hit.clone();
        }
        let resolution = self.resolve_uncached(catalog, tool_name, species_prefix);
        self.memo.insert(memo_key, resolution.clone());
        resolution
    }

    fn resolve_uncached(
        &self,
        catalog: &dyn MirnaCatalog,
        tool_name: &str,
        species_prefix: &str,
    ) -> MirnaResolution {
        let original = tool_name.trim().to_lowercase();
        if original.is_empty() {
            return MirnaResolution::unmatched();
        }
        let normalized = normalize(tool_name, species_prefix);
        if normalized.is_empty() {
            return MirnaResolution::unmatched();
        }

        let phases: [(MatchPhase, Vec<String>); 2] = [
            (MatchPhase::Direct, direct_candidates(&normalized)),
            (MatchPhase::FamilyExpansion, family_candidates(&normalized)),
        ];
        for (phase, candidates) in phases {
            let matches = lookup_names(catalog, &candidates);
            if !matches.is_empty() {
                debug!(name = tool_name, ?phase, matches = matches.len(), "miRNA resolved");
                return MirnaResolution {
                    phase: Some(phase),
                    matches,
                };
            }
        }

        let mut targets = self.aliases.get(&original).to_vec();
        for target in self.aliases.get(&normalized) {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        let mut matches = Vec::new();
        for target in &targets {
            let found = match target {
                AliasTarget::Accession(accession) => catalog
                    .find_mirna_by_accession(accession)
                    .map(|hit| hit.into_iter().collect::<Vec<_>>()),
                AliasTarget::Name(name) => catalog.find_mirnas_by_name(name),
            };
            match found {
                Ok(found) => extend_unique(&mut matches, found),
                Err(err) => warn!(name = tool_name, error = %err, "alias lookup failed"),
            }
        }
        if !matches.is_empty() {
            debug!(name = tool_name, matches = matches.len(), "miRNA resolved through alias");
            return MirnaResolution {
                phase: Some(MatchPhase::Alias),
                matches,
            };
        }

        warn!(name = tool_name, normalized = %normalized, "could not map miRNA after all phases");
        MirnaResolution::unmatched()
    }
}

fn lookup_names(catalog: &dyn MirnaCatalog, candidates: &[String]) -> Vec<CanonicalMirna> {
    let mut matches = Vec::new();
    for candidate in candidates {
        match catalog.find_mirnas_by_name(candidate) {
            Ok(found) => extend_unique(&mut matches, found),
            Err(err) => warn!(candidate = %candidate, error = %err, "miRNA lookup failed"),
        }
    }
    matches
}

fn extend_unique(matches: &mut Vec<CanonicalMirna>, found: Vec<CanonicalMirna>) {
    for hit in found {
        if !matches.iter().any(|existing| existing.name == hit.name) {
            matches.push(hit);
        }
    }
}
