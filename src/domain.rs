use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub prefix: String,
    pub name: String,
    pub taxid: u32,
}

impl Species {
    pub fn new(prefix: &str, name: &str, taxid: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            name: name.to_string(),
            taxid,
        }
    }

    pub fn builtin() -> Vec<Species> {
        vec![
            Species::new("hsa", "Homo sapiens", 9606),
            Species::new("mmu", "Mus musculus", 10090),
            Species::new("rno", "Rattus norvegicus", 10116),
            Species::new("dme", "Drosophila melanogaster", 7227),
            Species::new("cel", "Caenorhabditis elegans", 6239),
        ]
    }

    pub fn find<'a>(table: &'a [Species], prefix: &str) -> Result<&'a Species, KiraError> {
        let prefix = prefix.trim().to_ascii_lowercase();
        table
            .iter()
            .find(|species| species.prefix == prefix)
            .ok_or(KiraError::InvalidSpecies(prefix))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    #[serde(rename = "miRTarBase")]
    MirTarBase,
    PicTar,
    TargetScan,
    #[serde(rename = "RNA22")]
    Rna22,
}

impl RelationKind {
    pub fn database_name(&self) -> &'static str {
        match self {
            RelationKind::MirTarBase => "miRTarBase",
            RelationKind::PicTar => "PicTar",
            RelationKind::TargetScan => "TargetScan",
            RelationKind::Rna22 => "RNA22",
        }
    }

    pub fn database_url(&self) -> &'static str {
        match self {
            RelationKind::MirTarBase => "http://mirtarbase.mbc.nctu.edu.tw/",
            RelationKind::PicTar => "http://pictar.mdc-berlin.de/",
            RelationKind::TargetScan => "http://www.targetscan.org",
            RelationKind::Rna22 => "https://cm.jefferson.edu/rna22/",
        }
    }

    pub fn default_source_url(&self) -> &'static str {
        match self {
            RelationKind::MirTarBase => {
                "http://mirtarbase.mbc.nctu.edu.tw/cache/download/6.1/mmu_MTI.xls"
            }
            RelationKind::PicTar => "http://genome.ucsc.edu/cgi-bin/hgTables",
            RelationKind::TargetScan => {
                "https://www.targetscan.org/cgi-bin/targetscan/data_download.vert80.cgi"
            }
            RelationKind::Rna22 => {
                "https://cm.jefferson.edu/data-tools-downloads/rna22-full-sets-of-predictions/"
            }
        }
    }

    pub fn default_convention(&self) -> ScoreConvention {
        match self {
            RelationKind::MirTarBase => ScoreConvention::Categorical,
            RelationKind::PicTar => ScoreConvention::HigherIsBetter,
            RelationKind::TargetScan => ScoreConvention::LowerIsBetter,
            RelationKind::Rna22 => ScoreConvention::LowerIsBetter,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.database_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreConvention {
    HigherIsBetter,
    LowerIsBetter,
    Categorical,
}

impl ScoreConvention {
    /// Returns true when `candidate` should replace `current` under this convention.
    pub fn prefers(&self, candidate: f64, current: f64) -> bool {
        match self {
            ScoreConvention::HigherIsBetter => candidate > current,
            ScoreConvention::LowerIsBetter => candidate < current,
            ScoreConvention::Categorical => false,
        }
    }
}

impl FromStr for ScoreConvention {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "higher_is_better" | "max" => Ok(ScoreConvention::HigherIsBetter),
            "lower_is_better" | "min" => Ok(ScoreConvention::LowerIsBetter),
            "categorical" => Ok(ScoreConvention::Categorical),
            _ => Err(KiraError::InvalidConvention(value.to_string())),
        }
    }
}

/// A relation as loaded by one import run: the edge label plus how its scores compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSpec {
    pub label: String,
    pub kind: RelationKind,
    pub convention: ScoreConvention,
}

impl RelationSpec {
    pub fn new(label: &str, kind: RelationKind) -> Self {
        Self {
            label: label.to_string(),
            kind,
            convention: kind.default_convention(),
        }
    }

    pub fn with_convention(mut self, convention: ScoreConvention) -> Self {
        self.convention = convention;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Numeric(f64),
    Text(String),
}

impl Score {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Score::Numeric(value) => Some(*value),
            Score::Text(_) => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Numeric(value) => write!(f, "{value}"),
            Score::Text(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKey {
    GeneId(String),
    Ensembl(String),
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKey::GeneId(id) => write!(f, "geneid:{id}"),
            TargetKey::Ensembl(id) => write!(f, "ensembl:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirnaKind {
    Hairpin,
    Mature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MirnaId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn species_lookup_is_case_insensitive() {
        let table = Species::builtin();
        let species = Species::find(&table, "HSA").unwrap();
        assert_eq!(species.taxid, 9606);
    }

    #[test]
    fn species_lookup_unknown() {
        let table = Species::builtin();
        let err = Species::find(&table, "xyz").unwrap_err();
        assert_matches!(err, KiraError::InvalidSpecies(_));
    }

    #[test]
    fn convention_parsing() {
        assert_eq!(
            "higher-is-better".parse::<ScoreConvention>().unwrap(),
            ScoreConvention::HigherIsBetter
        );
        assert_eq!(
            "min".parse::<ScoreConvention>().unwrap(),
            ScoreConvention::LowerIsBetter
        );
        assert_matches!(
            "best".parse::<ScoreConvention>(),
            Err(KiraError::InvalidConvention(_))
        );
    }

    #[test]
    fn convention_preference() {
        assert!(ScoreConvention::HigherIsBetter.prefers(5.0, 3.0));
        assert!(!ScoreConvention::HigherIsBetter.prefers(3.0, 5.0));
        assert!(ScoreConvention::LowerIsBetter.prefers(0.2, 0.5));
        assert!(!ScoreConvention::Categorical.prefers(1.0, 0.0));
    }
}
