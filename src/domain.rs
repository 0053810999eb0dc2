use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MarkerError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenomeId(String);

impl GenomeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn numeric_suffix(&self) -> Option<u64> {
        let digits = self
            .0
            .bytes()
            .rev()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }
        self.0[self.0.len() - digits..].parse().ok()
    }
}

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GenomeId {
    type Err = MarkerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !is_path_segment(normalized) || normalized.contains([':', ',']) {
            return Err(MarkerError::InvalidGenomeId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(String);

impl SpeciesId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesId {
    type Err = MarkerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !is_path_segment(normalized) {
            return Err(MarkerError::InvalidSpeciesId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

// Ids become remote key and directory segments.
fn is_path_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value
            .chars()
            .any(|ch| ch.is_whitespace() || ch == '/' || ch == '\\')
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WorkItem {
    pub genome_id: GenomeId,
    pub species_id: SpeciesId,
}

impl WorkItem {
    pub fn new(genome_id: GenomeId, species_id: SpeciesId) -> Self {
        Self {
            genome_id,
            species_id,
        }
    }

    pub fn work_dir_name(&self) -> String {
        format!("{}__{}", self.species_id, self.genome_id)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.genome_id, self.species_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub query: String,
    pub target: String,
    pub evalue: f64,
    pub query_coverage: f64,
    pub target_coverage: f64,
    pub query_length: u64,
    pub target_length: u64,
}

impl SearchHit {
    pub fn min_coverage(&self) -> f64 {
        self.query_coverage.min(self.target_coverage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRecord {
    pub species_id: SpeciesId,
    pub genome_id: GenomeId,
    pub gene_id: String,
    pub gene_length: usize,
    pub marker_model_id: String,
}

impl MarkerRecord {
    pub fn to_tsv_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\n",
            self.species_id, self.genome_id, self.gene_id, self.gene_length, self.marker_model_id
        )
    }
}
