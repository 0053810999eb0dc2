use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Catalog;
use crate::domain::GenomeId;
use crate::error::MarkerError;

static SLICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?\d+)\s*:\s*([+-]?\d+)\s*$").expect("slice pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Tokens(Vec<SelectionToken>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionToken {
    Genome(GenomeId),
    Slice { index: u64, modulus: u64 },
}

impl FromStr for SelectionToken {
    type Err = MarkerError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| MarkerError::InvalidSelection {
            token: token.to_string(),
            reason,
        };

        if !token.contains(':') {
            let genome = token
                .parse::<GenomeId>()
                .map_err(|_| invalid("not a genome id or idx:modulus slice".to_string()))?;
            return Ok(SelectionToken::Genome(genome));
        }

        let captures = SLICE_RE
            .captures(token)
            .ok_or_else(|| invalid("slice must be two integers, idx:modulus".to_string()))?;
        let index: i128 = captures[1]
            .parse()
            .map_err(|_| invalid("slice index is not an integer".to_string()))?;
        let modulus: i128 = captures[2]
            .parse()
            .map_err(|_| invalid("slice modulus is not an integer".to_string()))?;
        if !(0 <= index && index < modulus) {
            return Err(invalid(format!(
                "slice index and modulus make no sense: {index}, {modulus}"
            )));
        }
        let modulus = u64::try_from(modulus)
            .map_err(|_| invalid("slice modulus is too large".to_string()))?;
        Ok(SelectionToken::Slice {
            index: index as u64,
            modulus,
        })
    }
}

impl FromStr for Selection {
    type Err = MarkerError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let trimmed = expression.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        trimmed
            .split(',')
            .map(str::trim)
            .map(|token| {
                if token.is_empty() {
                    Err(MarkerError::InvalidSelection {
                        token: expression.to_string(),
                        reason: "empty selection token".to_string(),
                    })
                } else {
                    token.parse()
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Selection::Tokens)
    }
}

impl Selection {
    pub fn resolve(&self, catalog: &Catalog) -> Result<Vec<GenomeId>, MarkerError> {
        let tokens = match self {
            Selection::All => return Ok(catalog.genomes().cloned().collect()),
            Selection::Tokens(tokens) => tokens,
        };

        let mut selected = BTreeSet::new();
        for token in tokens {
            match token {
                SelectionToken::Genome(genome) => {
                    if !catalog.contains(genome) {
                        return Err(MarkerError::InvalidSelection {
                            token: genome.to_string(),
                            reason: "genome is not in the catalog".to_string(),
                        });
                    }
                    selected.insert(genome.clone());
                }
                SelectionToken::Slice { index, modulus } => {
                    for genome in catalog.genomes() {
                        let number =
                            genome
                                .numeric_suffix()
                                .ok_or_else(|| MarkerError::InvalidSelection {
                                    token: format!("{index}:{modulus}"),
                                    reason: format!("genome {genome} has no numeric id suffix"),
                                })?;
                        if number % modulus == *index {
                            selected.insert(genome.clone());
                        }
                    }
                }
            }
        }
        Ok(selected.into_iter().collect())
    }
}

pub fn resolve_genomes(expression: &str, catalog: &Catalog) -> Result<Vec<GenomeId>, MarkerError> {
    expression.parse::<Selection>()?.resolve(catalog)
}
