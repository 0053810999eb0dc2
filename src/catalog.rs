use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::domain::{GenomeId, SpeciesId, WorkItem};
use crate::error::MarkerError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    species_for_genome: BTreeMap<GenomeId, SpeciesId>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, MarkerError> {
        let content = fs::read_to_string(path).map_err(|err| {
            MarkerError::Filesystem(format!("read catalog {}: {err}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, MarkerError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let (_, header) = lines
            .next()
            .ok_or_else(|| MarkerError::MalformedCatalog("empty catalog".to_string()))?;
        let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
        let column = |name: &str| {
            columns
                .iter()
                .position(|col| *col == name)
                .ok_or_else(|| MarkerError::MalformedCatalog(format!("missing column `{name}`")))
        };
        let genome_col = column("genome")?;
        let species_col = column("species")?;

        let mut species_for_genome = BTreeMap::new();
        for (index, line) in lines {
            let fields: Vec<&str> = line.split('\t').collect();
            let field = |col: usize| {
                fields.get(col).copied().ok_or_else(|| {
                    MarkerError::MalformedCatalog(format!(
                        "line {}: expected at least {} columns",
                        index + 1,
                        col + 1
                    ))
                })
            };
            let genome: GenomeId = field(genome_col)?.parse()?;
            let species: SpeciesId = field(species_col)?.parse()?;
            if let Some(previous) = species_for_genome.insert(genome.clone(), species.clone()) {
                if previous != species {
                    return Err(MarkerError::MalformedCatalog(format!(
                        "genome {genome} listed under species {previous} and {species}"
                    )));
                }
            }
        }

        Ok(Self { species_for_genome })
    }

    pub fn len(&self) -> usize {
        self.species_for_genome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species_for_genome.is_empty()
    }

    pub fn contains(&self, genome: &GenomeId) -> bool {
        self.species_for_genome.contains_key(genome)
    }

    pub fn species_of(&self, genome: &GenomeId) -> Option<&SpeciesId> {
        self.species_for_genome.get(genome)
    }

    pub fn genomes(&self) -> impl Iterator<Item = &GenomeId> {
        self.species_for_genome.keys()
    }

    pub fn work_item(&self, genome: &GenomeId) -> Result<WorkItem, MarkerError> {
        let species = self
            .species_of(genome)
            .ok_or_else(|| MarkerError::UnknownGenome(genome.to_string()))?;
        Ok(WorkItem::new(genome.clone(), species.clone()))
    }
}

impl FromIterator<(GenomeId, SpeciesId)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (GenomeId, SpeciesId)>>(iter: I) -> Self {
        Self {
            species_for_genome: iter.into_iter().collect(),
        }
    }
}
