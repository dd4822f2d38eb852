//! Read-only per-year state snapshots for external consumers, plus the
//! periodic JSON writer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::island::Island;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesCount {
    pub species: String,
    pub count: usize,
}

/// One animal as seen by histogram consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalRecord {
    pub species: String,
    pub age: u32,
    pub weight: f64,
    pub fitness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub row: usize,
    pub col: usize,
    pub terrain: char,
    pub fodder: f64,
    pub counts: Vec<SpeciesCount>,
    pub animals: Vec<AnimalRecord>,
}

/// Everything a renderer, exporter or histogram needs for one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IslandSnapshot {
    pub scenario: String,
    pub year: u64,
    pub captured_at: String,
    pub total_animals: usize,
    pub totals: Vec<SpeciesCount>,
    pub cells: Vec<CellRecord>,
}

impl IslandSnapshot {
    pub fn capture(island: &Island, scenario: &str) -> Self {
        let catalog = island.catalog();
        let totals = island
            .totals()
            .into_iter()
            .zip(catalog.iter())
            .map(|(count, (sid, _))| SpeciesCount {
                species: catalog.name(sid).to_string(),
                count,
            })
            .collect();

        let mut cells = Vec::with_capacity(island.rows() * island.cols());
        for ((row, col), cell) in island.cells() {
            let mut counts = Vec::with_capacity(catalog.len());
            let mut animals = Vec::with_capacity(cell.total_animals());
            for (sid, params) in catalog.iter() {
                counts.push(SpeciesCount {
                    species: catalog.name(sid).to_string(),
                    count: cell.count(sid),
                });
                for animal in cell.residents(sid) {
                    animals.push(AnimalRecord {
                        species: catalog.name(sid).to_string(),
                        age: animal.age(),
                        weight: animal.weight(),
                        fitness: animal.fitness(params),
                    });
                }
            }
            cells.push(CellRecord {
                row,
                col,
                terrain: cell.terrain().code(),
                fodder: cell.fodder(),
                counts,
                animals,
            });
        }

        Self {
            scenario: scenario.to_string(),
            year: island.year(),
            captured_at: chrono::Utc::now().to_rfc3339(),
            total_animals: island.num_animals(),
            totals,
            cells,
        }
    }
}

/// Writes `<dir>/<scenario>/year_NNNNNN.json` every `interval_years` years;
/// an interval of zero disables writing.
pub struct SnapshotWriter {
    dir: PathBuf,
    interval_years: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval_years: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval_years,
        }
    }

    pub fn maybe_write(&self, island: &Island, scenario: &str) -> Result<Option<PathBuf>> {
        if self.interval_years == 0 || island.year() % self.interval_years != 0 {
            return Ok(None);
        }
        let dir = self.dir.join(scenario);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("year_{:06}.json", island.year()));
        let snapshot = IslandSnapshot::capture(island, scenario);
        fs::write(&path, serde_json::to_string_pretty(&snapshot)?)?;
        Ok(Some(path))
    }
}
