//! YAML scenario files: map, parameter overrides and initial populations.

use std::collections::BTreeMap;
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

use crate::cell::{FodderTable, Terrain};
use crate::error::{Error, Result};
use crate::island::{Island, Placement};
use crate::species::{Diet, SpeciesCatalog, SpeciesParams, TerrainSet};

fn default_snapshot_interval_years() -> u64 {
    25
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub years: Option<u64>,
    #[serde(default = "default_snapshot_interval_years")]
    pub snapshot_interval_years: u64,
    /// Multi-line terrain map, one code per cell.
    pub map: String,
    /// Per-terrain fodder maxima, keyed by terrain code.
    #[serde(default)]
    pub fodder: BTreeMap<char, f64>,
    #[serde(default)]
    pub species: Vec<SpeciesSpec>,
    #[serde(default)]
    pub populations: Vec<PlacementGroup>,
}

/// Overrides for a built-in species, or a whole new one (then `archetype`
/// is required to pick the base parameter set).
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesSpec {
    pub name: String,
    #[serde(default)]
    pub archetype: Option<Diet>,
    #[serde(default)]
    pub overrides: SpeciesOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeciesOverrides {
    pub w_birth: Option<f64>,
    pub sigma_birth: Option<f64>,
    pub beta: Option<f64>,
    pub eta: Option<f64>,
    pub a_half: Option<f64>,
    pub phi_age: Option<f64>,
    pub w_half: Option<f64>,
    pub phi_weight: Option<f64>,
    pub mu: Option<f64>,
    pub gamma: Option<f64>,
    pub zeta: Option<f64>,
    pub xi: Option<f64>,
    pub omega: Option<f64>,
    pub f: Option<f64>,
    pub delta_phi_max: Option<f64>,
    pub stride: Option<u32>,
    /// Terrain codes the species may enter, e.g. `[L, H]`.
    pub terrain: Option<Vec<char>>,
}

impl SpeciesOverrides {
    fn apply(&self, params: &mut SpeciesParams) -> Result<()> {
        macro_rules! set {
            ($field:ident) => {
                if let Some(value) = self.$field {
                    params.$field = value;
                }
            };
        }
        set!(w_birth);
        set!(sigma_birth);
        set!(beta);
        set!(eta);
        set!(a_half);
        set!(phi_age);
        set!(w_half);
        set!(phi_weight);
        set!(mu);
        set!(gamma);
        set!(zeta);
        set!(xi);
        set!(omega);
        set!(f);
        set!(delta_phi_max);
        set!(stride);
        if let Some(codes) = &self.terrain {
            params.enterable = TerrainSet::from_codes(codes)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlacementGroup {
    pub loc: (usize, usize),
    pub animals: Vec<AnimalGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimalGroup {
    pub species: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "default_count")]
    pub count: u32,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> anyhow::Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    /// The catalog: built-in archetypes plus scenario registrations.
    pub fn build_catalog(&self) -> Result<SpeciesCatalog> {
        let mut catalog = SpeciesCatalog::with_builtin();
        for entry in &self.species {
            let mut params = match (catalog.id_of(&entry.name), entry.archetype) {
                (Ok(id), _) => catalog.params(id).clone(),
                (Err(_), Some(Diet::Herbivore)) => SpeciesParams::herbivore_defaults(),
                (Err(_), Some(Diet::Carnivore)) => SpeciesParams::carnivore_defaults(),
                (Err(_), None) => {
                    return Err(Error::Configuration(format!(
                        "new species '{}' needs an archetype",
                        entry.name
                    )))
                }
            };
            if let Some(diet) = entry.archetype {
                params.diet = diet;
            }
            entry.overrides.apply(&mut params)?;
            catalog.register(&entry.name, params)?;
        }
        Ok(catalog)
    }

    /// Builds the empty island; the engine seeds the population afterwards
    /// from its own deterministic stream.
    pub fn build_island(&self) -> Result<Island> {
        let catalog = self.build_catalog()?;
        let mut fodder = FodderTable::default();
        for (&code, &f_max) in &self.fodder {
            let terrain = Terrain::from_code(code).ok_or(Error::InvalidTerrain(code))?;
            fodder.set(terrain, f_max)?;
        }
        Island::from_map(&self.map, catalog, fodder)
    }

    /// Expands the population groups into individual placement requests.
    pub fn placements(&self) -> Vec<Placement> {
        let mut out = Vec::new();
        for group in &self.populations {
            for animals in &group.animals {
                for _ in 0..animals.count {
                    out.push(Placement {
                        loc: group.loc,
                        species: animals.species.clone(),
                        age: animals.age,
                        weight: animals.weight,
                    });
                }
            }
        }
        out
    }

    pub fn years(&self, override_years: Option<u64>) -> u64 {
        override_years.or(self.years).unwrap_or(100)
    }
}
