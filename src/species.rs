//! Species parameter catalog.
//!
//! Every biological constant lives here, keyed by species. Animals carry a
//! `SpeciesId` and look their constants up at the call site; parameters are
//! never copied per-instance and never change once the catalog has been
//! handed to an island.

use serde::{Deserialize, Serialize};

use crate::cell::Terrain;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeciesId(usize);

impl SpeciesId {
    pub fn raw(self) -> usize {
        self.0
    }

    pub(crate) fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

/// Feeding archetype: grazers consume cell fodder, hunters consume grazers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Diet {
    Herbivore,
    Carnivore,
}

/// Terrain types a species may enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainSet([bool; Terrain::COUNT]);

impl TerrainSet {
    /// Everything but water.
    pub fn land() -> Self {
        let mut set = [false; Terrain::COUNT];
        for terrain in Terrain::ALL {
            set[terrain as usize] = !terrain.is_aquatic();
        }
        Self(set)
    }

    pub fn from_codes(codes: &[char]) -> Result<Self> {
        let mut set = [false; Terrain::COUNT];
        for &code in codes {
            let terrain = Terrain::from_code(code).ok_or(Error::InvalidTerrain(code))?;
            set[terrain as usize] = true;
        }
        Ok(Self(set))
    }

    pub fn allows(&self, terrain: Terrain) -> bool {
        self.0[terrain as usize]
    }
}

/// Immutable biological and motion constants for one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    pub diet: Diet,
    /// Mean birth weight on the linear scale.
    pub w_birth: f64,
    /// Birth-weight standard deviation on the linear scale.
    pub sigma_birth: f64,
    /// Energy-conversion efficiency: weight gained per unit of food.
    pub beta: f64,
    /// Annual weight decay rate.
    pub eta: f64,
    /// Age at which the age term of fitness crosses one half.
    pub a_half: f64,
    /// Steepness of the age term.
    pub phi_age: f64,
    /// Weight at which the weight term of fitness crosses one half.
    pub w_half: f64,
    /// Steepness of the weight term.
    pub phi_weight: f64,
    /// Yearly migration probability.
    pub mu: f64,
    /// Procreation-odds coefficient.
    pub gamma: f64,
    /// Procreation weight-gate coefficient.
    pub zeta: f64,
    /// Fraction of offspring weight the parent loses at birth.
    pub xi: f64,
    /// Death-rate constant.
    pub omega: f64,
    /// Desired annual food intake.
    pub f: f64,
    /// Kill-advantage ceiling; only meaningful for carnivores.
    pub delta_phi_max: f64,
    /// Migration step size in cells.
    pub stride: u32,
    /// Terrain the species may occupy.
    pub enterable: TerrainSet,
}

impl SpeciesParams {
    pub fn herbivore_defaults() -> Self {
        Self {
            diet: Diet::Herbivore,
            w_birth: 8.0,
            sigma_birth: 1.5,
            beta: 0.9,
            eta: 0.05,
            a_half: 40.0,
            phi_age: 0.6,
            w_half: 10.0,
            phi_weight: 0.1,
            mu: 0.25,
            gamma: 0.2,
            zeta: 3.5,
            xi: 1.2,
            omega: 0.4,
            f: 10.0,
            delta_phi_max: 10.0,
            stride: 1,
            enterable: TerrainSet::land(),
        }
    }

    pub fn carnivore_defaults() -> Self {
        Self {
            diet: Diet::Carnivore,
            w_birth: 6.0,
            sigma_birth: 1.0,
            beta: 0.75,
            eta: 0.125,
            a_half: 40.0,
            phi_age: 0.3,
            w_half: 4.0,
            phi_weight: 0.4,
            mu: 0.4,
            gamma: 0.8,
            zeta: 3.5,
            xi: 1.1,
            omega: 0.8,
            f: 50.0,
            delta_phi_max: 10.0,
            stride: 1,
            enterable: TerrainSet::land(),
        }
    }

    /// Minimum parent weight below which procreation never happens.
    pub fn procreation_weight_gate(&self) -> f64 {
        self.zeta * (self.w_birth + self.sigma_birth)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("w_birth", self.w_birth),
            ("sigma_birth", self.sigma_birth),
            ("beta", self.beta),
            ("eta", self.eta),
            ("a_half", self.a_half),
            ("phi_age", self.phi_age),
            ("w_half", self.w_half),
            ("phi_weight", self.phi_weight),
            ("mu", self.mu),
            ("gamma", self.gamma),
            ("zeta", self.zeta),
            ("xi", self.xi),
            ("omega", self.omega),
            ("F", self.f),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidParameter { name, value });
            }
        }
        if self.eta > 1.0 {
            return Err(Error::InvalidParameter {
                name: "eta",
                value: self.eta,
            });
        }
        if self.diet == Diet::Carnivore
            && (!self.delta_phi_max.is_finite() || self.delta_phi_max <= 0.0)
        {
            return Err(Error::InvalidParameter {
                name: "DeltaPhiMax",
                value: self.delta_phi_max,
            });
        }
        if self.stride == 0 {
            return Err(Error::InvalidParameter {
                name: "stride",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Read-mostly registry of species constants.
///
/// The catalog is populated before any simulation step and moved into the
/// island at construction; after that point no mutation path exists.
#[derive(Debug, Clone)]
pub struct SpeciesCatalog {
    entries: Vec<(String, SpeciesParams)>,
}

impl SpeciesCatalog {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Catalog with the two built-in archetypes registered.
    pub fn with_builtin() -> Self {
        let mut catalog = Self::empty();
        catalog
            .register("Herbivore", SpeciesParams::herbivore_defaults())
            .expect("builtin herbivore parameters are valid");
        catalog
            .register("Carnivore", SpeciesParams::carnivore_defaults())
            .expect("builtin carnivore parameters are valid");
        catalog
    }

    /// Installs or overrides a species' constants.
    pub fn register(&mut self, name: &str, params: SpeciesParams) -> Result<SpeciesId> {
        params.validate()?;
        if let Some(pos) = self.entries.iter().position(|(n, _)| n == name) {
            self.entries[pos].1 = params;
            return Ok(SpeciesId(pos));
        }
        self.entries.push((name.to_string(), params));
        Ok(SpeciesId(self.entries.len() - 1))
    }

    pub fn id_of(&self, name: &str) -> Result<SpeciesId> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(SpeciesId)
            .ok_or_else(|| Error::UnknownSpecies(name.to_string()))
    }

    pub fn params(&self, id: SpeciesId) -> &SpeciesParams {
        &self.entries[id.0].1
    }

    pub fn name(&self, id: SpeciesId) -> &str {
        &self.entries[id.0].0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &SpeciesParams)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (_, p))| (SpeciesId(i), p))
    }
}
