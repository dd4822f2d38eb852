//! One grid tile: terrain, the fodder pool, and the resident animals.

use rand::Rng;

use crate::animal::Animal;
use crate::error::{Error, Result};
use crate::species::{Diet, SpeciesCatalog, SpeciesId};

/// Closed set of terrain types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terrain {
    Water,
    Lowland,
    Highland,
    Desert,
}

impl Terrain {
    pub const COUNT: usize = 4;
    pub const ALL: [Terrain; Terrain::COUNT] = [
        Terrain::Water,
        Terrain::Lowland,
        Terrain::Highland,
        Terrain::Desert,
    ];

    pub fn from_code(code: char) -> Option<Terrain> {
        match code {
            'W' => Some(Terrain::Water),
            'L' => Some(Terrain::Lowland),
            'H' => Some(Terrain::Highland),
            'D' => Some(Terrain::Desert),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Terrain::Water => 'W',
            Terrain::Lowland => 'L',
            Terrain::Highland => 'H',
            Terrain::Desert => 'D',
        }
    }

    pub fn is_aquatic(self) -> bool {
        self == Terrain::Water
    }

    /// Default annual fodder regrowth.
    pub fn default_fodder(self) -> f64 {
        match self {
            Terrain::Water => 0.0,
            Terrain::Lowland => 800.0,
            Terrain::Highland => 300.0,
            Terrain::Desert => 0.0,
        }
    }
}

/// Per-terrain annual fodder maxima, scenario-overridable.
#[derive(Debug, Clone)]
pub struct FodderTable([f64; Terrain::COUNT]);

impl Default for FodderTable {
    fn default() -> Self {
        let mut table = [0.0; Terrain::COUNT];
        for terrain in Terrain::ALL {
            table[terrain as usize] = terrain.default_fodder();
        }
        Self(table)
    }
}

impl FodderTable {
    pub fn max_for(&self, terrain: Terrain) -> f64 {
        self.0[terrain as usize]
    }

    pub fn set(&mut self, terrain: Terrain, f_max: f64) -> Result<()> {
        if !f_max.is_finite() || f_max < 0.0 {
            return Err(Error::InvalidParameter {
                name: "f_max",
                value: f_max,
            });
        }
        self.0[terrain as usize] = f_max;
        Ok(())
    }
}

/// One tile of the island.
///
/// Every resident animal lives in exactly one cell's per-species vector;
/// counts are always derived from those vectors, never tracked separately.
#[derive(Debug, Clone)]
pub struct Cell {
    terrain: Terrain,
    fodder: f64,
    populations: Vec<Vec<Animal>>,
}

impl Cell {
    pub fn new(terrain: Terrain, fodder: f64, species_count: usize) -> Self {
        Self {
            terrain,
            fodder,
            populations: vec![Vec::new(); species_count],
        }
    }

    pub fn terrain(&self) -> Terrain {
        self.terrain
    }

    pub fn fodder(&self) -> f64 {
        self.fodder
    }

    pub fn count(&self, species: SpeciesId) -> usize {
        self.populations[species.raw()].len()
    }

    pub fn total_animals(&self) -> usize {
        self.populations.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.populations.iter().all(Vec::is_empty)
    }

    pub fn residents(&self, species: SpeciesId) -> &[Animal] {
        &self.populations[species.raw()]
    }

    pub fn push(&mut self, animal: Animal) {
        self.populations[animal.species().raw()].push(animal);
    }

    /// Combined weight of all herbivore-diet residents.
    pub fn herbivore_biomass(&self, catalog: &SpeciesCatalog) -> f64 {
        catalog
            .iter()
            .filter(|(_, params)| params.diet == Diet::Herbivore)
            .map(|(sid, _)| {
                self.populations[sid.raw()]
                    .iter()
                    .map(Animal::weight)
                    .sum::<f64>()
            })
            .sum()
    }

    /// Annual regrowth: the fodder pool resets to the terrain maximum.
    pub fn grow(&mut self, table: &FodderTable) {
        self.fodder = table.max_for(self.terrain);
    }

    /// Grazers share the fodder pool in descending fitness order, the
    /// fittest eating first; a stable sort keeps ties in input order.
    /// Returns the total amount consumed.
    pub fn feed_herbivores(&mut self, catalog: &SpeciesCatalog) -> f64 {
        let mut grazers: Vec<(f64, usize, usize)> = Vec::new();
        for (sid, params) in catalog.iter() {
            if params.diet != Diet::Herbivore {
                continue;
            }
            for (idx, animal) in self.populations[sid.raw()].iter().enumerate() {
                grazers.push((animal.fitness(params), sid.raw(), idx));
            }
        }
        grazers.sort_by(|a, b| b.0.total_cmp(&a.0));

        let before = self.fodder;
        for (_, sid, idx) in grazers {
            if self.fodder <= 0.0 {
                break;
            }
            let params = catalog.params(SpeciesId::from_raw(sid));
            let bite = params.f.min(self.fodder);
            self.populations[sid][idx].feed(bite, params);
            self.fodder -= bite;
        }
        before - self.fodder
    }

    /// Hunters attack in descending fitness order; each works through the
    /// live prey list weakest-first until it has eaten `F` or run out of
    /// prey. A kill removes the prey immediately, so later hunters see the
    /// already-reduced list; the last portion is capped by the remaining
    /// appetite but the prey still dies.
    pub fn feed_carnivores<R: Rng>(&mut self, catalog: &SpeciesCatalog, rng: &mut R) {
        let mut hunters: Vec<(SpeciesId, Vec<Animal>)> = Vec::new();
        for (sid, params) in catalog.iter() {
            if params.diet == Diet::Carnivore {
                hunters.push((sid, std::mem::take(&mut self.populations[sid.raw()])));
            }
        }
        if hunters.iter().all(|(_, pack)| pack.is_empty()) {
            for (sid, pack) in hunters {
                self.populations[sid.raw()] = pack;
            }
            return;
        }

        // Prey fitness is fixed for the phase: grazers do not mutate while
        // being hunted.
        let mut prey: Vec<(usize, usize, f64)> = Vec::new();
        for (sid, params) in catalog.iter() {
            if params.diet != Diet::Herbivore {
                continue;
            }
            for (idx, animal) in self.populations[sid.raw()].iter().enumerate() {
                prey.push((sid.raw(), idx, animal.fitness(params)));
            }
        }
        prey.sort_by(|a, b| a.2.total_cmp(&b.2));

        let mut killed: Vec<Vec<bool>> = self
            .populations
            .iter()
            .map(|p| vec![false; p.len()])
            .collect();

        let mut order: Vec<(usize, usize, f64)> = Vec::new();
        for (slot, (sid, pack)) in hunters.iter().enumerate() {
            let params = catalog.params(*sid);
            for (idx, hunter) in pack.iter().enumerate() {
                order.push((slot, idx, hunter.fitness(params)));
            }
        }
        order.sort_by(|a, b| b.2.total_cmp(&a.2));

        for (slot, idx, _) in order {
            let (sid, pack) = &mut hunters[slot];
            let params = catalog.params(*sid);
            let hunter = &mut pack[idx];
            let mut eaten = 0.0;
            for &(psid, pidx, prey_phi) in &prey {
                if eaten >= params.f {
                    break;
                }
                if killed[psid][pidx] {
                    continue;
                }
                let advantage = hunter.fitness(params) - prey_phi;
                let odds = if advantage <= 0.0 {
                    0.0
                } else if advantage >= params.delta_phi_max {
                    1.0
                } else {
                    advantage / params.delta_phi_max
                };
                if rng.gen::<f64>() < odds {
                    killed[psid][pidx] = true;
                    let portion = self.populations[psid][pidx].weight().min(params.f - eaten);
                    eaten += portion;
                    hunter.feed(portion, params);
                }
            }
        }

        for (sid, pack) in hunters {
            self.populations[sid.raw()] = pack;
        }
        for (sid, flags) in killed.into_iter().enumerate() {
            if flags.iter().any(|&k| k) {
                let survivors = std::mem::take(&mut self.populations[sid])
                    .into_iter()
                    .zip(flags)
                    .filter(|(_, dead)| !dead)
                    .map(|(animal, _)| animal)
                    .collect();
                self.populations[sid] = survivors;
            }
        }
    }

    /// Every resident attempts procreation against the head-count frozen at
    /// the start of the phase; newborns join the cell only once the whole
    /// phase is done.
    pub fn procreate<R: Rng>(&mut self, catalog: &SpeciesCatalog, rng: &mut R) {
        let counts: Vec<usize> = self.populations.iter().map(Vec::len).collect();
        let mut newborn: Vec<Animal> = Vec::new();
        for (sid, params) in catalog.iter() {
            let n = counts[sid.raw()];
            if n < 2 {
                continue;
            }
            for parent in &mut self.populations[sid.raw()] {
                if let Some(baby) = parent.procreate(n, params, rng) {
                    newborn.push(baby);
                }
            }
        }
        for baby in newborn {
            self.push(baby);
        }
    }

    pub fn age_and_lose_weight(&mut self, catalog: &SpeciesCatalog) {
        for (sid, params) in catalog.iter() {
            for animal in &mut self.populations[sid.raw()] {
                animal.grow_older();
                animal.lose_weight(params);
            }
        }
    }

    /// Death filtering: the surviving subset is computed in one pass and
    /// swapped in, never removed from the vector being scanned.
    pub fn die<R: Rng>(&mut self, catalog: &SpeciesCatalog, rng: &mut R) {
        for (sid, params) in catalog.iter() {
            let residents = std::mem::take(&mut self.populations[sid.raw()]);
            self.populations[sid.raw()] = residents
                .into_iter()
                .filter(|animal| !animal.dies(params, rng))
                .collect();
        }
    }

    /// Pulls the selected residents out in index order, keeping the rest in
    /// place. `picks` maps a resident index to its destination cell index.
    pub(crate) fn extract(
        &mut self,
        species: SpeciesId,
        picks: &std::collections::HashMap<usize, usize>,
    ) -> Vec<(usize, Animal)> {
        let residents = std::mem::take(&mut self.populations[species.raw()]);
        let mut kept = Vec::with_capacity(residents.len());
        let mut moved = Vec::new();
        for (i, animal) in residents.into_iter().enumerate() {
            match picks.get(&i) {
                Some(&dest) => moved.push((dest, animal)),
                None => kept.push(animal),
            }
        }
        self.populations[species.raw()] = kept;
        moved
    }
}
