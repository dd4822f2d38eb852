//! A single organism: species tag, age, weight, and a memoized fitness.

use std::cell::Cell as Memo;

use rand::Rng;

use crate::species::{SpeciesId, SpeciesParams};

/// One animal. Owned by exactly one grid cell at any time.
///
/// Fields are private; mutation goes through the vital-rate methods so the
/// fitness cache can never go stale.
#[derive(Debug, Clone)]
pub struct Animal {
    species: SpeciesId,
    age: u32,
    weight: f64,
    fitness: Memo<Option<f64>>,
}

impl Animal {
    pub fn new(species: SpeciesId, age: u32, weight: f64) -> Self {
        Self {
            species,
            age,
            weight,
            fitness: Memo::new(None),
        }
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Fitness Φ in [0, 1], zero at non-positive weight.
    ///
    /// Φ = 1/(1 + e^{φ_age (a − a½)}) × 1/(1 + e^{−φ_weight (w − w½)}),
    /// memoized until the next age or weight mutation.
    pub fn fitness(&self, params: &SpeciesParams) -> f64 {
        if let Some(phi) = self.fitness.get() {
            return phi;
        }
        let phi = if self.weight <= 0.0 {
            0.0
        } else {
            let q_age = 1.0 / (1.0 + (params.phi_age * (self.age as f64 - params.a_half)).exp());
            let q_weight =
                1.0 / (1.0 + (-params.phi_weight * (self.weight - params.w_half)).exp());
            (q_age * q_weight).clamp(0.0, 1.0)
        };
        self.fitness.set(Some(phi));
        phi
    }

    /// Gains `beta × amount` weight. The caller caps `amount` at the
    /// remaining desired intake.
    pub fn feed(&mut self, amount: f64, params: &SpeciesParams) {
        debug_assert!(amount >= 0.0);
        self.weight += params.beta * amount;
        self.fitness.set(None);
    }

    /// Annual decay: weight shrinks by the factor eta.
    pub fn lose_weight(&mut self, params: &SpeciesParams) {
        self.weight -= params.eta * self.weight;
        self.fitness.set(None);
    }

    pub fn grow_older(&mut self) {
        self.age += 1;
        self.fitness.set(None);
    }

    /// One procreation attempt given the same-species head-count at the
    /// start of the phase. Returns the offspring on success.
    ///
    /// The attempt succeeds with probability
    /// min(1, gamma × Φ × (n − 1)); it is gated on at least two residents
    /// and on the parent clearing the zeta weight threshold. A successful
    /// draw is still cancelled if the parent cannot afford the
    /// xi × offspring-weight loss.
    pub fn procreate<R: Rng>(
        &mut self,
        same_species_in_cell: usize,
        params: &SpeciesParams,
        rng: &mut R,
    ) -> Option<Animal> {
        if same_species_in_cell < 2 || self.weight < params.procreation_weight_gate() {
            return None;
        }
        let odds = (params.gamma * self.fitness(params) * (same_species_in_cell as f64 - 1.0))
            .min(1.0);
        if rng.gen::<f64>() >= odds {
            return None;
        }
        let birth_weight = draw_birth_weight(params, rng);
        if self.weight < params.xi * birth_weight {
            return None;
        }
        self.weight -= params.xi * birth_weight;
        self.fitness.set(None);
        Some(Animal::new(self.species, 0, birth_weight))
    }

    /// Yearly death draw: certain at non-positive weight, otherwise
    /// probability omega × (1 − Φ).
    pub fn dies<R: Rng>(&self, params: &SpeciesParams, rng: &mut R) -> bool {
        self.weight <= 0.0 || rng.gen::<f64>() < params.omega * (1.0 - self.fitness(params))
    }
}

/// Draws a birth weight from a log-normal distribution whose linear-scale
/// mean and standard deviation are `w_birth` and `sigma_birth`:
/// μ = ln(w_birth² / √(σ² + w_birth²)), σln = √(ln(1 + σ²/w_birth²)).
pub fn draw_birth_weight<R: Rng>(params: &SpeciesParams, rng: &mut R) -> f64 {
    let w = params.w_birth;
    let s = params.sigma_birth;
    let mu = (w * w / (s * s + w * w).sqrt()).ln();
    let sigma = (1.0 + (s * s) / (w * w)).ln().sqrt();
    // Box-Muller transform for the gaussian draw (avoids a rand_distr
    // dependency).
    let u1: f64 = rng.gen::<f64>().max(f64::EPSILON);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    (mu + sigma * z).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::SpeciesCatalog;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn herbivore() -> (SpeciesId, SpeciesParams) {
        let catalog = SpeciesCatalog::with_builtin();
        let id = catalog.id_of("Herbivore").unwrap();
        (id, catalog.params(id).clone())
    }

    #[test]
    fn fitness_is_zero_at_nonpositive_weight() {
        let (id, params) = herbivore();
        for age in [0, 10, 200] {
            let animal = Animal::new(id, age, 0.0);
            assert_eq!(animal.fitness(&params), 0.0);
        }
    }

    #[test]
    fn fitness_stays_in_unit_interval() {
        let (id, params) = herbivore();
        for (age, weight) in [(0, 0.5), (5, 20.0), (40, 10.0), (500, 1000.0)] {
            let animal = Animal::new(id, age, weight);
            let phi = animal.fitness(&params);
            assert!((0.0..=1.0).contains(&phi), "phi={phi} out of range");
        }
    }

    #[test]
    fn fitness_matches_logistic_product() {
        let (id, params) = herbivore();
        let animal = Animal::new(id, 5, 20.0);
        let q_age = 1.0 / (1.0 + (params.phi_age * (5.0 - params.a_half)).exp());
        let q_weight = 1.0 / (1.0 + (-params.phi_weight * (20.0 - params.w_half)).exp());
        assert!((animal.fitness(&params) - q_age * q_weight).abs() < 1e-12);
    }

    #[test]
    fn fitness_cache_invalidates_on_mutation() {
        let (id, params) = herbivore();
        let mut animal = Animal::new(id, 5, 20.0);
        let before = animal.fitness(&params);
        animal.feed(10.0, &params);
        assert!(animal.fitness(&params) > before, "heavier should be fitter");
        let fed = animal.fitness(&params);
        animal.grow_older();
        assert!(animal.fitness(&params) <= fed);
    }

    #[test]
    fn feeding_gains_beta_times_amount() {
        let (id, params) = herbivore();
        let mut animal = Animal::new(id, 5, 20.0);
        animal.feed(10.0, &params);
        assert!((animal.weight() - (20.0 + params.beta * 10.0)).abs() < 1e-12);
    }

    #[test]
    fn annual_decay_shrinks_weight_by_eta() {
        let (id, params) = herbivore();
        let mut animal = Animal::new(id, 5, 20.0);
        animal.lose_weight(&params);
        assert!((animal.weight() - 20.0 * (1.0 - params.eta)).abs() < 1e-12);
    }

    #[test]
    fn birth_weights_match_requested_moments() {
        let (_, params) = herbivore();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| draw_birth_weight(&params, &mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - params.w_birth).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - params.sigma_birth).abs() < 0.1, "sd {}", var.sqrt());
    }

    #[test]
    fn procreation_requires_company_and_weight() {
        let (id, params) = herbivore();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut alone = Animal::new(id, 5, 50.0);
        assert!(alone.procreate(1, &params, &mut rng).is_none());
        let mut light = Animal::new(id, 5, params.procreation_weight_gate() - 0.01);
        for _ in 0..100 {
            assert!(light.procreate(10, &params, &mut rng).is_none());
        }
    }

    #[test]
    fn procreation_rate_matches_closed_form() {
        let (id, params) = herbivore();
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        let neighbours = 4;
        let weight = 60.0;
        let trials = 20_000;
        let mut births = 0;
        for _ in 0..trials {
            let mut parent = Animal::new(id, 5, weight);
            if parent.procreate(neighbours, &params, &mut rng).is_some() {
                births += 1;
            }
        }
        let expected = (params.gamma
            * Animal::new(id, 5, weight).fitness(&params)
            * (neighbours as f64 - 1.0))
            .min(1.0);
        let observed = births as f64 / trials as f64;
        // Three-sigma band for a binomial sample of this size.
        let tolerance = 3.0 * (expected * (1.0 - expected) / trials as f64).sqrt();
        assert!(
            (observed - expected).abs() < tolerance,
            "observed {observed}, expected {expected} ± {tolerance}"
        );
    }

    #[test]
    fn successful_birth_costs_the_parent_xi_times_offspring_weight() {
        let (id, params) = herbivore();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        // Heavy parent in a crowded cell: odds saturate at 1.
        let mut parent = Animal::new(id, 5, 500.0);
        let before = parent.weight();
        let baby = parent
            .procreate(50, &params, &mut rng)
            .expect("saturated odds should produce offspring");
        assert_eq!(baby.age(), 0);
        assert!(baby.weight() > 0.0);
        assert!((before - parent.weight() - params.xi * baby.weight()).abs() < 1e-12);
    }

    #[test]
    fn death_is_certain_at_zero_weight() {
        let (id, params) = herbivore();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let animal = Animal::new(id, 3, 0.0);
        for _ in 0..50 {
            assert!(animal.dies(&params, &mut rng));
        }
    }

    #[test]
    fn death_rate_tracks_omega_times_unfitness() {
        let (id, params) = herbivore();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let animal = Animal::new(id, 5, 40.0);
        let expected = params.omega * (1.0 - animal.fitness(&params));
        let trials = 20_000;
        let deaths = (0..trials).filter(|_| animal.dies(&params, &mut rng)).count();
        let observed = deaths as f64 / trials as f64;
        let tolerance = 3.0 * (expected * (1.0 - expected) / trials as f64).sqrt();
        assert!(
            (observed - expected).abs() < tolerance,
            "observed {observed}, expected {expected} ± {tolerance}"
        );
    }
}
