//! Annual cycle controller.
//!
//! Drives the six-phase yearly transformation in fixed order and owns the
//! deterministic RNG streams, so one (island, seed) pair always replays the
//! same history. The engine is synchronous throughout; a caller-provided
//! stop flag is honoured between years, never mid-phase.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::island::{Island, Placement};
use crate::rng::RngManager;
use crate::scenario::Scenario;
use crate::snapshot::SnapshotWriter;

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_years: u64,
    pub snapshot_dir: PathBuf,
}

impl EngineSettings {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            scenario_name: scenario.name.clone(),
            seed: scenario.seed,
            snapshot_interval_years: scenario.snapshot_interval_years,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }
}

#[derive(Clone, Debug)]
pub struct PhaseReport {
    pub name: &'static str,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct YearSummary {
    pub year: u64,
    pub animals_alive: usize,
    pub per_species: Vec<(String, usize)>,
    pub phases: Vec<PhaseReport>,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    island: Island,
    rng: RngManager,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
    stop: Option<Arc<AtomicBool>>,
}

impl Engine {
    pub fn new(island: Island, settings: EngineSettings) -> Self {
        Self {
            rng: RngManager::new(settings.seed),
            snapshot_writer: SnapshotWriter::new(
                &settings.snapshot_dir,
                settings.snapshot_interval_years,
            ),
            island,
            settings,
            stop: None,
        }
    }

    /// Builds the island from a scenario and seeds its initial population.
    pub fn from_scenario(scenario: &Scenario, settings: EngineSettings) -> Result<Self> {
        let island = scenario.build_island()?;
        let mut engine = Self::new(island, settings);
        engine.insert_population(&scenario.placements())?;
        Ok(engine)
    }

    /// Install a flag the caller may set from another thread to end the run
    /// after the current year completes.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn island(&self) -> &Island {
        &self.island
    }

    pub fn year(&self) -> u64 {
        self.island.year()
    }

    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    /// Adds animals between years (or before the first).
    pub fn insert_population(&mut self, placements: &[Placement]) -> Result<()> {
        let rng = self.rng.stream("seeding");
        self.island.insert(placements, rng)
    }

    /// Advances the island by exactly one year.
    pub fn step_year(&mut self) -> Result<YearSummary> {
        fn ms(start: Instant) -> f64 {
            start.elapsed().as_secs_f64() * 1_000.0
        }

        let mut phases = Vec::with_capacity(6);

        let start = Instant::now();
        self.island.grow();
        phases.push(PhaseReport {
            name: "growth",
            duration_ms: ms(start),
        });

        let start = Instant::now();
        self.island.feed(self.rng.stream("feeding"));
        phases.push(PhaseReport {
            name: "feeding",
            duration_ms: ms(start),
        });

        let start = Instant::now();
        self.island.procreate(self.rng.stream("procreation"));
        phases.push(PhaseReport {
            name: "procreation",
            duration_ms: ms(start),
        });

        let start = Instant::now();
        self.island.migrate(self.rng.stream("migration"));
        phases.push(PhaseReport {
            name: "migration",
            duration_ms: ms(start),
        });

        let start = Instant::now();
        self.island.age_and_lose_weight();
        phases.push(PhaseReport {
            name: "ageing",
            duration_ms: ms(start),
        });

        let start = Instant::now();
        self.island.die(self.rng.stream("death"));
        phases.push(PhaseReport {
            name: "death",
            duration_ms: ms(start),
        });

        self.island.advance_year();
        self.island.verify_consistency()?;

        let snapshot_path = self
            .snapshot_writer
            .maybe_write(&self.island, &self.settings.scenario_name)?;

        Ok(YearSummary {
            year: self.island.year(),
            animals_alive: self.island.num_animals(),
            per_species: self.island.totals_named(),
            phases,
            snapshot_path,
        })
    }

    /// Runs for `years` years, or until the stop flag is raised.
    pub fn run(&mut self, years: u64) -> Result<()> {
        for _ in 0..years {
            if let Some(flag) = &self.stop {
                if flag.load(Ordering::Relaxed) {
                    break;
                }
            }
            self.step_year()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::FodderTable;
    use crate::species::SpeciesCatalog;

    fn settings(name: &str, seed: u64) -> EngineSettings {
        EngineSettings {
            scenario_name: name.into(),
            seed,
            snapshot_interval_years: 0,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }

    fn small_island() -> Island {
        Island::from_map(
            "WWWW\nWLLW\nWLLW\nWWWW",
            SpeciesCatalog::with_builtin(),
            FodderTable::default(),
        )
        .unwrap()
    }

    fn herd(loc: (usize, usize), count: usize) -> Vec<Placement> {
        (0..count)
            .map(|_| Placement {
                loc,
                species: "Herbivore".into(),
                age: Some(5),
                weight: Some(25.0),
            })
            .collect()
    }

    #[test]
    fn step_year_advances_the_clock() {
        let mut engine = Engine::new(small_island(), settings("trial", 1));
        engine.insert_population(&herd((1, 1), 10)).unwrap();
        let summary = engine.step_year().unwrap();
        assert_eq!(summary.year, 1);
        assert_eq!(summary.phases.len(), 6);
        assert_eq!(engine.year(), 1);
    }

    #[test]
    fn stop_flag_halts_between_years() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut engine =
            Engine::new(small_island(), settings("trial", 1)).with_stop_flag(flag.clone());
        engine.insert_population(&herd((1, 1), 10)).unwrap();
        engine.run(3).unwrap();
        assert_eq!(engine.year(), 3);
        flag.store(true, Ordering::Relaxed);
        engine.run(50).unwrap();
        assert_eq!(engine.year(), 3, "no further years once the flag is up");
    }

    #[test]
    fn insertion_between_years_lands_on_the_grid() {
        let mut engine = Engine::new(small_island(), settings("trial", 1));
        engine.insert_population(&herd((1, 1), 5)).unwrap();
        engine.step_year().unwrap();
        engine.insert_population(&herd((2, 2), 5)).unwrap();
        let herb = engine.island().catalog().id_of("Herbivore").unwrap();
        assert_eq!(engine.island().cell(2, 2).count(herb), 5);
    }
}
