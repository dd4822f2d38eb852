pub mod animal;
pub mod cell;
pub mod engine;
pub mod error;
pub mod island;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod species;

pub use engine::{Engine, EngineSettings, YearSummary};
pub use error::{Error, Result};
pub use island::{Island, Placement};
pub use scenario::{Scenario, ScenarioLoader};
pub use snapshot::IslandSnapshot;
pub use species::{Diet, SpeciesCatalog, SpeciesId, SpeciesParams};
