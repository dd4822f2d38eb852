use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures detected before or between simulation years.
///
/// Probabilistic outcomes (death, birth, predation, migration) are normal
/// control flow and never surface here. Once a year is underway there are
/// no recoverable errors; `InvariantViolation` signals a defect, not a
/// condition to retry.
#[derive(Error, Debug)]
pub enum Error {
    #[error("the map must be rectangular: row {row} has {found} columns, expected {expected}")]
    RaggedMap {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("the edges of the map must be water: found '{code}' at ({row}, {col})")]
    InvalidBorder { code: char, row: usize, col: usize },

    #[error("unknown terrain code '{0}'")]
    InvalidTerrain(char),

    #[error("invalid value for parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("species '{0}' is not registered")]
    UnknownSpecies(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid species '{0}' in placement request")]
    InvalidSpecies(String),

    #[error("invalid location ({row}, {col}): {reason}")]
    InvalidLocation {
        row: usize,
        col: usize,
        reason: String,
    },

    #[error("invalid animal in placement request: {0}")]
    InvalidAnimal(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
