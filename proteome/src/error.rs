use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the analysis pipeline.
///
/// Statistical degeneracies (zero-variance bins, undefined tests) are never
/// reported through this type; they show up as `NaN` p-values instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("data file is missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("could not parse column '{column}' at line {line}")]
    Parse { line: usize, column: String },

    #[error("unknown sample: {0}")]
    UnknownSample(String),

    #[error("protein group {id} has {found} samples, expected {expected}")]
    SampleMismatch { id: u32, expected: usize, found: usize },

    #[error("duplicate protein group id {0}")]
    DuplicateId(u32),

    #[error("invalid value for parameter '{name}': {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("invalid id pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid parameter file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Ontology(#[from] ontology::Error),

    #[error("significance has not been estimated")]
    NoSignificance,

    #[error("no GO associations have been loaded")]
    NoAnnotations,

    #[error("result computed at revision {found}, analysis is at revision {current}")]
    Stale { found: u64, current: u64 },
}

impl Error {
    pub(crate) fn invalid<V: ToString>(name: &'static str, value: V) -> Error {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }
}
