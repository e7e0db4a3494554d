use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error that may occur while loading or querying the GO hierarchy
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("GO term not found: {0}")]
    NotFound(String),

    #[error("unknown ontology: {0}")]
    UnknownOntology(String),
}

impl Error {
    pub(crate) fn parse<S: Into<String>>(line: usize, message: S) -> Error {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}
