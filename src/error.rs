use std::path::PathBuf;

use thiserror::Error;

/// A malformed line in one of the line-oriented input files.
///
/// Readers catch this per line, log it and skip the line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{line}: {reason}", .file.display())]
pub struct ParseError {
    pub file: PathBuf,
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(file: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self { file: file.into(), line, reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum RecError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("evaluation cancelled")]
    Cancelled,
}

impl RecError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, RecError>;
