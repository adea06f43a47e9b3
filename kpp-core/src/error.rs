use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source {}", path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("{file}:{line}: kpp error: {message}")]
    Parse {
        line: usize,
        file: String,
        message: String,
    },
    #[error("{file}:{line}: kpp error: unexpected end of input")]
    ScanExhausted { line: usize, file: String },
}

impl CoreError {
    /// Line of the failure, for scan errors.
    pub fn line(&self) -> Option<usize> {
        match self {
            CoreError::Parse { line, .. } | CoreError::ScanExhausted { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            CoreError::Parse { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}
