use thiserror::Error;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Unbound dimension in shape of feature {0}")]
    UnboundDimension(String),

    #[error("Failed to load model from {0}: {1}")]
    ModelLoad(PathBuf, String),

    #[error("Failed to create session: {0}")]
    SessionCreation(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Counter unavailable: {0}")]
    CounterUnavailable(String),

    #[error("Imbalanced measurement bracket on slot {0}")]
    ImbalancedBracket(String),
}

impl Error {
    /// True when the error aborts the whole configuration rather than a
    /// single iteration.
    pub fn is_configuration_fatal(&self) -> bool {
        matches!(
            self,
            Error::ModelLoad(_, _) | Error::SessionCreation(_) | Error::DeviceLost(_)
        )
    }
}
