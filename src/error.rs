use thiserror::Error;

use crate::types::{JobState, MediaItemRef, ProcessingMode};

/// Errors reported by the host collaborator (media items, takes, undo).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Media item not found: {0}")]
    ItemNotFound(MediaItemRef),

    #[error("Host rejected the request: {0}")]
    Rejected(String),
}

/// Errors that can occur while scheduling or processing a batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("No media items are selected")]
    EmptySelection,

    #[error("No analysis algorithm is active")]
    NoActiveAlgorithm,

    #[error("Algorithm failed: {0}")]
    AlgorithmFailure(String),

    #[error("Invalid job state: expected {expected:?}, found {actual:?}")]
    InvalidState { expected: JobState, actual: JobState },

    #[error("Media item {0} is no longer valid")]
    ItemBecameInvalid(MediaItemRef),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Algorithm output cannot be applied in {mode:?} mode")]
    UnsupportedOutput { mode: ProcessingMode },

    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

impl From<anyhow::Error> for ProcessingError {
    fn from(err: anyhow::Error) -> Self {
        ProcessingError::AlgorithmFailure(format!("{:#}", err))
    }
}

/// Errors from reading or writing the persisted settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No settings path configured")]
    NoPath,
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
