//! Error types for the two pipeline stages.
//!
//! Nothing here is recovered from: every variant ends the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Cube loading failures.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The path is missing, not a regular file, or cannot be read.
    #[error("cannot read cube file '{}': {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is readable but is not a well-formed FITS cube.
    #[error("malformed cube file '{}': {reason}", .path.display())]
    Format { path: PathBuf, reason: String },
}

impl LoadError {
    pub(crate) fn format(path: &std::path::Path, reason: impl Into<String>) -> Self {
        LoadError::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Failures surfaced by the single engine call.
#[derive(Error, Debug)]
pub enum EngineInvocationError {
    #[error("engine call failed: {0}")]
    Engine(#[from] EngineError),

    #[error("failed to start engine worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("engine worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Umbrella error naming the stage that failed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("load stage failed: {0}")]
    Load(#[from] LoadError),

    #[error("invoke stage failed: {0}")]
    Invoke(#[from] EngineInvocationError),
}
