//! Error types for playfor
//!
//! Engine failures are wrapped with the operation that triggered them so a
//! fatal log line names the failing step.

use crate::engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal session error. Returned by `TimedPlayback::play_for` after teardown.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// An engine operation the session cannot continue without
    #[error("{operation} failed: {source}")]
    Engine {
        operation: &'static str,
        #[source]
        source: EngineError,
    },

    /// Timer runtime for the deadline watcher could not be built
    #[error("Timer runtime error: {0}")]
    Runtime(String),
}

impl PlaybackError {
    /// Adapter for `map_err`: tags an engine error with the failing operation
    pub fn engine(operation: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| PlaybackError::Engine { operation, source }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
