//! Engine-level error type
//!
//! Every engine operation returns `EngineResult`. Payloads are plain strings so
//! errors can be cloned across the session's threads.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Engine `init` called twice without a `release` in between
    #[error("Engine already initialized")]
    AlreadyInitialized,

    /// Operation requires an initialized engine
    #[error("Engine not initialized")]
    NotInitialized,

    /// Audio output device could not be opened or driven
    #[error("Audio output error: {0}")]
    Output(String),

    /// Media could not be opened or probed
    #[error("Failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// Command issued without loaded media
    #[error("No media loaded")]
    NoMedia,

    /// Query that is only valid once playback started
    #[error("Player is not playing")]
    NotPlaying,

    #[error("Seek failed: {0}")]
    Seek(String),

    #[error("Event subscription failed: {0}")]
    Subscription(String),

    #[error("Release failed: {0}")]
    Release(String),

    #[error("Engine error: {0}")]
    Other(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
