//! playfor: bounded-duration media playback sessions
//!
//! A session loads a media file, seeks to a random point that leaves enough
//! media for the requested duration, reports the remaining time while it
//! plays, and tears everything down once the media ends or the budget runs
//! out, whichever happens first.

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod playback;
pub mod utils;

pub use engine::{MediaEngine, MediaHandle, MediaPlayer, PlayerEvent, RodioEngine};
pub use error::{ConfigError, PlaybackError};
pub use playback::{ProgressCallback, Termination, TimedPlayback};
