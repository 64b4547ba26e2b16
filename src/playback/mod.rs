//! Timed playback: one bounded session per `play_for` call

pub mod controller;
pub mod seek;
pub mod session;
pub mod signal;

pub use controller::TimedPlayback;
pub use seek::{choose_seek, max_seek_fraction, SeekPlan};
pub use session::{ProgressCallback, SessionOutcome, Termination};
pub use signal::{OnceGate, TerminalSignal};
