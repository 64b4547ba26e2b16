//! Media engine abstraction. The timed playback controller only talks to these
//! traits; decoding and output live behind them.

pub mod error;
pub mod events;
pub mod rodio_engine;

use std::path::Path;
use std::time::Duration;

pub use error::{EngineError, EngineResult};
pub use events::{EventHandler, PlayerEvent, SubscriptionId};
pub use rodio_engine::RodioEngine;

/// Process-wide engine lifecycle plus player construction.
///
/// `init` and `release` bracket every session; a player may only be created
/// between them.
pub trait MediaEngine: Send + Sync {
    type Player: MediaPlayer;

    fn init(&self, options: &[String]) -> EngineResult<()>;
    fn release(&self) -> EngineResult<()>;
    fn new_player(&self) -> EngineResult<Self::Player>;
}

/// A single player instance. Queries and commands may be issued from event
/// dispatch threads, so implementations must be `Sync`.
pub trait MediaPlayer: Send + Sync {
    type Media: MediaHandle;

    fn load_media(&self, path: &Path) -> EngineResult<Self::Media>;
    fn play(&self) -> EngineResult<()>;
    fn stop(&self) -> EngineResult<()>;

    fn is_fullscreen(&self) -> EngineResult<bool>;
    fn set_fullscreen(&self, fullscreen: bool) -> EngineResult<()>;

    /// Total length of the loaded media. Only meaningful once playback started.
    fn media_length(&self) -> EngineResult<Duration>;
    /// Current playback position.
    fn media_time(&self) -> EngineResult<Duration>;
    fn is_seekable(&self) -> bool;
    /// Seek to `fraction` (in `[0, 1)`) of the total length.
    fn set_media_position(&self, fraction: f64) -> EngineResult<()>;

    fn attach(&self, event: PlayerEvent, handler: EventHandler) -> EngineResult<SubscriptionId>;
    fn detach(&self, ids: &[SubscriptionId]);

    fn release(self) -> EngineResult<()>;
}

/// Loaded media item. Must be released before its player.
pub trait MediaHandle: Send {
    fn release(self) -> EngineResult<()>;
}
