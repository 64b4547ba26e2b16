use std::fmt;
use std::sync::Arc;

/// Player events delivered asynchronously by an engine.
///
/// The same variant doubles as the subscription key passed to `attach`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEvent {
    /// Playback became active. Engines may repeat it.
    PlayingStarted,
    /// Total length became known or changed. Informational.
    LengthChanged,
    /// Playback position advanced.
    TimeChanged,
    /// Media played to its natural end.
    EndReached,
}

impl PlayerEvent {
    pub const ALL: [PlayerEvent; 4] = [
        PlayerEvent::PlayingStarted,
        PlayerEvent::LengthChanged,
        PlayerEvent::TimeChanged,
        PlayerEvent::EndReached,
    ];
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerEvent::PlayingStarted => "playing-started",
            PlayerEvent::LengthChanged => "length-changed",
            PlayerEvent::TimeChanged => "time-changed",
            PlayerEvent::EndReached => "end-reached",
        };
        f.write_str(name)
    }
}

/// Callback invoked by the engine on its own delivery thread
pub type EventHandler = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

/// Handle returned by `attach`, used to `detach` later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);
