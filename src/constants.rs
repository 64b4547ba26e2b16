//! Application constants and default configuration values

// === Session Loop ===
pub const DEFAULT_SOURCE: &str = "video.mp4";
pub const DEFAULT_PLAY_FOR_MILLIS: u64 = 3000;
pub const DEFAULT_PAUSE_MILLIS: u64 = 2000;

// === Engine ===
pub const DEFAULT_ENGINE_OPTIONS: &[&str] = &["--quiet", "--fullscreen"];
pub const TIME_TICK_MILLIS: u64 = 250; // TimeChanged cadence of the rodio engine
pub const DEFAULT_VOLUME: f32 = 1.0;

// === Controller ===
pub const DISPATCH_POLL_MILLIS: u64 = 20; // how often dispatch re-checks the terminal signal

// === Config ===
pub const CONFIG_DIR_NAME: &str = "playfor";
pub const CONFIG_FILE_NAME: &str = "config.json";
