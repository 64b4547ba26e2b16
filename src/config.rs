//! Runtime configuration
//!
//! Precedence, lowest first: built-in defaults, JSON config file, environment
//! (`.env` included), command line.

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_ENGINE_OPTIONS, DEFAULT_PAUSE_MILLIS,
    DEFAULT_PLAY_FOR_MILLIS, DEFAULT_SOURCE, TIME_TICK_MILLIS,
};
use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Default)]
#[command(
    name = "playfor",
    version,
    about = "Play random windows of a media file for a fixed duration"
)]
pub struct Cli {
    /// Media file to play
    #[arg(env = "PLAYFOR_SOURCE")]
    pub source: Option<PathBuf>,

    /// Play budget per session, in milliseconds
    #[arg(long, env = "PLAYFOR_DURATION_MS")]
    pub duration_ms: Option<u64>,

    /// Pause between sessions, in milliseconds
    #[arg(long, env = "PLAYFOR_PAUSE_MS")]
    pub pause_ms: Option<u64>,

    /// Stop after this many sessions (default: run forever)
    #[arg(long, env = "PLAYFOR_SESSIONS")]
    pub sessions: Option<u64>,

    /// Seed for seek positions
    #[arg(long, env = "PLAYFOR_SEED")]
    pub seed: Option<u64>,

    /// Engine option, repeatable (e.g. --engine-option=--volume=0.5)
    #[arg(long = "engine-option", allow_hyphen_values = true)]
    pub engine_options: Vec<String>,

    /// Interval between position events, in milliseconds
    #[arg(long, env = "PLAYFOR_TICK_MS")]
    pub tick_ms: Option<u64>,

    /// JSON config file (default: <config dir>/playfor/config.json)
    #[arg(long, env = "PLAYFOR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// On-disk config. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub source: Option<PathBuf>,
    pub duration_ms: Option<u64>,
    pub pause_ms: Option<u64>,
    pub sessions: Option<u64>,
    pub seed: Option<u64>,
    pub engine_options: Option<Vec<String>>,
    pub tick_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved settings for the session loop
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source: PathBuf,
    pub play_for: Duration,
    pub pause: Duration,
    pub sessions: Option<u64>,
    pub seed: Option<u64>,
    pub engine_options: Vec<String>,
    pub tick: Duration,
}

impl Settings {
    /// Merge command line (which already carries the environment) over the
    /// config file over defaults
    pub fn resolve(cli: Cli, file: FileConfig) -> Self {
        let engine_options = if !cli.engine_options.is_empty() {
            cli.engine_options
        } else {
            file.engine_options.unwrap_or_else(|| {
                DEFAULT_ENGINE_OPTIONS.iter().map(|o| o.to_string()).collect()
            })
        };

        Self {
            source: cli
                .source
                .or(file.source)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE)),
            play_for: Duration::from_millis(
                cli.duration_ms.or(file.duration_ms).unwrap_or(DEFAULT_PLAY_FOR_MILLIS),
            ),
            pause: Duration::from_millis(
                cli.pause_ms.or(file.pause_ms).unwrap_or(DEFAULT_PAUSE_MILLIS),
            ),
            sessions: cli.sessions.or(file.sessions),
            seed: cli.seed.or(file.seed),
            engine_options,
            // a zero tick would make the engine emit TimeChanged in a busy loop
            tick: Duration::from_millis(
                cli.tick_ms.or(file.tick_ms).unwrap_or(TIME_TICK_MILLIS).max(1),
            ),
        }
    }
}

/// Default config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load `.env`, parse the command line and merge in the config file.
///
/// A missing default config file is fine; a missing explicit one is an error.
pub fn load() -> Result<Settings, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        log::debug!("[Config] No .env loaded: {}", e);
    }

    let cli = Cli::parse();
    let file = match cli.config.clone() {
        Some(path) => FileConfig::load(&path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => FileConfig::load(&path)?,
            _ => FileConfig::default(),
        },
    };

    Ok(Settings::resolve(cli, file))
}
