//! Timed playback controller
//!
//! `TimedPlayback::play_for` runs one bounded session end to end:
//!
//! 1. engine init, player create, media load
//! 2. subscribe to player events, play, arm the deadline watcher
//! 3. react to events on a dispatch thread until the terminal signal fires
//! 4. detach, stop, release media, release player, release engine
//!
//! Every release in step 4 is attempted no matter which earlier step failed.

use crate::constants::{DEFAULT_ENGINE_OPTIONS, DISPATCH_POLL_MILLIS};
use crate::engine::{
    EventHandler, MediaEngine, MediaHandle, MediaPlayer, PlayerEvent, SubscriptionId,
};
use crate::error::PlaybackError;
use crate::playback::session::{ProgressCallback, Session, SessionOutcome, Termination};
use crate::playback::signal::TerminalSignal;
use crate::utils::create_runtime;
use crate::utils::formatting::format_duration;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

// Budgets past this are treated as "no deadline in practice".
const MAX_PLAY_FOR: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub struct TimedPlayback<E: MediaEngine> {
    engine: E,
    engine_options: Vec<String>,
    rng: Mutex<StdRng>,
}

impl<E: MediaEngine> TimedPlayback<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            engine_options: DEFAULT_ENGINE_OPTIONS.iter().map(|o| o.to_string()).collect(),
            rng: Mutex::new(StdRng::from_rng(&mut rand::rng())),
        }
    }

    /// Options passed to `MediaEngine::init` at the start of every session
    pub fn with_engine_options(mut self, options: Vec<String>) -> Self {
        self.engine_options = options;
        self
    }

    /// Make seek positions reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Play `source` for at most `play_for`, starting at a random position.
    ///
    /// Blocks until the media ends or the budget runs out. All engine
    /// resources are released before this returns, on every path.
    pub fn play_for(
        &self,
        source: &Path,
        play_for: Duration,
        on_progress: Option<ProgressCallback>,
    ) -> SessionOutcome {
        let label = source.display().to_string();
        log::info!("[Session] {}: starting, budget {}", label, format_duration(play_for));

        self.engine
            .init(&self.engine_options)
            .map_err(PlaybackError::engine("engine init"))?;

        let outcome = self.run_player(&label, source, play_for, on_progress);

        log::debug!("[Session] {}: releasing engine", label);
        let released = self
            .engine
            .release()
            .map_err(PlaybackError::engine("engine release"));

        let outcome = settle(outcome, released);
        match &outcome {
            Ok(termination) => log::info!("[Session] {}: finished ({:?})", label, termination),
            Err(e) => log::error!("[Session] {}: aborted: {}", label, e),
        }
        outcome
    }

    fn run_player(
        &self,
        label: &str,
        source: &Path,
        play_for: Duration,
        on_progress: Option<ProgressCallback>,
    ) -> SessionOutcome {
        let player = self
            .engine
            .new_player()
            .map_err(PlaybackError::engine("player create"))?;

        let outcome = self.run_media(&player, label, source, play_for, on_progress);

        log::debug!("[Session] {}: releasing player", label);
        let released = player
            .release()
            .map_err(PlaybackError::engine("player release"));
        settle(outcome, released)
    }

    fn run_media(
        &self,
        player: &E::Player,
        label: &str,
        source: &Path,
        play_for: Duration,
        on_progress: Option<ProgressCallback>,
    ) -> SessionOutcome {
        let media = player
            .load_media(source)
            .map_err(PlaybackError::engine("media load"))?;

        let outcome = self.run_session(player, label, play_for, on_progress);

        log::debug!("[Session] {}: stopping player", label);
        let stopped = player.stop().map_err(PlaybackError::engine("player stop"));

        if let Err(e) = media.release() {
            log::warn!("[Session] {}: media release error: {}", label, e);
        }
        settle(outcome, stopped)
    }

    fn run_session(
        &self,
        player: &E::Player,
        label: &str,
        play_for: Duration,
        on_progress: Option<ProgressCallback>,
    ) -> SessionOutcome {
        let runtime = create_runtime().map_err(|e| PlaybackError::Runtime(e.to_string()))?;

        let (event_tx, event_rx) = mpsc::channel();
        let subscriptions = subscribe(player, event_tx)?;

        log::debug!("[Session] {}: calling play()", label);
        if let Err(e) = player.play() {
            player.detach(&subscriptions);
            return Err(PlaybackError::engine("play")(e));
        }

        let started = Instant::now();
        let deadline = started + play_for.min(MAX_PLAY_FOR);
        let signal = TerminalSignal::new();
        let session = Session::new(label, player, play_for, deadline, &signal, &self.rng);

        let signal = &signal;
        let session = &session;
        thread::scope(|scope| {
            scope.spawn(move || watch_deadline(runtime, deadline, play_for, signal, label));
            scope.spawn(move || dispatch_events(session, event_rx, on_progress));

            let outcome = signal.wait();
            log::debug!("[Session] {}: detaching {} handlers", label, subscriptions.len());
            player.detach(&subscriptions);
            outcome
        })
    }
}

/// Attach one queue-feeding handler per event kind. On failure the handlers
/// attached so far are detached again.
fn subscribe<P: MediaPlayer>(
    player: &P,
    events: Sender<PlayerEvent>,
) -> Result<Vec<SubscriptionId>, PlaybackError> {
    let mut ids = Vec::with_capacity(PlayerEvent::ALL.len());
    for kind in PlayerEvent::ALL {
        let tx = events.clone();
        let handler: EventHandler = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        match player.attach(kind, handler) {
            Ok(id) => ids.push(id),
            Err(e) => {
                player.detach(&ids);
                return Err(PlaybackError::engine("event attach")(e));
            }
        }
    }
    Ok(ids)
}

fn dispatch_events<P: MediaPlayer>(
    session: &Session<'_, P>,
    events: Receiver<PlayerEvent>,
    mut on_progress: Option<ProgressCallback>,
) {
    let poll = Duration::from_millis(DISPATCH_POLL_MILLIS);
    while !session.signal.is_fired() {
        match events.recv_timeout(poll) {
            Ok(event) => {
                if session.signal.is_fired() {
                    break;
                }
                if let Err(e) = session.handle(event, &mut on_progress) {
                    log::error!("[Session] {}: fatal during {}: {}", session.label, event, e);
                    session.signal.fire(Err(e));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("[Session] {}: event source closed", session.label);
                break;
            }
        }
    }
}

/// Hard backstop: fires the terminal signal at `deadline` unless the session
/// already ended, in which case it returns right away.
fn watch_deadline(
    runtime: Runtime,
    deadline: Instant,
    play_for: Duration,
    signal: &TerminalSignal<SessionOutcome>,
    label: &str,
) {
    runtime.block_on(async {
        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                if signal.fire(Ok(Termination::DeadlineExpired)) {
                    log::info!(
                        "[Deadline] {}: timeout ({}), ending session",
                        label,
                        format_duration(play_for)
                    );
                }
            }
            _ = signal.fired() => {
                log::debug!("[Deadline] {}: session ended before deadline", label);
            }
        }
    });
}

/// Combine a step's outcome with the result of its cleanup. The earlier
/// failure wins; a cleanup failure on top of it is only logged.
fn settle<T>(
    outcome: Result<T, PlaybackError>,
    cleanup: Result<(), PlaybackError>,
) -> Result<T, PlaybackError> {
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            log::error!("[Session] {} (after earlier failure: {})", cleanup_err, e);
            Err(e)
        }
    }
}
