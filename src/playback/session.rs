//! Per-session event handling
//!
//! A `Session` is created once playback has been issued and lives until the
//! terminal signal fires. Its handlers run on the controller's dispatch
//! thread, never on the engine's delivery thread.

use crate::engine::{MediaPlayer, PlayerEvent};
use crate::error::PlaybackError;
use crate::playback::seek::choose_seek;
use crate::playback::signal::{OnceGate, TerminalSignal};
use crate::utils::formatting::format_duration;
use crate::utils::safe_lock;
use rand::rngs::StdRng;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Caller-supplied progress hook, given the time left until the deadline
pub type ProgressCallback = Box<dyn FnMut(Duration) + Send>;

/// How a session ended when no fatal error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The engine reported the natural end of the media
    EndReached,
    /// The play-for budget ran out first
    DeadlineExpired,
}

/// Value carried by a session's terminal signal
pub type SessionOutcome = Result<Termination, PlaybackError>;

pub struct Session<'a, P: MediaPlayer> {
    pub label: &'a str,
    pub player: &'a P,
    pub play_for: Duration,
    pub deadline: Instant,
    pub signal: &'a TerminalSignal<SessionOutcome>,
    pub rng: &'a Mutex<StdRng>,
    seek_gate: OnceGate,
}

impl<'a, P: MediaPlayer> Session<'a, P> {
    pub fn new(
        label: &'a str,
        player: &'a P,
        play_for: Duration,
        deadline: Instant,
        signal: &'a TerminalSignal<SessionOutcome>,
        rng: &'a Mutex<StdRng>,
    ) -> Self {
        Self {
            label,
            player,
            play_for,
            deadline,
            signal,
            rng,
            seek_gate: OnceGate::new(),
        }
    }

    /// React to one engine event. An `Err` is fatal for the session.
    pub fn handle(
        &self,
        event: PlayerEvent,
        on_progress: &mut Option<ProgressCallback>,
    ) -> Result<(), PlaybackError> {
        match event {
            PlayerEvent::PlayingStarted => {
                log::info!("[Session] {}: event {}", self.label, event);
                self.ensure_fullscreen();
                self.seek_once()?;
            }
            PlayerEvent::LengthChanged => {
                log::debug!("[Session] {}: event {}", self.label, event);
            }
            PlayerEvent::TimeChanged => self.report_progress(on_progress),
            PlayerEvent::EndReached => {
                log::info!("[Session] {}: event {}", self.label, event);
                if !self.signal.fire(Ok(Termination::EndReached)) {
                    log::debug!("[Session] {}: already terminating", self.label);
                }
            }
        }
        Ok(())
    }

    /// Best-effort; fullscreen problems never end the session
    fn ensure_fullscreen(&self) {
        match self.player.is_fullscreen() {
            Ok(true) => {}
            Ok(false) => {
                log::info!("[Session] {}: fullscreen off, switching on", self.label);
                if let Err(e) = self.player.set_fullscreen(true) {
                    log::warn!("[Session] {}: set fullscreen failed: {}", self.label, e);
                }
            }
            Err(e) => {
                log::warn!("[Session] {}: fullscreen query failed: {}", self.label, e);
            }
        }
    }

    fn seek_once(&self) -> Result<(), PlaybackError> {
        if self.seek_gate.has_passed() {
            return Ok(());
        }

        let length = self
            .player
            .media_length()
            .map_err(PlaybackError::engine("media length"))?;
        log::info!("[Session] {}: media length {}", self.label, format_duration(length));

        // LengthChanged never comes through here, so this is the only trigger.
        if !self.seek_gate.try_pass() {
            return Ok(());
        }

        let plan = {
            let mut rng = safe_lock(self.rng, "Session");
            choose_seek(&mut *rng, length, self.play_for)
        };
        if plan.is_clamped() {
            log::warn!(
                "[Session] {}: media ({}) not longer than budget ({}), playing from start",
                self.label,
                format_duration(length),
                format_duration(self.play_for)
            );
        }
        log::debug!("[Session] {}: seekable: {}", self.label, self.player.is_seekable());
        log::info!(
            "[Session] {}: max seek position {:.4}, seek position {:.4}",
            self.label,
            plan.max_fraction,
            plan.fraction
        );

        self.player
            .set_media_position(plan.fraction)
            .map_err(PlaybackError::engine("seek"))
    }

    fn report_progress(&self, on_progress: &mut Option<ProgressCallback>) {
        match self.player.media_time() {
            Ok(position) => {
                log::debug!("[Session] {}: @ {}", self.label, format_duration(position));
            }
            Err(e) => {
                log::warn!("[Session] {}: position query failed, skipping tick: {}", self.label, e);
                return;
            }
        }

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if let Some(callback) = on_progress.as_mut() {
            callback(remaining);
        }
    }
}
