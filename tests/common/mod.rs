//! Scripted in-memory engine for driving the controller in tests.
//!
//! Every engine call is recorded in order; events are emitted from a
//! background thread according to a script; any operation can be made to fail.

#![allow(dead_code)]

use playfor::engine::{
    EngineError, EngineResult, EventHandler, MediaEngine, MediaHandle, MediaPlayer, PlayerEvent,
    SubscriptionId,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Init,
    EngineRelease,
    NewPlayer,
    PlayerRelease,
    Load,
    MediaRelease,
    Play,
    Stop,
    Attach(PlayerEvent),
    Detach(usize),
    IsFullscreen,
    SetFullscreen(bool),
    MediaLength,
    MediaTime,
    Seek(f64),
}

impl Call {
    /// Acquire/release steps, as opposed to queries and commands
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Call::Init
                | Call::EngineRelease
                | Call::NewPlayer
                | Call::PlayerRelease
                | Call::Load
                | Call::MediaRelease
                | Call::Play
                | Call::Stop
                | Call::Attach(_)
                | Call::Detach(_)
        )
    }
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Init,
    EngineRelease,
    NewPlayer,
    PlayerRelease,
    Load,
    MediaRelease,
    Play,
    Stop,
    /// Fails the n-th (0-based) attach call
    Attach(usize),
    IsFullscreen,
    MediaLength,
    MediaTime,
    Seek,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub length: Duration,
    pub fullscreen: bool,
    /// (delay since previous event, event), emitted after `play`
    pub events: Vec<(Duration, PlayerEvent)>,
    /// After the scripted events, emit TimeChanged at this interval until stopped
    pub tick: Option<Duration>,
    pub failures: HashSet<Op>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            length: Duration::from_secs(10),
            fullscreen: false,
            events: vec![(Duration::ZERO, PlayerEvent::PlayingStarted)],
            tick: None,
            failures: HashSet::new(),
        }
    }
}

impl Script {
    pub fn events(mut self, events: Vec<(Duration, PlayerEvent)>) -> Self {
        self.events = events;
        self
    }

    pub fn tick(mut self, interval: Duration) -> Self {
        self.tick = Some(interval);
        self
    }

    pub fn length(mut self, length: Duration) -> Self {
        self.length = length;
        self
    }

    pub fn fullscreen(mut self, on: bool) -> Self {
        self.fullscreen = on;
        self
    }

    pub fn fail(mut self, op: Op) -> Self {
        self.failures.insert(op);
        self
    }
}

#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    emitter_threads: Mutex<Vec<ThreadId>>,
}

impl Recorder {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Threads the scripted events were delivered on
    pub fn emitter_threads(&self) -> Vec<ThreadId> {
        self.emitter_threads.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lifecycle(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_lifecycle).collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Seek(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

fn injected(op: Op) -> EngineError {
    EngineError::Other(format!("injected {:?} failure", op))
}

pub struct ScriptedEngine {
    script: Script,
    pub recorder: Arc<Recorder>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            recorder: Arc::new(Recorder::default()),
        }
    }

    fn check(&self, op: Op) -> EngineResult<()> {
        if self.script.failures.contains(&op) {
            Err(injected(op))
        } else {
            Ok(())
        }
    }
}

impl MediaEngine for ScriptedEngine {
    type Player = ScriptedPlayer;

    fn init(&self, _options: &[String]) -> EngineResult<()> {
        self.recorder.record(Call::Init);
        self.check(Op::Init)
    }

    fn release(&self) -> EngineResult<()> {
        self.recorder.record(Call::EngineRelease);
        self.check(Op::EngineRelease)
    }

    fn new_player(&self) -> EngineResult<ScriptedPlayer> {
        self.recorder.record(Call::NewPlayer);
        self.check(Op::NewPlayer)?;
        Ok(ScriptedPlayer {
            script: self.script.clone(),
            recorder: Arc::clone(&self.recorder),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            attach_calls: AtomicU64::new(0),
            fullscreen: AtomicBool::new(self.script.fullscreen),
            stopped: Arc::new(AtomicBool::new(false)),
            emitter: Mutex::new(None),
        })
    }
}

type Handlers = Arc<Mutex<HashMap<SubscriptionId, (PlayerEvent, EventHandler)>>>;

pub struct ScriptedPlayer {
    script: Script,
    recorder: Arc<Recorder>,
    handlers: Handlers,
    next_id: AtomicU64,
    attach_calls: AtomicU64,
    fullscreen: AtomicBool,
    stopped: Arc<AtomicBool>,
    emitter: Mutex<Option<JoinHandle<()>>>,
}

impl ScriptedPlayer {
    fn check(&self, op: Op) -> EngineResult<()> {
        if self.script.failures.contains(&op) {
            Err(injected(op))
        } else {
            Ok(())
        }
    }

    fn halt_emitter(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.emitter.lock().unwrap().take() {
            handle.join().unwrap();
        }
    }
}

fn emit(handlers: &Handlers, event: PlayerEvent) {
    let matching: Vec<EventHandler> = handlers
        .lock()
        .unwrap()
        .values()
        .filter(|(kind, _)| *kind == event)
        .map(|(_, handler)| Arc::clone(handler))
        .collect();
    for handler in matching {
        handler(event);
    }
}

/// Sleep in small steps; false if stopped meanwhile
fn pause(stopped: &AtomicBool, duration: Duration) -> bool {
    let step = Duration::from_millis(2);
    let mut left = duration;
    while !left.is_zero() {
        if stopped.load(Ordering::SeqCst) {
            return false;
        }
        let nap = left.min(step);
        std::thread::sleep(nap);
        left -= nap;
    }
    !stopped.load(Ordering::SeqCst)
}

impl MediaPlayer for ScriptedPlayer {
    type Media = ScriptedMedia;

    fn load_media(&self, _path: &Path) -> EngineResult<ScriptedMedia> {
        self.recorder.record(Call::Load);
        self.check(Op::Load)?;
        Ok(ScriptedMedia {
            recorder: Arc::clone(&self.recorder),
            fail: self.script.failures.contains(&Op::MediaRelease),
        })
    }

    fn play(&self) -> EngineResult<()> {
        self.recorder.record(Call::Play);
        self.check(Op::Play)?;

        let events = self.script.events.clone();
        let tick = self.script.tick;
        let handlers = Arc::clone(&self.handlers);
        let stopped = Arc::clone(&self.stopped);
        let recorder = Arc::clone(&self.recorder);
        let handle = std::thread::spawn(move || {
            recorder
                .emitter_threads
                .lock()
                .unwrap()
                .push(std::thread::current().id());
            for (delay, event) in events {
                if !pause(&stopped, delay) {
                    return;
                }
                emit(&handlers, event);
            }
            if let Some(interval) = tick {
                while pause(&stopped, interval) {
                    emit(&handlers, PlayerEvent::TimeChanged);
                }
            }
        });
        *self.emitter.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        self.recorder.record(Call::Stop);
        self.halt_emitter();
        self.check(Op::Stop)
    }

    fn is_fullscreen(&self) -> EngineResult<bool> {
        self.recorder.record(Call::IsFullscreen);
        self.check(Op::IsFullscreen)?;
        Ok(self.fullscreen.load(Ordering::SeqCst))
    }

    fn set_fullscreen(&self, fullscreen: bool) -> EngineResult<()> {
        self.recorder.record(Call::SetFullscreen(fullscreen));
        self.fullscreen.store(fullscreen, Ordering::SeqCst);
        Ok(())
    }

    fn media_length(&self) -> EngineResult<Duration> {
        self.recorder.record(Call::MediaLength);
        self.check(Op::MediaLength)?;
        Ok(self.script.length)
    }

    fn media_time(&self) -> EngineResult<Duration> {
        self.recorder.record(Call::MediaTime);
        self.check(Op::MediaTime)?;
        Ok(Duration::from_millis(500))
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn set_media_position(&self, fraction: f64) -> EngineResult<()> {
        self.recorder.record(Call::Seek(fraction));
        self.check(Op::Seek)
    }

    fn attach(&self, event: PlayerEvent, handler: EventHandler) -> EngineResult<SubscriptionId> {
        self.recorder.record(Call::Attach(event));
        let nth = self.attach_calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.check(Op::Attach(nth))?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().unwrap().insert(id, (event, handler));
        Ok(id)
    }

    fn detach(&self, ids: &[SubscriptionId]) {
        self.recorder.record(Call::Detach(ids.len()));
        let mut handlers = self.handlers.lock().unwrap();
        for id in ids {
            handlers.remove(id);
        }
    }

    fn release(self) -> EngineResult<()> {
        self.recorder.record(Call::PlayerRelease);
        self.halt_emitter();
        self.check(Op::PlayerRelease)
    }
}

pub struct ScriptedMedia {
    recorder: Arc<Recorder>,
    fail: bool,
}

impl MediaHandle for ScriptedMedia {
    fn release(self) -> EngineResult<()> {
        self.recorder.record(Call::MediaRelease);
        if self.fail {
            Err(injected(Op::MediaRelease))
        } else {
            Ok(())
        }
    }
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
