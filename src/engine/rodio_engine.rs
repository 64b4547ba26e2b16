use crate::constants::{DEFAULT_VOLUME, TIME_TICK_MILLIS};
use crate::engine::{
    EngineError, EngineResult, EventHandler, MediaEngine, MediaHandle, MediaPlayer, PlayerEvent,
    SubscriptionId,
};
use crate::utils::safe_lock;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Options understood by `RodioEngine::init`
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Per-tick position logging goes to trace instead of debug
    pub quiet: bool,
    /// Players start with the fullscreen display flag set
    pub fullscreen: bool,
    pub volume: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            quiet: false,
            fullscreen: false,
            volume: DEFAULT_VOLUME,
        }
    }
}

impl EngineSettings {
    pub fn from_options(options: &[String]) -> Self {
        let mut settings = Self::default();
        for option in options {
            match option.as_str() {
                "--quiet" => settings.quiet = true,
                "--fullscreen" => settings.fullscreen = true,
                other => match other.strip_prefix("--volume=").map(str::parse::<f32>) {
                    Some(Ok(volume)) if volume >= 0.0 => settings.volume = volume,
                    Some(_) => log::warn!("[RodioEngine] Invalid volume option: {}", other),
                    None => log::warn!("[RodioEngine] Ignoring unknown option: {}", other),
                },
            }
        }
        settings
    }
}

/// The output stream is not `Send`, so it lives on its own thread until the
/// engine is released.
struct OutputLease {
    handle: OutputStreamHandle,
    shutdown_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl OutputLease {
    fn open() -> EngineResult<Self> {
        let (ready_tx, ready_rx) = channel();
        let (shutdown_tx, shutdown_rx) = channel::<()>();

        let thread = std::thread::Builder::new()
            .name("rodio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Ends on an explicit shutdown or when the lease is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    log::debug!("[RodioEngine] Output stream closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(EngineError::Output(e.to_string())));
                }
            })
            .map_err(|e| EngineError::Output(format!("Failed to spawn output thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(handle)) => Ok(Self {
                handle,
                shutdown_tx,
                thread,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(EngineError::Output("Output thread exited early".to_string()))
            }
        }
    }

    fn close(self) -> EngineResult<()> {
        let _ = self.shutdown_tx.send(());
        self.thread
            .join()
            .map_err(|_| EngineError::Release("Output thread panicked".to_string()))
    }
}

/// Local-file audio engine on top of rodio.
///
/// `init` opens the default output device and `release` closes it again, so
/// each session owns the device for exactly its own lifetime.
pub struct RodioEngine {
    output: Mutex<Option<OutputLease>>,
    settings: Mutex<EngineSettings>,
    tick: Duration,
}

impl RodioEngine {
    pub fn new() -> Self {
        Self {
            output: Mutex::new(None),
            settings: Mutex::new(EngineSettings::default()),
            tick: Duration::from_millis(TIME_TICK_MILLIS),
        }
    }

    /// Interval between TimeChanged events, at least one millisecond
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    pub fn is_initialized(&self) -> bool {
        safe_lock(&self.output, "RodioEngine").is_some()
    }
}

impl Default for RodioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for RodioEngine {
    type Player = RodioPlayer;

    fn init(&self, options: &[String]) -> EngineResult<()> {
        let mut output = safe_lock(&self.output, "RodioEngine");
        if output.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        let settings = EngineSettings::from_options(options);
        log::info!("[RodioEngine] Opening output device ({:?})", settings);
        *output = Some(OutputLease::open()?);
        *safe_lock(&self.settings, "RodioEngine") = settings;
        Ok(())
    }

    fn release(&self) -> EngineResult<()> {
        let lease = safe_lock(&self.output, "RodioEngine")
            .take()
            .ok_or(EngineError::NotInitialized)?;
        log::info!("[RodioEngine] Releasing output device");
        lease.close()
    }

    fn new_player(&self) -> EngineResult<RodioPlayer> {
        let handle = safe_lock(&self.output, "RodioEngine")
            .as_ref()
            .map(|lease| lease.handle.clone())
            .ok_or(EngineError::NotInitialized)?;
        let settings = safe_lock(&self.settings, "RodioEngine").clone();
        Ok(RodioPlayer::new(handle, settings, self.tick))
    }
}

struct LoadedMedia {
    id: u64,
    path: PathBuf,
    length: Duration,
}

struct PlayerState {
    media: Option<LoadedMedia>,
    next_media_id: u64,
    sink: Option<Sink>,
    start_time: Instant,
    start_position: Duration,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            media: None,
            next_media_id: 0,
            sink: None,
            start_time: Instant::now(),
            start_position: Duration::ZERO,
        }
    }

    /// Record `path` as the loaded media and return its id
    fn load(&mut self, path: &Path, length: Duration) -> u64 {
        self.next_media_id += 1;
        self.media = Some(LoadedMedia {
            id: self.next_media_id,
            path: path.to_path_buf(),
            length,
        });
        self.next_media_id
    }

    /// Forget the media, but only if `id` is still the loaded one
    fn unload(&mut self, id: u64, path: &Path) -> EngineResult<()> {
        match self.media.as_ref() {
            Some(media) if media.id == id => {
                self.media = None;
                Ok(())
            }
            _ => Err(EngineError::Release(format!("{:?} is no longer loaded", path))),
        }
    }

    fn ensure_unloaded(&self) -> EngineResult<()> {
        match self.media.as_ref() {
            Some(media) => Err(EngineError::Release(format!("{:?} still loaded", media.path))),
            None => Ok(()),
        }
    }

    fn position(&self) -> Duration {
        let position = self.start_position.saturating_add(self.start_time.elapsed());
        match &self.media {
            Some(media) => position.min(media.length),
            None => position,
        }
    }
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: BTreeMap<SubscriptionId, (PlayerEvent, EventHandler)>,
}

fn emit(subscribers: &Mutex<Subscribers>, event: PlayerEvent) {
    // Handlers are called outside the lock so they may attach/detach.
    let handlers: Vec<EventHandler> = safe_lock(subscribers, "RodioPlayer")
        .handlers
        .values()
        .filter(|(kind, _)| *kind == event)
        .map(|(_, handler)| Arc::clone(handler))
        .collect();
    for handler in handlers {
        handler(event);
    }
}

struct Poller {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

pub struct RodioPlayer {
    handle: OutputStreamHandle,
    state: Arc<Mutex<PlayerState>>,
    subscribers: Arc<Mutex<Subscribers>>,
    poller: Mutex<Option<Poller>>,
    fullscreen: AtomicBool,
    volume: f32,
    quiet: bool,
    tick: Duration,
}

impl RodioPlayer {
    fn new(handle: OutputStreamHandle, settings: EngineSettings, tick: Duration) -> Self {
        Self {
            handle,
            state: Arc::new(Mutex::new(PlayerState::new())),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            poller: Mutex::new(None),
            fullscreen: AtomicBool::new(settings.fullscreen),
            volume: settings.volume,
            quiet: settings.quiet,
            tick,
        }
    }

    /// Emits PlayingStarted and LengthChanged once, then TimeChanged every
    /// tick until the sink drains (EndReached) or the player is stopped.
    fn start_poller(&self) -> EngineResult<()> {
        self.stop_poller();

        let (stop_tx, stop_rx) = channel::<()>();
        let state = Arc::clone(&self.state);
        let subscribers = Arc::clone(&self.subscribers);
        let tick = self.tick;
        let quiet = self.quiet;

        let thread = std::thread::Builder::new()
            .name("rodio-events".to_string())
            .spawn(move || {
                emit(&subscribers, PlayerEvent::PlayingStarted);
                emit(&subscribers, PlayerEvent::LengthChanged);

                loop {
                    match stop_rx.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }

                    let (finished, position) = {
                        let state = safe_lock(&state, "RodioPlayer");
                        match state.sink.as_ref() {
                            Some(sink) => (sink.empty(), state.position()),
                            None => break,
                        }
                    };

                    if finished {
                        log::debug!("[RodioPlayer] Sink drained");
                        emit(&subscribers, PlayerEvent::EndReached);
                        break;
                    }
                    if quiet {
                        log::trace!("[RodioPlayer] Tick at {:?}", position);
                    } else {
                        log::debug!("[RodioPlayer] Tick at {:?}", position);
                    }
                    emit(&subscribers, PlayerEvent::TimeChanged);
                }
            })
            .map_err(|e| EngineError::Other(format!("Failed to spawn event thread: {}", e)))?;

        *safe_lock(&self.poller, "RodioPlayer") = Some(Poller { stop_tx, thread });
        Ok(())
    }

    fn stop_poller(&self) {
        let poller = safe_lock(&self.poller, "RodioPlayer").take();
        if let Some(poller) = poller {
            let _ = poller.stop_tx.send(());
            if poller.thread.join().is_err() {
                log::warn!("[RodioPlayer] Event thread panicked");
            }
        }
    }
}

fn load_error(path: &Path, reason: impl ToString) -> EngineError {
    EngineError::Load {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn open_decoder(path: &Path) -> EngineResult<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| load_error(path, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| load_error(path, e))
}

/// Total length of the file at `path`
fn probe_length(path: &Path) -> EngineResult<Duration> {
    let decoder = open_decoder(path)?;
    if let Some(total) = decoder.total_duration() {
        return Ok(total);
    }

    // Not every format reports a length up front; count decoded samples instead.
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples = decoder.count() as u64;
    Ok(length_from_samples(samples, channels, sample_rate))
}

fn length_from_samples(samples: u64, channels: u16, sample_rate: u32) -> Duration {
    let frames = samples / u64::from(channels.max(1));
    Duration::from_secs_f64(frames as f64 / f64::from(sample_rate.max(1)))
}

fn check_fraction(fraction: f64) -> EngineResult<()> {
    if (0.0..1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(EngineError::Seek(format!("Fraction {} outside [0, 1)", fraction)))
    }
}

impl MediaPlayer for RodioPlayer {
    type Media = RodioMedia;

    fn load_media(&self, path: &Path) -> EngineResult<RodioMedia> {
        let length = probe_length(path)?;
        log::info!("[RodioPlayer] Loaded {:?} ({:?})", path, length);

        self.stop_poller();
        let mut state = safe_lock(&self.state, "RodioPlayer");
        if let Some(sink) = state.sink.take() {
            sink.stop();
        }
        let id = state.load(path, length);

        Ok(RodioMedia {
            id,
            path: path.to_path_buf(),
            state: Arc::downgrade(&self.state),
        })
    }

    fn play(&self) -> EngineResult<()> {
        {
            let mut state = safe_lock(&self.state, "RodioPlayer");
            let path = state
                .media
                .as_ref()
                .map(|media| media.path.clone())
                .ok_or(EngineError::NoMedia)?;
            let decoder = open_decoder(&path)?;

            if let Some(old) = state.sink.take() {
                old.stop();
            }
            let sink =
                Sink::try_new(&self.handle).map_err(|e| EngineError::Output(e.to_string()))?;
            sink.set_volume(self.volume);
            sink.append(decoder);
            sink.play();

            state.sink = Some(sink);
            state.start_time = Instant::now();
            state.start_position = Duration::ZERO;
            log::debug!("[RodioPlayer] Playing {:?}", path);
        }
        self.start_poller()
    }

    fn stop(&self) -> EngineResult<()> {
        self.stop_poller();
        if let Some(sink) = safe_lock(&self.state, "RodioPlayer").sink.take() {
            log::debug!("[RodioPlayer] Stopping playback");
            sink.stop();
        }
        Ok(())
    }

    fn is_fullscreen(&self) -> EngineResult<bool> {
        Ok(self.fullscreen.load(Ordering::Acquire))
    }

    fn set_fullscreen(&self, fullscreen: bool) -> EngineResult<()> {
        log::debug!("[RodioPlayer] Fullscreen -> {}", fullscreen);
        self.fullscreen.store(fullscreen, Ordering::Release);
        Ok(())
    }

    fn media_length(&self) -> EngineResult<Duration> {
        let state = safe_lock(&self.state, "RodioPlayer");
        if state.sink.is_none() {
            return Err(EngineError::NotPlaying);
        }
        state
            .media
            .as_ref()
            .map(|media| media.length)
            .ok_or(EngineError::NoMedia)
    }

    fn media_time(&self) -> EngineResult<Duration> {
        let state = safe_lock(&self.state, "RodioPlayer");
        if state.sink.is_none() {
            return Err(EngineError::NotPlaying);
        }
        Ok(state.position())
    }

    fn is_seekable(&self) -> bool {
        safe_lock(&self.state, "RodioPlayer").media.is_some()
    }

    fn set_media_position(&self, fraction: f64) -> EngineResult<()> {
        check_fraction(fraction)?;

        let mut state = safe_lock(&self.state, "RodioPlayer");
        let length = state
            .media
            .as_ref()
            .map(|media| media.length)
            .ok_or(EngineError::NoMedia)?;
        let position = length.mul_f64(fraction);

        let sink = state.sink.as_ref().ok_or(EngineError::NotPlaying)?;
        sink.try_seek(position)
            .map_err(|e| EngineError::Seek(e.to_string()))?;

        state.start_position = position;
        state.start_time = Instant::now();
        log::debug!("[RodioPlayer] Seeked to {:?}", position);
        Ok(())
    }

    fn attach(&self, event: PlayerEvent, handler: EventHandler) -> EngineResult<SubscriptionId> {
        let mut subscribers = safe_lock(&self.subscribers, "RodioPlayer");
        subscribers.next_id += 1;
        let id = SubscriptionId(subscribers.next_id);
        subscribers.handlers.insert(id, (event, handler));
        Ok(id)
    }

    fn detach(&self, ids: &[SubscriptionId]) {
        let mut subscribers = safe_lock(&self.subscribers, "RodioPlayer");
        for id in ids {
            subscribers.handlers.remove(id);
        }
    }

    fn release(self) -> EngineResult<()> {
        self.stop_poller();
        let state = safe_lock(&self.state, "RodioPlayer");
        if let Some(sink) = state.sink.as_ref() {
            sink.stop();
        }
        state.ensure_unloaded()
    }
}

impl Drop for RodioPlayer {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

pub struct RodioMedia {
    id: u64,
    path: PathBuf,
    state: Weak<Mutex<PlayerState>>,
}

impl MediaHandle for RodioMedia {
    fn release(self) -> EngineResult<()> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| EngineError::Release("Player already released".to_string()))?;
        let mut state = safe_lock(&state, "RodioMedia");
        state.unload(self.id, &self.path)
    }
}
