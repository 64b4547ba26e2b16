use playfor::config;
use playfor::utils::formatting::format_duration;
use playfor::{ProgressCallback, RodioEngine, TimedPlayback};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_NAME: &str = "playfor";

fn main() {
    // RUST_LOG=debug for per-tick positions
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("symphonia_core", log::LevelFilter::Warn)
        .init();

    log::info!("[Main] Starting {} v{}", APP_NAME, APP_VERSION);

    let settings = match config::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("[Main] {}", e);
            std::process::exit(2);
        }
    };
    log::info!(
        "[Main] Source {:?}, {} per session, pause {}",
        settings.source,
        format_duration(settings.play_for),
        format_duration(settings.pause)
    );

    let engine = RodioEngine::new().with_tick(settings.tick);
    let mut player =
        TimedPlayback::new(engine).with_engine_options(settings.engine_options.clone());
    if let Some(seed) = settings.seed {
        player = player.with_seed(seed);
    }

    let mut session = 0u64;
    loop {
        if settings.sessions.is_some_and(|limit| session >= limit) {
            break;
        }
        log::info!("[Main] session #{}", session);

        let on_progress: ProgressCallback = Box::new(|remaining| {
            log::info!("[Main] callback, remaining: {}", format_duration(remaining));
        });
        if let Err(e) = player.play_for(&settings.source, settings.play_for, Some(on_progress)) {
            log::error!("[Main] Fatal: {}", e);
            std::process::exit(1);
        }

        session += 1;
        std::thread::sleep(settings.pause);
    }

    log::info!("[Main] Finished {} session(s)", session);
}
