use std::sync::{Mutex, MutexGuard};
use tokio::runtime::Runtime;

/// Creates a single-threaded Tokio runtime for one session's timers
///
/// current_thread keeps a session at a fixed thread count; the deadline
/// watcher is the only task it ever runs.
pub fn create_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

/// Locks a mutex, recovering the inner value if a previous holder panicked
///
/// Player state guarded this way (sink, clocks, subscriber tables) stays
/// usable after a panicking event handler, which is what teardown needs.
pub fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("[{}] Mutex poisoned, recovering from panic", context);
            poisoned.into_inner()
        }
    }
}
