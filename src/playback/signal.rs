//! Fire-once primitives shared between the session's threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use tokio::sync::Notify;

/// Terminal signal of a session.
///
/// Any number of threads may call `fire`; only the first value is kept and
/// every later call is a no-op. Blocking waiters use `wait`, async waiters
/// (the deadline watcher) use `fired`.
pub struct TerminalSignal<T> {
    value: Mutex<Option<T>>,
    cond: Condvar,
    notify: Notify,
}

impl<T: Clone> TerminalSignal<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            cond: Condvar::new(),
            notify: Notify::new(),
        }
    }

    /// Fire with `value`. Returns `true` only for the call that won.
    pub fn fire(&self, value: T) -> bool {
        {
            let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
        }
        self.cond.notify_all();
        self.notify.notify_waiters();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Block until fired and return the winning value
    pub fn wait(&self) -> T {
        let mut slot = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self.cond.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Resolves once the signal has fired
    pub async fn fired(&self) {
        // Registered before the check so a fire in between is not missed.
        let notified = self.notify.notified();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

impl<T: Clone> Default for TerminalSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-execution gate: `try_pass` returns `true` exactly once
#[derive(Debug, Default)]
pub struct OnceGate {
    passed: AtomicBool,
}

impl OnceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_pass(&self) -> bool {
        self.passed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn has_passed(&self) -> bool {
        self.passed.load(Ordering::Acquire)
    }
}
