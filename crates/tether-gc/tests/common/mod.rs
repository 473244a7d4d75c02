//! Shared test harness.
//!
//! The collector is a process-wide singleton, so tests within one binary
//! take turns: every test holds the serial lock for its whole body, either
//! through a [`Session`] (which also drives `init`/`terminate`) or directly
//! via [`serial`] when the test manages the lifecycle itself.

#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, PoisonError};

static SERIAL: Mutex<()> = Mutex::new(());

/// Holds the serial lock without touching the collector lifecycle.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An initialized collector, terminated (finalizers on) when dropped.
pub struct Session {
    _guard: MutexGuard<'static, ()>,
    terminate: bool,
}

pub fn session() -> Session {
    let guard = serial();
    tether_gc::init();
    Session {
        _guard: guard,
        terminate: true,
    }
}

impl Session {
    /// Ends the session explicitly, choosing finalizer behavior.
    pub fn end(mut self, run_finalizers: bool) {
        self.terminate = false;
        tether_gc::terminate(run_finalizers);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.terminate && !std::thread::panicking() {
            tether_gc::terminate(true);
        }
    }
}
