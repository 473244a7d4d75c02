//! The global reader/writer lock guarding the object graph.
//!
//! A bespoke spin lock over a single 32-bit status word: bit 0 is
//! writer-held, bit 1 is writer-pending, and the upper 30 bits count
//! concurrent readers. Acquisition busy-waits for a bounded number of
//! iterations before falling back to an OS yield. Fairness is not a goal;
//! writer starvation under sustained reader load is possible and accepted,
//! because writes (collections included) are infrequent and deliberate.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

const WRITER_HELD: u32 = 0b01;
const WRITER_PENDING: u32 = 0b10;
const WRITER_BITS: u32 = WRITER_HELD | WRITER_PENDING;
/// One reader in the upper 30 bits of the status word.
const READER_ONE: u32 = 0b100;

/// Busy-wait iterations before yielding to the scheduler.
const SPIN_LIMIT: u32 = 100;

/// A reader/writer spin lock wrapping the value it protects.
pub(crate) struct RwSpinLock<T> {
    status: AtomicU32,
    value: UnsafeCell<T>,
}

// SAFETY: the status-word protocol gives readers shared access (`&T`) only
// while no writer holds the lock, and a writer exclusive access (`&mut T`)
// only while the reader count is zero. The usual RwLock bounds apply.
unsafe impl<T: Send> Send for RwSpinLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            status: AtomicU32::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Spins (bounded) and then yields until `cond` holds for the status word.
    fn wait_until(&self, cond: impl Fn(u32) -> bool) {
        for _ in 0..SPIN_LIMIT {
            if cond(self.status.load(Ordering::Acquire)) {
                return;
            }
            std::hint::spin_loop();
        }
        while !cond(self.status.load(Ordering::Acquire)) {
            std::thread::yield_now();
        }
    }

    /// Acquires the shared side of the lock.
    pub(crate) fn read(&self) -> ReadGuard<'_, T> {
        loop {
            self.wait_until(|status| status & WRITER_BITS == 0);
            let seen = self.status.load(Ordering::Relaxed);
            if seen & WRITER_BITS != 0 {
                continue;
            }
            if self
                .status
                .compare_exchange_weak(
                    seen,
                    seen + READER_ONE,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                return ReadGuard { lock: self };
            }
            std::hint::spin_loop();
        }
    }

    /// Acquires the exclusive side of the lock.
    pub(crate) fn write(&self) -> WriteGuard<'_, T> {
        loop {
            self.status.fetch_or(WRITER_PENDING, Ordering::AcqRel);
            self.wait_until(|status| status & !WRITER_BITS == 0);
            // Pending promotes to held only when no reader and no other
            // writer slipped in; otherwise re-arm and wait again.
            if self
                .status
                .compare_exchange(WRITER_PENDING, WRITER_HELD, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return WriteGuard { lock: self };
            }
            std::hint::spin_loop();
        }
    }

    fn read_unlock(&self) {
        let prev = self.status.fetch_sub(READER_ONE, Ordering::Release);
        assert!(prev >= READER_ONE, "read-unlock with no reader registered");
    }

    fn write_unlock(&self) {
        let prev = self.status.fetch_and(!WRITER_HELD, Ordering::Release);
        assert!(prev & WRITER_HELD != 0, "write-unlock of an unheld lock");
    }
}

/// Shared access to the locked value; unlocks on drop.
pub(crate) struct ReadGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the reader count in the status word excludes writers for
        // as long as this guard lives.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.read_unlock();
    }
}

/// Exclusive access to the locked value; unlocks on drop.
pub(crate) struct WriteGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the held bit excludes every other reader and writer.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above; exclusive access for the guard's lifetime.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.write_unlock();
    }
}
