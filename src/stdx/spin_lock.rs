//! Test-and-set spinlock.
//!
//! # Design
//!
//! A single `AtomicBool` flag, flipped free→held with a compare-exchange.
//! There is no waiter queue and no fairness guarantee: under contention a
//! thread can in principle be starved indefinitely. The critical sections
//! this lock guards are a handful of pointer/index updates on the shared
//! task list, so busy-waiting is cheaper than parking.
//!
//! # Ordering rationale
//!
//! ```text
//! Acquire on the winning CAS  →  reads inside the critical section see
//!                                everything the previous holder wrote
//! Release on unlock           →  writes inside the critical section are
//!                                visible to the next holder
//! ```
//!
//! The failing CAS uses `Relaxed`: a failed lock attempt publishes nothing
//! and synchronizes with nothing.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, Ordering};

/// Busy-wait mutual exclusion with a non-blocking acquire path.
///
/// `try_lock` reports success as a `bool` instead of blocking; `lock` is the
/// spin loop callers would otherwise write by hand. `unlock` is
/// unconditional — calling it without holding the lock releases someone
/// else's critical section, so don't.
pub struct SpinLock {
    held: AtomicBool,
}

impl SpinLock {
    pub fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Attempt to take the lock without waiting.
    ///
    /// Returns `true` when this call transitioned the lock free→held.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spin until the lock is acquired.
    #[inline]
    pub fn lock(&self) {
        while !self.try_lock() {
            backoff();
        }
    }

    /// Release the lock unconditionally.
    #[inline]
    pub fn unlock(&self) {
        self.held.store(false, Ordering::Release);
    }
}

impl Default for SpinLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SpinLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLock")
            .field("held", &self.held.load(Ordering::Relaxed))
            .finish()
    }
}

#[inline]
fn backoff() {
    #[cfg(not(loom))]
    core::hint::spin_loop();
    #[cfg(loom)]
    loom::thread::yield_now();
}
