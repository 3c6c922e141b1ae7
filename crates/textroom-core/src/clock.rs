//! Wall-clock abstraction and per-session write stamping.
//!
//! Writes are stamped with milliseconds since the Unix epoch. The store does
//! no ordering of its own, so [`WriteClock`] only promises that one session
//! never stamps a write older than anything it has already seen. Across
//! sessions the stamps are only as good as the clocks behind them.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of wall-clock time in milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A settable clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Per-session `lastUpdated` generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteClock {
    last: i64,
}

impl WriteClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `lastUpdated` read back from the store.
    pub fn observe(&mut self, last_updated: i64) {
        self.last = self.last.max(last_updated);
    }

    /// Stamp for the next write: `now`, unless that would go backwards.
    pub fn stamp(&mut self, now: i64) -> i64 {
        self.last = self.last.max(now);
        self.last
    }

    pub fn last(&self) -> i64 {
        self.last
    }
}
