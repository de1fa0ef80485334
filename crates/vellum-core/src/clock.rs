//! Millisecond wall-clock abstraction.
//!
//! Every timer in the engine (debounce, heartbeat, lease liveness, freshness
//! windows) reads time through [`Clock`] so that scheduling behavior is
//! deterministic under test. Production code uses [`SystemClock`]; tests use
//! [`ManualClock`] and advance it explicitly.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of wall time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current wall time in milliseconds.
    fn now_ms(&self) -> i64;
}

/// Real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock starting at `start_ms`.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Move the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Pin the clock to an absolute time.
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
