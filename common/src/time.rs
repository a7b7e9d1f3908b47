//! Clock abstraction and bucket arithmetic shared by the store and aggregator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const HOUR_SECS: i64 = 60 * 60;
pub const DAY_SECS: i64 = 24 * HOUR_SECS;

/// Source of wall-clock time. Injected so caches and "now"-relative
/// windows can be driven deterministically in tests.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;

    fn now_secs(&self) -> i64 {
        (self.now_ms() / 1000) as i64
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually advanced clock for tests.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, delta: u64) {
        self.ms.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

/// Start of the bucket of width `bucket_secs` that contains `ts`.
pub fn last_started_tick(bucket_secs: i64, ts: i64) -> i64 {
    ts.div_euclid(bucket_secs) * bucket_secs
}
