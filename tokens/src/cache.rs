use std::sync::Arc;

use common::time::Clock;
use corelib::TokenId;
use parking_lot::Mutex;
use tracing::{debug, instrument};

pub const DEFAULT_TTL_MS: u64 = 2_000;

struct Entry<V> {
    timestamp_ms: u64,
    base: TokenId,
    data: Arc<V>,
}

/// Single-slot cache for a derived value keyed by base currency.
///
/// The stored value is reused while it is younger than `ttl_ms` and was
/// computed for the same base; anything else recomputes and replaces it.
/// Failed computations leave the previous entry untouched.
pub struct SnapshotCache<V, C: Clock> {
    ttl_ms: u64,
    clock: C,
    slot: Mutex<Option<Entry<V>>>,
}

impl<V, C: Clock> SnapshotCache<V, C> {
    pub fn new(ttl_ms: u64, clock: C) -> Self {
        Self {
            ttl_ms,
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Cached value for `base`, or the result of `compute` stored as the new entry.
    ///
    /// The lock is held while computing so concurrent callers wait for one
    /// computation instead of racing their own.
    #[instrument(skip(self, compute), target = "cache")]
    pub fn get_or_try_compute<E, F>(&self, base: TokenId, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut slot = self.slot.lock();
        let now = self.clock.now_ms();

        if let Some(entry) = slot.as_ref() {
            let age = now.saturating_sub(entry.timestamp_ms);
            if entry.base == base && age < self.ttl_ms {
                debug!(age_ms = age, "serving cached value");
                return Ok(entry.data.clone());
            }
        }

        let data = Arc::new(compute()?);
        *slot = Some(Entry {
            timestamp_ms: now,
            base,
            data: data.clone(),
        });
        debug!("cache entry replaced");
        Ok(data)
    }
}
