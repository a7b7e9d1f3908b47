use serde::{Deserialize, Serialize};

use super::{EntityId, Interval};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// One upstream delivery: `data[time][entity]`, aligned with `ids`.
///
/// When `ids` is empty the entity id is the column index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestBatch<T> {
    pub interval: Interval,
    pub start: i64,
    pub end: i64,

    #[serde(default)]
    pub ids: Vec<EntityId>,

    pub data: Vec<Vec<Option<T>>>,
}

impl<T> IngestBatch<T> {
    /// Entity id for column `col`.
    pub fn entity_at(&self, col: usize) -> EntityId {
        self.ids.get(col).copied().unwrap_or(col as EntityId)
    }

    /// Number of entity columns (taken from the first row).
    pub fn width(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }
}

/// Batch as returned by the aggregator canister: bounds in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch<T> {
    pub first: u64,
    pub last: u64,
    pub data: Vec<Vec<Option<T>>>,
}

impl<T> RawBatch<T> {
    pub fn into_batch(self, interval: Interval, ids: Vec<EntityId>) -> IngestBatch<T> {
        IngestBatch {
            interval,
            start: (self.first / NANOS_PER_SEC) as i64,
            end: (self.last / NANOS_PER_SEC) as i64,
            ids,
            data: self.data,
        }
    }
}
