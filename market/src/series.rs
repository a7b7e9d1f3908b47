//! Sparse per-entity time series.
//!
//! Each `(interval, entity)` key owns a `TickSeries`: a start epoch, an end
//! epoch and a bucket-indexed array where missing buckets are `None`.
//! Incoming batches either overwrite the series (when they start earlier than
//! what is stored) or are written at their bucket offset, growing `end`.

use std::collections::HashMap;
use std::sync::Arc;

use common::time::last_started_tick;
use corelib::{EntityId, IngestBatch, Interval};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::MarketError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSeries<T> {
    /// Epoch seconds of bucket 0.
    pub start: i64,
    /// Epoch seconds of the last covered bucket.
    pub end: i64,
    pub data: Vec<Option<T>>,
}

impl<T> TickSeries<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cell at a signed bucket index; negative or out-of-range indices are absent.
    pub fn get(&self, idx: i64) -> Option<&T> {
        if idx < 0 {
            return None;
        }
        self.data.get(idx as usize).and_then(Option::as_ref)
    }

    /// Bucket index containing `ts` (floored, may be negative).
    pub fn index_of(&self, interval: Interval, ts: i64) -> i64 {
        (ts - self.start).div_euclid(interval.secs())
    }

    pub fn last_index(&self) -> i64 {
        self.data.len() as i64 - 1
    }

    /// Number of buckets spanned by `[start, end]`.
    fn span(&self, interval: Interval) -> usize {
        ((self.end - self.start) / interval.secs() + 1).max(0) as usize
    }
}

/// What a merge did to the stored series.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MergeOutcome {
    Created,
    Overwritten,
    Appended { offset: usize },
}

type SeriesKey = (Interval, EntityId);

/// Owner of every stored series.
///
/// Merges on one key are serialized by that series' lock; different keys
/// merge in parallel. Readers see whole buckets, never a torn cell.
pub struct TickSeriesStore<T> {
    series: RwLock<HashMap<SeriesKey, Arc<RwLock<TickSeries<T>>>>>,
}

impl<T> Default for TickSeriesStore<T> {
    fn default() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone> TickSeriesStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one entity's column of a batch into its stored series.
    #[instrument(skip(self, cells), target = "series", fields(buckets = cells.len()))]
    pub fn merge(
        &self,
        interval: Interval,
        entity: EntityId,
        batch_start: i64,
        batch_end: i64,
        cells: Vec<Option<T>>,
    ) -> Result<MergeOutcome, MarketError> {
        validate_range(interval, batch_start, batch_end, cells.len())?;

        let existing = {
            let mut map = self.series.write();
            match map.get(&(interval, entity)) {
                Some(s) => Arc::clone(s),
                None => {
                    let mut fresh = TickSeries {
                        start: batch_start,
                        end: batch_end,
                        data: cells,
                    };
                    pad_to_span(&mut fresh, interval);
                    map.insert((interval, entity), Arc::new(RwLock::new(fresh)));
                    debug!(start = batch_start, end = batch_end, "series created");
                    return Ok(MergeOutcome::Created);
                }
            }
        };

        let mut series = existing.write();
        let outcome = merge_into(&mut series, interval, batch_start, batch_end, cells)?;
        debug!(
            ?outcome,
            start = series.start,
            end = series.end,
            len = series.len(),
            "series merged"
        );
        Ok(outcome)
    }

    /// Split a `[time][entity]` batch into columns and merge each one.
    ///
    /// Returns the number of entities merged. Ragged rows, an invalid range
    /// and a start off any column's bucket grid reject the whole batch before
    /// anything is written.
    #[instrument(skip(self, batch), target = "series", fields(interval = %batch.interval, start = batch.start, end = batch.end))]
    pub fn ingest(&self, batch: IngestBatch<T>) -> Result<usize, MarketError> {
        let width = batch.width();
        if width == 0 {
            debug!("empty batch ignored");
            return Ok(0);
        }
        if let Some(row) = batch.data.iter().position(|r| r.len() != width) {
            return Err(MarketError::malformed(
                batch.interval,
                format!("row {row} has {} cells, expected {width}", batch.data[row].len()),
            ));
        }
        if !batch.ids.is_empty() && batch.ids.len() != width {
            return Err(MarketError::malformed(
                batch.interval,
                format!("{} ids for {width} entity columns", batch.ids.len()),
            ));
        }

        validate_range(batch.interval, batch.start, batch.end, batch.data.len())?;
        for col in 0..width {
            let entity = batch.entity_at(col);
            self.with_series(batch.interval, entity, |s| {
                check_alignment(s.start, batch.start, batch.interval)
            })
            .transpose()?;
        }

        for col in 0..width {
            let cells: Vec<Option<T>> = batch.data.iter().map(|row| row[col].clone()).collect();
            self.merge(
                batch.interval,
                batch.entity_at(col),
                batch.start,
                batch.end,
                cells,
            )?;
        }

        info!(entities = width, buckets = batch.data.len(), "batch ingested");
        Ok(width)
    }

    /// Cloned snapshot of a series.
    pub fn read(&self, interval: Interval, entity: EntityId) -> Option<TickSeries<T>> {
        self.with_series(interval, entity, Clone::clone)
    }

    /// Run `f` against a series under its read lock.
    pub fn with_series<R>(
        &self,
        interval: Interval,
        entity: EntityId,
        f: impl FnOnce(&TickSeries<T>) -> R,
    ) -> Option<R> {
        let series = self.series.read().get(&(interval, entity)).cloned()?;
        let guard = series.read();
        Some(f(&guard))
    }
}

fn validate_range(
    interval: Interval,
    batch_start: i64,
    batch_end: i64,
    buckets: usize,
) -> Result<(), MarketError> {
    if batch_end < batch_start {
        return Err(MarketError::malformed(
            interval,
            format!("end {batch_end} precedes start {batch_start}"),
        ));
    }
    let span = (batch_end - batch_start) / interval.secs() + 1;
    if buckets as i64 > span {
        return Err(MarketError::malformed(
            interval,
            format!("{buckets} buckets do not fit in [{batch_start}, {batch_end}]"),
        ));
    }
    Ok(())
}

fn merge_into<T>(
    series: &mut TickSeries<T>,
    interval: Interval,
    batch_start: i64,
    batch_end: i64,
    cells: Vec<Option<T>>,
) -> Result<MergeOutcome, MarketError> {
    if batch_start < series.start {
        series.start = batch_start;
        series.end = batch_end;
        series.data = cells;
        pad_to_span(series, interval);
        return Ok(MergeOutcome::Overwritten);
    }

    check_alignment(series.start, batch_start, interval)?;
    let offset = ((batch_start - series.start) / interval.secs()) as usize;

    let needed = offset + cells.len();
    if series.data.len() < needed {
        series.data.resize_with(needed, || None);
    }
    for (i, cell) in cells.into_iter().enumerate() {
        series.data[offset + i] = cell;
    }

    series.end = series.end.max(batch_end);
    pad_to_span(series, interval);
    Ok(MergeOutcome::Appended { offset })
}

/// A batch starting at or after `series_start` must land on its bucket grid.
fn check_alignment(series_start: i64, batch_start: i64, interval: Interval) -> Result<(), MarketError> {
    if batch_start >= series_start && (batch_start - series_start) % interval.secs() != 0 {
        return Err(MarketError::malformed(
            interval,
            format!("start {batch_start} is not on a bucket boundary of series starting at {series_start}"),
        ));
    }
    Ok(())
}

/// Keep `data.len()` consistent with `[start, end]`.
fn pad_to_span<T>(series: &mut TickSeries<T>, interval: Interval) {
    let span = series.span(interval);
    if series.data.len() < span {
        series.data.resize_with(span, || None);
    }
}

/// `(from, to)` window of the last `back` buckets ending at the bucket that
/// contains `now`; what an ingestion client requests from upstream.
pub fn fetch_window(interval: Interval, back: i64, now: i64) -> (i64, i64) {
    let to = last_started_tick(interval.secs(), now);
    (to - interval.secs() * back, to)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const H: i64 = 3_600;

    fn batch_strategy() -> impl Strategy<Value = (i64, Vec<Option<u32>>)> {
        (0..48i64, prop::collection::vec(prop::option::of(0..1_000u32), 1..24))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]
        #[test]
        fn merge_invariants(
            batches in prop::collection::vec(batch_strategy(), 1..8),
        ) {
            let store = TickSeriesStore::<u32>::new();
            let mut prev: Option<TickSeries<u32>> = None;

            for (start_bucket, cells) in batches {
                let start = start_bucket * H;
                let end = start + (cells.len() as i64 - 1) * H;

                store.merge(Interval::T1h, 0, start, end, cells.clone()).unwrap();
                let once = store.read(Interval::T1h, 0).unwrap();

                // --- re-applying the same batch changes nothing ---
                store.merge(Interval::T1h, 0, start, end, cells.clone()).unwrap();
                let twice = store.read(Interval::T1h, 0).unwrap();
                prop_assert_eq!(&once, &twice);

                // --- length matches the covered range ---
                prop_assert_eq!(once.len() as i64, (once.end - once.start) / H + 1);

                match prev {
                    Some(p) if start < p.start => {
                        // --- earlier batch: wholesale replacement ---
                        prop_assert_eq!(once.start, start);
                        prop_assert_eq!(once.end, end);
                        prop_assert_eq!(&once.data, &cells);
                    }
                    Some(p) => {
                        // --- append: start kept, end never retreats, low buckets kept ---
                        prop_assert_eq!(once.start, p.start);
                        prop_assert!(once.end >= p.end);
                        let offset = ((start - p.start) / H) as usize;
                        for i in 0..offset.min(p.data.len()) {
                            prop_assert_eq!(&once.data[i], &p.data[i]);
                        }
                        for (i, c) in cells.iter().enumerate() {
                            prop_assert_eq!(&once.data[offset + i], c);
                        }
                    }
                    None => prop_assert_eq!(&once.data, &cells),
                }
                prev = Some(once);
            }
        }
    }
}
