//! Point lookups against the stores with bounded staleness.

use std::sync::Arc;

use corelib::{Interval, PairId, Tick, TokenDay, TokenId};
use tracing::trace;

use crate::error::{EntityKind, MarketError};
use crate::{PairStore, TokenStore};

/// How many buckets back a pair lookup may walk when the requested bucket is empty.
pub const MAX_STALE_BUCKETS: i64 = 10;

/// How many trailing daily records `token_info` inspects.
pub const TOKEN_INFO_LOOKBACK: i64 = 10;

/// Lookup time: the newest stored bucket, or the bucket containing an epoch second.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum At {
    Latest,
    Time(i64),
}

/// Interval pair rates are read at; token records are read at `T1d`.
const PAIR_INTERVAL: Interval = Interval::T1h;

#[derive(Clone)]
pub struct RateResolver {
    pairs: Arc<PairStore>,
    tokens: Arc<TokenStore>,
}

impl RateResolver {
    pub fn new(pairs: Arc<PairStore>, tokens: Arc<TokenStore>) -> Self {
        Self { pairs, tokens }
    }

    /// Most recent tick at or before `at`, walking back at most
    /// `MAX_STALE_BUCKETS` buckets. `Ok(None)` when all of them are empty.
    pub fn rate_at(&self, pair: PairId, at: At) -> Result<Option<Tick>, MarketError> {
        let interval = PAIR_INTERVAL;
        self.pairs
            .with_series(interval, pair, |s| {
                let idx = match at {
                    At::Latest => s.last_index(),
                    At::Time(t) => s.index_of(interval, t),
                };
                let found = (0..=MAX_STALE_BUCKETS).find_map(|back| s.get(idx - back).copied());
                if found.is_none() {
                    trace!(pair, idx, "no tick inside staleness window");
                }
                found
            })
            .ok_or_else(|| MarketError::pair_not_found(pair))
    }

    /// Newest daily record among the last `TOKEN_INFO_LOOKBACK` buckets.
    pub fn token_info(&self, token: TokenId) -> Result<TokenDay, MarketError> {
        self.tokens
            .with_series(Interval::T1d, token, |s| {
                let last = s.len() as i64;
                (1..=TOKEN_INFO_LOOKBACK).find_map(|back| s.get(last - back).cloned())
            })
            .ok_or_else(|| MarketError::token_not_found(token))?
            .ok_or(MarketError::NoDataAvailable {
                kind: EntityKind::Token,
                id: token,
            })
    }

    /// Daily record for exactly the bucket at `at` (no walk-back).
    pub fn token_day(&self, token: TokenId, at: At) -> Result<Option<TokenDay>, MarketError> {
        self.tokens
            .with_series(Interval::T1d, token, |s| {
                let idx = match at {
                    At::Latest => s.last_index(),
                    At::Time(t) => s.index_of(Interval::T1d, t),
                };
                s.get(idx).cloned()
            })
            .ok_or_else(|| MarketError::token_not_found(token))
    }
}
