//! Query facade over the stores, aggregator and list cache.

use std::sync::Arc;
use std::time::Duration;

use common::logger::{TraceId, annotate_token, root_span, warn_if_slow};
use common::time::Clock;
use corelib::{Catalog, IngestBatch, Tick, TokenDay, TokenId};
use market::{PairStore, TokenStore};
use tracing::{info, warn};

use crate::aggregator::TokenAggregator;
use crate::cache::SnapshotCache;
use crate::config::{AggregatorSettings, AppConfig};
use crate::error::AggregatorError;
use crate::snapshot::{HistoricalSeries, RefreshPlan, TokenSnapshot};

/// List computations slower than this are reported on the `performance` target.
const SLOW_LIST: Duration = Duration::from_millis(250);

pub struct TokenService<C: Clock + Clone> {
    pairs: Arc<PairStore>,
    tokens: Arc<TokenStore>,
    aggregator: TokenAggregator<C>,
    list_cache: SnapshotCache<Vec<TokenSnapshot>, C>,
}

impl<C: Clock + Clone> TokenService<C> {
    pub fn new(catalog: Catalog, settings: AggregatorSettings, ttl_ms: u64, clock: C) -> Self {
        let pairs = Arc::new(PairStore::new());
        let tokens = Arc::new(TokenStore::new());
        let aggregator = TokenAggregator::new(
            Arc::new(catalog),
            pairs.clone(),
            tokens.clone(),
            settings,
            clock.clone(),
        );

        Self {
            pairs,
            tokens,
            aggregator,
            list_cache: SnapshotCache::new(ttl_ms, clock),
        }
    }

    /// Build from environment configuration; `BASE_CURRENCY` overrides the
    /// catalog's default base.
    pub fn from_config(mut catalog: Catalog, cfg: &AppConfig, clock: C) -> Self {
        if let Some(base) = cfg.base_currency {
            catalog.base_currency = base;
        }
        info!(
            pairs = catalog.pairs.len(),
            tokens = catalog.tokens.len(),
            base = catalog.base_currency,
            "token service configured"
        );
        Self::new(catalog, cfg.aggregator.clone(), cfg.cache_ttl_ms, clock)
    }

    pub fn catalog(&self) -> &Catalog {
        self.aggregator.catalog()
    }

    pub fn default_base(&self) -> TokenId {
        self.catalog().base_currency
    }

    pub fn aggregator(&self) -> &TokenAggregator<C> {
        &self.aggregator
    }

    /// Merge an hourly (or other interval) pair batch; returns the number of merged series.
    pub fn ingest_ticks(&self, batch: IngestBatch<Tick>) -> Result<usize, AggregatorError> {
        Ok(self.pairs.ingest(batch)?)
    }

    pub fn ingest_token_days(&self, batch: IngestBatch<TokenDay>) -> Result<usize, AggregatorError> {
        Ok(self.tokens.ingest(batch)?)
    }

    fn resolve_symbol(&self, symbol: &str) -> Result<TokenId, AggregatorError> {
        self.catalog()
            .token_by_symbol(symbol)
            .map(|(id, _)| id)
            .ok_or_else(|| AggregatorError::SymbolNotFound(symbol.to_string()))
    }

    pub fn get_snapshot(&self, symbol: &str, base: TokenId) -> Result<TokenSnapshot, AggregatorError> {
        let span = root_span("get_snapshot", &TraceId::default());
        let _g = span.enter();

        let token = self.resolve_symbol(symbol)?;
        annotate_token(token, base);
        self.aggregator.snapshot(token, base)
    }

    /// Chart data for `symbol`; failures are logged and reported as `None`.
    pub fn get_historical_series(
        &self,
        symbol: &str,
        period_hours: i64,
        base: TokenId,
    ) -> Option<HistoricalSeries> {
        let span = root_span("get_historical_series", &TraceId::default());
        let _g = span.enter();

        let res = self.resolve_symbol(symbol).and_then(|token| {
            annotate_token(token, base);
            self.aggregator.historical_series(token, base, period_hours)
        });

        match res {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(symbol, period_hours, error = %e, "historical series unavailable");
                None
            }
        }
    }

    /// Every listed token's snapshot, served from the short-lived cache.
    pub fn list_snapshots(&self, base: TokenId) -> Result<Arc<Vec<TokenSnapshot>>, AggregatorError> {
        let span = root_span("list_snapshots", &TraceId::default());
        let _g = span.enter();

        self.list_cache.get_or_try_compute(base, || {
            warn_if_slow("list_snapshots", SLOW_LIST, || self.aggregator.list(base))
        })
    }

    pub fn refresh_plan(&self, symbol: &str, base: TokenId) -> Result<RefreshPlan, AggregatorError> {
        let token = self.resolve_symbol(symbol)?;
        self.aggregator.refresh_plan(token, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::time::ManualClock;
    use corelib::{Interval, PairConfig, TokenConfig};
    use tracing_test::traced_test;

    const H: i64 = 3_600;
    const NOW_MS: u64 = 1_000 * H as u64 * 1_000;

    fn service() -> (TokenService<ManualClock>, ManualClock) {
        let catalog = Catalog::new(
            vec![PairConfig::new(0, 1)],
            vec![
                TokenConfig::new("AAA", "Alpha", 8),
                TokenConfig::new("BBB", "Beta", 8),
            ],
            1,
        );
        let clock = ManualClock::new(NOW_MS);
        let svc = TokenService::new(catalog, AggregatorSettings::default(), 2_000, clock.clone());
        (svc, clock)
    }

    fn batch(price: f64) -> IngestBatch<Tick> {
        let end = (NOW_MS / 1_000) as i64;
        IngestBatch {
            interval: Interval::T1h,
            start: end - H,
            end,
            ids: vec![0],
            data: vec![vec![Some(Tick::new(price, 0.0, 0.0, 0.0))]; 2],
        }
    }

    #[test]
    fn unknown_symbol_is_reported() {
        let (svc, _) = service();
        assert_eq!(
            svc.get_snapshot("ZZZ", 1).unwrap_err(),
            AggregatorError::SymbolNotFound("ZZZ".into())
        );
    }

    #[test]
    fn snapshot_by_symbol() {
        let (svc, _) = service();
        svc.ingest_ticks(batch(4.0)).unwrap();
        let snap = svc.get_snapshot("AAA", 1).unwrap();
        assert_eq!(snap.id, 0);
        assert_eq!(snap.price, Some(4.0));
    }

    #[test]
    #[traced_test]
    fn failed_history_is_logged_and_none() {
        let (svc, _) = service();
        assert!(svc.get_historical_series("AAA", 24, 1).is_none());
        assert!(logs_contain("historical series unavailable"));
    }

    #[test]
    fn list_is_cached_until_ttl() {
        let (svc, clock) = service();
        svc.ingest_ticks(batch(4.0)).unwrap();
        let first = svc.list_snapshots(1).unwrap();

        svc.ingest_ticks(batch(5.0)).unwrap();
        let cached = svc.list_snapshots(1).unwrap();
        assert!(Arc::ptr_eq(&first, &cached));

        clock.advance_ms(2_000);
        let fresh = svc.list_snapshots(1).unwrap();
        assert_eq!(fresh.iter().find(|s| s.id == 0).and_then(|s| s.price), Some(5.0));
    }
}
