//! Combines route quotes, token configuration and daily supply records into
//! token snapshots.

use std::cmp::Ordering;
use std::sync::Arc;

use common::logger::{annotate_token, child_span};
use common::time::{Clock, DAY_SECS, HOUR_SECS, last_started_tick};
use corelib::{Catalog, Interval, TokenConfig, TokenDay, TokenId};
use market::{
    At, PairGraph, PairStore, PathEvaluator, PathQuote, RateResolver, Route, SeriesPoint,
    TokenStore, blend, fetch_window, unique_pairs,
};
use tracing::{debug, instrument, warn};

use crate::config::AggregatorSettings;
use crate::error::{AggregatorError, optional};
use crate::snapshot::{ChartPoint, RefreshPlan, RouteQuote, TokenSnapshot, TreasuryEntry};
use crate::supply::{SupplyFigures, derive_supply, parse_amount, to_float, units_with_cents};

/// Nesting limit for price conversions started from treasury valuation.
pub const MAX_PRICE_DEPTH: usize = 2;

pub struct TokenAggregator<C: Clock> {
    catalog: Arc<Catalog>,
    graph: PairGraph,
    evaluator: PathEvaluator,
    settings: AggregatorSettings,
    clock: C,
}

impl<C: Clock> TokenAggregator<C> {
    pub fn new(
        catalog: Arc<Catalog>,
        pairs: Arc<PairStore>,
        tokens: Arc<TokenStore>,
        settings: AggregatorSettings,
        clock: C,
    ) -> Self {
        let graph = PairGraph::from_pairs(&catalog.pairs);
        let evaluator = PathEvaluator::new(RateResolver::new(pairs, tokens));
        Self {
            catalog,
            graph,
            evaluator,
            settings,
            clock,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn evaluator(&self) -> &PathEvaluator {
        &self.evaluator
    }

    pub(crate) fn resolver(&self) -> &RateResolver {
        self.evaluator.resolver()
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    pub(crate) fn token_config(&self, id: TokenId) -> Result<&TokenConfig, AggregatorError> {
        self.catalog.token(id).ok_or(AggregatorError::TokenNotFound(id))
    }

    /// Routes used for a listed token (bounded by `max_hops`).
    pub fn routes(&self, token: TokenId, base: TokenId) -> Vec<Route> {
        self.graph.find_paths(token, base, self.settings.max_hops)
    }

    /// Route-averaged latest price of `from` in units of `to`.
    pub fn price_between(&self, from: TokenId, to: TokenId) -> Result<Option<f64>, AggregatorError> {
        self.resolve_price(from, to, 0)
    }

    pub(crate) fn resolve_price(
        &self,
        from: TokenId,
        to: TokenId,
        depth: usize,
    ) -> Result<Option<f64>, AggregatorError> {
        if depth > MAX_PRICE_DEPTH {
            return Err(AggregatorError::ComputationFailure(format!(
                "price conversion {from}->{to} nested deeper than {MAX_PRICE_DEPTH}"
            )));
        }
        let routes = self.graph.find_paths(from, to, self.settings.price_max_hops);
        let quotes = self.latest_quotes(&routes)?;
        Ok(blend(quotes).map(|q| q.price))
    }

    fn latest_quotes(&self, routes: &[Route]) -> Result<Vec<Option<PathQuote>>, AggregatorError> {
        routes
            .iter()
            .map(|r| self.evaluator.price_at(r, At::Latest).map_err(Into::into))
            .collect()
    }

    pub(crate) fn route_series(
        &self,
        routes: &[Route],
        from: i64,
        to: i64,
    ) -> Result<Vec<Vec<SeriesPoint>>, AggregatorError> {
        routes
            .iter()
            .map(|r| {
                self.evaluator
                    .series_over(r, Interval::T1h, from, to)
                    .map_err(Into::into)
            })
            .collect()
    }

    /// Start of the current hourly bucket.
    pub(crate) fn last_hour(&self) -> i64 {
        last_started_tick(HOUR_SECS, self.clock.now_secs())
    }

    #[instrument(skip(self), target = "aggregator")]
    pub fn snapshot(&self, token: TokenId, base: TokenId) -> Result<TokenSnapshot, AggregatorError> {
        let cfg = self.token_config(token)?;
        self.token_config(base)?;

        let routes = self.routes(token, base);
        if routes.is_empty() {
            return Err(AggregatorError::NoRoute { token, base });
        }

        let tlast = self.last_hour();
        let tstart = tlast - self.settings.chart_days * DAY_SECS;
        let series = self.route_series(&routes, tstart, tlast)?;
        let weekchart = blend_chart(&series);
        let price_24h_ago = weekchart
            .iter()
            .find(|p| p.t == tlast - DAY_SECS)
            .and_then(|p| p.price);

        let latest = self.latest_quotes(&routes)?;
        let combined = blend(latest.iter().copied());
        let price = combined.map(|q| q.price);

        let volume_price =
            optional(self.resolve_price(self.catalog.volume_token, base, 0))?;
        let volume24 = combined
            .zip(volume_price)
            .map(|(q, vp)| q.volume24h * vp);

        let day = match self.resolver().token_info(token) {
            Ok(day) => Some(day),
            Err(e) if e.is_missing_data() => {
                debug!(token, error = %e, "no supply record; supply figures unavailable");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let supply = day
            .as_ref()
            .map(|d| derive_supply(d, cfg, self.settings.fixed_lock(&cfg.symbol)))
            .transpose()?;

        let circulating = supply.as_ref().and_then(|s| to_float(&s.circulating));
        let marketcap = circulating.zip(price).map(|(c, p)| c * p);

        let treasury = match (&day, &supply) {
            (Some(d), Some(s)) => self.treasury_entries(token, base, d, s, price)?,
            _ => Vec::new(),
        };

        let change24 = percent_change(price, price_24h_ago);

        Ok(TokenSnapshot {
            id: token,
            symbol: cfg.symbol.clone(),
            name: cfg.name.clone(),
            locking: cfg.locking,
            price,
            total: supply.as_ref().and_then(|s| to_float(&s.total)),
            total_locked: supply.as_ref().and_then(|s| to_float(&s.total_locked)),
            circulating,
            real_circulating: supply.as_ref().and_then(|s| to_float(&s.real_circulating)),
            treasury,
            marketcap,
            volume24,
            change24,
            depth50_bid: combined.map(|q| q.depth_bid),
            depth50_ask: combined.map(|q| q.depth_ask),
            routes: routes
                .into_iter()
                .zip(latest)
                .map(|(route, quote)| RouteQuote { route, quote })
                .collect(),
            weekchart,
        })
    }

    /// Own treasury plus every other treasury holding valued in `base`.
    ///
    /// A holding in an unknown token or with an unreadable amount is logged
    /// and left out.
    fn treasury_entries(
        &self,
        token: TokenId,
        base: TokenId,
        day: &TokenDay,
        supply: &SupplyFigures,
        price: Option<f64>,
    ) -> Result<Vec<TreasuryEntry>, AggregatorError> {
        let Some(locking) = &day.locking else {
            return Ok(Vec::new());
        };

        let own = to_float(&supply.treasury).ok_or_else(|| {
            AggregatorError::ComputationFailure(format!("treasury {} exceeds f64", supply.treasury))
        })?;
        let mut out = vec![TreasuryEntry {
            token,
            amount: own,
            value: price.map(|p| own * p),
        }];

        for (held, raw) in &locking.other_treasuries {
            let amount = match self
                .token_config(*held)
                .and_then(|cfg| units_with_cents(&parse_amount(raw)?, cfg.decimals))
            {
                Ok(amount) => amount,
                Err(e) => {
                    warn!(token, held = *held, error = %e, "treasury holding skipped");
                    continue;
                }
            };
            let held_price = if *held == token {
                price
            } else {
                optional(self.resolve_price(*held, base, 1))?
            };
            out.push(TreasuryEntry {
                token: *held,
                amount,
                value: held_price.map(|p| amount * p),
            });
        }

        Ok(out)
    }

    /// Snapshots of every listed token, sorted by market cap (unavailable last).
    ///
    /// A token that fails is logged and left out; only an unknown base fails
    /// the whole list.
    #[instrument(skip(self), target = "aggregator")]
    pub fn list(&self, base: TokenId) -> Result<Vec<TokenSnapshot>, AggregatorError> {
        self.token_config(base)?;

        let mut out = Vec::new();
        for (idx, cfg) in self.catalog.tokens.iter().enumerate() {
            if cfg.hidden {
                continue;
            }
            let id = idx as TokenId;
            let _span = child_span("token_snapshot").entered();
            annotate_token(id, base);
            match self.snapshot(id, base) {
                Ok(s) => out.push(s),
                Err(AggregatorError::NoRoute { .. }) => {
                    debug!(token = id, symbol = %cfg.symbol, "no route to base; not listed");
                }
                Err(e) => {
                    warn!(token = id, symbol = %cfg.symbol, error = %e, "token snapshot unavailable");
                }
            }
        }

        out.sort_by(by_marketcap_desc);
        debug!(listed = out.len(), "token list computed");
        Ok(out)
    }

    /// Pairs and hourly window to request from upstream before showing `token`.
    pub fn refresh_plan(&self, token: TokenId, base: TokenId) -> Result<RefreshPlan, AggregatorError> {
        self.token_config(token)?;
        let routes = self.routes(token, base);
        let (from, to) = fetch_window(
            Interval::T1h,
            self.settings.refresh_back_hours,
            self.clock.now_secs(),
        );
        Ok(RefreshPlan {
            interval: Interval::T1h,
            ids: unique_pairs(&routes),
            from,
            to,
        })
    }
}

/// Per-bucket route-averaged price.
fn blend_chart(series: &[Vec<SeriesPoint>]) -> Vec<ChartPoint> {
    let Some(first) = series.first() else {
        return Vec::new();
    };
    first
        .iter()
        .enumerate()
        .map(|(i, p)| ChartPoint {
            t: p.t,
            price: blend(series.iter().map(|s| s.get(i).and_then(|pt| pt.quote))).map(|q| q.price),
        })
        .collect()
}

pub(crate) fn percent_change(now: Option<f64>, before: Option<f64>) -> Option<f64> {
    let (now, before) = (now?, before?);
    if before == 0.0 {
        warn!("zero baseline price; 24h change unavailable");
        return None;
    }
    Some((now - before) / before * 100.0)
}

fn by_marketcap_desc(a: &TokenSnapshot, b: &TokenSnapshot) -> Ordering {
    match (a.marketcap, b.marketcap) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::time::ManualClock;
    use corelib::{IngestBatch, PairConfig, Tick, TokenLocking};
    use tracing_test::traced_test;

    const TLAST: i64 = 1_000 * DAY_SECS;
    const USD: TokenId = 0;
    const ICP: TokenId = 1;
    const CHAT: TokenId = 2;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    fn catalog() -> Catalog {
        let mut hidden = TokenConfig::new("HID", "Hidden", 8);
        hidden.hidden = true;
        Catalog::new(
            vec![
                PairConfig::new(CHAT, ICP),
                PairConfig::new(ICP, USD),
                PairConfig::new(5, USD),
            ],
            vec![
                TokenConfig::new("USD", "Dollar", 8),
                TokenConfig::new("ICP", "Internet Computer", 8),
                TokenConfig::new("CHAT", "OpenChat", 8),
                TokenConfig::new("LONE", "No pairs", 8),
                hidden,
                TokenConfig::new("BRK", "No ticks", 8),
            ],
            USD,
        )
    }

    fn chat_day(total: &str, treasury: &str, locked: &str, others: &[(TokenId, &str)]) -> TokenDay {
        TokenDay {
            total_supply: total.into(),
            circulating_supply: None,
            locking: Some(TokenLocking {
                treasury: treasury.into(),
                total_locked: locked.into(),
                other_treasuries: others.iter().map(|(t, a)| (*t, a.to_string())).collect(),
                ..TokenLocking::default()
            }),
        }
    }

    fn fixture() -> TokenAggregator<ManualClock> {
        fixture_with(chat_day(
            "100000000000",
            "20000000000",
            "30000000000",
            &[(ICP, "123456789")],
        ))
    }

    /// Eight days of hourly ticks ending at `TLAST`; CHAT dips to 0.4 ICP
    /// exactly one day back. `chat` is CHAT's daily record at `TLAST`.
    fn fixture_with(chat: TokenDay) -> TokenAggregator<ManualClock> {
        let pairs = Arc::new(PairStore::new());
        let tokens = Arc::new(TokenStore::new());

        let start = TLAST - 8 * DAY_SECS;
        let dip = ((TLAST - DAY_SECS - start) / HOUR_SECS) as usize;
        let rows = (0..=8 * 24)
            .map(|i| {
                let chat = if i == dip { 0.4 } else { 0.5 };
                vec![
                    Some(Tick::new(chat, 100.0, 10.0, 5.0)),
                    Some(Tick::new(10.0, 1_000.0, 20.0, 8.0)),
                ]
            })
            .collect();
        pairs
            .ingest(IngestBatch {
                interval: Interval::T1h,
                start,
                end: TLAST,
                ids: vec![0, 1],
                data: rows,
            })
            .unwrap();

        tokens
            .ingest(IngestBatch {
                interval: Interval::T1d,
                start: TLAST,
                end: TLAST,
                ids: vec![CHAT],
                data: vec![vec![Some(chat)]],
            })
            .unwrap();

        let clock = ManualClock::new((TLAST as u64 + 1_800) * 1_000);
        TokenAggregator::new(
            Arc::new(catalog()),
            pairs,
            tokens,
            AggregatorSettings::default(),
            clock,
        )
    }

    #[test]
    fn snapshot_combines_routes_supply_and_treasury() {
        let agg = fixture();
        let s = agg.snapshot(CHAT, USD).unwrap();

        assert!(close(s.price, 5.0));
        assert!(close(s.change24, 25.0));
        assert!(close(s.volume24, 1_100.0));
        assert_eq!(s.depth50_bid, Some(30.0));
        assert_eq!(s.depth50_ask, Some(13.0));

        assert_eq!(s.total, Some(1_000.0));
        assert_eq!(s.circulating, Some(800.0));
        assert_eq!(s.real_circulating, Some(500.0));
        assert!(close(s.marketcap, 4_000.0));

        assert_eq!(s.treasury.len(), 2);
        assert_eq!(s.treasury[0].token, CHAT);
        assert!(close(s.treasury[0].value, 1_000.0));
        assert_eq!(s.treasury[1].token, ICP);
        assert_eq!(s.treasury[1].amount, 1.23);
        assert!(close(s.treasury[1].value, 12.3));

        assert_eq!(s.weekchart.len(), 7 * 24 + 1);
        assert_eq!(s.weekchart.last().map(|p| p.t), Some(TLAST));
    }

    #[test]
    #[traced_test]
    fn unreadable_treasury_holdings_are_skipped() {
        let agg = fixture_with(chat_day(
            "100000000000",
            "20000000000",
            "30000000000",
            &[(99, "1"), (ICP, "12x"), (ICP, "123456789")],
        ));
        let s = agg.snapshot(CHAT, USD).unwrap();

        let held: Vec<_> = s.treasury.iter().map(|t| (t.token, t.amount)).collect();
        assert_eq!(held, vec![(CHAT, 200.0), (ICP, 1.23)]);
        assert!(close(s.marketcap, 4_000.0));
        assert!(logs_contain("treasury holding skipped"));
    }

    #[test]
    fn supply_beyond_i128_does_not_overflow() {
        // 10^46 base units = 10^38 whole tokens at 8 decimals
        let huge = format!("1{}", "0".repeat(46));
        let agg = fixture_with(chat_day("0", &huge, &huge, &[]));
        let s = agg.snapshot(CHAT, USD).unwrap();

        assert_eq!(s.total, Some(0.0));
        assert_eq!(s.circulating, Some(-1e38));
        assert_eq!(s.real_circulating, Some(-2e38));
        assert_eq!(s.treasury[0].amount, 1e38);
        assert!(close(s.marketcap.map(|m| m / 1e38), -5.0));
    }

    #[test]
    fn snapshot_without_supply_record_keeps_price() {
        let agg = fixture();
        let s = agg.snapshot(ICP, USD).unwrap();
        assert_eq!(s.price, Some(10.0));
        assert_eq!(s.circulating, None);
        assert_eq!(s.marketcap, None);
        assert!(s.treasury.is_empty());
    }

    #[test]
    fn base_snapshot_is_identity() {
        let s = fixture().snapshot(USD, USD).unwrap();
        assert_eq!(s.price, Some(1.0));
        assert_eq!(s.routes.len(), 1);
        assert!(s.routes[0].route.is_identity());
    }

    #[test]
    fn unroutable_and_unknown_tokens() {
        let agg = fixture();
        assert_eq!(
            agg.snapshot(3, USD).unwrap_err(),
            AggregatorError::NoRoute { token: 3, base: USD }
        );
        assert_eq!(
            agg.snapshot(CHAT, 99).unwrap_err(),
            AggregatorError::TokenNotFound(99)
        );
    }

    #[test]
    #[traced_test]
    fn list_skips_failures_and_sorts_by_marketcap() {
        let agg = fixture();
        let list = agg.list(USD).unwrap();

        let ids: Vec<TokenId> = list.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![CHAT, USD, ICP]);
        assert!(logs_contain("token snapshot unavailable"));
    }

    #[test]
    fn price_recursion_is_capped() {
        let agg = fixture();
        assert!(close(agg.price_between(ICP, USD).unwrap(), 10.0));
        assert!(matches!(
            agg.resolve_price(ICP, USD, MAX_PRICE_DEPTH + 1),
            Err(AggregatorError::ComputationFailure(_))
        ));
    }

    #[test]
    fn refresh_plan_covers_route_pairs() {
        let plan = fixture().refresh_plan(CHAT, USD).unwrap();
        assert_eq!(plan.ids, vec![0, 1]);
        assert_eq!(plan.to, TLAST);
        assert_eq!(plan.from, TLAST - 24 * 31 * HOUR_SECS);
    }

    #[test]
    fn zero_baseline_has_no_change() {
        assert_eq!(percent_change(Some(2.0), Some(0.0)), None);
        assert_eq!(percent_change(None, Some(1.0)), None);
        assert_eq!(percent_change(Some(3.0), Some(2.0)), Some(50.0));
    }
}
