//! Turns a route into one composite quote.
//!
//! ```text
//! price  = Π rate(hop)        rate = tick.price, or 1 / tick.price for reverse hops
//! volume = Σ tick.volume24h
//! depth  = Σ tick.depth_bid / Σ tick.depth_ask
//! ```
//!
//! A hop without data makes the whole quote missing; it is never treated as zero.

use corelib::Interval;
use serde::Serialize;
use tracing::trace;

use crate::error::MarketError;
use crate::graph::Route;
use crate::resolver::{At, RateResolver};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PathQuote {
    pub price: f64,
    pub volume24h: f64,
    pub depth_bid: f64,
    pub depth_ask: f64,
}

impl PathQuote {
    /// Quote of the zero-hop route.
    pub const IDENTITY: PathQuote = PathQuote {
        price: 1.0,
        volume24h: 0.0,
        depth_bid: 0.0,
        depth_ask: 0.0,
    };
}

/// One bucket of a route's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub t: i64,
    pub quote: Option<PathQuote>,
}

#[derive(Clone)]
pub struct PathEvaluator {
    resolver: RateResolver,
}

impl PathEvaluator {
    pub fn new(resolver: RateResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &RateResolver {
        &self.resolver
    }

    /// Composite quote for `route` at `at`; `Ok(None)` if any hop lacks data.
    pub fn price_at(&self, route: &Route, at: At) -> Result<Option<PathQuote>, MarketError> {
        let mut quote = PathQuote::IDENTITY;

        for hop in &route.hops {
            let Some(tick) = self.resolver.rate_at(hop.pair, at)? else {
                trace!(pair = hop.pair, ?at, "hop missing data");
                return Ok(None);
            };

            let rate = if hop.reverse {
                if tick.price == 0.0 {
                    trace!(pair = hop.pair, "zero rate cannot be inverted");
                    return Ok(None);
                }
                tick.price.recip()
            } else {
                tick.price
            };

            quote.price *= rate;
            quote.volume24h += tick.volume24h;
            quote.depth_bid += tick.depth_bid;
            quote.depth_ask += tick.depth_ask;
        }

        Ok(Some(quote))
    }

    /// One point per bucket `from + i * interval` up to and including `to`.
    pub fn series_over(
        &self,
        route: &Route,
        interval: Interval,
        from: i64,
        to: i64,
    ) -> Result<Vec<SeriesPoint>, MarketError> {
        if to < from {
            return Ok(Vec::new());
        }
        let dt = interval.secs();
        let buckets = (to - from) / dt + 1;

        (0..buckets)
            .map(|i| {
                let t = from + dt * i;
                Ok(SeriesPoint {
                    t,
                    quote: self.price_at(route, At::Time(t))?,
                })
            })
            .collect()
    }
}

/// Combine quotes of independent routes between the same two tokens:
/// price is the plain average, volume and depths are summed. Routes without
/// data are left out; `None` when no route has data.
pub fn blend<I>(quotes: I) -> Option<PathQuote>
where
    I: IntoIterator<Item = Option<PathQuote>>,
{
    let mut total = PathQuote::default();
    let mut count = 0usize;

    for q in quotes.into_iter().flatten() {
        total.price += q.price;
        total.volume24h += q.volume24h;
        total.depth_bid += q.depth_bid;
        total.depth_ask += q.depth_ask;
        count += 1;
    }

    if count == 0 {
        return None;
    }
    total.price /= count as f64;
    Some(total)
}
