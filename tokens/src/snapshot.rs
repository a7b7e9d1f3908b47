//! Read models handed to consumers. Every metric that may be unavailable is
//! an `Option`; `None` means "unavailable", never zero.

use std::collections::BTreeMap;

use corelib::{DexInfo, Interval, LockingMode, PairId, TokenConfig, TokenId};
use market::{PathQuote, Route};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub id: TokenId,
    pub symbol: String,
    pub name: String,
    pub locking: LockingMode,

    pub price: Option<f64>,

    pub total: Option<f64>,
    pub total_locked: Option<f64>,
    pub circulating: Option<f64>,
    pub real_circulating: Option<f64>,
    pub treasury: Vec<TreasuryEntry>,

    pub marketcap: Option<f64>,
    /// 24h volume converted to the base currency.
    pub volume24: Option<f64>,
    /// Percent change against the chart bucket one day back.
    pub change24: Option<f64>,
    pub depth50_bid: Option<f64>,
    pub depth50_ask: Option<f64>,

    pub routes: Vec<RouteQuote>,
    pub weekchart: Vec<ChartPoint>,
}

/// Holding of one token in a project's treasury.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryEntry {
    pub token: TokenId,
    /// Amount in tokens.
    pub amount: f64,
    /// Amount valued in the base currency.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteQuote {
    pub route: Route,
    pub quote: Option<PathQuote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub t: i64,
    pub price: Option<f64>,
}

/// One route's figures in a history bucket; volume is in the base currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoint {
    pub price: f64,
    pub volume: Option<f64>,
    pub depth_bid: f64,
    pub depth_ask: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPoint {
    pub t: i64,
    /// Change in locked supply since the baseline bucket, valued in base.
    pub circulating_delta: Option<f64>,
    /// Change in the token's own treasury since the baseline bucket, valued in base.
    pub treasury_delta: Option<f64>,
    /// Same for every other treasury token, keyed by token id.
    pub other_treasury_deltas: BTreeMap<TokenId, f64>,
    /// Aligned with `HistoricalSeries::sources`.
    pub routes: Vec<Option<RoutePoint>>,
}

/// Cumulative neuron dissolve schedule value for one future day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeuronPoint {
    pub t: i64,
    pub dissolving: Option<f64>,
    pub not_dissolving: Option<f64>,
}

/// Exchange a route starts on and its latest figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSource {
    pub dex_id: Option<String>,
    pub dex: Option<DexInfo>,
    pub price: Option<f64>,
    pub volume24: Option<f64>,
    pub volume7: Option<f64>,
    pub volume30: Option<f64>,
    pub liquidity: Option<f64>,
    pub liquidity_ask: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalSeries {
    pub token: TokenConfig,
    pub lines: usize,
    pub merged: Vec<MergedPoint>,
    pub neurons: Vec<NeuronPoint>,
    pub sources: Vec<RouteSource>,
}

/// What an ingestion client should fetch to refresh one token's routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshPlan {
    pub interval: Interval,
    pub ids: Vec<PairId>,
    pub from: i64,
    pub to: i64,
}
