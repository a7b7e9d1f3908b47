pub mod error;
pub mod evaluator;
pub mod graph;
pub mod resolver;
pub mod series;

pub use error::{EntityKind, MarketError};
pub use evaluator::{PathEvaluator, PathQuote, SeriesPoint, blend};
pub use graph::{Hop, PairGraph, Route, unique_pairs};
pub use resolver::{At, RateResolver};
pub use series::{TickSeries, TickSeriesStore, fetch_window};

/// Pair ticks keyed by (interval, pair id).
pub type PairStore = TickSeriesStore<corelib::Tick>;

/// Daily token records keyed by (interval, token id).
pub type TokenStore = TickSeriesStore<corelib::TokenDay>;
