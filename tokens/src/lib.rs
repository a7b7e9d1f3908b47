pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod history;
pub mod service;
pub mod snapshot;
pub mod supply;

pub use aggregator::TokenAggregator;
pub use cache::SnapshotCache;
pub use config::{AggregatorSettings, AppConfig};
pub use error::AggregatorError;
pub use service::TokenService;
pub use snapshot::*;
