use std::collections::HashMap;
use std::path::PathBuf;

use corelib::TokenId;

use crate::cache::DEFAULT_TTL_MS;

/// Knobs of the aggregation engine.
#[derive(Clone, Debug)]
pub struct AggregatorSettings {
    /// Hop bound for a listed token's routes to the base currency.
    pub max_hops: usize,

    /// Hop bound for plain price conversions (treasury tokens, volume token).
    pub price_max_hops: usize,

    /// Length of the snapshot price chart.
    pub chart_days: i64,

    /// Whole-token amounts subtracted from total and locked supply, by symbol.
    pub fixed_locks: HashMap<String, i128>,

    /// Hourly buckets an ingestion client should request when refreshing a token.
    pub refresh_back_hours: i64,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            max_hops: 4,
            price_max_hops: 3,
            chart_days: 7,
            fixed_locks: HashMap::from([("SNS1".to_string(), 5_284)]),
            refresh_back_hours: 24 * 31,
        }
    }
}

impl AggregatorSettings {
    pub fn fixed_lock(&self, symbol: &str) -> i128 {
        self.fixed_locks.get(symbol).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// JSON catalog with pairs, tokens and the default base currency.
    pub catalog_path: Option<PathBuf>,

    /// Overrides the catalog's base currency.
    pub base_currency: Option<TokenId>,

    /// Age after which the cached token list is recomputed.
    pub cache_ttl_ms: u64,

    /// JSON log output instead of the compact human format.
    pub json_logs: bool,

    pub aggregator: AggregatorSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            base_currency: None,
            cache_ttl_ms: DEFAULT_TTL_MS,
            json_logs: false,
            aggregator: AggregatorSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut aggregator = defaults.aggregator;
        if let Some(hops) = env_parse("MAX_HOPS") {
            aggregator.max_hops = hops;
        }

        Self {
            catalog_path: std::env::var("CATALOG_PATH").ok().map(PathBuf::from),
            base_currency: env_parse("BASE_CURRENCY"),
            cache_ttl_ms: env_parse("CACHE_TTL_MS").unwrap_or(defaults.cache_ttl_ms),
            json_logs: std::env::var("APP_ENV").unwrap_or_default() == "production",
            aggregator,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
