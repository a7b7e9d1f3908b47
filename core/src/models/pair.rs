use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::TokenId;

/// A tradable two-token market. Immutable once loaded from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    /// Stored token order; tick prices quote `tokens[0]` in units of `tokens[1]`.
    pub tokens: [TokenId; 2],

    /// Exchange-specific settings keyed by exchange id.
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl PairConfig {
    pub fn new(a: TokenId, b: TokenId) -> Self {
        Self {
            tokens: [a, b],
            config: Map::new(),
        }
    }

    /// Exchange the pair trades on (first key of its config).
    pub fn dex_id(&self) -> Option<&str> {
        self.config.keys().next().map(String::as_str)
    }
}
