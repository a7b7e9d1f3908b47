use serde::{Deserialize, Serialize};

use super::TokenId;

/// One hourly (or other granularity) observation for a pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Exchange rate of `tokens[0]` in `tokens[1]`.
    pub price: f64,

    pub volume24h: f64,

    #[serde(rename = "depthBid", alias = "depth_bid")]
    pub depth_bid: f64,

    #[serde(rename = "depthAsk", alias = "depth_ask")]
    pub depth_ask: f64,
}

impl Tick {
    pub fn new(price: f64, volume24h: f64, depth_bid: f64, depth_ask: f64) -> Self {
        Self {
            price,
            volume24h,
            depth_bid,
            depth_ask,
        }
    }
}

/// Treasury and neuron schedule for one token on one day.
///
/// Amounts are raw integer units as decimal strings; they may exceed 2^53.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenLocking {
    pub treasury: String,
    pub total_locked: String,

    #[serde(default)]
    pub other_treasuries: Vec<(TokenId, String)>,

    /// Indexed by future day offset.
    #[serde(default)]
    pub dissolving: Vec<String>,

    #[serde(default)]
    pub not_dissolving: Vec<String>,
}

/// Daily supply record for a token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenDay {
    pub total_supply: String,

    #[serde(default)]
    pub circulating_supply: Option<String>,

    #[serde(default)]
    pub locking: Option<TokenLocking>,
}
