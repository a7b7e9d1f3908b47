use serde::{Deserialize, Serialize};

/// How circulating supply is obtained for a token.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockingMode {
    /// `total - treasury - locked`, from the daily locking record.
    #[default]
    Derived,

    /// The daily record carries `circulating_supply` directly.
    Reported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub name: String,
    pub decimals: u32,

    #[serde(default)]
    pub locking: LockingMode,

    /// Reference currencies that are never listed on their own.
    #[serde(default)]
    pub hidden: bool,
}

impl TokenConfig {
    pub fn new(symbol: &str, name: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            decimals,
            locking: LockingMode::Derived,
            hidden: false,
        }
    }
}
