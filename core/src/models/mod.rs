use serde::{Deserialize, Serialize};

pub mod batch;
pub mod pair;
pub mod tick;
pub mod token;

pub use batch::{IngestBatch, RawBatch};
pub use pair::PairConfig;
pub use tick::{Tick, TokenDay, TokenLocking};
pub use token::{LockingMode, TokenConfig};

/// Position of a pair in the catalog's pair list.
pub type PairId = u32;

/// Position of a token in the catalog's token list.
pub type TokenId = u32;

/// Identifier of a series entity (a pair or a token, depending on the store).
pub type EntityId = u32;

/// Bucket granularity a series is stored at.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "t5m")]
    T5m,

    #[default]
    #[serde(rename = "t1h")]
    T1h,

    #[serde(rename = "t1d")]
    T1d,
}

impl Interval {
    /// Bucket duration in seconds.
    pub const fn secs(self) -> i64 {
        match self {
            Interval::T5m => 5 * 60,
            Interval::T1h => 60 * 60,
            Interval::T1d => 24 * 60 * 60,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Interval::T5m => "t5m",
            Interval::T1h => "t1h",
            Interval::T1d => "t1d",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
