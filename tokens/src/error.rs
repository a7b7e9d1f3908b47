use corelib::TokenId;
use market::MarketError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregatorError {
    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("no token with symbol {0}")]
    SymbolNotFound(String),

    #[error("no route from token {token} to base {base}")]
    NoRoute { token: TokenId, base: TokenId },

    #[error("invalid amount {0:?}")]
    InvalidAmount(String),

    /// Unexpected fault inside one token's computation.
    #[error("computation failed: {0}")]
    ComputationFailure(String),

    #[error(transparent)]
    Market(#[from] MarketError),
}

impl AggregatorError {
    /// True for lookups that found no entity or no data; callers computing
    /// optional fields treat these as "unavailable".
    pub fn is_missing_data(&self) -> bool {
        match self {
            AggregatorError::Market(e) => e.is_missing_data(),
            AggregatorError::NoRoute { .. } => true,
            _ => false,
        }
    }
}

/// Map "missing" failures of an optional field to `Ok(None)`; other
/// failures still abort the computation.
pub(crate) fn optional<T>(res: Result<Option<T>, AggregatorError>) -> Result<Option<T>, AggregatorError> {
    match res {
        Ok(v) => Ok(v),
        Err(e) if e.is_missing_data() => {
            tracing::debug!(error = %e, "optional field unavailable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
