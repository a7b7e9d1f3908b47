use corelib::{EntityId, Interval};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EntityKind {
    Pair,
    Token,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Pair => f.write_str("pair"),
            EntityKind::Token => f.write_str("token"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    /// No series or configuration entry exists for the entity.
    #[error("{kind} {id} not found")]
    EntityNotFound { kind: EntityKind, id: EntityId },

    /// The series exists but nothing falls inside the staleness window.
    #[error("no {kind} data for {id} within the staleness window")]
    NoDataAvailable { kind: EntityKind, id: EntityId },

    #[error("malformed {interval} batch: {reason}")]
    MalformedBatch { interval: Interval, reason: String },
}

impl MarketError {
    pub fn pair_not_found(id: EntityId) -> Self {
        Self::EntityNotFound {
            kind: EntityKind::Pair,
            id,
        }
    }

    pub fn token_not_found(id: EntityId) -> Self {
        Self::EntityNotFound {
            kind: EntityKind::Token,
            id,
        }
    }

    pub fn malformed(interval: Interval, reason: impl Into<String>) -> Self {
        Self::MalformedBatch {
            interval,
            reason: reason.into(),
        }
    }

    /// Lookup misses that callers may treat as "skip this optional field".
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            MarketError::EntityNotFound { .. } | MarketError::NoDataAvailable { .. }
        )
    }
}
