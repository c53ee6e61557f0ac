//! Domain error model.

use thiserror::Error;

use crate::id::{EquipmentId, LocationId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, illegal transitions,
/// missing references, stock shortfalls, lost races). Persistence failures
/// belong to the gateway layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: empty item list, non-positive quantity, missing reference.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Illegal lifecycle transition (e.g. approving a draft).
    #[error("illegal state transition: {0}")]
    State(String),

    /// A referenced equipment, location or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An outgoing movement would drive a stock bucket negative.
    #[error(
        "insufficient stock for equipment {equipment_id} at location {location_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        equipment_id: EquipmentId,
        location_id: LocationId,
        available: i64,
        requested: i64,
    },

    /// A competing write invalidated the snapshot this operation was based on.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_bucket_and_amounts() {
        let equipment_id = EquipmentId::new();
        let location_id = LocationId::new();
        let err = DomainError::InsufficientStock {
            equipment_id,
            location_id,
            available: 5,
            requested: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains(&equipment_id.to_string()));
        assert!(msg.contains(&location_id.to_string()));
        assert!(msg.contains("available 5, requested 20"));
    }
}
