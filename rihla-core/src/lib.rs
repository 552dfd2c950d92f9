pub mod ids;
pub mod identity;
pub mod money;
pub mod notify;
pub mod payment;
pub mod repository;
pub mod resource;

pub use identity::{Actor, Role};
pub use money::{Currency, PriceSnapshot};
pub use repository::{Availability, Catalog, InventoryLedger, ReservationToken, ResourceInfo};
pub use resource::{ResourceKind, ResourceRef};

/// Failure kinds shared by the ledger, the state machine and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient capacity on {resource}: requested {requested}, available {available}")]
    InsufficientCapacity {
        resource: String,
        requested: u32,
        available: u32,
    },

    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment settlement failed: {0}")]
    SettlementFailure(String),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn transition(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        CoreError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Builds an `InvariantViolation` and logs it; these are never silently dropped.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(invariant = %message, "Invariant violation detected");
        CoreError::InvariantViolation(message)
    }

    /// Stable machine-readable label, used for metrics and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation_error",
            CoreError::InsufficientCapacity { .. } => "insufficient_capacity",
            CoreError::InvalidTransition { .. } => "invalid_transition",
            CoreError::NotFound { .. } => "not_found",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::SettlementFailure(_) => "settlement_failure",
            CoreError::InvariantViolation(_) => "invariant_violation",
            CoreError::Internal(_) => "internal_error",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::transition("booking", "refunded", "cancelled");
        assert_eq!(err.to_string(), "Invalid booking transition from refunded to cancelled");
        assert_eq!(err.kind(), "invalid_transition");

        let err = CoreError::not_found("payment", "42");
        assert_eq!(err.to_string(), "payment not found: 42");
    }

    #[test]
    fn test_invariant_helper() {
        let err = CoreError::invariant("over-release on flight:1");
        assert_eq!(err, CoreError::InvariantViolation("over-release on flight:1".to_string()));
    }
}
