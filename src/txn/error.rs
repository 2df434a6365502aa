//! Transaction Error Types
//!
//! One taxonomy for everything the transaction manager can surface:
//! boundary validation, business-rule rejection, lock contention, and
//! infrastructure failure. Controllers map `code()` to status codes.

use thiserror::Error;

use super::store::StoreError;
use crate::models::{OrderStatus, OrderType};

/// Transaction error types
#[derive(Error, Debug)]
pub enum TransactionError {
    // === Validation Errors (rejected before lock acquisition) ===
    #[error("Username must not be empty")]
    InvalidUsername,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Price must not be negative")]
    InvalidPrice,

    #[error("Total cost does not equal quantity x price")]
    TotalCostMismatch,

    #[error("Order type {0} is not valid for this operation")]
    InvalidOrderType(OrderType),

    // === Business-Rule Rejection (detected under the lock) ===
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: rust_decimal::Decimal,
        requested: rust_decimal::Decimal,
    },

    // === Lock Errors ===
    /// The per-user lock could not be obtained before the timeout.
    /// Transient: the caller may retry, no data was touched.
    #[error("Could not acquire lock {key}")]
    LockAcquisition { key: String },

    /// The lock could not be released after the guarded section ran.
    /// The underlying mutation may have committed; the operation still
    /// reports failure.
    #[error("Failed to release user lock: {0}")]
    LockRelease(String),

    // === Infrastructure Errors ===
    /// A store call failed. The message stays generic; the original
    /// cause travels as `source` for logs, never to the caller.
    #[error("{op} failed")]
    Database {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
}

impl TransactionError {
    pub(crate) fn database(op: &'static str, source: StoreError) -> Self {
        TransactionError::Database { op, source }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::InvalidUsername => "INVALID_USERNAME",
            TransactionError::InvalidAmount => "INVALID_AMOUNT",
            TransactionError::InvalidQuantity => "INVALID_QUANTITY",
            TransactionError::InvalidPrice => "INVALID_PRICE",
            TransactionError::TotalCostMismatch => "TOTAL_COST_MISMATCH",
            TransactionError::InvalidOrderType(_) => "INVALID_ORDER_TYPE",
            TransactionError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            TransactionError::LockAcquisition { .. } => "LOCK_TIMEOUT",
            TransactionError::LockRelease(_) => "LOCK_RELEASE_FAILED",
            TransactionError::Database { .. } => "SERVICE_UNAVAILABLE",
            TransactionError::NotFound { .. } => "NOT_FOUND",
            TransactionError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
        }
    }

    /// Transient errors the caller may retry without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransactionError::LockAcquisition { .. } | TransactionError::Database { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_message_is_generic() {
        let err = TransactionError::database(
            "Withdrawal",
            StoreError::Unavailable("connection refused to 10.0.0.3:5432".to_string()),
        );
        // Storage internals must not leak into the caller-facing message
        assert_eq!(err.to_string(), "Withdrawal failed");
        assert_eq!(err.code(), "SERVICE_UNAVAILABLE");

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            TransactionError::LockAcquisition {
                key: "user:u1".to_string()
            }
            .is_retryable()
        );
        assert!(TransactionError::database("Deposit", StoreError::NotFound).is_retryable());
        assert!(
            !TransactionError::InsufficientBalance {
                available: rust_decimal::Decimal::ZERO,
                requested: rust_decimal::Decimal::ONE,
            }
            .is_retryable()
        );
        assert!(!TransactionError::InvalidAmount.is_retryable());
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            TransactionError::InsufficientBalance {
                available: rust_decimal::Decimal::ZERO,
                requested: rust_decimal::Decimal::ONE,
            }
            .code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(
            TransactionError::LockAcquisition {
                key: "user:u1".to_string()
            }
            .code(),
            "LOCK_TIMEOUT"
        );
    }
}
