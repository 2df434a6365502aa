//! Transaction Result
//!
//! Uniform value object returned by every transaction manager operation,
//! serializable so controllers can project it straight into responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::{Balance, BalanceTransaction};
use crate::models::Order;

/// Entities touched by a completed operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionData {
    /// Deposit or withdrawal: the ledger entry, the refreshed balance,
    /// and the amount applied
    FundsMovement {
        transaction: BalanceTransaction,
        balance: Balance,
        amount: Decimal,
    },
    /// Buy or sell order: the order row and its cash ledger entry
    OrderPlacement {
        order: Order,
        transaction: BalanceTransaction,
    },
}

/// Outcome of one transaction manager operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub success: bool,
    pub data: TransactionData,
    pub error: Option<String>,
    /// How long the per-user lock was held, for observability
    pub lock_duration: Duration,
}

impl TransactionResult {
    /// Result for an operation that committed
    pub fn completed(data: TransactionData, lock_duration: Duration) -> Self {
        Self {
            success: true,
            data,
            error: None,
            lock_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::types::TransactionType;

    #[test]
    fn test_completed_result_serializes() {
        let tx = BalanceTransaction::completed(
            "u1",
            TransactionType::Deposit,
            Decimal::new(10000, 2),
            "Deposit",
        );
        let balance = Balance {
            username: "u1".to_string(),
            current_balance: Decimal::new(10000, 2),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let result = TransactionResult::completed(
            TransactionData::FundsMovement {
                transaction: tx,
                balance,
                amount: Decimal::new(10000, 2),
            },
            Duration::from_millis(3),
        );

        assert!(result.success);
        assert!(result.error.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], serde_json::json!(true));
        assert_eq!(json["data"]["kind"], serde_json::json!("funds_movement"));
        assert_eq!(json["data"]["amount"], serde_json::json!("100.00"));
    }
}
