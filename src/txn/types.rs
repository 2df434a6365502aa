//! Balance Core Types
//!
//! Entities the transaction manager reads and writes: the cached balance
//! projection, the append-only ledgers, and the per-asset holdings. All
//! monetary and quantity fields are exact `rust_decimal::Decimal`; binary
//! floating point never touches money.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::TransactionError;
use crate::models::OrderType;

/// Cash balance for one user
///
/// `current_balance` is a cached projection of the completed ledger
/// entries. It is mutated only through the transaction manager and never
/// decremented below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub username: String,
    pub current_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Balance transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum TransactionType {
    Deposit = 1,
    Withdraw = 2,
    BuyOrder = 3,
    SellOrder = 4,
}

impl TransactionType {
    /// Get numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionType::Deposit),
            2 => Some(TransactionType::Withdraw),
            3 => Some(TransactionType::BuyOrder),
            4 => Some(TransactionType::SellOrder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdraw => "WITHDRAW",
            TransactionType::BuyOrder => "BUY_ORDER",
            TransactionType::SellOrder => "SELL_ORDER",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum TransactionStatus {
    Pending = 0,
    Completed = 1,
    Failed = -1,
}

impl TransactionStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            1 => Some(TransactionStatus::Completed),
            -1 => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cash ledger entry - immutable once created
///
/// One balance mutation always produces exactly one ledger entry; the
/// ledger is the audit trail and the balance row is its projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub transaction_id: Uuid,
    pub username: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub status: TransactionStatus,
    /// Correlates order-driven entries with the order row
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl BalanceTransaction {
    /// Create a COMPLETED ledger entry
    pub fn completed(
        username: &str,
        transaction_type: TransactionType,
        amount: Decimal,
        description: &str,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            username: username.to_string(),
            transaction_type,
            amount,
            description: description.to_string(),
            status: TransactionStatus::Completed,
            reference_id: None,
            created_at: Utc::now(),
        }
    }

    /// Create a COMPLETED ledger entry correlated with an order
    pub fn completed_for_order(
        username: &str,
        transaction_type: TransactionType,
        amount: Decimal,
        description: &str,
        order_id: Uuid,
    ) -> Self {
        let mut tx = Self::completed(username, transaction_type, amount, description);
        tx.reference_id = Some(order_id);
        tx
    }
}

/// Asset holdings for one (user, asset) pair
///
/// Upserted by delta. Quantity may legitimately reach exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub username: String,
    pub asset_id: String,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Asset ledger entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum AssetTransactionType {
    Buy = 1,
    Sell = 2,
}

impl AssetTransactionType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AssetTransactionType::Buy),
            2 => Some(AssetTransactionType::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetTransactionType::Buy => "BUY",
            AssetTransactionType::Sell => "SELL",
        }
    }
}

impl fmt::Display for AssetTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asset ledger entry - immutable, mirrors [`BalanceTransaction`] for
/// asset-denominated movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetTransaction {
    pub transaction_id: Uuid,
    pub username: String,
    pub asset_id: String,
    pub transaction_type: AssetTransactionType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub order_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl AssetTransaction {
    /// Create a COMPLETED asset ledger entry linked to an order
    pub fn completed(
        username: &str,
        asset_id: &str,
        transaction_type: AssetTransactionType,
        quantity: Decimal,
        price: Decimal,
        order_id: Uuid,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            username: username.to_string(),
            asset_id: asset_id.to_string(),
            transaction_type,
            quantity,
            price,
            total_amount: quantity * price,
            order_id: Some(order_id),
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

/// Buy order request from the service layer
#[derive(Debug, Clone)]
pub struct BuyOrderRequest {
    pub username: String,
    pub asset_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub order_type: OrderType,
    /// quantity x price, re-validated at the boundary
    pub total_cost: Decimal,
}

impl BuyOrderRequest {
    pub fn new(
        username: &str,
        asset_id: &str,
        quantity: Decimal,
        price: Decimal,
        order_type: OrderType,
        total_cost: Decimal,
    ) -> Self {
        Self {
            username: username.to_string(),
            asset_id: asset_id.to_string(),
            quantity,
            price,
            order_type,
            total_cost,
        }
    }

    /// Cheap validation, runs before any lock or I/O
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.username.trim().is_empty() {
            return Err(TransactionError::InvalidUsername);
        }
        if !self.order_type.is_buy() {
            return Err(TransactionError::InvalidOrderType(self.order_type));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(TransactionError::InvalidQuantity);
        }
        if self.price < Decimal::ZERO {
            return Err(TransactionError::InvalidPrice);
        }
        if self.total_cost != self.quantity * self.price {
            return Err(TransactionError::TotalCostMismatch);
        }
        Ok(())
    }
}

/// Sell order request from the service layer
#[derive(Debug, Clone)]
pub struct SellOrderRequest {
    pub username: String,
    pub asset_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub order_type: OrderType,
    /// Cash proceeds credited to the balance
    pub asset_amount: Decimal,
}

impl SellOrderRequest {
    pub fn new(
        username: &str,
        asset_id: &str,
        quantity: Decimal,
        price: Decimal,
        order_type: OrderType,
        asset_amount: Decimal,
    ) -> Self {
        Self {
            username: username.to_string(),
            asset_id: asset_id.to_string(),
            quantity,
            price,
            order_type,
            asset_amount,
        }
    }

    /// Cheap validation, runs before any lock or I/O
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.username.trim().is_empty() {
            return Err(TransactionError::InvalidUsername);
        }
        if !self.order_type.is_sell() {
            return Err(TransactionError::InvalidOrderType(self.order_type));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(TransactionError::InvalidQuantity);
        }
        if self.price < Decimal::ZERO {
            return Err(TransactionError::InvalidPrice);
        }
        if self.asset_amount < Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }
        Ok(())
    }
}
