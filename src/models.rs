// models.rs - Order entity and status state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use crate::txn::error::TransactionError;

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderType {
    MarketBuy = 1,
    MarketSell = 2,
    LimitBuy = 3,
    LimitSell = 4,
}

impl OrderType {
    #[inline]
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderType::MarketBuy | OrderType::LimitBuy)
    }

    #[inline]
    pub fn is_sell(&self) -> bool {
        !self.is_buy()
    }

    /// Market orders execute immediately; limit orders wait for fulfillment
    #[inline]
    pub fn is_market(&self) -> bool {
        matches!(self, OrderType::MarketBuy | OrderType::MarketSell)
    }

    /// Get numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(OrderType::MarketBuy),
            2 => Some(OrderType::MarketSell),
            3 => Some(OrderType::LimitBuy),
            4 => Some(OrderType::LimitSell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::MarketBuy => "MARKET_BUY",
            OrderType::MarketSell => "MARKET_SELL",
            OrderType::LimitBuy => "LIMIT_BUY",
            OrderType::LimitSell => "LIMIT_SELL",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order status
///
/// One state machine for the whole order lifecycle. The transaction side
/// only ever creates orders in `Pending` or `Completed`; every later hop
/// belongs to the fulfillment path and must go through [`Order::transition`].
///
/// ```text
/// PENDING ──► CONFIRMED ──► PROCESSING ──► COMPLETED
///    │  │          │             │
///    │  └► PAID ───┼─► REFUNDED  │
///    │             │             │
///    └─────────────┴─────────────┴──► CANCELLED
/// ```
///
/// Terminal states: COMPLETED, CANCELLED, REFUNDED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderStatus {
    Pending = 0,
    Paid = 10,
    Confirmed = 20,
    Processing = 30,
    Completed = 40,
    Cancelled = -10,
    Refunded = -20,
}

impl OrderStatus {
    /// Check whether moving to `next` is a legal lifecycle hop
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Paid)
                | (Pending, Cancelled)
                | (Paid, Processing)
                | (Paid, Refunded)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Completed)
                | (Processing, Cancelled)
        )
    }

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Get numeric ID for PostgreSQL storage
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    /// Convert from PostgreSQL ID
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(OrderStatus::Pending),
            10 => Some(OrderStatus::Paid),
            20 => Some(OrderStatus::Confirmed),
            30 => Some(OrderStatus::Processing),
            40 => Some(OrderStatus::Completed),
            -10 => Some(OrderStatus::Cancelled),
            -20 => Some(OrderStatus::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A buy or sell order for one asset
///
/// Created exactly once by the transaction manager as part of a buy/sell
/// flow. Market orders settle in the same locked section and are born
/// `Completed`; limit orders are born `Pending` and advanced later by the
/// fulfillment service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Uuid,
    pub username: String,
    pub order_type: OrderType,
    pub asset_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
    /// quantity x price
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        username: &str,
        order_type: OrderType,
        asset_id: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        let now = Utc::now();
        let status = if order_type.is_market() {
            OrderStatus::Completed
        } else {
            OrderStatus::Pending
        };

        Self {
            order_id: Uuid::new_v4(),
            username: username.to_string(),
            order_type,
            asset_id: asset_id.to_string(),
            quantity,
            price,
            total_amount: quantity * price,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the order to `next`, rejecting illegal lifecycle hops
    ///
    /// An illegal transition leaves the order untouched. Reservation
    /// side effects (release on CANCELLED, permanent debit on COMPLETED)
    /// are applied by the fulfillment service, not here.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), TransactionError> {
        if !self.status.can_transition_to(next) {
            warn!(
                order_id = %self.order_id,
                from = %self.status,
                to = %next,
                "Illegal order status transition rejected"
            );
            return Err(TransactionError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order[{}] {} {} {} qty={} price={} status={}",
            self.order_id,
            self.username,
            self.order_type,
            self.asset_id,
            self.quantity,
            self.price,
            self.status
        )
    }
}
