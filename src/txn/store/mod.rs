//! Entity Stores
//!
//! One trait per entity family. Each store is atomic at the single-item
//! level but never across entities; cross-entity consistency is the
//! transaction manager's job, under the per-user lock.

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::types::{AssetBalance, AssetTransaction, Balance, BalanceTransaction};
use crate::models::{Order, OrderStatus};

pub use memory::MemoryStore;

/// Storage-agnostic store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entity not found")]
    NotFound,

    /// Compare-and-set update lost: the row was not in the expected state
    #[error("Conflicting concurrent update")]
    Conflict,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Cash balance and cash ledger operations
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Fetch the balance row for a user
    async fn get_balance(&self, username: &str) -> Result<Balance, StoreError>;

    /// Set the balance to an absolute value, creating the row when absent
    async fn update_balance(
        &self,
        username: &str,
        new_balance: Decimal,
    ) -> Result<Balance, StoreError>;

    /// Append one immutable ledger entry
    async fn create_transaction(
        &self,
        tx: BalanceTransaction,
    ) -> Result<BalanceTransaction, StoreError>;

    /// Ledger entries for a user, oldest first
    async fn list_transactions(
        &self,
        username: &str,
    ) -> Result<Vec<BalanceTransaction>, StoreError>;
}

/// Order row operations
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: Order) -> Result<Order, StoreError>;

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError>;

    /// Advance an order's status if it is still in `expected`
    ///
    /// Rejects both stale expectations and illegal lifecycle hops with
    /// [`StoreError::Conflict`], leaving the row untouched.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError>;
}

/// Asset holdings operations
#[async_trait]
pub trait AssetBalanceStore: Send + Sync {
    async fn get_asset_balance(
        &self,
        username: &str,
        asset_id: &str,
    ) -> Result<AssetBalance, StoreError>;

    /// Apply `quantity_delta`, creating the row from zero when absent
    async fn upsert_asset_balance(
        &self,
        username: &str,
        asset_id: &str,
        quantity_delta: Decimal,
    ) -> Result<AssetBalance, StoreError>;
}

/// Asset ledger operations
#[async_trait]
pub trait AssetTransactionStore: Send + Sync {
    async fn create_asset_transaction(
        &self,
        tx: AssetTransaction,
    ) -> Result<AssetTransaction, StoreError>;

    /// Asset ledger entries for a user, oldest first
    async fn list_asset_transactions(
        &self,
        username: &str,
    ) -> Result<Vec<AssetTransaction>, StoreError>;
}

/// Explicit bundle of store handles passed to the transaction manager
///
/// Handles travel through this context instead of process-wide
/// singletons, so every call site can be wired against a different
/// backend.
#[derive(Clone)]
pub struct StoreContext {
    pub balances: Arc<dyn BalanceStore>,
    pub orders: Arc<dyn OrderStore>,
    pub asset_balances: Arc<dyn AssetBalanceStore>,
    pub asset_transactions: Arc<dyn AssetTransactionStore>,
}

impl StoreContext {
    /// Wire all handles to one in-memory store
    pub fn from_memory(store: &Arc<MemoryStore>) -> Self {
        Self {
            balances: store.clone(),
            orders: store.clone(),
            asset_balances: store.clone(),
            asset_transactions: store.clone(),
        }
    }

    /// Wire all handles to PostgreSQL stores sharing one pool
    pub fn postgres(pool: &sqlx::PgPool) -> Self {
        let assets = Arc::new(postgres::PgAssetStore::new(pool.clone()));
        Self {
            balances: Arc::new(postgres::PgBalanceStore::new(pool.clone())),
            orders: Arc::new(postgres::PgOrderStore::new(pool.clone())),
            asset_balances: assets.clone(),
            asset_transactions: assets,
        }
    }
}
