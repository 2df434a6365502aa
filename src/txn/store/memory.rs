//! In-Memory Store
//!
//! DashMap-backed implementation of all store traits for tests and local
//! development. Failure injection switches let tests force a store error
//! at any step of a multi-entity operation.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{
    AssetBalanceStore, AssetTransactionStore, BalanceStore, OrderStore, StoreError,
};
use crate::models::{Order, OrderStatus};
use crate::txn::types::{AssetBalance, AssetTransaction, Balance, BalanceTransaction};

/// In-memory store implementing every store trait
pub struct MemoryStore {
    balances: DashMap<String, Balance>,
    transactions: Mutex<Vec<BalanceTransaction>>,
    orders: DashMap<Uuid, Order>,
    asset_balances: DashMap<(String, String), AssetBalance>,
    asset_transactions: Mutex<Vec<AssetTransaction>>,

    fail_get_balance: AtomicBool,
    fail_update_balance: AtomicBool,
    fail_create_transaction: AtomicBool,
    fail_create_order: AtomicBool,
    fail_upsert_asset_balance: AtomicBool,
    fail_create_asset_transaction: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            balances: DashMap::new(),
            transactions: Mutex::new(Vec::new()),
            orders: DashMap::new(),
            asset_balances: DashMap::new(),
            asset_transactions: Mutex::new(Vec::new()),
            fail_get_balance: AtomicBool::new(false),
            fail_update_balance: AtomicBool::new(false),
            fail_create_transaction: AtomicBool::new(false),
            fail_create_order: AtomicBool::new(false),
            fail_upsert_asset_balance: AtomicBool::new(false),
            fail_create_asset_transaction: AtomicBool::new(false),
        })
    }

    // Failure injection switches

    pub fn set_fail_get_balance(&self, fail: bool) {
        self.fail_get_balance.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_update_balance(&self, fail: bool) {
        self.fail_update_balance.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create_transaction(&self, fail: bool) {
        self.fail_create_transaction.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create_order(&self, fail: bool) {
        self.fail_create_order.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upsert_asset_balance(&self, fail: bool) {
        self.fail_upsert_asset_balance.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create_asset_transaction(&self, fail: bool) {
        self.fail_create_asset_transaction.store(fail, Ordering::SeqCst);
    }

    /// Orders created for a user, for test verification
    pub fn orders_for(&self, username: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().username == username)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    fn check(&self, flag: &AtomicBool, op: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("Injected {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl BalanceStore for MemoryStore {
    async fn get_balance(&self, username: &str) -> Result<Balance, StoreError> {
        self.check(&self.fail_get_balance, "get_balance")?;
        self.balances
            .get(username)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_balance(
        &self,
        username: &str,
        new_balance: Decimal,
    ) -> Result<Balance, StoreError> {
        self.check(&self.fail_update_balance, "update_balance")?;
        let now = Utc::now();
        let mut entry = self
            .balances
            .entry(username.to_string())
            .or_insert_with(|| Balance {
                username: username.to_string(),
                current_balance: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            });
        entry.current_balance = new_balance;
        entry.updated_at = now;
        Ok(entry.value().clone())
    }

    async fn create_transaction(
        &self,
        tx: BalanceTransaction,
    ) -> Result<BalanceTransaction, StoreError> {
        self.check(&self.fail_create_transaction, "create_transaction")?;
        self.transactions.lock().unwrap().push(tx.clone());
        Ok(tx)
    }

    async fn list_transactions(
        &self,
        username: &str,
    ) -> Result<Vec<BalanceTransaction>, StoreError> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| tx.username == username)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: Order) -> Result<Order, StoreError> {
        self.check(&self.fail_create_order, "create_order")?;
        self.orders.insert(order.order_id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Order, StoreError> {
        self.orders
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut entry = self.orders.get_mut(&order_id).ok_or(StoreError::NotFound)?;
        let order = entry.value_mut();
        if order.status != expected || !expected.can_transition_to(next) {
            return Err(StoreError::Conflict);
        }
        order.status = next;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[async_trait]
impl AssetBalanceStore for MemoryStore {
    async fn get_asset_balance(
        &self,
        username: &str,
        asset_id: &str,
    ) -> Result<AssetBalance, StoreError> {
        self.asset_balances
            .get(&(username.to_string(), asset_id.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn upsert_asset_balance(
        &self,
        username: &str,
        asset_id: &str,
        quantity_delta: Decimal,
    ) -> Result<AssetBalance, StoreError> {
        self.check(&self.fail_upsert_asset_balance, "upsert_asset_balance")?;
        let now = Utc::now();
        let mut entry = self
            .asset_balances
            .entry((username.to_string(), asset_id.to_string()))
            .or_insert_with(|| AssetBalance {
                username: username.to_string(),
                asset_id: asset_id.to_string(),
                quantity: Decimal::ZERO,
                created_at: now,
                updated_at: now,
            });
        entry.quantity += quantity_delta;
        entry.updated_at = now;
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl AssetTransactionStore for MemoryStore {
    async fn create_asset_transaction(
        &self,
        tx: AssetTransaction,
    ) -> Result<AssetTransaction, StoreError> {
        self.check(&self.fail_create_asset_transaction, "create_asset_transaction")?;
        self.asset_transactions.lock().unwrap().push(tx.clone());
        Ok(tx)
    }

    async fn list_asset_transactions(
        &self,
        username: &str,
    ) -> Result<Vec<AssetTransaction>, StoreError> {
        Ok(self
            .asset_transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| tx.username == username)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderType;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_update_balance_upserts() {
        let store = MemoryStore::new();

        assert!(matches!(
            store.get_balance("u1").await,
            Err(StoreError::NotFound)
        ));

        let balance = store.update_balance("u1", dec("100")).await.unwrap();
        assert_eq!(balance.current_balance, dec("100"));

        let balance = store.update_balance("u1", dec("40")).await.unwrap();
        assert_eq!(balance.current_balance, dec("40"));
        assert_eq!(store.get_balance("u1").await.unwrap().current_balance, dec("40"));
    }

    #[tokio::test]
    async fn test_asset_balance_delta_upsert() {
        let store = MemoryStore::new();

        let ab = store.upsert_asset_balance("u1", "BTC", dec("1.5")).await.unwrap();
        assert_eq!(ab.quantity, dec("1.5"));

        let ab = store.upsert_asset_balance("u1", "BTC", dec("-0.5")).await.unwrap();
        assert_eq!(ab.quantity, dec("1.0"));

        // Driven to exactly zero, row stays
        let ab = store.upsert_asset_balance("u1", "BTC", dec("-1.0")).await.unwrap();
        assert_eq!(ab.quantity, Decimal::ZERO);
        assert!(store.get_asset_balance("u1", "BTC").await.is_ok());
    }

    #[tokio::test]
    async fn test_order_status_cas() {
        let store = MemoryStore::new();
        let order = Order::new("u1", OrderType::LimitBuy, "BTC", dec("1"), dec("100"));
        let order = store.create_order(order).await.unwrap();

        let updated = store
            .update_order_status(order.order_id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);

        // Stale expectation
        let err = store
            .update_order_status(order.order_id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // Illegal hop
        let err = store
            .update_order_status(order.order_id, OrderStatus::Confirmed, OrderStatus::Refunded)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
        assert_eq!(
            store.get_order(order.order_id).await.unwrap().status,
            OrderStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_update_balance(true);

        let err = store.update_balance("u1", dec("1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.set_fail_update_balance(false);
        assert!(store.update_balance("u1", dec("1")).await.is_ok());
    }
}
