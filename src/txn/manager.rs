//! Transaction Manager
//!
//! Orchestrates locked, multi-entity balance and order mutations. Every
//! operation follows the same shape: cheap validation before any I/O,
//! acquire the per-user lock, run the ordered store reads and writes,
//! release the lock on every exit path, and return a uniform
//! [`TransactionResult`] or a typed error.
//!
//! # Consistency model
//!
//! The per-user lock totally orders all mutations for one username, so
//! two concurrent withdrawals can never both observe the pre-decrement
//! balance. It does NOT make a multi-entity operation atomic: a store
//! failure halfway through a buy leaves the already-written rows in
//! place and surfaces a database error. Ledger rows are append-only and
//! written in the same locked section as the balance delta they mirror.

use rust_decimal::Decimal;
use std::future::Future;
use tracing::{error, info, warn};

use super::error::TransactionError;
use super::lock::UserLockManager;
use super::result::{TransactionData, TransactionResult};
use super::store::{StoreContext, StoreError};
use super::types::{
    AssetBalance, AssetTransaction, AssetTransactionType, Balance, BalanceTransaction,
    BuyOrderRequest, SellOrderRequest, TransactionType,
};
use crate::models::Order;

/// Coordinates balance, ledger, order, and asset writes for one backend
///
/// Store handles and the lock manager are injected; the manager itself
/// is stateless and can be shared behind an `Arc`.
pub struct TransactionManager {
    stores: StoreContext,
    locks: UserLockManager,
}

impl TransactionManager {
    pub fn new(stores: StoreContext, locks: UserLockManager) -> Self {
        Self { stores, locks }
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Credit `amount` to a user's cash balance
    ///
    /// Creates the COMPLETED ledger entry, applies the delta, and returns
    /// the refreshed balance. The balance row is created on first deposit.
    pub async fn deposit_funds(
        &self,
        username: &str,
        amount: Decimal,
    ) -> Result<TransactionResult, TransactionError> {
        validate_username(username)?;
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }

        self.with_user_lock(username, self.deposit_locked(username, amount))
            .await
    }

    /// Debit `amount` from a user's cash balance
    ///
    /// The sufficiency check and the decrement are evaluated against the
    /// same locked read; an insufficient balance rejects the call with
    /// zero writes.
    pub async fn withdraw_funds(
        &self,
        username: &str,
        amount: Decimal,
    ) -> Result<TransactionResult, TransactionError> {
        validate_username(username)?;
        if amount <= Decimal::ZERO {
            return Err(TransactionError::InvalidAmount);
        }

        self.with_user_lock(username, self.withdraw_locked(username, amount))
            .await
    }

    /// Place a buy order, debiting its total cost from the cash balance
    /// and crediting the asset holding
    pub async fn create_buy_order_with_balance_update(
        &self,
        req: BuyOrderRequest,
    ) -> Result<TransactionResult, TransactionError> {
        req.validate()?;
        let username = req.username.clone();
        self.with_user_lock(&username, self.buy_locked(req)).await
    }

    /// Place a sell order, crediting the proceeds to the cash balance
    /// and debiting the asset holding
    pub async fn create_sell_order_with_balance_update(
        &self,
        req: SellOrderRequest,
    ) -> Result<TransactionResult, TransactionError> {
        req.validate()?;
        let username = req.username.clone();
        self.with_user_lock(&username, self.sell_locked(req)).await
    }

    // ========================================================================
    // Read-only queries (single-item reads, no lock needed)
    // ========================================================================

    /// Current cash balance for a user
    pub async fn balance(&self, username: &str) -> Result<Balance, TransactionError> {
        self.stores
            .balances
            .get_balance(username)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => TransactionError::NotFound {
                    entity: "balance",
                    key: username.to_string(),
                },
                e => TransactionError::database("Balance query", e),
            })
    }

    /// Cash ledger for a user, oldest first
    pub async fn transaction_history(
        &self,
        username: &str,
    ) -> Result<Vec<BalanceTransaction>, TransactionError> {
        self.stores
            .balances
            .list_transactions(username)
            .await
            .map_err(|e| TransactionError::database("Transaction history", e))
    }

    /// Current holding for one (user, asset) pair
    pub async fn asset_balance(
        &self,
        username: &str,
        asset_id: &str,
    ) -> Result<AssetBalance, TransactionError> {
        self.stores
            .asset_balances
            .get_asset_balance(username, asset_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => TransactionError::NotFound {
                    entity: "asset balance",
                    key: format!("{}/{}", username, asset_id),
                },
                e => TransactionError::database("Asset balance query", e),
            })
    }

    // ========================================================================
    // Locked sections
    // ========================================================================

    /// Run `op` with the user's lock held, releasing it on every exit path
    ///
    /// A failed release makes the whole operation report failure even
    /// when the guarded mutation already committed.
    async fn with_user_lock<F>(
        &self,
        username: &str,
        op: F,
    ) -> Result<TransactionResult, TransactionError>
    where
        F: Future<Output = Result<TransactionData, TransactionError>>,
    {
        let key = UserLockManager::resource_key(username);
        let lock = match self.locks.acquire_user(username).await {
            Ok(lock) => lock,
            Err(e) => {
                warn!(key = %key, error = %e, "Lock acquisition failed");
                return Err(TransactionError::LockAcquisition { key });
            }
        };

        let outcome = op.await;
        let lock_duration = lock.held();
        let released = self.locks.release(lock).await;

        match outcome {
            Ok(data) => match released {
                Ok(true) => Ok(TransactionResult::completed(data, lock_duration)),
                Ok(false) => {
                    error!(key = %key, "Lock was no longer held at release");
                    Err(TransactionError::LockRelease(format!(
                        "Lock {} was no longer held at release",
                        key
                    )))
                }
                Err(e) => {
                    error!(key = %key, error = %e, "Lock release failed after commit");
                    Err(TransactionError::LockRelease(e.to_string()))
                }
            },
            Err(e) => {
                if let Err(release_err) = released {
                    warn!(
                        key = %key,
                        error = %release_err,
                        "Lock release failed while propagating operation error"
                    );
                }
                Err(e)
            }
        }
    }

    async fn deposit_locked(
        &self,
        username: &str,
        amount: Decimal,
    ) -> Result<TransactionData, TransactionError> {
        const OP: &str = "Deposit";

        let tx = BalanceTransaction::completed(username, TransactionType::Deposit, amount, OP);
        let tx = self
            .stores
            .balances
            .create_transaction(tx)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let current = match self.stores.balances.get_balance(username).await {
            Ok(balance) => balance.current_balance,
            // First deposit creates the row
            Err(StoreError::NotFound) => Decimal::ZERO,
            Err(e) => return Err(TransactionError::database(OP, e)),
        };

        self.stores
            .balances
            .update_balance(username, current + amount)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let balance = self
            .stores
            .balances
            .get_balance(username)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        info!(
            target: "audit",
            username = %username,
            transaction_id = %tx.transaction_id,
            amount = %amount,
            balance = %balance.current_balance,
            "Deposit committed"
        );

        Ok(TransactionData::FundsMovement {
            transaction: tx,
            balance,
            amount,
        })
    }

    async fn withdraw_locked(
        &self,
        username: &str,
        amount: Decimal,
    ) -> Result<TransactionData, TransactionError> {
        const OP: &str = "Withdrawal";

        // A missing balance row is reported as a generic store failure;
        // the not-found detail stays at this layer.
        let current = self
            .stores
            .balances
            .get_balance(username)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        if current.current_balance < amount {
            return Err(TransactionError::InsufficientBalance {
                available: current.current_balance,
                requested: amount,
            });
        }

        let tx = BalanceTransaction::completed(username, TransactionType::Withdraw, amount, OP);
        let tx = self
            .stores
            .balances
            .create_transaction(tx)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let balance = self
            .stores
            .balances
            .update_balance(username, current.current_balance - amount)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        info!(
            target: "audit",
            username = %username,
            transaction_id = %tx.transaction_id,
            amount = %amount,
            balance = %balance.current_balance,
            "Withdrawal committed"
        );

        Ok(TransactionData::FundsMovement {
            transaction: tx,
            balance,
            amount,
        })
    }

    async fn buy_locked(&self, req: BuyOrderRequest) -> Result<TransactionData, TransactionError> {
        const OP: &str = "Buy order";

        let balance = match self.stores.balances.get_balance(&req.username).await {
            Ok(balance) => balance,
            Err(StoreError::NotFound) => {
                return Err(TransactionError::NotFound {
                    entity: "balance",
                    key: req.username.clone(),
                });
            }
            Err(e) => return Err(TransactionError::database(OP, e)),
        };

        if balance.current_balance < req.total_cost {
            return Err(TransactionError::InsufficientBalance {
                available: balance.current_balance,
                requested: req.total_cost,
            });
        }

        let order = Order::new(
            &req.username,
            req.order_type,
            &req.asset_id,
            req.quantity,
            req.price,
        );
        let order = self
            .stores
            .orders
            .create_order(order)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        // From here on a failure leaves the order row in place; the lock
        // window prevents concurrent double-spend, not partial failure.
        let tx = BalanceTransaction::completed_for_order(
            &req.username,
            TransactionType::BuyOrder,
            req.total_cost,
            &format!("Buy {} {}", req.quantity, req.asset_id),
            order.order_id,
        );
        let tx = self
            .stores
            .balances
            .create_transaction(tx)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        self.stores
            .balances
            .update_balance(&req.username, balance.current_balance - req.total_cost)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        self.stores
            .asset_balances
            .upsert_asset_balance(&req.username, &req.asset_id, req.quantity)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let asset_tx = AssetTransaction::completed(
            &req.username,
            &req.asset_id,
            AssetTransactionType::Buy,
            req.quantity,
            req.price,
            order.order_id,
        );
        self.stores
            .asset_transactions
            .create_asset_transaction(asset_tx)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        info!(
            target: "audit",
            username = %req.username,
            order_id = %order.order_id,
            asset_id = %req.asset_id,
            quantity = %req.quantity,
            total_cost = %req.total_cost,
            "Buy order committed"
        );

        Ok(TransactionData::OrderPlacement {
            order,
            transaction: tx,
        })
    }

    async fn sell_locked(&self, req: SellOrderRequest) -> Result<TransactionData, TransactionError> {
        const OP: &str = "Sell order";

        // Order creation comes first: a store failure here aborts the
        // whole operation before any balance or asset mutation.
        let order = Order::new(
            &req.username,
            req.order_type,
            &req.asset_id,
            req.quantity,
            req.price,
        );
        let order = self
            .stores
            .orders
            .create_order(order)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let tx = BalanceTransaction::completed_for_order(
            &req.username,
            TransactionType::SellOrder,
            req.asset_amount,
            &format!("Sell {} {}", req.quantity, req.asset_id),
            order.order_id,
        );
        let tx = self
            .stores
            .balances
            .create_transaction(tx)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let current = match self.stores.balances.get_balance(&req.username).await {
            Ok(balance) => balance.current_balance,
            Err(StoreError::NotFound) => Decimal::ZERO,
            Err(e) => return Err(TransactionError::database(OP, e)),
        };
        self.stores
            .balances
            .update_balance(&req.username, current + req.asset_amount)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        self.stores
            .asset_balances
            .upsert_asset_balance(&req.username, &req.asset_id, -req.quantity)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        let asset_tx = AssetTransaction::completed(
            &req.username,
            &req.asset_id,
            AssetTransactionType::Sell,
            req.quantity,
            req.price,
            order.order_id,
        );
        self.stores
            .asset_transactions
            .create_asset_transaction(asset_tx)
            .await
            .map_err(|e| TransactionError::database(OP, e))?;

        info!(
            target: "audit",
            username = %req.username,
            order_id = %order.order_id,
            asset_id = %req.asset_id,
            quantity = %req.quantity,
            proceeds = %req.asset_amount,
            "Sell order committed"
        );

        Ok(TransactionData::OrderPlacement {
            order,
            transaction: tx,
        })
    }
}

fn validate_username(username: &str) -> Result<(), TransactionError> {
    if username.trim().is_empty() {
        return Err(TransactionError::InvalidUsername);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::lock::{LocalLockStore, LockError, LockStore, LockToken};
    use crate::txn::store::{BalanceStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn manager_with(store: &Arc<MemoryStore>) -> TransactionManager {
        TransactionManager::new(
            StoreContext::from_memory(store),
            UserLockManager::in_process(Duration::from_secs(1)),
        )
    }

    /// Acquires normally, always fails the release
    struct FlakyReleaseLockStore {
        inner: LocalLockStore,
    }

    #[async_trait]
    impl LockStore for FlakyReleaseLockStore {
        async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockToken, LockError> {
            self.inner.acquire(key, timeout).await
        }

        async fn release(&self, token: LockToken) -> Result<bool, LockError> {
            let _ = self.inner.release(token).await;
            Err(LockError::Store("Simulated release failure".to_string()))
        }
    }

    #[tokio::test]
    async fn test_validation_rejected_before_lock_and_io() {
        let store = MemoryStore::new();
        let mgr = manager_with(&store);

        let err = mgr.deposit_funds("u1", Decimal::ZERO).await.unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAmount));

        let err = mgr.withdraw_funds("u1", dec("-5")).await.unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAmount));

        let err = mgr.deposit_funds("", dec("5")).await.unwrap_err();
        assert!(matches!(err, TransactionError::InvalidUsername));

        // Nothing reached the stores
        assert!(store.list_transactions("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_failure_fails_committed_operation() {
        let store = MemoryStore::new();
        let locks = UserLockManager::new(
            Arc::new(FlakyReleaseLockStore {
                inner: LocalLockStore::new(),
            }),
            Duration::from_secs(1),
        );
        let mgr = TransactionManager::new(StoreContext::from_memory(&store), locks);

        let err = mgr.deposit_funds("u1", dec("100")).await.unwrap_err();
        assert!(matches!(err, TransactionError::LockRelease(_)));

        // The mutation itself committed before the release failed
        let balance = store.get_balance("u1").await.unwrap();
        assert_eq!(balance.current_balance, dec("100"));
        assert_eq!(store.list_transactions("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_operation_error_wins_over_release_error() {
        let store = MemoryStore::new();
        store.set_fail_update_balance(true);
        let locks = UserLockManager::new(
            Arc::new(FlakyReleaseLockStore {
                inner: LocalLockStore::new(),
            }),
            Duration::from_secs(1),
        );
        let mgr = TransactionManager::new(StoreContext::from_memory(&store), locks);

        let err = mgr.deposit_funds("u1", dec("100")).await.unwrap_err();
        assert!(matches!(err, TransactionError::Database { .. }));
    }
}
