//! txn-core - Balance/Order Transaction Manager
//!
//! The write-coordination core of the order-processing platform: every
//! mutation of a user's cash balance or asset holdings goes through the
//! [`txn::TransactionManager`], serialized per user by an advisory lock.
//!
//! # Modules
//!
//! - [`models`] - Order entity and status state machine
//! - [`txn`] - Transaction manager, lock manager, stores, and entities
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing subscriber setup with an audit target

pub mod config;
pub mod logging;
pub mod models;
pub mod txn;

// Convenient re-exports at crate root
pub use config::{AppConfig, LockConfig};
pub use models::{Order, OrderStatus, OrderType};
pub use txn::{
    AssetBalance, AssetBalanceStore, AssetTransaction, AssetTransactionStore,
    AssetTransactionType, Balance, BalanceStore, BalanceTransaction, BuyOrderRequest,
    LocalLockStore, LockError, LockStore, MemoryStore, OrderStore, SellOrderRequest,
    StoreContext, StoreError, TransactionData, TransactionError, TransactionManager,
    TransactionResult, TransactionStatus, TransactionType, UserLockManager,
};
