//! Balance/Order Transaction Core
//!
//! Atomically mutates a user's cash balance and asset holdings for
//! deposits, withdrawals, and buy/sell orders, with no lost updates
//! under concurrent requests from the same user.
//!
//! # Architecture
//!
//! ```text
//! caller ──► TransactionManager ──► UserLockManager ──► LockStore
//!                     │
//!                     └──► StoreContext ──► Balance / Order / Asset stores
//! ```
//!
//! # Safety Invariants
//!
//! 1. **One lock per user**: every balance-affecting operation for a
//!    username runs under the same advisory lock; users never share locks
//! 2. **Check-under-lock**: sufficiency checks read the balance inside
//!    the locked section, never from an earlier unlocked read
//! 3. **Release-on-every-path**: success, business rejection, and store
//!    failure all release the lock before the result propagates
//! 4. **One ledger entry per mutation**: each balance delta is mirrored
//!    by exactly one append-only ledger row in the same locked section

pub mod error;
pub mod lock;
pub mod manager;
pub mod result;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use error::TransactionError;
pub use lock::{HeldLock, LocalLockStore, LockError, LockStore, LockToken, UserLockManager};
pub use manager::TransactionManager;
pub use result::{TransactionData, TransactionResult};
pub use store::{
    AssetBalanceStore, AssetTransactionStore, BalanceStore, MemoryStore, OrderStore, StoreContext,
    StoreError,
};
pub use types::{
    AssetBalance, AssetTransaction, AssetTransactionType, Balance, BalanceTransaction,
    BuyOrderRequest, SellOrderRequest, TransactionStatus, TransactionType,
};
