//! Per-User Lock Manager
//!
//! One advisory lock per username serializes every balance-affecting
//! operation for that user; different users never contend. The lock store
//! is an injectable seam so deployments can swap the in-process store for
//! a distributed one without touching the transaction manager.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Lock store errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out acquiring lock {key} after {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    #[error("Lock store error: {0}")]
    Store(String),
}

/// Token proving ownership of an acquired lock
///
/// For the in-process store the token owns the mutex guard, so dropping
/// the token on any exit path (including panic or task cancellation)
/// frees the lock.
pub struct LockToken {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LockToken {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockToken")
            .field("key", &self.key)
            .field("held", &self.guard.is_some())
            .finish()
    }
}

/// Named advisory lock store
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Acquire the lock for `key`, waiting at most `timeout`
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockToken, LockError>;

    /// Release a previously acquired lock
    ///
    /// Returns `false` when the lock was no longer held at release time.
    async fn release(&self, token: LockToken) -> Result<bool, LockError>;
}

/// In-process lock store over named tokio mutexes
///
/// Cells are created on first use and kept for the process lifetime;
/// the map is bounded by the number of distinct users seen.
#[derive(Default)]
pub struct LocalLockStore {
    cells: DashMap<String, Arc<Mutex<()>>>,
}

impl LocalLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for LocalLockStore {
    async fn acquire(&self, key: &str, timeout: Duration) -> Result<LockToken, LockError> {
        let cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        match tokio::time::timeout(timeout, cell.lock_owned()).await {
            Ok(guard) => Ok(LockToken {
                key: key.to_string(),
                guard: Some(guard),
            }),
            Err(_) => Err(LockError::Timeout {
                key: key.to_string(),
                timeout,
            }),
        }
    }

    async fn release(&self, token: LockToken) -> Result<bool, LockError> {
        let held = token.guard.is_some();
        drop(token);
        Ok(held)
    }
}

/// A lock currently held for one user
///
/// Records the acquisition instant so callers can report how long the
/// lock was held.
pub struct HeldLock {
    token: LockToken,
    acquired_at: Instant,
}

impl HeldLock {
    pub fn key(&self) -> &str {
        self.token.key()
    }

    /// Time elapsed since acquisition
    pub fn held(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// Per-user lock manager
///
/// Derives the resource key from the username and applies the configured
/// acquisition timeout. A failed acquisition is transient and surfaces
/// immediately; retry policy belongs to the caller.
pub struct UserLockManager {
    store: Arc<dyn LockStore>,
    timeout: Duration,
}

impl UserLockManager {
    pub fn new(store: Arc<dyn LockStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Manager backed by the in-process store
    pub fn in_process(timeout: Duration) -> Self {
        Self::new(Arc::new(LocalLockStore::new()), timeout)
    }

    /// Resource key serializing all mutations for one user
    pub fn resource_key(username: &str) -> String {
        format!("user:{}", username)
    }

    pub async fn acquire_user(&self, username: &str) -> Result<HeldLock, LockError> {
        let key = Self::resource_key(username);
        let token = self.store.acquire(&key, self.timeout).await?;
        debug!(key = %key, "User lock acquired");
        Ok(HeldLock {
            token,
            acquired_at: Instant::now(),
        })
    }

    pub async fn release(&self, lock: HeldLock) -> Result<bool, LockError> {
        let key = lock.token.key().to_string();
        let released = self.store.release(lock.token).await?;
        debug!(key = %key, released = released, "User lock released");
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key() {
        assert_eq!(UserLockManager::resource_key("u1"), "user:u1");
    }

    #[tokio::test]
    async fn test_acquire_release_cycle() {
        let store = LocalLockStore::new();

        let token = store
            .acquire("user:u1", Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(token.key(), "user:u1");
        assert!(store.release(token).await.unwrap());

        // Reacquirable after release
        let token = store
            .acquire("user:u1", Duration::from_millis(100))
            .await
            .unwrap();
        assert!(store.release(token).await.unwrap());
    }

    #[tokio::test]
    async fn test_contended_acquire_times_out() {
        let store = LocalLockStore::new();

        let held = store
            .acquire("user:u1", Duration::from_millis(100))
            .await
            .unwrap();

        let err = store
            .acquire("user:u1", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));

        store.release(held).await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let store = LocalLockStore::new();

        let a = store
            .acquire("user:alice", Duration::from_millis(50))
            .await
            .unwrap();
        let b = store
            .acquire("user:bob", Duration::from_millis(50))
            .await
            .unwrap();

        store.release(a).await.unwrap();
        store.release(b).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_token_frees_lock() {
        let store = LocalLockStore::new();

        {
            let _token = store
                .acquire("user:u1", Duration::from_millis(50))
                .await
                .unwrap();
            // Dropped without an explicit release
        }

        let token = store
            .acquire("user:u1", Duration::from_millis(50))
            .await
            .unwrap();
        store.release(token).await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_reports_held_duration() {
        let manager = UserLockManager::in_process(Duration::from_millis(100));

        let lock = manager.acquire_user("u1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(lock.held() >= Duration::from_millis(10));
        assert!(manager.release(lock).await.unwrap());
    }
}
