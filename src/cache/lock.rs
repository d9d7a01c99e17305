//! Best-effort mutual exclusion around snapshot patches.
//!
//! The backend may not offer atomic partial updates on map-valued entries,
//! so the read-modify-write cycle of a patch runs under a short-lived named
//! lock keyed identically to the cache key. Backends without a locking
//! primitive fall back to the unlocked path.

use std::time::Duration;

use tracing::debug;

use super::keys::SnapshotKey;
use super::store::{CacheStore, LockToken};

/// Held for the duration of one patch; `None` means the unlocked fallback.
pub(crate) struct PatchLock {
    token: Option<LockToken>,
}

pub(crate) async fn acquire(
    store: &dyn CacheStore,
    key: &SnapshotKey,
    ttl: Duration,
) -> PatchLock {
    let token = store.try_lock(&key.lock_key(), ttl).await;
    if token.is_none() {
        debug!(
            snapshot_key = %key,
            "Patch lock unavailable, proceeding with unlocked read-modify-write"
        );
    }
    PatchLock { token }
}

pub(crate) async fn release(store: &dyn CacheStore, lock: PatchLock) {
    if let Some(token) = lock.token {
        store.unlock(token).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCache;

    #[tokio::test]
    async fn acquire_and_release() {
        let store = MemoryCache::new();
        let key = SnapshotKey::new("alpha", 1);

        let lock = acquire(&store, &key, Duration::from_secs(5)).await;
        assert!(lock.token.is_some());

        // Second acquisition degrades to the unlocked path.
        let fallback = acquire(&store, &key, Duration::from_secs(5)).await;
        assert!(fallback.token.is_none());

        release(&store, lock).await;
        let reacquired = acquire(&store, &key, Duration::from_secs(5)).await;
        assert!(reacquired.token.is_some());
        release(&store, reacquired).await;
    }

    struct NoLockStore;

    #[async_trait::async_trait]
    impl CacheStore for NoLockStore {
        async fn get(&self, _key: &str) -> Option<serde_json::Value> {
            None
        }
        async fn set(&self, _key: &str, _value: serde_json::Value, _ttl: Duration) {}
        async fn delete(&self, _key: &str) {}
    }

    #[tokio::test]
    async fn backend_without_locking_falls_back() {
        let store = NoLockStore;
        let key = SnapshotKey::new("alpha", 1);

        let lock = acquire(&store, &key, Duration::from_secs(5)).await;
        assert!(lock.token.is_none());
        release(&store, lock).await;
    }
}
