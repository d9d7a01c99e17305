//! Cache storage seam and the in-memory backend.
//!
//! The engine assumes a single shared store with linearizable per-key
//! `get`/`set`/`delete`. Locking is optional: backends without a locking
//! primitive keep the default `try_lock` that reports no support, and the
//! patch path falls back to unlocked read-modify-write.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

/// Opaque handle for a held named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub key: String,
    pub id: Uuid,
}

/// Key-value store holding serialized snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Duration);

    async fn delete(&self, key: &str);

    /// Acquire a named lock with the given expiry. The default reports no
    /// locking support so callers take the unlocked path.
    async fn try_lock(&self, _key: &str, _ttl: Duration) -> Option<LockToken> {
        None
    }

    /// Release a lock acquired with [`CacheStore::try_lock`]. The default is
    /// a no-op for backends without locking.
    async fn unlock(&self, _token: LockToken) {}
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

struct LockEntry {
    id: Uuid,
    expires_at: Instant,
}

/// In-memory cache store for single-process deployments and tests.
///
/// TTLs are enforced lazily on read; a zero TTL means no expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    locks: DashMap<String, LockEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.expired() {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expired());
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries.insert(key.to_string(), Entry { value, expires_at });
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> Option<LockToken> {
        let now = Instant::now();
        let mut acquired = None;
        let entry = self
            .locks
            .entry(key.to_string())
            .and_modify(|lock| {
                if now >= lock.expires_at {
                    lock.id = Uuid::new_v4();
                    lock.expires_at = now + ttl;
                    acquired = Some(lock.id);
                }
            })
            .or_insert_with(|| {
                let id = Uuid::new_v4();
                acquired = Some(id);
                LockEntry {
                    id,
                    expires_at: now + ttl,
                }
            });
        drop(entry);

        acquired.map(|id| LockToken {
            key: key.to_string(),
            id,
        })
    }

    async fn unlock(&self, token: LockToken) {
        self.locks.remove_if(&token.key, |_, lock| lock.id == token.id);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn roundtrip() {
        let store = MemoryCache::new();

        assert!(store.get("k").await.is_none());

        store.set("k", json!({"a": 1}), Duration::ZERO).await;
        assert_eq!(store.get("k").await, Some(json!({"a": 1})));

        store.delete("k").await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let store = MemoryCache::new();

        store.set("k", json!(true), Duration::from_millis(5)).await;
        assert!(store.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get("k").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_never_expires() {
        let store = MemoryCache::new();

        store.set("k", json!(1), Duration::ZERO).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.get("k").await.is_some());
    }

    #[tokio::test]
    async fn lock_excludes_second_holder() {
        let store = MemoryCache::new();

        let token = store.try_lock("k", Duration::from_secs(5)).await;
        assert!(token.is_some());

        assert!(store.try_lock("k", Duration::from_secs(5)).await.is_none());

        store.unlock(token.unwrap()).await;
        assert!(store.try_lock("k", Duration::from_secs(5)).await.is_some());
    }

    #[tokio::test]
    async fn expired_lock_can_be_reacquired() {
        let store = MemoryCache::new();

        let first = store.try_lock("k", Duration::from_millis(5)).await;
        assert!(first.is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = store.try_lock("k", Duration::from_secs(5)).await;
        assert!(second.is_some());

        // The stale token no longer matches and must not release the new lock.
        store.unlock(first.unwrap()).await;
        assert!(store.try_lock("k", Duration::from_secs(5)).await.is_none());
        store.unlock(second.unwrap()).await;
    }
}
