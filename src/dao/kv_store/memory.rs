//! Process-local [`KeyValueStore`] used for single-instance deployments and tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::dao::{
    kv_store::KeyValueStore,
    storage::{StorageError, StorageResult},
};

/// Minimum delay between two full sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Failure reported while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct MemoryStoreOffline;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Key-value store backed by a concurrent hash map.
///
/// Expired values are hidden on read and physically removed by a sweep that writes trigger
/// at most once every 30 seconds.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    offline: Arc<AtomicBool>,
    next_sweep: Arc<Mutex<Instant>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
            offline: Arc::default(),
            next_sweep: Arc::new(Mutex::new(Instant::now() + SWEEP_INTERVAL)),
        }
    }
}

impl MemoryStore {
    /// Empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones not yet swept included.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "swept expired in-memory entries");
        }
        removed
    }

    fn sweep_if_due(&self, now: Instant) {
        {
            let Ok(mut next_sweep) = self.next_sweep.lock() else {
                return;
            };
            if now < *next_sweep {
                return;
            }
            *next_sweep = now + SWEEP_INTERVAL;
        }
        self.purge_expired();
    }

    /// Simulate an outage: every call fails with [`StorageError::Unavailable`] while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store switched offline".into(),
                MemoryStoreOffline,
            ));
        }
        Ok(())
    }

    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.ensure_online()?;
        let now = Instant::now();
        let live = self
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match live {
            Some(Some(value)) => Ok(Some(value)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: String, ttl: Option<Duration>) -> StorageResult<()> {
        self.ensure_online()?;
        let now = Instant::now();
        self.sweep_if_due(now);
        let expires_at = ttl.map(|ttl| now + ttl);
        self.entries
            .insert(key.to_owned(), StoredValue { value, expires_at });
        Ok(())
    }

    fn write_if_absent(&self, key: &str, value: String, ttl: Duration) -> StorageResult<bool> {
        self.ensure_online()?;
        let now = Instant::now();
        self.sweep_if_due(now);
        let fresh = StoredValue {
            value,
            expires_at: Some(now + ttl),
        };

        let written = match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    false
                } else {
                    occupied.insert(fresh);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        };
        Ok(written)
    }

    fn remove_if_equals(&self, key: &str, expected: &str) -> StorageResult<bool> {
        self.ensure_online()?;
        let now = Instant::now();
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.is_live(now) && entry.value == expected)
            .is_some())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let result = self.read(key);
        Box::pin(async move { result })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(key, value, None);
        Box::pin(async move { result })
    }

    fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.write(key, value, Some(ttl));
        Box::pin(async move { result })
    }

    fn exists(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let result = self.read(key).map(|value| value.is_some());
        Box::pin(async move { result })
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let result = self.write_if_absent(key, value, ttl);
        Box::pin(async move { result })
    }

    fn delete_if_equals(
        &self,
        key: &str,
        expected: &str,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let result = self.remove_if_equals(key, expected);
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online();
        Box::pin(async move { result })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online();
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k", "v".into(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_refreshes_the_expiry() {
        let store = MemoryStore::new();
        store
            .set_with_expiry("k", "v1".into(), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store
            .set_with_expiry("k", "v2".into(), Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn set_without_expiry_persists() {
        let store = MemoryStore::new();
        store.set("k", "v".into()).await.unwrap();
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_only_wins_once_until_expiry() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);

        assert!(store.set_if_absent("lock", "a".into(), ttl).await.unwrap());
        assert!(!store.set_if_absent("lock", "b".into(), ttl).await.unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.set_if_absent("lock", "b".into(), ttl).await.unwrap());
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn delete_if_equals_checks_the_holder() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        store.set_if_absent("lock", "a".into(), ttl).await.unwrap();

        assert!(!store.delete_if_equals("lock", "b").await.unwrap());
        assert!(store.delete_if_equals("lock", "a").await.unwrap());
        assert!(!store.exists("lock").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_swept_by_later_writes() {
        let store = MemoryStore::new();
        for index in 0..1000 {
            store
                .set_with_expiry(&format!("session:{index}"), "{}".into(), Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert_eq!(store.entry_count(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store
            .set_with_expiry("other", "v".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("v"));

        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_keeps_live_and_persistent_entries() {
        let store = MemoryStore::new();
        store.set("pool", "v".into()).await.unwrap();
        store
            .set_with_expiry("short", "v".into(), Duration::from_secs(5))
            .await
            .unwrap();
        store
            .set_with_expiry("long", "v".into(), Duration::from_secs(500))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.entry_count(), 2);
        assert!(store.exists("pool").await.unwrap());
        assert!(store.exists("long").await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_offline(true);

        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert!(store.health_check().await.is_err());

        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
