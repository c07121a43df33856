use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::LockSettings,
    dao::{kv_store::KeyValueStore, storage::StorageError},
};

/// Errors raised while acquiring a distributed lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder kept the lock for the whole acquisition window.
    #[error("lock `{name}` is busy")]
    Busy {
        /// Store key of the lock.
        name: String,
    },
    /// The store could not be reached while acquiring.
    #[error("lock store unavailable")]
    Storage(#[from] StorageError),
}

/// Named mutual-exclusion lock shared by every server instance through the key-value store.
///
/// The lock is a key written with `set_if_absent` and a hold timeout. Each holder writes
/// a unique token so that release never removes a lock that expired and was taken over.
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    name: String,
    hold_timeout: Duration,
    acquire_wait: Duration,
    retry_interval: Duration,
}

impl DistributedLock {
    /// Lock keyed by `settings.key_prefix + name`.
    pub fn new(store: Arc<dyn KeyValueStore>, name: &str, settings: &LockSettings) -> Self {
        Self {
            store,
            name: format!("{}{}", settings.key_prefix, name),
            hold_timeout: settings.hold_timeout,
            acquire_wait: settings.acquire_wait,
            retry_interval: settings.retry_interval,
        }
    }

    /// Store key backing this lock.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll the store until the lock is taken or the acquisition window closes.
    pub async fn acquire(&self) -> Result<LockGuard, LockError> {
        let token = Uuid::new_v4().to_string();
        let deadline = Instant::now() + self.acquire_wait;

        loop {
            if self
                .store
                .set_if_absent(&self.name, token.clone(), self.hold_timeout)
                .await?
            {
                debug!(lock = %self.name, "lock acquired");
                return Ok(LockGuard {
                    store: self.store.clone(),
                    name: self.name.clone(),
                    token,
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::Busy {
                    name: self.name.clone(),
                });
            }
            sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    /// Run `work` while holding the lock. The lock is released on every exit path of `work`.
    pub async fn run<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let guard = self.acquire().await?;
        let outcome = work().await;
        guard.release().await;
        outcome
    }
}

/// Proof of ownership of a [`DistributedLock`].
///
/// Dropping the guard without calling [`LockGuard::release`] leaves the key to expire on its own.
pub struct LockGuard {
    store: Arc<dyn KeyValueStore>,
    name: String,
    token: String,
}

impl LockGuard {
    /// Release the lock. Failures are logged and swallowed; the hold timeout is the backstop.
    pub async fn release(self) {
        match self.store.delete_if_equals(&self.name, &self.token).await {
            Ok(true) => debug!(lock = %self.name, "lock released"),
            Ok(false) => warn!(
                lock = %self.name,
                "lock expired before release; another holder may have taken it"
            ),
            Err(err) => warn!(
                lock = %self.name,
                error = %err,
                "failed to release lock; relying on hold timeout"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dao::kv_store::MemoryStore;

    fn settings() -> LockSettings {
        LockSettings {
            key_prefix: "test:lock:".into(),
            hold_timeout: Duration::from_secs(5),
            acquire_wait: Duration::from_millis(200),
            retry_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquirer_times_out_as_busy() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store, "ABC123", &settings());

        let _held = lock.acquire().await.unwrap();
        let err = lock.acquire().await.err().unwrap();
        assert!(matches!(err, LockError::Busy { name } if name == "test:lock:ABC123"));
    }

    #[tokio::test(start_paused = true)]
    async fn released_lock_can_be_taken_again() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store, "ABC123", &settings());

        lock.acquire().await.unwrap().release().await;
        assert!(lock.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_lock_expires_after_hold_timeout() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store, "ABC123", &settings());

        let abandoned = lock.acquire().await.unwrap();
        drop(abandoned);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(lock.acquire().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_guard_does_not_release_new_holder() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone(), "ABC123", &settings());

        let stale = lock.acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        let _fresh = lock.acquire().await.unwrap();

        stale.release().await;
        assert!(store.exists("test:lock:ABC123").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn run_releases_after_failed_work() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let lock = DistributedLock::new(store.clone(), "ABC123", &settings());
        let calls = AtomicUsize::new(0);

        let outcome: Result<(), LockError> = lock
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LockError::Busy {
                    name: "inner".into(),
                })
            })
            .await;

        assert!(outcome.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!store.exists("test:lock:ABC123").await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_surfaces_storage_error() {
        let memory = MemoryStore::new();
        memory.set_offline(true);
        let store: Arc<dyn KeyValueStore> = Arc::new(memory);
        let lock = DistributedLock::new(store, "ABC123", &settings());

        assert!(matches!(
            lock.acquire().await.err().unwrap(),
            LockError::Storage(_)
        ));
    }
}
