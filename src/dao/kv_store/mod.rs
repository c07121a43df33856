/// CouchDB backend.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Process-local backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{env, sync::Arc, time::Duration};

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

pub use memory::MemoryStore;

/// Abstraction over the shared, TTL-capable key-value store every server instance talks to.
///
/// Keys are plain strings built by the repositories (`prefix + id`). Values are opaque
/// strings, in practice JSON documents.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the live value stored under `key`.
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Store `value` without an expiry, replacing any previous value.
    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Store `value` and (re)arm its expiry to `ttl` from now.
    fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether a live value exists under `key`.
    fn exists(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Store `value` only when no live value exists. Returns `true` when the write happened.
    fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete `key` only while it still holds `expected`. Returns `true` when a value was removed.
    fn delete_if_equals(&self, key: &str, expected: &str)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Ping the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Storage backend selected at startup through `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; only safe with a single server instance.
    Memory,
    /// CouchDB, configured through `COUCH_*` variables.
    #[cfg(feature = "couch-store")]
    Couch,
    /// MongoDB, configured through `MONGO_URI` and `MONGO_DB`.
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl StoreBackend {
    /// Read the backend choice from the environment, defaulting to the in-memory store.
    pub fn from_env() -> Self {
        match env::var("STORE_BACKEND")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => StoreBackend::Couch,
            #[cfg(feature = "mongo-store")]
            "mongo" | "mongodb" => StoreBackend::Mongo,
            "" | "memory" => StoreBackend::Memory,
            other => {
                tracing::warn!(backend = other, "unknown STORE_BACKEND; using in-memory store");
                StoreBackend::Memory
            }
        }
    }

    /// Open a connection to the selected backend.
    pub async fn connect(self) -> StorageResult<Arc<dyn KeyValueStore>> {
        match self {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            #[cfg(feature = "couch-store")]
            StoreBackend::Couch => {
                let config = couchdb::CouchConfig::from_env()?;
                let store = couchdb::CouchKvStore::connect(config).await?;
                Ok(Arc::new(store))
            }
            #[cfg(feature = "mongo-store")]
            StoreBackend::Mongo => {
                let config = mongodb::MongoConfig::from_env().await?;
                let store = mongodb::MongoKvStore::connect(config).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
