use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use mongodb::{
    Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    config::MongoConfig,
    connection::{entries, open_database},
    error::{MongoDaoError, MongoResult},
    models::{MongoEntryDocument, expired_filter, key_filter, live_filter},
};
use crate::dao::{kv_store::KeyValueStore, storage::StorageResult};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Key-value store keeping one MongoDB document per key.
#[derive(Clone)]
pub struct MongoKvStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoKvStore {
    /// Connect to MongoDB; the entries collection gets its TTL index on the way.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = open_database(&config).await?;
        Ok(Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        })
    }

    async fn collection(&self) -> Collection<MongoEntryDocument> {
        let database = self.inner.database.read().await;
        entries(&database, &self.inner.config)
    }

    async fn find_live(&self, key: &str) -> MongoResult<Option<MongoEntryDocument>> {
        self.collection()
            .await
            .find_one(live_filter(key))
            .await
            .map_err(|source| MongoDaoError::Read {
                key: key.to_owned(),
                source,
            })
    }

    async fn upsert(&self, key: &str, value: String, ttl: Option<Duration>) -> MongoResult<()> {
        let document = MongoEntryDocument::new(key, value, ttl);
        self.collection()
            .await
            .replace_one(key_filter(key), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                key: key.to_owned(),
                source,
            })?;
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: String, ttl: Duration) -> MongoResult<bool> {
        let collection = self.collection().await;

        // Clear an expired holder the TTL monitor has not swept yet.
        collection
            .delete_one(expired_filter(key))
            .await
            .map_err(|source| MongoDaoError::Delete {
                key: key.to_owned(),
                source,
            })?;

        let document = MongoEntryDocument::new(key, value, Some(ttl));
        match collection.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                key: key.to_owned(),
                source,
            }),
        }
    }

    async fn delete_matching(&self, key: &str, expected: &str) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(doc! { "_id": key, "value": expected })
            .await
            .map_err(|source| MongoDaoError::Delete {
                key: key.to_owned(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn ping(&self) -> MongoResult<()> {
        let database = self.inner.database.read().await.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = open_database(&self.inner.config).await?;
        *self.inner.database.write().await = database;
        info!("MongoDB connection re-established");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl KeyValueStore for MongoKvStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let document = store.find_live(&key).await?;
            Ok(document.map(|doc| doc.value))
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move { store.upsert(&key, value, None).await.map_err(Into::into) })
    }

    fn set_with_expiry(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move {
            store
                .upsert(&key, value, Some(ttl))
                .await
                .map_err(Into::into)
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move { Ok(store.find_live(&key).await?.is_some()) })
    }

    fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move {
            store
                .insert_if_absent(&key, value, ttl)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_if_equals(
        &self,
        key: &str,
        expected: &str,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let key = key.to_owned();
        let expected = expected.to_owned();
        Box::pin(async move {
            store
                .delete_matching(&key, &expected)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reconnect().await.map_err(Into::into) })
    }
}
