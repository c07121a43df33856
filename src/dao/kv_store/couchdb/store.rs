use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};

use crate::dao::{kv_store::KeyValueStore, storage::StorageResult};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchEntryDocument, entry_doc_id, now_ms},
};

/// Attempts made by an unconditional write before giving up on revision conflicts.
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Key-value store persisting one CouchDB document per key.
///
/// Expiry is enforced on read (CouchDB has no native TTL); conditional writes rely on
/// CouchDB's revision check, where creating a document that already exists yields `409`.
#[derive(Clone)]
pub struct CouchKvStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchKvStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|(user, pass)| (Arc::<str>::from(user), Arc::<str>::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, doc_id: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), doc_id);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::Database {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another instance created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document(&self, doc_id: &str) -> CouchResult<Option<CouchEntryDocument>> {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                doc_id: doc_id.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchEntryDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeDocument {
                    doc_id: doc_id.to_owned(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                doc_id: doc_id.to_owned(),
                status: other,
            }),
        }
    }

    async fn get_live_document(&self, key: &str) -> CouchResult<Option<CouchEntryDocument>> {
        let doc = self.get_document(&entry_doc_id(key)).await?;
        Ok(doc.filter(|doc| doc.is_live(now_ms())))
    }

    /// PUT a document. Returns `false` when CouchDB reports a revision conflict.
    async fn put_document(&self, document: &CouchEntryDocument) -> CouchResult<bool> {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                doc_id: document.id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                doc_id: document.id.clone(),
                status: other,
            }),
        }
    }

    /// DELETE a specific revision. Returns `false` when the revision is gone or stale.
    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<bool> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                doc_id: doc_id.to_owned(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                doc_id: doc_id.to_owned(),
                status: other,
            }),
        }
    }

    async fn write(&self, key: &str, value: String, ttl: Option<Duration>) -> CouchResult<()> {
        let mut document = CouchEntryDocument::new(key, value, ttl);
        for _ in 0..MAX_WRITE_ATTEMPTS {
            document.rev = self
                .get_document(&document.id)
                .await?
                .and_then(|existing| existing.rev);
            if self.put_document(&document).await? {
                return Ok(());
            }
        }

        Err(CouchDaoError::RevisionConflict {
            doc_id: document.id,
            attempts: MAX_WRITE_ATTEMPTS,
        })
    }

    async fn write_if_absent(&self, key: &str, value: String, ttl: Duration) -> CouchResult<bool> {
        let mut document = CouchEntryDocument::new(key, value, Some(ttl));
        match self.get_document(&document.id).await? {
            Some(existing) if existing.is_live(now_ms()) => return Ok(false),
            // Taking over an expired entry must name its revision; a concurrent
            // taker bumps it and turns our PUT into a conflict.
            Some(expired) => document.rev = expired.rev,
            None => {}
        }
        self.put_document(&document).await
    }

    async fn remove_if_equals(&self, key: &str, expected: &str) -> CouchResult<bool> {
        let Some(document) = self.get_live_document(key).await? else {
            return Ok(false);
        };
        if document.value != expected {
            return Ok(false);
        }
        match document.rev {
            Some(rev) => self.delete_document(&document.id, &rev).await,
            None => Ok(false),
        }
    }

    async fn ping(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::Database {
                database: self.database.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::DatabaseStatus {
                database: self.database.to_string(),
                status: response.status(),
            })
        }
    }
}

impl KeyValueStore for CouchKvStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move {
            let document = store.get_live_document(&key).await?;
            Ok(document.map(|doc| doc.value))
        })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move { store.write(&key, value, None).await.map_err(Into::into) })
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
                .write(&key, value, Some(ttl))
                .await
                .map_err(Into::into)
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let key = key.to_owned();
        Box::pin(async move { Ok(store.get_live_document(&key).await?.is_some()) })
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
                .write_if_absent(&key, value, ttl)
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
                .remove_if_equals(&key, &expected)
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
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
