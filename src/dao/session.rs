use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    config::SessionSettings,
    dao::{
        kv_store::KeyValueStore,
        storage::{StorageError, StorageResult},
    },
    state::session::Session,
};

/// Stores one JSON document per session under `prefix + code`.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
}

impl SessionRepository {
    /// Repository using the key layout and lifetime of `settings`.
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &SessionSettings) -> Self {
        Self {
            store,
            prefix: settings.key_prefix.clone(),
            ttl: settings.ttl,
        }
    }

    /// Store key of the session identified by `code`.
    pub fn key(&self, code: &str) -> String {
        format!("{}{}", self.prefix, code)
    }

    /// Whether a live session uses `code`.
    pub async fn exists(&self, code: &str) -> StorageResult<bool> {
        self.store.exists(&self.key(code)).await
    }

    /// Fetch and decode the session, `None` when absent or expired.
    pub async fn load(&self, code: &str) -> StorageResult<Option<Session>> {
        let key = self.key(code);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::corrupted(key, err))
    }

    /// Persist a brand-new session unless its code is already used. Returns whether it was written.
    pub async fn insert_new(&self, session: &Session) -> StorageResult<bool> {
        let key = self.key(&session.code);
        let raw =
            serde_json::to_string(session).map_err(|err| StorageError::corrupted(&key, err))?;
        self.store.set_if_absent(&key, raw, self.ttl).await
    }

    /// Persist the session and re-arm its expiry.
    pub async fn save(&self, session: &Session) -> StorageResult<()> {
        let key = self.key(&session.code);
        let raw =
            serde_json::to_string(session).map_err(|err| StorageError::corrupted(&key, err))?;
        self.store.set_with_expiry(&key, raw, self.ttl).await?;
        debug!(code = %session.code, status = ?session.status, "session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::kv_store::MemoryStore;

    fn repository(store: Arc<dyn KeyValueStore>) -> SessionRepository {
        SessionRepository::new(
            store,
            &SessionSettings {
                key_prefix: "test:session:".into(),
                ttl: Duration::from_secs(60),
                ..SessionSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn saved_session_loads_back() {
        let repo = repository(Arc::new(MemoryStore::new()));
        let session = Session::new("ABC123".into());

        repo.save(&session).await.unwrap();

        assert!(repo.exists("ABC123").await.unwrap());
        assert_eq!(repo.load("ABC123").await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn insert_new_refuses_taken_code() {
        let repo = repository(Arc::new(MemoryStore::new()));
        let session = Session::new("ABC123".into());

        assert!(repo.insert_new(&session).await.unwrap());
        assert!(!repo.insert_new(&session).await.unwrap());
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let repo = repository(Arc::new(MemoryStore::new()));
        assert_eq!(repo.load("ZZZ999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn undecodable_document_is_corrupted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store
            .set("test:session:ABC123", "not json".into())
            .await
            .unwrap();

        let err = repository(store).load("ABC123").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { key, .. } if key == "test:session:ABC123"));
    }

    #[tokio::test(start_paused = true)]
    async fn saving_refreshes_expiry() {
        let repo = repository(Arc::new(MemoryStore::new()));
        let session = Session::new("ABC123".into());

        repo.save(&session).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        repo.save(&session).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(repo.exists("ABC123").await.unwrap());

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!repo.exists("ABC123").await.unwrap());
    }
}
