use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    config::QuestionSettings,
    dao::{
        kv_store::KeyValueStore,
        models::QuestionSetEntity,
        storage::{StorageError, StorageResult},
    },
};

/// Stores generated question sets under `prefix + id` with their own lifetime.
#[derive(Clone)]
pub struct QuestionRepository {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
}

impl QuestionRepository {
    /// Repository using the key layout and lifetime of `settings`.
    pub fn new(store: Arc<dyn KeyValueStore>, settings: &QuestionSettings) -> Self {
        Self {
            store,
            prefix: settings.key_prefix.clone(),
            ttl: settings.ttl,
        }
    }

    fn key(&self, id: Uuid) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Store `set`, re-arming its lifetime.
    pub async fn save(&self, set: &QuestionSetEntity) -> StorageResult<()> {
        let key = self.key(set.id);
        let raw = serde_json::to_string(set).map_err(|err| StorageError::corrupted(&key, err))?;
        self.store.set_with_expiry(&key, raw, self.ttl).await
    }

    /// Load a set; `None` once it expired.
    pub async fn load(&self, id: Uuid) -> StorageResult<Option<QuestionSetEntity>> {
        let key = self.key(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::corrupted(key, err))
    }
}
