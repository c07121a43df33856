use std::sync::Arc;

use tracing::info;

use crate::{
    config::PrizeSeed,
    dao::{
        kv_store::KeyValueStore,
        models::{PrizeEntity, PrizePoolEntity},
        storage::{StorageError, StorageResult},
    },
};

/// Store key of the prize pool document.
pub const PRIZE_POOL_KEY: &str = "prize:pool";

/// Reads and writes the prize pool document. Callers serialize writes with the draw lock.
#[derive(Clone)]
pub struct PrizeRepository {
    store: Arc<dyn KeyValueStore>,
}

impl PrizeRepository {
    /// Repository over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current pool, empty when nothing was stored yet.
    pub async fn load(&self) -> StorageResult<PrizePoolEntity> {
        let Some(raw) = self.store.get(PRIZE_POOL_KEY).await? else {
            return Ok(PrizePoolEntity::default());
        };
        serde_json::from_str(&raw).map_err(|err| StorageError::corrupted(PRIZE_POOL_KEY, err))
    }

    /// Persist the pool without expiry.
    pub async fn save(&self, pool: &PrizePoolEntity) -> StorageResult<()> {
        let raw = serde_json::to_string(pool)
            .map_err(|err| StorageError::corrupted(PRIZE_POOL_KEY, err))?;
        self.store.set(PRIZE_POOL_KEY, raw).await
    }

    /// Write `seeds` as the pool when none exists. Returns whether the pool was seeded.
    pub async fn seed_if_empty(&self, seeds: &[PrizeSeed]) -> StorageResult<bool> {
        if seeds.is_empty() || self.store.exists(PRIZE_POOL_KEY).await? {
            return Ok(false);
        }

        let pool = PrizePoolEntity {
            prizes: seeds
                .iter()
                .zip(1..)
                .map(|(seed, id)| PrizeEntity {
                    id,
                    name: seed.name.clone(),
                    stock: seed.stock,
                })
                .collect(),
        };
        self.save(&pool).await?;
        info!(prizes = pool.prizes.len(), "prize pool seeded");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::kv_store::MemoryStore;

    fn seeds() -> Vec<PrizeSeed> {
        vec![
            PrizeSeed {
                name: "Sticker".into(),
                stock: 3,
            },
            PrizeSeed {
                name: "Mug".into(),
                stock: 1,
            },
        ]
    }

    #[tokio::test]
    async fn seeding_assigns_sequential_ids() {
        let repo = PrizeRepository::new(Arc::new(MemoryStore::new()));

        assert!(repo.seed_if_empty(&seeds()).await.unwrap());

        let pool = repo.load().await.unwrap();
        let ids: Vec<u32> = pool.prizes.iter().map(|prize| prize.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(pool.prizes[1].name, "Mug");
    }

    #[tokio::test]
    async fn existing_pool_is_not_reseeded() {
        let repo = PrizeRepository::new(Arc::new(MemoryStore::new()));
        repo.seed_if_empty(&seeds()).await.unwrap();

        let mut pool = repo.load().await.unwrap();
        pool.prizes[0].stock = 0;
        repo.save(&pool).await.unwrap();

        assert!(!repo.seed_if_empty(&seeds()).await.unwrap());
        assert_eq!(repo.load().await.unwrap().prizes[0].stock, 0);
    }
}
