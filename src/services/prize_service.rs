use tracing::{info, warn};

use crate::{
    config::PrizeSeed,
    dao::{models::PrizeEntity, prize::PrizeRepository},
    dto::prize::{DrawResponse, PrizeListResponse, PrizeSummary},
    error::ServiceError,
    state::SharedState,
};

/// Every prize ordered by id, with the total remaining stock.
pub async fn list_prizes(state: &SharedState) -> Result<PrizeListResponse, ServiceError> {
    let pool = state.prize_repository().await?.load().await?;
    let mut prizes: Vec<&PrizeEntity> = pool.prizes.iter().collect();
    prizes.sort_by_key(|prize| prize.id);

    Ok(PrizeListResponse {
        remaining: prizes.iter().map(|prize| u64::from(prize.stock)).sum(),
        prizes: prizes.into_iter().map(PrizeSummary::from).collect(),
    })
}

/// Pick a prize uniformly among those in stock and decrement it, atomically across instances.
pub async fn draw_prize(state: &SharedState) -> Result<DrawResponse, ServiceError> {
    let repository = state.prize_repository().await?;
    let lock = state.prize_lock().await?;
    let repository = &repository;

    lock.run(|| async move {
        let mut pool = repository.load().await?;
        pool.prizes.sort_by_key(|prize| prize.id);

        let available: Vec<usize> = pool
            .prizes
            .iter()
            .enumerate()
            .filter(|(_, prize)| prize.stock > 0)
            .map(|(index, _)| index)
            .collect();
        if available.is_empty() {
            warn!("prize draw attempted on an exhausted pool");
            return Err(ServiceError::Exhausted("no prizes left".into()));
        }

        let picked = available[state.random().pick_index(available.len())];
        let prize = &mut pool.prizes[picked];
        prize.stock -= 1;
        let summary = PrizeSummary::from(&*prize);
        repository.save(&pool).await?;

        info!(prize_id = summary.id, remaining = summary.stock, "prize drawn");
        Ok::<_, ServiceError>(DrawResponse { prize: summary })
    })
    .await
}

/// Seed the pool from configuration when the store holds none.
pub async fn seed_pool(repository: &PrizeRepository, seeds: &[PrizeSeed]) {
    if let Err(err) = repository.seed_if_empty(seeds).await {
        warn!(error = %err, "failed to seed prize pool");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv_store::MemoryStore,
        services::question_service::LlmQuestionGenerator,
        state::{AppState, roles::ThreadRandom},
    };

    async fn state_with_pool(seeds: &[(&str, u32)]) -> SharedState {
        let state = AppState::with_parts(
            AppConfig::default(),
            Arc::new(ThreadRandom),
            Arc::new(LlmQuestionGenerator::disabled()),
        );
        state.set_kv_store(Arc::new(MemoryStore::new())).await;
        let seeds: Vec<PrizeSeed> = seeds
            .iter()
            .map(|(name, stock)| PrizeSeed {
                name: (*name).into(),
                stock: *stock,
            })
            .collect();
        seed_pool(&state.prize_repository().await.unwrap(), &seeds).await;
        state
    }

    #[tokio::test]
    async fn draws_until_exhausted() {
        let state = state_with_pool(&[("Sticker", 2), ("Mug", 0), ("Pin", 1)]).await;

        let mut drawn = Vec::new();
        for _ in 0..3 {
            drawn.push(draw_prize(&state).await.unwrap().prize.name);
        }
        drawn.sort();
        assert_eq!(drawn, vec!["Pin", "Sticker", "Sticker"]);

        assert!(matches!(
            draw_prize(&state).await,
            Err(ServiceError::Exhausted(_))
        ));
        assert_eq!(list_prizes(&state).await.unwrap().remaining, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_draws_never_oversell() {
        let state = state_with_pool(&[("Sticker", 5), ("Pin", 3)]).await;

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { draw_prize(&state).await })
            })
            .collect();

        let mut won = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(ServiceError::Exhausted(_)) => exhausted += 1,
                Err(other) => panic!("unexpected draw failure: {other}"),
            }
        }

        assert_eq!(won, 8);
        assert_eq!(exhausted, 4);
        assert_eq!(list_prizes(&state).await.unwrap().remaining, 0);
    }

    #[tokio::test]
    async fn listing_empty_pool_is_empty() {
        let state = state_with_pool(&[]).await;
        let listing = list_prizes(&state).await.unwrap();
        assert!(listing.prizes.is_empty());
        assert_eq!(listing.remaining, 0);
    }
}
