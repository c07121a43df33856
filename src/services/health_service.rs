use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the key-value store and report it together with the degraded flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let reachable = match state.kv_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "key-value store health check failed");
                false
            }
        },
        None => {
            warn!("key-value store unavailable (degraded mode)");
            false
        }
    };

    HealthResponse::from_probe(state.is_degraded(), reachable)
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

    #[tokio::test]
    async fn reports_store_reachability() {
        let state = AppState::with_parts(
            AppConfig::default(),
            Arc::new(ThreadRandom),
            Arc::new(LlmQuestionGenerator::disabled()),
        );
        assert_eq!(health_status(&state).await.status, "degraded");

        let store = MemoryStore::new();
        state.set_kv_store(Arc::new(store.clone())).await;
        let healthy = health_status(&state).await;
        assert_eq!(healthy.status, "ok");
        assert!(healthy.store_reachable);

        store.set_offline(true);
        let probe = health_status(&state).await;
        assert_eq!(probe.status, "degraded");
        assert!(!probe.store_reachable);
    }
}
