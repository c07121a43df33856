use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{kv_store::KeyValueStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a key-value store installed in the shared state, toggling degraded mode while it is unreachable.
///
/// `connect` runs for every fresh connection, so it may also perform one-off setup such as seeding.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn KeyValueStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_kv_store(store.clone()).await;
                info!("key-value store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_store(&state, store.as_ref()).await;

                warn!("exhausted store reconnect attempts; dropping connection");
                state.clear_kv_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "key-value store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store health until reconnecting in place fails too many times in a row.
async fn watch_store(state: &SharedState, store: &dyn KeyValueStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("key-value store healthy again; leaving degraded mode");
                state.update_degraded(false);
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut reconnected = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "key-value store reconnected after failed health check");
                    reconnected = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(attempt, error = %err, "store reconnect failed; entering degraded mode");
                        state.update_degraded(true);
                    } else {
                        warn!(attempt, error = %err, "store reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }

        if !reconnected {
            return;
        }
        state.update_degraded(false);
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv_store::MemoryStore,
        services::question_service::LlmQuestionGenerator,
        state::{AppState, roles::ThreadRandom},
    };

    #[tokio::test(start_paused = true)]
    async fn outage_toggles_degraded_mode() {
        let state = AppState::with_parts(
            AppConfig::default(),
            Arc::new(ThreadRandom),
            Arc::new(LlmQuestionGenerator::disabled()),
        );
        let memory = MemoryStore::new();
        let store: Arc<dyn KeyValueStore> = Arc::new(memory.clone());

        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok(store) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded());

        memory.set_offline(true);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded());

        memory.set_offline(false);
        sleep(MAX_DELAY * 2 + HEALTH_POLL_INTERVAL).await;
        assert!(!state.is_degraded());

        supervisor.abort();
    }
}
