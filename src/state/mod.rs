/// Ready or pending results of session operations.
pub mod outcome;
/// Hidden trait selection and role assignment.
pub mod roles;
/// Session document and its value types.
pub mod session;
/// Session lifecycle transitions.
pub mod state_machine;
/// Ballot counting and verdicts.
pub mod tally;

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{
        kv_store::KeyValueStore, lock::DistributedLock, prize::PrizeRepository,
        question::QuestionRepository, session::SessionRepository,
    },
    error::ServiceError,
    services::question_service::{LlmQuestionGenerator, QuestionGenerator},
    state::roles::{RandomSource, ThreadRandom},
};

/// State handle shared by every handler.
pub type SharedState = Arc<AppState>;

/// Name of the lock serializing prize draws.
pub const PRIZE_DRAW_LOCK: &str = "prize:draw";

/// Process-wide handles shared by every request. Game data itself lives in the key-value store.
pub struct AppState {
    kv_store: RwLock<Option<Arc<dyn KeyValueStore>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    random: Arc<dyn RandomSource>,
    question_generator: Arc<dyn QuestionGenerator>,
    tally_runs: AtomicU64,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_parts(
            config,
            Arc::new(ThreadRandom),
            Arc::new(LlmQuestionGenerator::from_env()),
        )
    }

    /// Build the state with explicit randomness and question collaborators.
    pub fn with_parts(
        config: AppConfig,
        random: Arc<dyn RandomSource>,
        question_generator: Arc<dyn QuestionGenerator>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            kv_store: RwLock::new(None),
            degraded: degraded_tx,
            config,
            random,
            question_generator,
            tally_runs: AtomicU64::new(0),
        })
    }

    /// Obtain a handle to the current key-value store, if one is installed.
    pub async fn kv_store(&self) -> Option<Arc<dyn KeyValueStore>> {
        let guard = self.kv_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new key-value store implementation and leave degraded mode.
    pub async fn set_kv_store(&self, store: Arc<dyn KeyValueStore>) {
        {
            let mut guard = self.kv_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_kv_store(&self) {
        {
            let mut guard = self.kv_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Store handle, or [`ServiceError::Degraded`] while degraded.
    pub async fn require_kv_store(&self) -> Result<Arc<dyn KeyValueStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.kv_store().await.ok_or(ServiceError::Degraded)
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Randomness used for codes, roles and draws.
    pub fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }

    /// Generator and evaluator of quiz questions.
    pub fn question_generator(&self) -> Arc<dyn QuestionGenerator> {
        self.question_generator.clone()
    }

    /// Count one tally computation.
    pub fn record_tally(&self) {
        self.tally_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of tallies computed since startup.
    pub fn tally_runs(&self) -> u64 {
        self.tally_runs.load(Ordering::Relaxed)
    }

    /// Session persistence over the current store.
    pub async fn session_repository(&self) -> Result<SessionRepository, ServiceError> {
        let store = self.require_kv_store().await?;
        Ok(SessionRepository::new(store, &self.config.session))
    }

    /// Lock guarding every read-modify-write of the session `code`.
    pub async fn session_lock(&self, code: &str) -> Result<DistributedLock, ServiceError> {
        let store = self.require_kv_store().await?;
        Ok(DistributedLock::new(store, code, &self.config.lock))
    }

    /// Prize pool persistence over the current store.
    pub async fn prize_repository(&self) -> Result<PrizeRepository, ServiceError> {
        let store = self.require_kv_store().await?;
        Ok(PrizeRepository::new(store))
    }

    /// Question set persistence over the current store.
    pub async fn question_repository(&self) -> Result<QuestionRepository, ServiceError> {
        let store = self.require_kv_store().await?;
        Ok(QuestionRepository::new(store, &self.config.questions))
    }

    /// Lock serializing prize draws.
    pub async fn prize_lock(&self) -> Result<DistributedLock, ServiceError> {
        let store = self.require_kv_store().await?;
        Ok(DistributedLock::new(store, PRIZE_DRAW_LOCK, &self.config.lock))
    }
}
