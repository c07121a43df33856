//! Application-level configuration: session store layout, lock timings, question sets and
//! the prize pool seed.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SPY_GAME_BACK_CONFIG_PATH";
/// Longest session code accepted anywhere, generated or read from a URL.
pub const MAX_CODE_LENGTH: usize = 16;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Session key layout and lifetime.
    pub session: SessionSettings,
    /// Distributed lock timings.
    pub lock: LockSettings,
    /// Generated question set storage.
    pub questions: QuestionSettings,
    /// Prizes written to the store when no pool exists yet.
    pub prizes: Vec<PrizeSeed>,
}

/// How sessions are keyed, identified and expired in the key-value store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Namespace prepended to the session code to build the store key.
    pub key_prefix: String,
    /// Idle lifetime of a session, re-armed on every write.
    pub ttl: Duration,
    /// Length of generated session codes.
    pub code_length: usize,
    /// Collision retries before session creation reports the system as busy.
    pub code_attempts: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            key_prefix: "spygame:session:".into(),
            ttl: Duration::from_secs(2 * 60 * 60),
            code_length: 6,
            code_attempts: 10,
        }
    }
}

/// Timings for the per-session distributed lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    /// Namespace prepended to the lock name.
    pub key_prefix: String,
    /// Auto-expiry of a held lock, bounding staleness when a holder dies.
    pub hold_timeout: Duration,
    /// How long an acquirer waits before reporting the system as busy.
    pub acquire_wait: Duration,
    /// Pause between two acquisition attempts.
    pub retry_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            key_prefix: "spygame:lock:".into(),
            hold_timeout: Duration::from_secs(5),
            acquire_wait: Duration::from_secs(5),
            retry_interval: Duration::from_millis(25),
        }
    }
}

/// Storage of generated question sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSettings {
    /// Namespace prepended to the question set id.
    pub key_prefix: String,
    /// Lifetime of a stored question set.
    pub ttl: Duration,
    /// Number of questions served per set.
    pub count: usize,
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            key_prefix: "traitquiz:session:".into(),
            ttl: Duration::from_secs(30 * 60),
            count: 8,
        }
    }
}

/// One prize entry seeded into an empty pool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrizeSeed {
    /// Display name; unique within the pool.
    pub name: String,
    /// Initial remaining count.
    pub stock: u32,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        prizes = config.prizes.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON configuration document. Missing fields keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    session_prefix: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    session_ttl_secs: Option<Duration>,
    code_length: Option<usize>,
    code_attempts: Option<u32>,
    lock_prefix: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    lock_timeout_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    lock_wait_secs: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    lock_retry_ms: Option<Duration>,
    question_prefix: Option<String>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    question_ttl_secs: Option<Duration>,
    question_count: Option<usize>,
    prizes: Vec<PrizeSeed>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let session_defaults = SessionSettings::default();
        let lock_defaults = LockSettings::default();
        let question_defaults = QuestionSettings::default();

        Self {
            session: SessionSettings {
                key_prefix: raw.session_prefix.unwrap_or(session_defaults.key_prefix),
                ttl: raw.session_ttl_secs.unwrap_or(session_defaults.ttl),
                code_length: raw
                    .code_length
                    .filter(|length| *length > 0)
                    .map(|length| length.min(MAX_CODE_LENGTH))
                    .unwrap_or(session_defaults.code_length),
                code_attempts: raw
                    .code_attempts
                    .filter(|attempts| *attempts > 0)
                    .unwrap_or(session_defaults.code_attempts),
            },
            lock: LockSettings {
                key_prefix: raw.lock_prefix.unwrap_or(lock_defaults.key_prefix),
                hold_timeout: raw
                    .lock_timeout_secs
                    .filter(|timeout| !timeout.is_zero())
                    .unwrap_or(lock_defaults.hold_timeout),
                acquire_wait: raw.lock_wait_secs.unwrap_or(lock_defaults.acquire_wait),
                retry_interval: raw.lock_retry_ms.unwrap_or(lock_defaults.retry_interval),
            },
            questions: QuestionSettings {
                key_prefix: raw.question_prefix.unwrap_or(question_defaults.key_prefix),
                ttl: raw.question_ttl_secs.unwrap_or(question_defaults.ttl),
                count: raw
                    .question_count
                    .filter(|count| *count > 0)
                    .unwrap_or(question_defaults.count),
            },
            prizes: raw.prizes,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
