use std::{env, time::Duration};

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "spy_game_kv";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the CouchDB-backed key-value store.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, without trailing slash.
    pub base_url: String,
    /// Database holding the entries.
    pub database: String,
    /// Basic-auth user and password.
    pub credentials: Option<(String, String)>,
    /// Upper bound for a single HTTP round-trip; keeps lock polling bounded.
    pub request_timeout: Duration,
}

impl CouchConfig {
    /// Settings without credentials and with the default timeout.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Build a configuration from `COUCH_BASE_URL` (required), `COUCH_DB`,
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` and `COUCH_TIMEOUT_MS`.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = env::var("COUCH_DB")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_owned());

        let mut config = Self::new(base_url, database);

        if let (Ok(username), Ok(password)) = (env::var("COUCH_USERNAME"), env::var("COUCH_PASSWORD"))
        {
            config = config.with_credentials(username, password);
        }

        if let Some(timeout) = env::var("COUCH_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_millis(timeout);
        }

        Ok(config)
    }
}
