use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable context.
        message: String,
        /// Backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored value could not be decoded into the expected record.
    #[error("stored value under `{key}` is corrupted")]
    Corrupted {
        /// Key holding the value.
        key: String,
        /// Backend error.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corruption error for a value that failed to decode.
    pub fn corrupted(key: impl Into<String>, source: serde_json::Error) -> Self {
        StorageError::Corrupted {
            key: key.into(),
            source,
        }
    }
}
