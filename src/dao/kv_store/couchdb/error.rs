//! Error types raised by the CouchDB key-value backend.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`CouchDaoError`] failures.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures that can occur while interacting with CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// Required environment variable is missing.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB rejected a GET or PUT against the target database itself.
    #[error("failed to reach CouchDB database `{database}`")]
    Database {
        /// Target database.
        database: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a database operation.
    #[error("unexpected CouchDB database response status {status} for `{database}`")]
    DatabaseStatus {
        /// Target database.
        database: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send CouchDB request for document `{doc_id}`")]
    RequestSend {
        /// Target document.
        doc_id: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB returned an unexpected status code for a document endpoint.
    #[error("unexpected CouchDB response status {status} for document `{doc_id}`")]
    RequestStatus {
        /// Target document.
        doc_id: String,
        /// Status CouchDB answered with.
        status: StatusCode,
    },
    /// Response payload could not be decoded into the entry document.
    #[error("failed to decode CouchDB document `{doc_id}`")]
    DecodeDocument {
        /// Target document.
        doc_id: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// Every attempt to overwrite a document lost a revision race.
    #[error("gave up writing CouchDB document `{doc_id}` after {attempts} revision conflicts")]
    RevisionConflict {
        /// Target document.
        doc_id: String,
        /// Writes attempted.
        attempts: u32,
    },
}
