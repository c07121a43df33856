use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::{lock::LockError, storage::StorageError},
    state::{roles::RoleError, state_machine::InvalidTransition, tally::TallyError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// A lock could not be acquired in time or no free session code was found.
    #[error("system busy: {0}")]
    Busy(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Nothing is left to hand out.
    #[error("exhausted: {0}")]
    Exhausted(String),
    /// The tallier met a ballot set it cannot resolve.
    #[error("tally inconsistency")]
    TallyInconsistency(#[source] TallyError),
    /// An internal invariant was broken.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<LockError> for ServiceError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Busy { name } => {
                ServiceError::Busy(format!("lock `{name}` is held; retry shortly"))
            }
            LockError::Storage(source) => ServiceError::Unavailable(source),
        }
    }
}

impl From<TallyError> for ServiceError {
    fn from(err: TallyError) -> Self {
        ServiceError::TallyInconsistency(err)
    }
}

impl From<RoleError> for ServiceError {
    fn from(err: RoleError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(StorageError::Corrupted { key, source }) => {
                error!(key = %key, error = %source, "stored document is corrupted");
                AppError::Internal(format!("stored document `{key}` is corrupted"))
            }
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Busy(message) => AppError::ServiceUnavailable(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Exhausted(message) => AppError::Conflict(message),
            ServiceError::TallyInconsistency(source) => {
                error!(error = %source, "vote tally inconsistency");
                AppError::Internal(format!("tally inconsistency: {source}"))
            }
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    pub error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            success: false,
            error: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_degraded_map_to_503() {
        for err in [
            ServiceError::Degraded,
            ServiceError::Busy("lock held".into()),
            LockError::Busy {
                name: "spy:lock:ABC123".into(),
            }
            .into(),
        ] {
            assert_eq!(
                AppError::from(err).status(),
                StatusCode::SERVICE_UNAVAILABLE
            );
        }
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::InvalidState("x".into()), StatusCode::CONFLICT),
            (ServiceError::Exhausted("x".into()), StatusCode::CONFLICT),
            (
                TallyError::SentinelLeader.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn corrupted_document_is_internal() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ServiceError::from(StorageError::corrupted("spy:session:ABC123", source));
        assert_eq!(
            AppError::from(err).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
