use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    outcome::{Outcome, Pending},
    state_machine::SessionStatus,
};

/// Successful body: `success: true` followed by the payload fields.
#[derive(Debug, Serialize)]
pub struct SuccessBody<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

/// "Not yet" body returned with HTTP 200 so polling clients can tell waiting from failure.
#[derive(Debug, Serialize, ToSchema)]
pub struct PendingResponse {
    /// Always `false`.
    pub success: bool,
    /// Always `true`.
    pub pending: bool,
    /// What the operation waits for.
    pub message: String,
    /// Session code.
    pub session_code: String,
    /// Session status.
    pub status: SessionStatus,
    /// Players registered so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_players: Option<usize>,
    /// Players the roster needs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_players: Option<usize>,
    /// Ballots recorded so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ballots_cast: Option<usize>,
    /// Ballots needed to close the round.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_ballots: Option<usize>,
}

impl PendingResponse {
    /// Body for `pending` on `session_code`.
    pub fn new(session_code: &str, pending: Pending) -> Self {
        Self {
            success: false,
            pending: true,
            message: pending.message,
            session_code: session_code.to_owned(),
            status: pending.status,
            registered_players: pending.registered_players,
            expected_players: pending.expected_players,
            ballots_cast: pending.ballots_cast,
            expected_ballots: pending.expected_ballots,
        }
    }
}

/// Transport shape of an [`Outcome`]: both variants answer with HTTP 200.
#[derive(Debug)]
pub enum ApiReply<T> {
    /// Rendered as `{success: true, ...}`.
    Ready(T),
    /// Rendered as a [`PendingResponse`].
    Pending(PendingResponse),
}

impl<T> ApiReply<T> {
    /// Reply with a completed result.
    pub fn ready(data: T) -> Self {
        ApiReply::Ready(data)
    }

    /// Reply for an [`Outcome`] on `session_code`.
    pub fn from_outcome(session_code: &str, outcome: Outcome<T>) -> Self {
        match outcome {
            Outcome::Ready(data) => ApiReply::Ready(data),
            Outcome::Pending(pending) => {
                ApiReply::Pending(PendingResponse::new(session_code, pending))
            }
        }
    }
}

impl<T: Serialize> IntoResponse for ApiReply<T> {
    fn into_response(self) -> Response {
        match self {
            ApiReply::Ready(data) => Json(SuccessBody {
                success: true,
                data,
            })
            .into_response(),
            ApiReply::Pending(pending) => Json(pending).into_response(),
        }
    }
}
