use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        common::ApiReply,
        question::{EvaluateRequest, EvaluationResponse, QuestionRequest, QuestionSetResponse},
    },
    error::AppError,
    services::question_service,
    state::SharedState,
};

/// Personality quiz endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/questions", post(generate_questions))
        .route("/questions/evaluate", post(evaluate_answers))
        .route("/questions/{id}", get(get_question_set))
}

/// Generate a question set themed on optional player tags.
///
/// Falls back to the built-in set, with a `warning`, when the language model cannot be used.
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    request_body(content = QuestionRequest, description = "Optional tags, as a string or a list"),
    responses(
        (status = 200, description = "Stored question set", body = QuestionSetResponse),
        (status = 400, description = "Invalid body", body = crate::error::ErrorBody),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn generate_questions(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiReply<QuestionSetResponse>, AppError> {
    let request: QuestionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        QuestionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::BadRequest(format!("invalid JSON body: {err}")))?
    };

    Ok(ApiReply::ready(
        question_service::generate_questions(&state, request).await?,
    ))
}

/// Fetch a stored question set while it is alive.
#[utoipa::path(
    get,
    path = "/questions/{id}",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question set identifier")),
    responses(
        (status = 200, description = "Stored question set", body = QuestionSetResponse),
        (status = 404, description = "Unknown or expired set", body = crate::error::ErrorBody)
    )
)]
pub async fn get_question_set(
    State(state): State<SharedState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<ApiReply<QuestionSetResponse>, AppError> {
    let Path(id) = path?;
    Ok(ApiReply::ready(
        question_service::get_question_set(&state, id).await?,
    ))
}

/// Judge a trait code from the answers given to a stored question set.
///
/// Returns a default verdict, with a `warning`, when the language model cannot be used.
#[utoipa::path(
    post,
    path = "/questions/evaluate",
    tag = "questions",
    request_body(content = EvaluateRequest, description = "Question set id and answers"),
    responses(
        (status = 200, description = "Verdict and resolved answers", body = EvaluationResponse),
        (status = 400, description = "Missing id or no usable answer", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown or expired set", body = crate::error::ErrorBody),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn evaluate_answers(
    State(state): State<SharedState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<ApiReply<EvaluationResponse>, AppError> {
    let Json(request) = payload?;
    Ok(ApiReply::ready(
        question_service::evaluate_answers(&state, request).await?,
    ))
}
