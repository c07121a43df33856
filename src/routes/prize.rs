use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::{
        common::ApiReply,
        prize::{DrawResponse, PrizeListResponse},
    },
    error::AppError,
    services::prize_service,
    state::SharedState,
};

/// Prize pool endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/prizes", get(list_prizes))
        .route("/prizes/draw", post(draw_prize))
}

/// List every prize with its remaining stock.
#[utoipa::path(
    get,
    path = "/prizes",
    tag = "prizes",
    responses(
        (status = 200, description = "Prize pool ordered by id", body = PrizeListResponse),
        (status = 503, description = "Store unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn list_prizes(
    State(state): State<SharedState>,
) -> Result<ApiReply<PrizeListResponse>, AppError> {
    Ok(ApiReply::ready(prize_service::list_prizes(&state).await?))
}

/// Draw one prize at random among those still in stock.
#[utoipa::path(
    post,
    path = "/prizes/draw",
    tag = "prizes",
    responses(
        (status = 200, description = "Prize won", body = DrawResponse),
        (status = 409, description = "Pool exhausted", body = crate::error::ErrorBody),
        (status = 503, description = "Draw lock busy or store unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn draw_prize(
    State(state): State<SharedState>,
) -> Result<ApiReply<DrawResponse>, AppError> {
    Ok(ApiReply::ready(prize_service::draw_prize(&state).await?))
}
