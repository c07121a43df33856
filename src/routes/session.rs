use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        common::ApiReply,
        session::{
            CreateSessionRequest, CreateSessionResponse, HiddenTraitResponse, PlayersResponse,
            ReadinessResponse, RegisterRequest, RegisterResponse, ResultsResponse, RoleResponse,
            VoteOptionsResponse, VoteRequest, VoteResponse, VotingStartedResponse,
        },
    },
    error::AppError,
    services::session_service::{self, normalize_code},
    state::SharedState,
};

/// Session lifecycle endpoints, from creation to results.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session", post(create_session))
        .route("/session/{code}/players", get(list_players))
        .route("/session/{code}/register", post(register_player))
        .route("/session/{code}/register/status", get(check_readiness))
        .route("/session/{code}/role/{player_id}", get(get_player_role))
        .route("/session/{code}/hidden-trait", get(get_hidden_trait))
        .route("/session/{code}/vote/start", post(start_voting))
        .route(
            "/session/{code}/vote/{player_id}",
            get(get_vote_options).post(submit_vote),
        )
        .route("/session/{code}/results", get(get_results))
}

/// Create a session and return its shareable code.
///
/// The body is optional; an empty one behaves like `{}`.
#[utoipa::path(
    post,
    path = "/session",
    tag = "session",
    request_body(content = CreateSessionRequest, description = "Optional roster size, always 3"),
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse),
        (status = 400, description = "Invalid body", body = crate::error::ErrorBody),
        (status = 503, description = "Store unavailable or no free code", body = crate::error::ErrorBody)
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<ApiReply<CreateSessionResponse>, AppError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::BadRequest(format!("invalid JSON body: {err}")))?
    };
    request.validate()?;

    Ok(ApiReply::ready(
        session_service::create_session(&state).await?,
    ))
}

/// List registered players without their roles.
#[utoipa::path(
    get,
    path = "/session/{code}/players",
    tag = "session",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Current roster", body = PlayersResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody)
    )
)]
pub async fn list_players(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<ApiReply<PlayersResponse>, AppError> {
    let code = normalize_code(&code)?;
    Ok(ApiReply::ready(
        session_service::list_players(&state, &code).await?,
    ))
}

/// Register a player with their four-letter trait code.
#[utoipa::path(
    post,
    path = "/session/{code}/register",
    tag = "session",
    params(("code" = String, Path, description = "Session code")),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Player registered", body = RegisterResponse),
        (status = 400, description = "Invalid name or trait code, or name taken", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
        (status = 409, description = "Roster full or registration closed", body = crate::error::ErrorBody)
    )
)]
pub async fn register_player(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiReply<RegisterResponse>, AppError> {
    let code = normalize_code(&code)?;
    let Json(request) = payload?;
    request.validate()?;

    Ok(ApiReply::ready(
        session_service::register_player(&state, &code, request).await?,
    ))
}

/// Poll until the roster is full; assigns roles on the first full poll.
#[utoipa::path(
    get,
    path = "/session/{code}/register/status",
    tag = "session",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Roster with roles, or a pending body", body = ReadinessResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
        (status = 503, description = "Session lock busy", body = crate::error::ErrorBody)
    )
)]
pub async fn check_readiness(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<ApiReply<ReadinessResponse>, AppError> {
    let code = normalize_code(&code)?;
    let outcome = session_service::check_readiness(&state, &code).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}

/// Role of one player, pending until roles are assigned.
#[utoipa::path(
    get,
    path = "/session/{code}/role/{player_id}",
    tag = "session",
    params(
        ("code" = String, Path, description = "Session code"),
        ("player_id" = u32, Path, description = "Player id within the session")
    ),
    responses(
        (status = 200, description = "Role of the player, or a pending body", body = RoleResponse),
        (status = 404, description = "Unknown session or player", body = crate::error::ErrorBody)
    )
)]
pub async fn get_player_role(
    State(state): State<SharedState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<ApiReply<RoleResponse>, AppError> {
    let Path((code, player_id)) = path?;
    let code = normalize_code(&code)?;
    let outcome = session_service::get_player_role(&state, &code, player_id).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}

/// Hidden trait of the session, pending until roles are assigned.
#[utoipa::path(
    get,
    path = "/session/{code}/hidden-trait",
    tag = "session",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Hidden trait, or a pending body", body = HiddenTraitResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody)
    )
)]
pub async fn get_hidden_trait(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<ApiReply<HiddenTraitResponse>, AppError> {
    let code = normalize_code(&code)?;
    let outcome = session_service::get_hidden_trait(&state, &code).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}

/// Open the voting round once roles are assigned.
#[utoipa::path(
    post,
    path = "/session/{code}/vote/start",
    tag = "vote",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Voting opened, or a pending body", body = VotingStartedResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
        (status = 503, description = "Session lock busy", body = crate::error::ErrorBody)
    )
)]
pub async fn start_voting(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<ApiReply<VotingStartedResponse>, AppError> {
    let code = normalize_code(&code)?;
    let outcome = session_service::start_voting(&state, &code).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}

/// Candidates the player may vote for.
#[utoipa::path(
    get,
    path = "/session/{code}/vote/{player_id}",
    tag = "vote",
    params(
        ("code" = String, Path, description = "Session code"),
        ("player_id" = u32, Path, description = "Voting player id")
    ),
    responses(
        (status = 200, description = "Vote options, or a pending body", body = VoteOptionsResponse),
        (status = 404, description = "Unknown session or player", body = crate::error::ErrorBody)
    )
)]
pub async fn get_vote_options(
    State(state): State<SharedState>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> Result<ApiReply<VoteOptionsResponse>, AppError> {
    let Path((code, player_id)) = path?;
    let code = normalize_code(&code)?;
    let outcome = session_service::get_vote_options(&state, &code, player_id).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}

/// Cast or replace the player's ballot.
#[utoipa::path(
    post,
    path = "/session/{code}/vote/{player_id}",
    tag = "vote",
    params(
        ("code" = String, Path, description = "Session code"),
        ("player_id" = u32, Path, description = "Voting player id")
    ),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Ballot stored, or a pending body", body = VoteResponse),
        (status = 400, description = "Invalid vote target", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown session or player", body = crate::error::ErrorBody),
        (status = 503, description = "Session lock busy", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    path: Result<Path<(String, u32)>, PathRejection>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<ApiReply<VoteResponse>, AppError> {
    let Path((code, player_id)) = path?;
    let code = normalize_code(&code)?;
    let Json(request) = payload?;
    let outcome = session_service::submit_vote(&state, &code, player_id, request).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}

/// Tally the ballots once everyone voted; later calls return the cached verdict.
#[utoipa::path(
    get,
    path = "/session/{code}/results",
    tag = "vote",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Verdict, or a pending body", body = ResultsResponse),
        (status = 404, description = "Unknown session", body = crate::error::ErrorBody),
        (status = 500, description = "Inconsistent ballots", body = crate::error::ErrorBody),
        (status = 503, description = "Session lock busy", body = crate::error::ErrorBody)
    )
)]
pub async fn get_results(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<ApiReply<ResultsResponse>, AppError> {
    let code = normalize_code(&code)?;
    let outcome = session_service::get_results(&state, &code).await?;
    Ok(ApiReply::from_outcome(&code, outcome))
}
