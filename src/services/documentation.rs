use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Spy Game Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::list_players,
        crate::routes::session::register_player,
        crate::routes::session::check_readiness,
        crate::routes::session::get_player_role,
        crate::routes::session::get_hidden_trait,
        crate::routes::session::start_voting,
        crate::routes::session::get_vote_options,
        crate::routes::session::submit_vote,
        crate::routes::session::get_results,
        crate::routes::prize::list_prizes,
        crate::routes::prize::draw_prize,
        crate::routes::question::generate_questions,
        crate::routes::question::get_question_set,
        crate::routes::question::evaluate_answers,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::PendingResponse,
            crate::error::ErrorBody,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::RegisterRequest,
            crate::dto::session::RegisterResponse,
            crate::dto::session::PlayersResponse,
            crate::dto::session::ReadinessResponse,
            crate::dto::session::RoleResponse,
            crate::dto::session::HiddenTraitResponse,
            crate::dto::session::VotingStartedResponse,
            crate::dto::session::VoteOptionsResponse,
            crate::dto::session::VoteRequest,
            crate::dto::session::VoteResponse,
            crate::dto::session::ResultsResponse,
            crate::dto::prize::PrizeListResponse,
            crate::dto::prize::DrawResponse,
            crate::dto::question::QuestionRequest,
            crate::dto::question::QuestionSetResponse,
            crate::dto::question::EvaluateRequest,
            crate::dto::question::EvaluationResponse,
            crate::dto::question::EvaluationResult,
            crate::dto::question::AnswerDto,
            crate::state::session::Role,
            crate::state::state_machine::SessionStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Session creation, registration and roles"),
        (name = "vote", description = "Voting round and results"),
        (name = "prizes", description = "Prize pool and draws"),
        (name = "questions", description = "Personality quiz questions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/session",
            "/session/{code}/register",
            "/session/{code}/vote/{player_id}",
            "/session/{code}/results",
            "/prizes/draw",
            "/questions",
            "/questions/evaluate",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
