use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        validation::{validate_player_name, validate_trait_code},
    },
    state::{
        session::{Player, Role, Session},
        state_machine::SessionStatus,
        tally::Verdict,
    },
};

/// Optional body of `POST /session`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    /// Must be 3 when given.
    #[validate(range(min = 3, max = 3, message = "the spy game always uses exactly 3 players"))]
    pub expected_players: Option<usize>,
}

/// Code of a newly created session.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Roster size, always 3.
    pub expected_players: usize,
}

impl From<&Session> for CreateSessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_code: session.code.clone(),
            expected_players: session.expected_players,
        }
    }
}

/// Registration of one player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Display name, trimmed; unique within the session.
    #[validate(custom(function = "validate_player_name"))]
    pub player_name: String,
    /// Four-letter trait code, case-insensitive.
    #[validate(custom(function = "validate_trait_code"))]
    pub mbti: String,
}

/// Outcome of a registration.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// 1-based player id.
    pub player_id: u32,
    /// Display name, trimmed; unique within the session.
    pub player_name: String,
    /// Assigned role; `unassigned` until the roster is complete.
    pub role: Role,
    /// Whether roles have been handed out.
    pub roles_assigned: bool,
    /// Hidden trait code, once roles are assigned.
    pub hidden_trait: Option<String>,
    /// Roster size, always 3.
    pub expected_players: usize,
}

/// Public roster entry; roles are never exposed here.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// 1-based player id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Trait code declared at registration.
    pub mbti: String,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            mbti: player.trait_code.to_string(),
        }
    }
}

/// Roster of a session.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayersResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Current session status.
    pub status: SessionStatus,
    /// Players in registration order.
    pub players: Vec<PlayerSummary>,
    /// Roster size, always 3.
    pub expected_players: usize,
}

impl From<&Session> for PlayersResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_code: session.code.clone(),
            status: session.status,
            players: session.players.iter().map(PlayerSummary::from).collect(),
            expected_players: session.expected_players,
        }
    }
}

/// Roster entry with its assigned role.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerWithRole {
    /// 1-based player id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Trait code declared at registration.
    pub mbti: String,
    /// Assigned role; `unassigned` until the roster is complete.
    pub role: Role,
}

impl From<&Player> for PlayerWithRole {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            mbti: player.trait_code.to_string(),
            role: player.role,
        }
    }
}

/// Result of the readiness poll once the roster is complete.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Current session status.
    pub status: SessionStatus,
    /// Players registered so far.
    pub registered_players: usize,
    /// Roster size, always 3.
    pub expected_players: usize,
    /// Whether roles have been handed out.
    pub roles_assigned: bool,
    /// Hidden trait code, once roles are assigned.
    pub hidden_trait: Option<String>,
    /// Players in registration order.
    pub players: Vec<PlayerWithRole>,
}

impl From<&Session> for ReadinessResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_code: session.code.clone(),
            status: session.status,
            registered_players: session.players.len(),
            expected_players: session.expected_players,
            roles_assigned: session.roles_assigned(),
            hidden_trait: session.hidden_trait.as_ref().map(ToString::to_string),
            players: session.players.iter().map(PlayerWithRole::from).collect(),
        }
    }
}

/// Role of one player once assigned.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// 1-based player id.
    pub player_id: u32,
    /// Assigned role; `unassigned` until the roster is complete.
    pub role: Role,
    /// Hidden trait code, once roles are assigned.
    pub hidden_trait: String,
}

/// Hidden trait of a session once assigned.
#[derive(Debug, Serialize, ToSchema)]
pub struct HiddenTraitResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Hidden trait code, once roles are assigned.
    pub hidden_trait: String,
}

/// Acknowledgement of the voting start.
#[derive(Debug, Serialize, ToSchema)]
pub struct VotingStartedResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Current session status.
    pub status: SessionStatus,
    /// RFC 3339 timestamp.
    pub vote_started_at: Option<String>,
}

impl From<&Session> for VotingStartedResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_code: session.code.clone(),
            status: session.status,
            vote_started_at: session.vote_started_at.map(format_system_time),
        }
    }
}

/// One selectable ballot.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteOption {
    /// Player id, or `"all_hidden"`.
    #[schema(value_type = Object)]
    pub vote_for: Value,
    /// Text shown to the voter.
    pub label: String,
}

/// Ballots a player may cast.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteOptionsResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Current session status.
    pub status: SessionStatus,
    /// 1-based player id.
    pub player_id: u32,
    /// Whether every player holds the hidden trait; only then is `all_hidden` offered.
    pub all_hidden_mode: bool,
    /// Selectable ballots, own id excluded.
    pub options: Vec<VoteOption>,
}

/// Ballot body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// Player id (number or numeric string) or `"all_hidden"`.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub vote_for: Value,
}

/// Acknowledgement of a recorded ballot.
#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// 1-based player id.
    pub player_id: u32,
    /// Recorded ballot: player id or `"all_hidden"`.
    #[schema(value_type = Object)]
    pub vote_for: Value,
    /// Ballots recorded so far.
    pub ballots_cast: usize,
    /// Ballots needed to close the round.
    pub expected_ballots: usize,
}

/// Final verdict of a session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultsResponse {
    /// Session code, upper-case.
    pub session_code: String,
    /// Ballots needed to close the round.
    pub expected_ballots: usize,
    /// Tally outcome.
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl ResultsResponse {
    /// Wrap the verdict of `session`.
    pub fn new(session: &Session, verdict: Verdict) -> Self {
        Self {
            session_code: session.code.clone(),
            expected_ballots: session.players.len(),
            verdict,
        }
    }
}
