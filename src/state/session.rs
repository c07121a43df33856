//! Session aggregate: the single record shared by every request of one game.

use std::{fmt, time::SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::{state_machine::SessionStatus, tally::Verdict};

/// Number of players a spy game is played with.
pub const EXPECTED_PLAYERS: usize = 3;

/// Wire token of the "every player is hidden" ballot.
pub const ALL_HIDDEN_TOKEN: &str = "all_hidden";

/// Alphabet of trait codes, two letters per axis.
const TRAIT_AXES: [[char; 2]; 4] = [['E', 'I'], ['S', 'N'], ['T', 'F'], ['J', 'P']];

/// Role of a player once the hidden trait is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Roles are not assigned yet.
    Unknown,
    /// Holds the hidden trait.
    Hidden,
    /// Must find the hidden player.
    Seeker,
}

/// Rejected trait code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trait code must be 4 letters from E/I, S/N, T/F, J/P, got `{0}`")]
pub struct InvalidTraitCode(pub String);

/// Four-letter personality code such as `INFJ`. Always stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraitCode(String);

impl TraitCode {
    /// Trim, upper-case and validate a raw trait code.
    pub fn parse(raw: &str) -> Result<Self, InvalidTraitCode> {
        let normalized = raw.trim().to_uppercase();
        let valid = normalized.chars().count() == TRAIT_AXES.len()
            && normalized
                .chars()
                .all(|letter| TRAIT_AXES.iter().flatten().any(|allowed| *allowed == letter));

        if valid {
            Ok(Self(normalized))
        } else {
            Err(InvalidTraitCode(raw.to_owned()))
        }
    }

    /// Upper-case code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TraitCode {
    type Error = InvalidTraitCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TraitCode> for String {
    fn from(value: TraitCode) -> Self {
        value.0
    }
}

impl fmt::Display for TraitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// 1-based join position, never reused.
    pub id: u32,
    /// Trimmed display name, unique within the session.
    pub name: String,
    #[serde(rename = "mbti")]
    pub trait_code: TraitCode,
    pub role: Role,
}

/// Rejected ballot target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vote target must be a player id or `all_hidden`")]
pub struct InvalidVoteTarget;

/// What a ballot designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawVoteTarget", into = "RawVoteTarget")]
pub enum VoteTarget {
    /// A specific player suspected of being hidden.
    Player(u32),
    /// Claim that the whole roster is hidden.
    AllHidden,
}

impl VoteTarget {
    /// Accept a player id (number or numeric string) or the `all_hidden` token in any case.
    pub fn parse(raw: &Value) -> Result<Self, InvalidVoteTarget> {
        match raw {
            Value::Number(number) => number
                .as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .map(VoteTarget::Player)
                .ok_or(InvalidVoteTarget),
            Value::String(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case(ALL_HIDDEN_TOKEN) {
                    Ok(VoteTarget::AllHidden)
                } else {
                    text.parse()
                        .map(VoteTarget::Player)
                        .map_err(|_| InvalidVoteTarget)
                }
            }
            _ => Err(InvalidVoteTarget),
        }
    }

    /// JSON form used in responses: the player id or the sentinel token.
    pub fn to_json(self) -> Value {
        match self {
            VoteTarget::Player(id) => Value::from(id),
            VoteTarget::AllHidden => Value::from(ALL_HIDDEN_TOKEN),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawVoteTarget {
    Id(u32),
    Token(String),
}

impl TryFrom<RawVoteTarget> for VoteTarget {
    type Error = InvalidVoteTarget;

    fn try_from(raw: RawVoteTarget) -> Result<Self, Self::Error> {
        match raw {
            RawVoteTarget::Id(id) => Ok(VoteTarget::Player(id)),
            RawVoteTarget::Token(token) => VoteTarget::parse(&Value::String(token)),
        }
    }
}

impl From<VoteTarget> for RawVoteTarget {
    fn from(target: VoteTarget) -> Self {
        match target {
            VoteTarget::Player(id) => RawVoteTarget::Id(id),
            VoteTarget::AllHidden => RawVoteTarget::Token(ALL_HIDDEN_TOKEN.into()),
        }
    }
}

/// One game, persisted as a single document and mutated only under its lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Upper-case session code, also the store key suffix.
    pub code: String,
    /// Roster size.
    pub expected_players: usize,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Join order is id order.
    pub players: Vec<Player>,
    /// Trait the seekers must find; set with the roles.
    pub hidden_trait: Option<TraitCode>,
    /// Latest ballot per voter id.
    pub votes: IndexMap<u32, VoteTarget>,
    /// Verdict, cached by the first tally.
    pub results: Option<Verdict>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Start of the voting round.
    pub vote_started_at: Option<SystemTime>,
}

impl Session {
    /// Fresh session waiting for registrations.
    pub fn new(code: String) -> Self {
        Self {
            code,
            expected_players: EXPECTED_PLAYERS,
            status: SessionStatus::Registering,
            players: Vec::with_capacity(EXPECTED_PLAYERS),
            hidden_trait: None,
            votes: IndexMap::new(),
            results: None,
            created_at: SystemTime::now(),
            vote_started_at: None,
        }
    }

    /// Player with `id`.
    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Whether every seat is taken.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.expected_players
    }

    /// Whether the hidden trait and roles are set.
    pub fn roles_assigned(&self) -> bool {
        self.hidden_trait.is_some()
    }

    /// Every player holds the hidden trait; the `all_hidden` ballot is only offered then.
    pub fn all_hidden(&self) -> bool {
        self.roles_assigned()
            && !self.players.is_empty()
            && self.players.iter().all(|player| player.role == Role::Hidden)
    }

    /// Append a player with the next id. Callers check capacity and name uniqueness first.
    pub fn push_player(&mut self, name: String, trait_code: TraitCode) -> &Player {
        let id = self.players.len() as u32 + 1;
        self.players.push(Player {
            id,
            name,
            trait_code,
            role: Role::Unknown,
        });
        &self.players[self.players.len() - 1]
    }

    /// Whether a player already uses exactly `name`.
    pub fn name_taken(&self, name: &str) -> bool {
        self.players.iter().any(|player| player.name == name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn trait_code_is_normalized() {
        assert_eq!(TraitCode::parse(" infj ").unwrap().as_str(), "INFJ");
    }

    #[test]
    fn trait_code_rejects_bad_letters_and_length() {
        for raw in ["INFX", "INF", "INFJP", "", "ИNFJ"] {
            assert!(TraitCode::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn vote_target_accepts_ids_and_sentinel() {
        assert_eq!(
            VoteTarget::parse(&json!(2)).unwrap(),
            VoteTarget::Player(2)
        );
        assert_eq!(
            VoteTarget::parse(&json!(" 3 ")).unwrap(),
            VoteTarget::Player(3)
        );
        assert_eq!(
            VoteTarget::parse(&json!("ALL_HIDDEN")).unwrap(),
            VoteTarget::AllHidden
        );
    }

    #[test]
    fn vote_target_rejects_garbage() {
        for raw in [json!(-1), json!(1.5), json!("abc"), json!(null), json!([1])] {
            assert_eq!(VoteTarget::parse(&raw), Err(InvalidVoteTarget));
        }
    }

    #[test]
    fn session_document_round_trips_votes() {
        let mut session = Session::new("ABC123".into());
        session.votes.insert(1, VoteTarget::AllHidden);
        session.votes.insert(2, VoteTarget::Player(1));

        let raw = serde_json::to_value(&session).unwrap();
        assert_eq!(raw["votes"], json!({"1": "all_hidden", "2": 1}));

        let back: Session = serde_json::from_value(raw).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn players_get_sequential_ids() {
        let mut session = Session::new("ABC123".into());
        let trait_code = TraitCode::parse("ENTP").unwrap();
        session.push_player("Ada".into(), trait_code.clone());
        let second = session.push_player("Bob".into(), trait_code);

        assert_eq!(second.id, 2);
        assert_eq!(second.role, Role::Unknown);
        assert!(session.name_taken("Ada"));
        assert!(!session.name_taken("ada"));
    }
}
