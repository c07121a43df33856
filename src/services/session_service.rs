//! Session operations. Every mutation goes through [`with_locked_session`].

use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::{
    config::MAX_CODE_LENGTH,
    dto::session::{
        CreateSessionResponse, HiddenTraitResponse, PlayersResponse, ReadinessResponse,
        RegisterRequest, RegisterResponse, ResultsResponse, RoleResponse, VoteOption,
        VoteOptionsResponse, VoteRequest, VoteResponse, VotingStartedResponse,
    },
    error::ServiceError,
    state::{
        SharedState,
        outcome::{Outcome, Pending},
        roles::{RandomSource, assign_roles},
        session::{ALL_HIDDEN_TOKEN, Session, TraitCode, VoteTarget},
        state_machine::{SessionEvent, SessionStatus},
        tally::tally,
    },
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Canonical form of a session code taken from a URL.
pub fn normalize_code(raw: &str) -> Result<String, ServiceError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty()
        || code.len() > MAX_CODE_LENGTH
        || !code.bytes().all(|byte| byte.is_ascii_alphanumeric())
    {
        return Err(session_not_found(raw));
    }
    Ok(code)
}

fn session_not_found(code: &str) -> ServiceError {
    ServiceError::NotFound(format!("session `{code}` does not exist"))
}

fn player_not_found(player_id: u32) -> ServiceError {
    ServiceError::NotFound(format!("player {player_id} does not exist"))
}

fn generate_code(length: usize, random: &dyn RandomSource) -> String {
    (0..length)
        .map(|_| char::from(CODE_ALPHABET[random.pick_index(CODE_ALPHABET.len())]))
        .collect()
}

/// Lock the session, load it, run `mutate`, persist when it changed, and unlock.
///
/// An error from `mutate` aborts without persisting. The lock is released on every path.
pub async fn with_locked_session<T, F>(
    state: &SharedState,
    code: &str,
    mutate: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(&mut Session) -> Result<T, ServiceError>,
{
    let repository = state.session_repository().await?;
    let lock = state.session_lock(code).await?;
    let repository = &repository;

    lock.run(|| async move {
        let Some(mut session) = repository.load(code).await? else {
            return Err(session_not_found(code));
        };
        let before = session.clone();
        let value = mutate(&mut session)?;
        if session != before {
            repository.save(&session).await?;
        }
        Ok::<T, ServiceError>(value)
    })
    .await
}

async fn load_session(state: &SharedState, code: &str) -> Result<Session, ServiceError> {
    let repository = state.session_repository().await?;
    repository
        .load(code)
        .await?
        .ok_or_else(|| session_not_found(code))
}

/// Allocate a fresh code and persist an empty session under it.
pub async fn create_session(state: &SharedState) -> Result<CreateSessionResponse, ServiceError> {
    let repository = state.session_repository().await?;
    let settings = &state.config().session;

    for attempt in 1..=settings.code_attempts {
        let session = Session::new(generate_code(settings.code_length, state.random()));
        if repository.insert_new(&session).await? {
            info!(code = %session.code, attempt, "session created");
            return Ok(CreateSessionResponse::from(&session));
        }
        debug!(code = %session.code, attempt, "session code collision");
    }

    warn!(
        attempts = settings.code_attempts,
        "no free session code found"
    );
    Err(ServiceError::Busy(
        "failed to allocate a session code; please try again".into(),
    ))
}

/// Add a player to a session that is still registering.
pub async fn register_player(
    state: &SharedState,
    code: &str,
    request: RegisterRequest,
) -> Result<RegisterResponse, ServiceError> {
    let name = request.player_name.trim().to_owned();
    if name.is_empty() {
        return Err(ServiceError::InvalidInput(
            "player name must not be empty".into(),
        ));
    }
    let trait_code = TraitCode::parse(&request.mbti)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let response = with_locked_session(state, code, |session| {
        if session.status != SessionStatus::Registering {
            return Err(ServiceError::InvalidState(
                "game already started; new players cannot join".into(),
            ));
        }
        if session.name_taken(&name) {
            return Err(ServiceError::InvalidInput(format!(
                "player name `{name}` is already taken"
            )));
        }
        if session.is_full() {
            return Err(ServiceError::InvalidState("session is full".into()));
        }

        let player = session.push_player(name, trait_code).clone();
        Ok(RegisterResponse {
            session_code: session.code.clone(),
            player_id: player.id,
            player_name: player.name,
            role: player.role,
            roles_assigned: session.roles_assigned(),
            hidden_trait: session.hidden_trait.as_ref().map(ToString::to_string),
            expected_players: session.expected_players,
        })
    })
    .await?;

    info!(
        code,
        player_id = response.player_id,
        "player registered"
    );
    Ok(response)
}

/// Poll point of the lobby. Assigns roles exactly once when the roster is complete.
pub async fn check_readiness(
    state: &SharedState,
    code: &str,
) -> Result<Outcome<ReadinessResponse>, ServiceError> {
    with_locked_session(state, code, |session| {
        if session.players.len() < session.expected_players {
            return Ok(Outcome::Pending(
                Pending::new("waiting for all players to register", session.status)
                    .with_roster(session.players.len(), session.expected_players),
            ));
        }

        if !session.roles_assigned() {
            let next = session.status.transition(SessionEvent::RosterFilled)?;
            let hidden = assign_roles(&mut session.players, state.random())?;
            session.hidden_trait = Some(hidden);
            session.status = next;
            info!(
                code = %session.code,
                all_hidden = session.all_hidden(),
                "roles assigned"
            );
            session.votes.clear();
            session.results = None;
            session.vote_started_at = None;
        }

        Ok(Outcome::Ready(ReadinessResponse::from(&*session)))
    })
    .await
}

/// Lock-free roster listing without roles.
pub async fn list_players(state: &SharedState, code: &str) -> Result<PlayersResponse, ServiceError> {
    let session = load_session(state, code).await?;
    Ok(PlayersResponse::from(&session))
}

/// Lock-free role lookup for one player.
pub async fn get_player_role(
    state: &SharedState,
    code: &str,
    player_id: u32,
) -> Result<Outcome<RoleResponse>, ServiceError> {
    let session = load_session(state, code).await?;
    let player = session
        .player(player_id)
        .ok_or_else(|| player_not_found(player_id))?;

    let Some(hidden_trait) = &session.hidden_trait else {
        return Ok(Outcome::Pending(Pending::new(
            "roles have not been assigned yet",
            session.status,
        )));
    };

    Ok(Outcome::Ready(RoleResponse {
        session_code: session.code.clone(),
        player_id,
        role: player.role,
        hidden_trait: hidden_trait.to_string(),
    }))
}

/// Lock-free lookup of the hidden trait.
pub async fn get_hidden_trait(
    state: &SharedState,
    code: &str,
) -> Result<Outcome<HiddenTraitResponse>, ServiceError> {
    let session = load_session(state, code).await?;
    Ok(match &session.hidden_trait {
        Some(hidden_trait) => Outcome::Ready(HiddenTraitResponse {
            session_code: session.code.clone(),
            hidden_trait: hidden_trait.to_string(),
        }),
        None => Outcome::Pending(Pending::new(
            "the hidden trait has not been determined yet",
            session.status,
        )),
    })
}

/// Open the vote on a ready session.
pub async fn start_voting(
    state: &SharedState,
    code: &str,
) -> Result<Outcome<VotingStartedResponse>, ServiceError> {
    with_locked_session(state, code, |session| {
        if !session.roles_assigned() {
            return Ok(Outcome::Pending(Pending::new(
                "roles have not been assigned yet; voting cannot start",
                session.status,
            )));
        }
        if session.status != SessionStatus::Ready {
            return Ok(Outcome::Pending(Pending::new(
                "voting cannot be started from the current state",
                session.status,
            )));
        }

        session.status = session.status.transition(SessionEvent::VotingStarted)?;
        session.votes.clear();
        session.results = None;
        session.vote_started_at = Some(SystemTime::now());
        info!(code = %session.code, "voting started");

        Ok(Outcome::Ready(VotingStartedResponse::from(&*session)))
    })
    .await
}

/// Lock-free list of the ballots `player_id` may cast.
pub async fn get_vote_options(
    state: &SharedState,
    code: &str,
    player_id: u32,
) -> Result<Outcome<VoteOptionsResponse>, ServiceError> {
    let session = load_session(state, code).await?;
    if session.status != SessionStatus::Voting {
        return Ok(Outcome::Pending(Pending::new(
            "voting has not started yet",
            session.status,
        )));
    }
    if session.player(player_id).is_none() {
        return Err(player_not_found(player_id));
    }

    let all_hidden_mode = session.all_hidden();
    let mut options: Vec<VoteOption> = session
        .players
        .iter()
        .filter(|player| player.id != player_id)
        .map(|player| VoteOption {
            vote_for: VoteTarget::Player(player.id).to_json(),
            label: player.name.clone(),
        })
        .collect();
    if all_hidden_mode {
        options.push(VoteOption {
            vote_for: VoteTarget::AllHidden.to_json(),
            label: "Everyone is hidden".into(),
        });
    }

    Ok(Outcome::Ready(VoteOptionsResponse {
        session_code: session.code.clone(),
        status: session.status,
        player_id,
        all_hidden_mode,
        options,
    }))
}

/// Record or replace the ballot of `voter_id`.
pub async fn submit_vote(
    state: &SharedState,
    code: &str,
    voter_id: u32,
    request: VoteRequest,
) -> Result<Outcome<VoteResponse>, ServiceError> {
    let target = VoteTarget::parse(&request.vote_for).map_err(|_| {
        ServiceError::InvalidInput(format!(
            "vote_for must be a player id or `{ALL_HIDDEN_TOKEN}`"
        ))
    })?;

    with_locked_session(state, code, |session| {
        if session.status != SessionStatus::Voting {
            return Ok(Outcome::Pending(Pending::new(
                "voting is not open",
                session.status,
            )));
        }
        if session.player(voter_id).is_none() {
            return Err(player_not_found(voter_id));
        }

        match target {
            VoteTarget::Player(id) if id == voter_id => {
                return Err(ServiceError::InvalidInput(
                    "players cannot vote for themselves".into(),
                ));
            }
            VoteTarget::Player(id) if session.player(id).is_none() => {
                return Err(ServiceError::InvalidInput(format!(
                    "target player {id} does not exist"
                )));
            }
            VoteTarget::AllHidden if !session.all_hidden() => {
                return Err(ServiceError::InvalidInput(format!(
                    "`{ALL_HIDDEN_TOKEN}` is only available when every player is hidden"
                )));
            }
            _ => {}
        }

        session.votes.insert(voter_id, target);
        session.results = None;
        debug!(code = %session.code, voter_id, ballots = session.votes.len(), "ballot recorded");

        Ok(Outcome::Ready(VoteResponse {
            session_code: session.code.clone(),
            player_id: voter_id,
            vote_for: target.to_json(),
            ballots_cast: session.votes.len(),
            expected_ballots: session.players.len(),
        }))
    })
    .await
}

/// Tally a complete ballot set once; later calls return the cached verdict.
pub async fn get_results(
    state: &SharedState,
    code: &str,
) -> Result<Outcome<ResultsResponse>, ServiceError> {
    with_locked_session(state, code, |session| match session.status {
        SessionStatus::Completed => match &session.results {
            Some(verdict) => Ok(Outcome::Ready(ResultsResponse::new(
                session,
                verdict.clone(),
            ))),
            None => Err(ServiceError::Internal(
                "completed session has no cached results".into(),
            )),
        },
        SessionStatus::Voting => {
            let expected = session.players.len();
            if session.votes.len() < expected {
                return Ok(Outcome::Pending(
                    Pending::new("waiting for every player to vote", session.status)
                        .with_ballots(session.votes.len(), expected),
                ));
            }

            state.record_tally();
            let verdict = tally(&session.players, &session.votes)?;
            session.status = session.status.transition(SessionEvent::BallotsTallied)?;
            session.results = Some(verdict.clone());
            info!(
                code = %session.code,
                winning_side = ?verdict.winning_side,
                tie = verdict.tie,
                "results computed"
            );

            Ok(Outcome::Ready(ResultsResponse::new(session, verdict)))
        }
        status => Ok(Outcome::Pending(Pending::new(
            "voting has not started yet",
            status,
        ))),
    })
    .await
}
