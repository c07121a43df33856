use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle of a session. Statuses only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Players are joining; the roster is not full yet.
    Registering,
    /// Roster full and roles assigned; waiting for the host to open the vote.
    Ready,
    /// Ballots are being collected.
    Voting,
    /// Ballots were tallied and the verdict is cached.
    Completed,
}

impl SessionStatus {
    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Registering => "registering",
            SessionStatus::Ready => "ready",
            SessionStatus::Voting => "voting",
            SessionStatus::Completed => "completed",
        }
    }

    /// Compute the status reached by applying `event`, without mutating anything.
    pub fn transition(self, event: SessionEvent) -> Result<SessionStatus, InvalidTransition> {
        let next = match (self, event) {
            (SessionStatus::Registering, SessionEvent::RosterFilled) => SessionStatus::Ready,
            (SessionStatus::Ready, SessionEvent::VotingStarted) => SessionStatus::Voting,
            (SessionStatus::Voting, SessionEvent::BallotsTallied) => SessionStatus::Completed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

/// Events that advance a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Every expected player joined and roles were assigned.
    RosterFilled,
    /// The host opened the vote.
    VotingStarted,
    /// A complete ballot set was tallied.
    BallotsTallied,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the session was in when the invalid event was received.
    pub from: SessionStatus,
    /// The event that cannot be applied from this status.
    pub event: SessionEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_happy_path_through_session() {
        let mut status = SessionStatus::Registering;
        for (event, expected) in [
            (SessionEvent::RosterFilled, SessionStatus::Ready),
            (SessionEvent::VotingStarted, SessionStatus::Voting),
            (SessionEvent::BallotsTallied, SessionStatus::Completed),
        ] {
            status = status.transition(event).unwrap();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn completed_is_terminal() {
        for event in [
            SessionEvent::RosterFilled,
            SessionEvent::VotingStarted,
            SessionEvent::BallotsTallied,
        ] {
            assert!(SessionStatus::Completed.transition(event).is_err());
        }
    }

    #[test]
    fn invalid_transition_returns_error() {
        let err = SessionStatus::Registering
            .transition(SessionEvent::VotingStarted)
            .unwrap_err();
        assert_eq!(
            err,
            InvalidTransition {
                from: SessionStatus::Registering,
                event: SessionEvent::VotingStarted,
            }
        );
    }

    #[test]
    fn status_serializes_in_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Registering).unwrap(),
            "\"registering\""
        );
        assert_eq!(SessionStatus::Completed.as_str(), "completed");
    }
}
