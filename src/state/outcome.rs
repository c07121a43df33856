use crate::state::state_machine::SessionStatus;

/// Result of a session operation that may have to wait for other players.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The operation completed.
    Ready(T),
    /// Not yet possible; the client should poll again.
    Pending(Pending),
}

impl<T> Outcome<T> {
    /// Transform the ready value, leaving pending outcomes untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ready(value) => Outcome::Ready(f(value)),
            Outcome::Pending(pending) => Outcome::Pending(pending),
        }
    }

    /// Whether the operation has to be retried later.
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }
}

/// Why an operation is waiting, with the counts a polling client displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    /// What the operation waits for.
    pub message: String,
    /// Session status at the time of the poll.
    pub status: SessionStatus,
    /// Players registered so far.
    pub registered_players: Option<usize>,
    /// Players the roster needs.
    pub expected_players: Option<usize>,
    /// Ballots recorded so far.
    pub ballots_cast: Option<usize>,
    /// Ballots needed to close the round.
    pub expected_ballots: Option<usize>,
}

impl Pending {
    /// Pending outcome without counts.
    pub fn new(message: impl Into<String>, status: SessionStatus) -> Self {
        Self {
            message: message.into(),
            status,
            registered_players: None,
            expected_players: None,
            ballots_cast: None,
            expected_ballots: None,
        }
    }

    /// Attach registration progress.
    pub fn with_roster(mut self, registered: usize, expected: usize) -> Self {
        self.registered_players = Some(registered);
        self.expected_players = Some(expected);
        self
    }

    /// Attach ballot progress.
    pub fn with_ballots(mut self, cast: usize, expected: usize) -> Self {
        self.ballots_cast = Some(cast);
        self.expected_ballots = Some(expected);
        self
    }
}
