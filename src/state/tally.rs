//! Ballot counting and verdict computation.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::session::{Player, Role, VoteTarget};

/// Side that won the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The seekers found the hidden player, or rightly claimed everyone is hidden.
    Seekers,
    /// The hidden player escaped.
    Hidden,
    /// Nobody won.
    None,
}

/// Player reference embedded in verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerRef {
    /// Player id.
    pub id: u32,
    /// Display name.
    pub name: String,
}

impl From<&Player> for PlayerRef {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
        }
    }
}

/// Ballots received by one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TallyEntry {
    /// Player id or `all_hidden`.
    #[schema(value_type = Object)]
    pub target: VoteTarget,
    /// Player name, or a description of the all-hidden claim.
    pub label: String,
    /// Ballots received.
    pub votes: u32,
}

/// Player designated by a single plurality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Eliminated {
    /// Player id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Role the player held.
    pub role: Role,
}

/// Final outcome of a session, cached once computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Verdict {
    /// Players on the winning side.
    pub winners: Vec<PlayerRef>,
    /// Players on the losing side.
    pub losers: Vec<PlayerRef>,
    /// Human-readable summary.
    pub message: String,
    /// Several targets shared the highest count.
    pub tie: bool,
    /// Side that won.
    pub winning_side: Side,
    /// Player designated by a single plurality.
    pub eliminated: Option<Eliminated>,
    /// Counts per target, highest first.
    pub tally: Vec<TallyEntry>,
    /// Ballots counted.
    pub total_ballots: usize,
}

/// Ballot sets the tallier refuses to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TallyError {
    /// No ballot was recorded.
    #[error("no ballots to tally")]
    NoBallots,
    /// The all-hidden claim cannot win outright unless everybody is hidden.
    #[error("all-hidden claim leads the vote outside all-hidden mode")]
    SentinelLeader,
    /// A ballot names a player missing from the roster.
    #[error("ballot targets unknown player {0}")]
    UnknownTarget(u32),
}

/// Resolve the ballots of a roster whose roles are assigned.
pub fn tally(players: &[Player], votes: &IndexMap<u32, VoteTarget>) -> Result<Verdict, TallyError> {
    if votes.is_empty() {
        return Err(TallyError::NoBallots);
    }

    let mut counts: BTreeMap<VoteTarget, u32> = BTreeMap::new();
    for target in votes.values() {
        if let VoteTarget::Player(id) = target {
            if !players.iter().any(|player| player.id == *id) {
                return Err(TallyError::UnknownTarget(*id));
            }
        }
        *counts.entry(*target).or_default() += 1;
    }
    let tally_entries = tally_entries(players, &counts);
    let total_ballots = votes.len();

    let all_hidden = players.iter().all(|player| player.role == Role::Hidden);
    if all_hidden {
        let (winners, losers): (Vec<&Player>, Vec<&Player>) = players
            .iter()
            .partition(|player| votes.get(&player.id) == Some(&VoteTarget::AllHidden));
        let winning_side = if winners.is_empty() {
            Side::None
        } else {
            Side::Hidden
        };
        let message = if winners.is_empty() {
            "Everyone shared the hidden trait and nobody called it. Nobody wins.".to_owned()
        } else {
            "Everyone shared the hidden trait. Players who called it win.".to_owned()
        };
        return Ok(Verdict {
            winners: refs(winners),
            losers: refs(losers),
            message,
            tie: false,
            winning_side,
            eliminated: None,
            tally: tally_entries,
            total_ballots,
        });
    }

    let top = counts.values().copied().max().unwrap_or_default();
    let leaders: Vec<VoteTarget> = counts
        .iter()
        .filter(|(_, count)| **count == top)
        .map(|(target, _)| *target)
        .collect();

    let verdict = match leaders.as_slice() {
        [VoteTarget::AllHidden] => return Err(TallyError::SentinelLeader),
        [VoteTarget::Player(id)] => {
            let Some(leader) = players.iter().find(|player| player.id == *id) else {
                return Err(TallyError::UnknownTarget(*id));
            };
            let (winning_side, message) = if leader.role == Role::Hidden {
                (
                    Side::Seekers,
                    format!("{} was hidden. The seekers win.", leader.name),
                )
            } else {
                (
                    Side::Hidden,
                    format!("{} was a seeker. The hidden side wins.", leader.name),
                )
            };
            let (winners, losers) = split_by_side(players, winning_side);
            Verdict {
                winners,
                losers,
                message,
                tie: false,
                winning_side,
                eliminated: Some(Eliminated {
                    id: leader.id,
                    name: leader.name.clone(),
                    role: leader.role,
                }),
                tally: tally_entries,
                total_ballots,
            }
        }
        tied if tied.contains(&VoteTarget::AllHidden) => Verdict {
            winners: Vec::new(),
            losers: refs(players.iter()),
            message: "The vote was tied with an all-hidden claim. Nobody wins this round."
                .to_owned(),
            tie: true,
            winning_side: Side::None,
            eliminated: None,
            tally: tally_entries,
            total_ballots,
        },
        _ => {
            let (winners, losers) = split_by_side(players, Side::Hidden);
            Verdict {
                winners,
                losers,
                message: "The vote was tied. The hidden side survives and wins.".to_owned(),
                tie: true,
                winning_side: Side::Hidden,
                eliminated: None,
                tally: tally_entries,
                total_ballots,
            }
        }
    };

    Ok(verdict)
}

fn split_by_side(players: &[Player], side: Side) -> (Vec<PlayerRef>, Vec<PlayerRef>) {
    let winning_role = match side {
        Side::Seekers => Role::Seeker,
        Side::Hidden => Role::Hidden,
        Side::None => return (Vec::new(), refs(players.iter())),
    };
    let (winners, losers): (Vec<&Player>, Vec<&Player>) = players
        .iter()
        .partition(|player| player.role == winning_role);
    (refs(winners), refs(losers))
}

fn refs<'a>(players: impl IntoIterator<Item = &'a Player>) -> Vec<PlayerRef> {
    players.into_iter().map(PlayerRef::from).collect()
}

fn tally_entries(players: &[Player], counts: &BTreeMap<VoteTarget, u32>) -> Vec<TallyEntry> {
    let mut entries: Vec<TallyEntry> = counts
        .iter()
        .map(|(target, votes)| TallyEntry {
            target: *target,
            label: match target {
                VoteTarget::Player(id) => players
                    .iter()
                    .find(|player| player.id == *id)
                    .map(|player| player.name.clone())
                    .unwrap_or_else(|| format!("player {id}")),
                VoteTarget::AllHidden => "everyone is hidden".to_owned(),
            },
            votes: *votes,
        })
        .collect();
    // Stable sort keeps target order among equal counts.
    entries.sort_by(|a, b| b.votes.cmp(&a.votes));
    entries
}
