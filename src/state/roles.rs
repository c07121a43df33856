//! Hidden trait selection and role labelling.

use rand::Rng;
use thiserror::Error;

use crate::state::session::{EXPECTED_PLAYERS, Player, Role, TraitCode};

/// Source of uniform random indices, injectable so tests can pin the outcome.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..len`. `len` is never zero.
    fn pick_index(&self, len: usize) -> usize;
}

/// [`RandomSource`] backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Rosters the assigner refuses to work on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    /// The roster does not have the expected size.
    #[error("role assignment needs exactly {expected} players, got {actual}")]
    RosterSize {
        /// Players a session needs.
        expected: usize,
        /// Players registered.
        actual: usize,
    },
}

/// Select the hidden trait of a full roster.
///
/// One distinct value: everybody is hidden. Two distinct values: the value held by a
/// single player. Three distinct values: a uniform pick, since nothing singles one out.
pub fn hidden_trait(
    traits: &[TraitCode],
    random: &dyn RandomSource,
) -> Result<TraitCode, RoleError> {
    if traits.len() != EXPECTED_PLAYERS {
        return Err(RoleError::RosterSize {
            expected: EXPECTED_PLAYERS,
            actual: traits.len(),
        });
    }

    let mut distinct: Vec<(&TraitCode, usize)> = Vec::with_capacity(traits.len());
    for code in traits {
        match distinct.iter_mut().find(|(seen, _)| *seen == code) {
            Some((_, count)) => *count += 1,
            None => distinct.push((code, 1)),
        }
    }

    let hidden = match distinct.as_slice() {
        [(only, _)] => *only,
        [_, _] => {
            distinct
                .iter()
                .find(|(_, count)| *count == 1)
                .map(|(code, _)| *code)
                .unwrap_or(distinct[0].0)
        }
        _ => distinct[random.pick_index(distinct.len())].0,
    };

    Ok(hidden.clone())
}

/// Compute the hidden trait and label every player with it.
pub fn assign_roles(
    players: &mut [Player],
    random: &dyn RandomSource,
) -> Result<TraitCode, RoleError> {
    let traits: Vec<TraitCode> = players
        .iter()
        .map(|player| player.trait_code.clone())
        .collect();
    let hidden = hidden_trait(&traits, random)?;

    for player in players.iter_mut() {
        player.role = if player.trait_code == hidden {
            Role::Hidden
        } else {
            Role::Seeker
        };
    }

    Ok(hidden)
}
