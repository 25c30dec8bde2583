//! Packed team strings and a seeded roster.
//!
//! A packed team is battlers joined by `]`, each `Species|hp|move,move,...`.
//! A move written `!id` is sealed: unusable, but the player is not told until
//! they try it. `id*N` gives the move N uses instead of the default.

use lockstep_core::{Generation, PerPlayer, PlayerSpec, Seed, SimulatorError, TeamSource};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;

use crate::duel::lookup;

pub const DEFAULT_PP: u8 = 10;
pub const MAX_TEAM: usize = 6;
pub const MAX_MOVES: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TeamError {
    #[error("team is empty")]
    Empty,
    #[error("team has {0} battlers, at most {MAX_TEAM} allowed")]
    TooLarge(usize),
    #[error("malformed battler '{0}'")]
    Malformed(String),
    #[error("unknown move '{0}'")]
    UnknownMove(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveSlot {
    pub id: String,
    pub pp: u8,
    pub sealed: bool,
}

impl MoveSlot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pp: DEFAULT_PP,
            sealed: false,
        }
    }

    pub fn usable(&self) -> bool {
        self.pp > 0 && !self.sealed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonSpec {
    pub species: String,
    pub hp: u16,
    pub moves: Vec<MoveSlot>,
}

pub fn unpack(team: &str) -> Result<Vec<MonSpec>, TeamError> {
    if team.trim().is_empty() {
        return Err(TeamError::Empty);
    }
    let mons = team.split(']').map(unpack_mon).collect::<Result<Vec<_>, _>>()?;
    if mons.len() > MAX_TEAM {
        return Err(TeamError::TooLarge(mons.len()));
    }
    Ok(mons)
}

fn unpack_mon(packed: &str) -> Result<MonSpec, TeamError> {
    let malformed = || TeamError::Malformed(packed.to_owned());
    let mut fields = packed.split('|');
    let (Some(species), Some(hp), Some(moves), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(malformed());
    };
    let hp: u16 = hp.parse().map_err(|_| malformed())?;
    if species.is_empty() || hp == 0 {
        return Err(malformed());
    }
    let moves = moves
        .split(',')
        .filter(|m| !m.is_empty())
        .map(unpack_move)
        .collect::<Result<Vec<_>, _>>()?;
    let repeated = moves
        .iter()
        .enumerate()
        .any(|(i, m)| moves[..i].iter().any(|earlier| earlier.id == m.id));
    if moves.len() > MAX_MOVES || repeated {
        return Err(malformed());
    }
    Ok(MonSpec {
        species: species.to_owned(),
        hp,
        moves,
    })
}

fn unpack_move(packed: &str) -> Result<MoveSlot, TeamError> {
    let (sealed, rest) = match packed.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, packed),
    };
    let (id, pp) = match rest.split_once('*') {
        Some((id, pp)) => (
            id,
            pp.parse()
                .map_err(|_| TeamError::Malformed(packed.to_owned()))?,
        ),
        None => (rest, DEFAULT_PP),
    };
    if lookup(id).is_none() {
        return Err(TeamError::UnknownMove(id.to_owned()));
    }
    Ok(MoveSlot {
        id: id.to_owned(),
        pp,
        sealed,
    })
}

pub fn pack(team: &[MonSpec]) -> String {
    team.iter()
        .map(|mon| {
            let moves: Vec<String> = mon
                .moves
                .iter()
                .map(|m| {
                    let seal = if m.sealed { "!" } else { "" };
                    if m.pp == DEFAULT_PP {
                        format!("{seal}{}", m.id)
                    } else {
                        format!("{seal}{}*{}", m.id, m.pp)
                    }
                })
                .collect();
            format!("{}|{}|{}", mon.species, mon.hp, moves.join(","))
        })
        .collect::<Vec<_>>()
        .join("]")
}

const SPECIES: &[&str] = &[
    "Bulbasaur", "Charmander", "Squirtle", "Pikachu", "Ekans", "Abra", "Machop", "Gastly",
    "Onix", "Eevee", "Snorlax", "Ditto",
];
const MOVE_POOL: &[&str] = &["tackle", "splash", "poisonsting", "absorb", "thrash"];

/// Random teams drawn from a small roster, reproducible from the session seed.
#[derive(Debug, Clone)]
pub struct Roster {
    pub max_team: usize,
    /// Battlers know no moves, so every turn is a pass until the turn limit.
    pub draw_only: bool,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            max_team: 3,
            draw_only: false,
        }
    }
}

impl Roster {
    pub fn team(&self, rng: &mut StdRng) -> Vec<MonSpec> {
        let size = rng.gen_range(1..=self.max_team.clamp(1, MAX_TEAM));
        (0..size)
            .map(|_| {
                let species = SPECIES[rng.gen_range(0..SPECIES.len())];
                let moves = if self.draw_only {
                    Vec::new()
                } else {
                    let count = rng.gen_range(1..=MAX_MOVES);
                    let ids: Vec<&str> = MOVE_POOL.choose_multiple(rng, count).copied().collect();
                    ids.into_iter()
                        .map(|id| MoveSlot {
                            id: id.to_owned(),
                            pp: rng.gen_range(2..=8),
                            sealed: rng.gen_ratio(1, 6),
                        })
                        .collect()
                };
                MonSpec {
                    species: species.to_owned(),
                    hp: rng.gen_range(20..=60),
                    moves,
                }
            })
            .collect()
    }
}

impl TeamSource for Roster {
    fn generate(
        &mut self,
        _generation: Generation,
        seed: Seed,
    ) -> Result<PerPlayer<PlayerSpec>, SimulatorError> {
        let mut rng = StdRng::seed_from_u64(seed.to_u64());
        Ok(PerPlayer::new(
            PlayerSpec::new("Bot 1", pack(&self.team(&mut rng))),
            PlayerSpec::new("Bot 2", pack(&self.team(&mut rng))),
        ))
    }
}
