use thiserror::Error;

use crate::choice::{Choice, MalformedChoiceError, Player};
use crate::prng::Seed;
use crate::protocol::ProtocolMismatch;
use crate::simulator::{SimulatorError, TurnResult};

/// Setup problems that make a session impossible to start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("seed must have 4 words, found {found}")]
    SeedArity { found: usize },
    #[error("malformed seed '{input}'")]
    MalformedSeed { input: String },
    #[error("unsupported generation {0}")]
    UnsupportedGeneration(u8),
    #[error("unrecognized format id '{0}'")]
    UnknownFormat(String),
    #[error("malformed input log header (line {line}): {reason}")]
    MalformedHeader { line: usize, reason: String },
}

/// The recorded transcript and the live simulators disagree about whose turn it is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DesyncError {
    #[error("unexpected input {index}: '{line}'")]
    UnexpectedInput { index: usize, line: String },
    #[error("invalid choice data: '{token}'")]
    InvalidChoiceData { token: String },
    #[error("already have choice for {player}: '{existing}' vs. '{found}'")]
    DuplicateChoice {
        player: Player,
        existing: Choice,
        found: Choice,
    },
    #[error("invalid choice for {player} when move is forced: '{found}'")]
    ForcedMoveViolation { player: Player, found: Choice },
    #[error("unable to resolve choices for {}", join_players(.unresolved))]
    Exhausted { unresolved: Vec<Player> },
}

/// The two simulators stopped agreeing.
#[derive(Debug, Error)]
pub enum Divergence {
    #[error(transparent)]
    Protocol(#[from] Box<ProtocolMismatch>),
    #[error("result mismatch: reference {reference:?}, candidate {candidate:?}")]
    Result {
        reference: TurnResult,
        candidate: TurnResult,
    },
    #[error("random state mismatch: reference {reference:?}, candidate {candidate:?}")]
    RandomState { reference: Seed, candidate: Seed },
    #[error(
        "'{choice}' is not one of {}'s choices: [{}]",
        .player.as_str().to_uppercase(),
        join_choices(.options)
    )]
    IllegalChoice {
        player: Player,
        choice: Choice,
        options: Vec<Choice>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{player} found no acceptable choice after {rounds} rejections (last offered '{choice}')")]
    NonConvergence {
        player: Player,
        choice: Choice,
        rounds: usize,
    },
    #[error("simulator accepted '{choice}' for {player} but does not list it as legal")]
    AcceptedUnlisted { player: Player, choice: Choice },
}

#[derive(Debug, Error)]
pub enum LockstepError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Choice(#[from] MalformedChoiceError),
    #[error(transparent)]
    Desync(#[from] DesyncError),
    #[error(transparent)]
    Divergence(#[from] Divergence),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
}

impl LockstepError {
    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::Divergence(_))
    }
}

fn join_players(players: &[Player]) -> String {
    players
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_choices(choices: &[Choice]) -> String {
    choices
        .iter()
        .map(|c| format!("'{c}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
