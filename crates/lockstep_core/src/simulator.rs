//! The capability interface the orchestrator drives both simulators through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::choice::{Choice, PerPlayer, Player};
use crate::prng::{Generation, Seed};
use crate::protocol::{parse_chunk, ProtocolLine};

pub const STRUGGLE: &str = "struggle";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{simulator}: {message}")]
pub struct SimulatorError {
    pub simulator: String,
    pub message: String,
}

impl SimulatorError {
    pub fn new(simulator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            simulator: simulator.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    #[default]
    Pass,
    Move,
    Switch,
}

/// Battle outcome from player 1's perspective.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Tie,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnResult {
    pub outcome: Option<Outcome>,
    pub p1: RequestState,
    pub p2: RequestState,
}

impl TurnResult {
    pub fn new(outcome: Option<Outcome>, p1: RequestState, p2: RequestState) -> Self {
        Self { outcome, p1, p2 }
    }

    pub fn ended(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn state(&self, player: Player) -> RequestState {
        match player {
            Player::P1 => self.p1,
            Player::P2 => self.p2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMove {
    pub slot: u8,
    pub id: String,
    #[serde(default)]
    pub disabled: bool,
}

/// What a simulator currently asks of one player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub state: RequestState,
    #[serde(default)]
    pub wait: bool,
    #[serde(default)]
    pub moves: Vec<RequestMove>,
    #[serde(default)]
    pub switches: Vec<u8>,
}

impl Request {
    pub fn wait() -> Self {
        Self {
            wait: true,
            ..Self::default()
        }
    }

    pub fn forced_struggle(&self) -> bool {
        self.moves.first().is_some_and(|m| m.id == STRUGGLE)
    }
}

/// How a simulator numbers the Struggle move it forces when nothing else is usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StruggleSlot {
    Zero,
    One,
}

impl StruggleSlot {
    /// Re-addresses a `move 0` (canonical Struggle) choice for this simulator.
    pub fn submit(self, choice: Choice) -> Choice {
        match self {
            Self::One if choice == Choice::move_slot(0) => Choice::move_slot(1),
            _ => choice,
        }
    }
}

/// Per-turn output, either as the protocol text the simulator wrote or as
/// lines it already structured itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "events", rename_all = "lowercase")]
pub enum EventLog {
    Raw(String),
    Parsed(Vec<ProtocolLine>),
}

impl EventLog {
    pub fn lines(&self) -> Vec<ProtocolLine> {
        match self {
            Self::Raw(chunk) => parse_chunk(chunk),
            Self::Parsed(lines) => lines.clone(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Raw(chunk) => chunk.clone(),
            Self::Parsed(lines) => lines
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::Parsed(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSpec {
    pub name: String,
    pub team: String,
}

impl PlayerSpec {
    pub fn new(name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
        }
    }
}

/// Everything both simulators must be created from identically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSetup {
    pub format: String,
    pub generation: Generation,
    pub seed: Seed,
    pub players: PerPlayer<PlayerSpec>,
    /// Ask the simulators for their extra diagnostic output.
    #[serde(default)]
    pub debug: bool,
}

impl BattleSetup {
    pub fn new(generation: Generation, seed: Seed, players: PerPlayer<PlayerSpec>) -> Self {
        Self {
            format: generation.format_id(),
            generation,
            seed,
            players,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// A battle simulator driven in lockstep.
///
/// Choices passed to `advance` and `choose` use the simulator's own Struggle
/// addressing; `legal_choices` always reports Struggle as `move 0`.
pub trait Simulator {
    const NAME: &'static str;

    fn create(setup: &BattleSetup) -> Result<Self, SimulatorError>
    where
        Self: Sized;

    /// Registers both players and emits the opening output.
    fn start(&mut self) -> Result<TurnResult, SimulatorError> {
        self.advance(Choice::PASS, Choice::PASS)
    }

    fn advance(&mut self, p1: Choice, p2: Choice) -> Result<TurnResult, SimulatorError>;

    /// `None` when nothing is pending for the player.
    fn request(&self, player: Player) -> Option<Request>;

    fn legal_choices(&self, player: Player) -> Vec<Choice>;

    /// Offers a choice outside of `advance`. Rejection must leave the battle
    /// state untouched but may update the player's request.
    fn choose(&mut self, player: Player, choice: Choice) -> bool;

    /// Move ids of the player's active battler, in slot order.
    fn move_ids(&self, player: Player) -> Vec<String>;

    /// Output produced since the previous call.
    fn events(&mut self) -> EventLog;

    fn random_state(&self) -> Seed;

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn input_log(&self) -> Vec<String> {
        Vec::new()
    }
}
