//! Player decisions as both simulators understand them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed choice '{input}' (expected 'pass', 'move N' or 'switch N')")]
pub struct MalformedChoiceError {
    pub input: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceKind {
    #[default]
    Pass,
    Move,
    Switch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Choice {
    pub kind: ChoiceKind,
    pub data: u8,
}

impl Choice {
    pub const PASS: Choice = Choice {
        kind: ChoiceKind::Pass,
        data: 0,
    };

    pub const fn move_slot(slot: u8) -> Self {
        Self {
            kind: ChoiceKind::Move,
            data: slot,
        }
    }

    pub const fn switch_slot(slot: u8) -> Self {
        Self {
            kind: ChoiceKind::Switch,
            data: slot,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.kind == ChoiceKind::Pass
    }

    pub fn parse(text: &str) -> Result<Self, MalformedChoiceError> {
        let malformed = || MalformedChoiceError {
            input: text.to_owned(),
        };
        if text == "pass" {
            return Ok(Self::PASS);
        }
        let (kind, data) = text.split_once(' ').ok_or_else(malformed)?;
        // Reject signs and padding that u8::from_str would otherwise tolerate.
        if data.is_empty() || !data.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let data = data.parse::<u8>().map_err(|_| malformed())?;
        match kind {
            "move" => Ok(Self::move_slot(data)),
            "switch" => Ok(Self::switch_slot(data)),
            _ => Err(malformed()),
        }
    }
}

impl FromStr for Choice {
    type Err = MalformedChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChoiceKind::Pass => f.write_str("pass"),
            ChoiceKind::Move => write!(f, "move {}", self.data),
            ChoiceKind::Switch => write!(f, "switch {}", self.data),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Player {
    P1,
    P2,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::P1, Player::P2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::P1 => Self::P2,
            Self::P2 => Self::P1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Player {
    type Err = MalformedChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p1" => Ok(Self::P1),
            "p2" => Ok(Self::P2),
            _ => Err(MalformedChoiceError {
                input: s.to_owned(),
            }),
        }
    }
}

/// One value per player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerPlayer<T> {
    pub p1: T,
    pub p2: T,
}

impl<T> PerPlayer<T> {
    pub fn new(p1: T, p2: T) -> Self {
        Self { p1, p2 }
    }

    pub fn from_fn(mut f: impl FnMut(Player) -> T) -> Self {
        Self {
            p1: f(Player::P1),
            p2: f(Player::P2),
        }
    }

    pub fn get(&self, player: Player) -> &T {
        match player {
            Player::P1 => &self.p1,
            Player::P2 => &self.p2,
        }
    }

    pub fn get_mut(&mut self, player: Player) -> &mut T {
        match player {
            Player::P1 => &mut self.p1,
            Player::P2 => &mut self.p2,
        }
    }
}
