//! Scripted reference and candidate simulators sharing one small battle
//! engine, for exercising the lockstep harness end to end.

pub mod candidate;
pub mod duel;
pub mod reference;
pub mod teams;

pub use candidate::ScriptedCandidate;
pub use duel::{Duel, DuelError, Event};
pub use reference::ScriptedReference;
pub use teams::{pack, unpack, MonSpec, MoveSlot, Roster, TeamError};
