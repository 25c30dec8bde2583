//! A small deterministic singles battle both test simulators are built on.
//!
//! Battle logic lives here once; the two adapters differ only in how they
//! address Struggle, what they reveal up front, and how they write the events
//! out. Every random draw goes through the generation's [`Rng`], so both
//! adapters stay in step as long as they see the same choices.

use lockstep_core::{
    BattleSetup, Choice, ChoiceKind, Generation, Outcome, PerPlayer, Player, Prng, ProtocolLine,
    Request, RequestMove, RequestState, Rng, Seed, TurnResult,
};
use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::teams::{unpack, MonSpec, MoveSlot, TeamError};

pub const TURN_LIMIT: u32 = 40;
pub const STRUGGLE_DAMAGE: u16 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DuelError {
    #[error("bad team for {player}: {source}")]
    Team { player: Player, source: TeamError },
    #[error("battle already started")]
    AlreadyStarted,
    #[error("battle has not started")]
    NotStarted,
    #[error("battle is over")]
    Ended,
    #[error("'{choice}' is not a legal choice for {player}")]
    IllegalChoice { player: Player, choice: Choice },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Hit { base: u16, spread: u32 },
    Nothing,
    PoisonSting,
    Drain,
    Thrash,
    Struggle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveData {
    pub id: &'static str,
    pub name: &'static str,
    pub effect: Effect,
}

pub const MOVES: &[MoveData] = &[
    MoveData {
        id: "tackle",
        name: "Tackle",
        effect: Effect::Hit { base: 8, spread: 8 },
    },
    MoveData {
        id: "splash",
        name: "Splash",
        effect: Effect::Nothing,
    },
    MoveData {
        id: "poisonsting",
        name: "Poison Sting",
        effect: Effect::PoisonSting,
    },
    MoveData {
        id: "absorb",
        name: "Absorb",
        effect: Effect::Drain,
    },
    MoveData {
        id: "thrash",
        name: "Thrash",
        effect: Effect::Thrash,
    },
    MoveData {
        id: "struggle",
        name: "Struggle",
        effect: Effect::Struggle,
    },
];

pub fn lookup(id: &str) -> Option<&'static MoveData> {
    MOVES.iter().find(|m| m.id == id)
}

/// Why a battler lost or regained health.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Poison { of: String },
    Drain { of: String },
    Recoil,
}

/// Battle output before either simulator's formatting is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Player { side: Player, name: String },
    GameType,
    Gen(u8),
    Tier(String),
    Blank,
    Timestamp(u32),
    Start,
    Switch { ident: String, species: String, condition: String },
    SilentStatus { ident: String, status: &'static str },
    Move { ident: String, name: &'static str, target: String, locked: bool },
    Nothing,
    Damage { ident: String, condition: String, source: Option<Source> },
    Heal { ident: String, condition: String, source: Source },
    Status { ident: String, status: &'static str },
    Faint { ident: String },
    Debug(String),
    Upkeep,
    Turn(u32),
    Win(String),
    Tie,
}

impl Event {
    /// Reference-only bookkeeping that carries no battle information.
    pub fn is_cosmetic(&self) -> bool {
        matches!(
            self,
            Self::Player { .. }
                | Self::GameType
                | Self::Gen(_)
                | Self::Tier(_)
                | Self::Blank
                | Self::Timestamp(_)
                | Self::Debug(_)
                | Self::Upkeep
        )
    }

    /// The fully attributed protocol line for this event.
    pub fn line(&self) -> ProtocolLine {
        match self {
            Self::Player { side, name } => proto(&["player", side.as_str(), name, ""]),
            Self::GameType => proto(&["gametype", "singles"]),
            Self::Gen(num) => proto(&["gen", &num.to_string()]),
            Self::Tier(tier) => proto(&["tier", tier]),
            Self::Blank => proto(&[""]),
            Self::Timestamp(turn) => proto(&["t:", &turn.to_string()]),
            Self::Start => proto(&["start"]),
            Self::Switch {
                ident,
                species,
                condition,
            } => proto(&["switch", ident, species, condition]),
            Self::SilentStatus { ident, status } => {
                proto(&["-status", ident, status]).with_kw("silent", "")
            }
            Self::Move {
                ident,
                name,
                target,
                locked,
            } => {
                let line = proto(&["move", ident, name, target]);
                if *locked {
                    line.with_kw("from", "lockedmove")
                } else {
                    line
                }
            }
            Self::Nothing => proto(&["-nothing"]),
            Self::Damage {
                ident,
                condition,
                source,
            } => with_source(proto(&["-damage", ident, condition]), source.as_ref()),
            Self::Heal {
                ident,
                condition,
                source,
            } => with_source(proto(&["-heal", ident, condition]), Some(source)),
            Self::Status { ident, status } => proto(&["-status", ident, status]),
            Self::Faint { ident } => proto(&["faint", ident]),
            Self::Debug(message) => proto(&["debug", message]),
            Self::Upkeep => proto(&["upkeep"]),
            Self::Turn(turn) => proto(&["turn", &turn.to_string()]),
            Self::Win(name) => proto(&["win", name]),
            Self::Tie => proto(&["tie"]),
        }
    }
}

fn proto(args: &[&str]) -> ProtocolLine {
    ProtocolLine::new(args.iter().copied())
}

fn with_source(line: ProtocolLine, source: Option<&Source>) -> ProtocolLine {
    match source {
        None => line,
        Some(Source::Poison { of }) => line.with_kw("from", "psn").with_kw("of", of.as_str()),
        Some(Source::Drain { of }) => line.with_kw("from", "drain").with_kw("of", of.as_str()),
        Some(Source::Recoil) => line.with_kw("from", "Recoil"),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mon {
    pub species: String,
    pub hp: u16,
    pub max_hp: u16,
    pub moves: Vec<MoveSlot>,
    pub poisoned: bool,
}

impl Mon {
    fn new(spec: MonSpec) -> Self {
        Self {
            species: spec.species,
            hp: spec.hp,
            max_hp: spec.hp,
            moves: spec.moves,
            poisoned: false,
        }
    }

    pub fn alive(&self) -> bool {
        self.hp > 0
    }

    pub fn condition(&self) -> String {
        if self.hp == 0 {
            "0 fnt".to_owned()
        } else if self.poisoned {
            format!("{}/{} psn", self.hp, self.max_hp)
        } else {
            format!("{}/{}", self.hp, self.max_hp)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Side {
    pub name: String,
    /// The active battler is always first.
    pub team: Vec<Mon>,
    /// Slot index of a move the active battler must repeat next turn.
    pub locked: Option<usize>,
    /// Whether the active battler's sealed moves have been exposed.
    pub revealed: bool,
}

impl Side {
    fn active(&self) -> &Mon {
        &self.team[0]
    }

    fn active_mut(&mut self) -> &mut Mon {
        &mut self.team[0]
    }

    fn defeated(&self) -> bool {
        self.team.iter().all(|mon| !mon.alive())
    }

    fn bench(&self) -> Vec<u8> {
        (2..=self.team.len())
            .filter(|&slot| self.team[slot - 1].alive())
            .map(|slot| slot as u8)
            .collect()
    }

    fn struggling(&self) -> bool {
        self.locked.is_none() && !self.active().moves.iter().any(MoveSlot::usable)
    }
}

#[derive(Clone, Debug)]
pub struct Duel {
    generation: Generation,
    rng: Rng,
    sides: PerPlayer<Side>,
    turn: u32,
    outcome: Option<Outcome>,
    states: PerPlayer<RequestState>,
    events: Vec<Event>,
    debug: bool,
}

impl Duel {
    pub fn new(setup: &BattleSetup) -> Result<Self, DuelError> {
        let side = |player: Player| -> Result<Side, DuelError> {
            let spec = setup.players.get(player);
            let team = unpack(&spec.team).map_err(|source| DuelError::Team { player, source })?;
            Ok(Side {
                name: spec.name.clone(),
                team: team.into_iter().map(Mon::new).collect(),
                locked: None,
                revealed: false,
            })
        };
        Ok(Self {
            generation: setup.generation,
            rng: Rng::new(setup.generation, setup.seed),
            sides: PerPlayer::new(side(Player::P1)?, side(Player::P2)?),
            turn: 0,
            outcome: None,
            states: PerPlayer::default(),
            events: Vec::new(),
            debug: setup.debug,
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn random_state(&self) -> Seed {
        self.rng.seed()
    }

    pub fn side(&self, player: Player) -> &Side {
        self.sides.get(player)
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(&self.sides).unwrap_or_default()
    }

    pub fn result(&self) -> TurnResult {
        TurnResult::new(self.outcome, self.states.p1, self.states.p2)
    }

    pub fn start(&mut self) -> Result<TurnResult, DuelError> {
        if self.turn != 0 {
            return Err(DuelError::AlreadyStarted);
        }
        for player in Player::ALL {
            let name = self.sides.get(player).name.clone();
            self.events.push(Event::Player { side: player, name });
        }
        self.events.push(Event::GameType);
        self.events.push(Event::Gen(self.generation.num()));
        self.events.push(Event::Tier(format!("[Gen {}] Custom Game", self.generation.num())));
        self.events.push(Event::Blank);
        self.events.push(Event::Timestamp(0));
        self.events.push(Event::Start);
        for player in Player::ALL {
            self.announce_switch(player);
        }
        self.turn = 1;
        self.events.push(Event::Turn(self.turn));
        self.states = self.normal_states();
        Ok(self.result())
    }

    pub fn advance(&mut self, choices: PerPlayer<Choice>) -> Result<TurnResult, DuelError> {
        if self.outcome.is_some() {
            return Err(DuelError::Ended);
        }
        if self.turn == 0 {
            return Err(DuelError::NotStarted);
        }
        for player in Player::ALL {
            let choice = *choices.get(player);
            if !self.legal_choices(player).contains(&choice) {
                return Err(DuelError::IllegalChoice { player, choice });
            }
        }

        self.events.push(Event::Blank);
        self.events.push(Event::Timestamp(self.turn));
        let forced_switch = Player::ALL
            .iter()
            .any(|&p| *self.states.get(p) == RequestState::Switch);

        self.switch_phase(&choices);
        if !forced_switch {
            self.move_phase(&choices);
            self.residual();
        }
        self.end_turn(!forced_switch);
        Ok(self.result())
    }

    /// `None` while nothing is being asked of the player.
    pub fn request(&self, player: Player) -> Option<Request> {
        if self.outcome.is_some() {
            return None;
        }
        let side = self.sides.get(player);
        match self.states.get(player) {
            RequestState::Pass => {
                let opponent_switching = *self.states.get(player.opponent()) == RequestState::Switch;
                opponent_switching.then(Request::wait)
            }
            RequestState::Switch => Some(Request {
                state: RequestState::Switch,
                switches: side.bench(),
                ..Request::default()
            }),
            RequestState::Move => {
                let mon = side.active();
                let (moves, switches) = if let Some(locked) = side.locked {
                    let slot = &mon.moves[locked];
                    (vec![request_move(locked, slot, false)], Vec::new())
                } else {
                    let visible: Vec<RequestMove> = mon
                        .moves
                        .iter()
                        .enumerate()
                        .map(|(i, m)| request_move(i, m, m.pp == 0 || (m.sealed && side.revealed)))
                        .collect();
                    let moves = if visible.iter().all(|m| m.disabled) {
                        vec![RequestMove {
                            slot: 1,
                            id: "struggle".to_owned(),
                            disabled: false,
                        }]
                    } else {
                        visible
                    };
                    (moves, side.bench())
                };
                Some(Request {
                    state: RequestState::Move,
                    wait: false,
                    moves,
                    switches,
                })
            }
        }
    }

    /// Struggle is `move 0`.
    pub fn legal_choices(&self, player: Player) -> Vec<Choice> {
        let side = self.sides.get(player);
        let switches = side.bench().into_iter().map(Choice::switch_slot);
        match self.states.get(player) {
            _ if self.outcome.is_some() => vec![Choice::PASS],
            RequestState::Pass => vec![Choice::PASS],
            RequestState::Switch => switches.collect(),
            RequestState::Move => {
                if let Some(locked) = side.locked {
                    return vec![Choice::move_slot(locked as u8 + 1)];
                }
                let mut legal: Vec<Choice> = side
                    .active()
                    .moves
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.usable())
                    .map(|(i, _)| Choice::move_slot(i as u8 + 1))
                    .collect();
                if legal.is_empty() {
                    legal.push(Choice::move_slot(0));
                }
                legal.extend(switches);
                legal
            }
        }
    }

    pub fn struggling(&self, player: Player) -> bool {
        *self.states.get(player) == RequestState::Move && self.sides.get(player).struggling()
    }

    /// Offers a choice without advancing. Trying a sealed move exposes every
    /// sealed move of the active battler.
    pub fn try_choice(&mut self, player: Player, choice: Choice) -> bool {
        if self.legal_choices(player).contains(&choice) {
            return true;
        }
        let side = self.sides.get_mut(player);
        if choice.kind == ChoiceKind::Move {
            let sealed = side
                .active()
                .moves
                .get(usize::from(choice.data).wrapping_sub(1))
                .is_some_and(|m| m.sealed);
            if sealed {
                side.revealed = true;
            }
        }
        false
    }

    pub fn move_ids(&self, player: Player) -> Vec<String> {
        self.sides
            .get(player)
            .active()
            .moves
            .iter()
            .map(|m| m.id.clone())
            .collect()
    }

    /// Move id the choice refers to, as the reference records it.
    pub fn move_id(&self, player: Player, slot: u8) -> String {
        if slot == 0 {
            return "struggle".to_owned();
        }
        self.sides
            .get(player)
            .active()
            .moves
            .get(usize::from(slot) - 1)
            .map_or_else(|| slot.to_string(), |m| m.id.clone())
    }

    fn ident(&self, player: Player) -> String {
        format!("{}a: {}", player.as_str(), self.sides.get(player).active().species)
    }

    fn normal_states(&self) -> PerPlayer<RequestState> {
        PerPlayer::from_fn(|p| {
            if self.sides.get(p).active().moves.is_empty() {
                RequestState::Pass
            } else {
                RequestState::Move
            }
        })
    }

    fn announce_switch(&mut self, player: Player) {
        let mon = self.sides.get(player).active();
        let event = Event::Switch {
            ident: self.ident(player),
            species: mon.species.clone(),
            condition: mon.condition(),
        };
        self.events.push(event);
    }

    /// All switches are announced before any silent status of the incoming
    /// battlers.
    fn switch_phase(&mut self, choices: &PerPlayer<Choice>) {
        let mut switched = Vec::new();
        for player in Player::ALL {
            let choice = *choices.get(player);
            if choice.kind != ChoiceKind::Switch {
                continue;
            }
            let side = self.sides.get_mut(player);
            side.team.swap(0, usize::from(choice.data) - 1);
            side.locked = None;
            side.revealed = false;
            self.announce_switch(player);
            switched.push(player);
        }
        for player in switched {
            if self.sides.get(player).active().poisoned {
                let ident = self.ident(player);
                self.events.push(Event::SilentStatus { ident, status: "psn" });
            }
        }
    }

    fn move_phase(&mut self, choices: &PerPlayer<Choice>) {
        let movers: Vec<Player> = Player::ALL
            .into_iter()
            .filter(|&p| choices.get(p).kind == ChoiceKind::Move)
            .collect();
        let order = if movers.len() == 2 {
            let first = if self.draw(2) == 0 { Player::P1 } else { Player::P2 };
            vec![first, first.opponent()]
        } else {
            movers
        };
        for player in order {
            let both_standing = Player::ALL.iter().all(|&p| self.sides.get(p).active().alive());
            if both_standing {
                self.use_move(player, choices.get(player).data);
            }
        }
    }

    fn use_move(&mut self, player: Player, slot: u8) {
        let target = player.opponent();
        let side = self.sides.get_mut(player);
        let (id, locked) = match side.locked.take() {
            Some(index) => (side.active().moves[index].id.clone(), Some(index)),
            None if slot == 0 => ("struggle".to_owned(), None),
            None => {
                let index = usize::from(slot) - 1;
                let m = &mut side.active_mut().moves[index];
                m.pp -= 1;
                (m.id.clone(), None)
            }
        };
        let Some(data) = lookup(&id) else {
            return;
        };
        let event = Event::Move {
            ident: self.ident(player),
            name: data.name,
            target: self.ident(target),
            locked: locked.is_some(),
        };
        self.events.push(event);

        match data.effect {
            Effect::Nothing => self.events.push(Event::Nothing),
            Effect::Hit { base, spread } => {
                let amount = base + self.roll(spread);
                self.deal(target, amount, None);
            }
            Effect::PoisonSting => {
                let amount = 4 + self.roll(4);
                self.deal(target, amount, None);
                let victim = self.sides.get(target).active();
                let exposed = victim.alive() && !victim.poisoned;
                if exposed && self.draw(4) == 0 {
                    self.sides.get_mut(target).active_mut().poisoned = true;
                    let ident = self.ident(target);
                    self.events.push(Event::Status { ident, status: "psn" });
                }
            }
            Effect::Drain => {
                let amount = 6 + self.roll(4);
                let dealt = self.deal(target, amount, None);
                let of = self.ident(target);
                let mon = self.sides.get_mut(player).active_mut();
                if mon.hp < mon.max_hp {
                    mon.hp = (mon.hp + (dealt / 2).max(1)).min(mon.max_hp);
                    let (ident, condition) = (self.ident(player), self.sides.get(player).active().condition());
                    self.events.push(Event::Heal {
                        ident,
                        condition,
                        source: Source::Drain { of },
                    });
                }
            }
            Effect::Thrash => {
                let amount = 10 + self.roll(6);
                self.deal(target, amount, None);
                let side = self.sides.get_mut(player);
                if locked.is_none() && side.active().alive() {
                    side.locked = Some(usize::from(slot) - 1);
                }
            }
            Effect::Struggle => {
                self.deal(target, STRUGGLE_DAMAGE, None);
                let recoil = (self.sides.get(player).active().max_hp / 4).max(1);
                self.deal(player, recoil, Some(Source::Recoil));
            }
        }
    }

    fn residual(&mut self) {
        for player in Player::ALL {
            let mon = self.sides.get(player).active();
            if mon.alive() && mon.poisoned {
                let amount = (mon.max_hp / 16).max(1);
                let of = self.ident(player.opponent());
                self.deal(player, amount, Some(Source::Poison { of }));
            }
        }
    }

    fn deal(&mut self, player: Player, amount: u16, source: Option<Source>) -> u16 {
        let side = self.sides.get_mut(player);
        let mon = side.active_mut();
        let dealt = amount.min(mon.hp);
        mon.hp -= dealt;
        let fainted = !mon.alive();
        if fainted {
            side.locked = None;
        }
        let event = Event::Damage {
            ident: self.ident(player),
            condition: self.sides.get(player).active().condition(),
            source,
        };
        self.events.push(event);
        if fainted {
            let ident = self.ident(player);
            self.events.push(Event::Faint { ident });
        }
        dealt
    }

    fn draw(&mut self, range: u32) -> u32 {
        let value = self.rng.next(range);
        trace!(target: "duel", range, value, "draw");
        value
    }

    fn roll(&mut self, spread: u32) -> u16 {
        let value = self.draw(spread);
        if self.debug {
            self.events.push(Event::Debug(format!("roll {value}/{spread}")));
        }
        value as u16
    }

    fn end_turn(&mut self, moved: bool) {
        let defeated = PerPlayer::from_fn(|p| self.sides.get(p).defeated());
        let outcome = match (defeated.p1, defeated.p2) {
            (true, true) => Some(Outcome::Tie),
            (true, false) => Some(Outcome::Lose),
            (false, true) => Some(Outcome::Win),
            (false, false) => None,
        };
        if let Some(outcome) = outcome {
            self.finish(outcome);
            return;
        }
        if moved {
            self.events.push(Event::Upkeep);
        }

        let fainted = PerPlayer::from_fn(|p| !self.sides.get(p).active().alive());
        if fainted.p1 || fainted.p2 {
            self.states = PerPlayer::from_fn(|p| {
                if *fainted.get(p) {
                    RequestState::Switch
                } else {
                    RequestState::Pass
                }
            });
            return;
        }

        self.turn += 1;
        if self.turn > TURN_LIMIT {
            self.finish(Outcome::Tie);
            return;
        }
        self.events.push(Event::Turn(self.turn));
        self.states = self.normal_states();
    }

    fn finish(&mut self, outcome: Outcome) {
        let event = match outcome {
            Outcome::Win => Event::Win(self.sides.p1.name.clone()),
            Outcome::Lose => Event::Win(self.sides.p2.name.clone()),
            Outcome::Tie => Event::Tie,
        };
        self.events.push(event);
        self.outcome = Some(outcome);
        self.states = PerPlayer::default();
    }
}

fn request_move(index: usize, slot: &MoveSlot, disabled: bool) -> RequestMove {
    RequestMove {
        slot: index as u8 + 1,
        id: slot.id.clone(),
        disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_core::PlayerSpec;

    fn duel(p1: &str, p2: &str, generation: u8) -> Duel {
        let players = PerPlayer::new(PlayerSpec::new("Bot 1", p1), PlayerSpec::new("Bot 2", p2));
        let setup = BattleSetup::new(Generation::new(generation).unwrap(), Seed::default(), players);
        Duel::new(&setup).unwrap()
    }

    #[test]
    fn forced_switch_after_a_faint() {
        let mut duel = duel("Mew|1|tackle]Abra|30|tackle", "Ditto|30|tackle", 1);
        duel.start().unwrap();
        let result = duel
            .advance(PerPlayer::new(Choice::move_slot(1), Choice::move_slot(1)))
            .unwrap();
        assert_eq!(RequestState::Switch, result.p1);
        assert_eq!(RequestState::Pass, result.p2);
        assert_eq!(vec![Choice::switch_slot(2)], duel.legal_choices(Player::P1));
        assert!(duel.request(Player::P2).unwrap().wait);
    }

    #[test]
    fn sealed_moves_hide_until_tried() {
        let mut duel = duel("Mew|30|!tackle,splash", "Ditto|30|splash", 2);
        duel.start().unwrap();
        let request = duel.request(Player::P1).unwrap();
        assert!(!request.moves[0].disabled);
        assert_eq!(vec![Choice::move_slot(2)], duel.legal_choices(Player::P1));

        assert!(!duel.try_choice(Player::P1, Choice::move_slot(1)));
        assert!(duel.request(Player::P1).unwrap().moves[0].disabled);
    }

    #[test]
    fn struggle_when_nothing_is_usable() {
        let mut duel = duel("Mew|30|splash*1", "Ditto|30|splash", 3);
        duel.start().unwrap();
        duel.advance(PerPlayer::new(Choice::move_slot(1), Choice::move_slot(1)))
            .unwrap();
        assert!(duel.struggling(Player::P1));
        assert!(duel.request(Player::P1).unwrap().forced_struggle());
        assert_eq!(vec![Choice::move_slot(0)], duel.legal_choices(Player::P1));
        duel.take_events();

        duel.advance(PerPlayer::new(Choice::move_slot(0), Choice::move_slot(1)))
            .unwrap();
        let recoil = duel
            .take_events()
            .into_iter()
            .any(|e| matches!(e, Event::Damage { source: Some(Source::Recoil), .. }));
        assert!(recoil);
    }

    #[test]
    fn thrash_locks_for_one_more_turn() {
        let mut duel = duel("Mew|60|thrash,splash", "Snorlax|60|splash", 5);
        duel.start().unwrap();
        duel.advance(PerPlayer::new(Choice::move_slot(1), Choice::move_slot(1)))
            .unwrap();
        assert_eq!(vec![Choice::move_slot(1)], duel.legal_choices(Player::P1));
        assert!(duel.request(Player::P1).unwrap().switches.is_empty());
        duel.take_events();

        duel.advance(PerPlayer::new(Choice::move_slot(1), Choice::move_slot(1)))
            .unwrap();
        let locked = duel
            .take_events()
            .into_iter()
            .any(|e| matches!(e, Event::Move { locked: true, .. }));
        assert!(locked);
        assert_eq!(2, duel.legal_choices(Player::P1).len());
    }

    #[test]
    fn moveless_battles_run_out_the_clock() {
        let mut duel = duel("Mew|30|", "Ditto|30|", 4);
        let mut result = duel.start().unwrap();
        let seed = duel.random_state();
        let mut turns = 0;
        while !result.ended() {
            result = duel.advance(PerPlayer::new(Choice::PASS, Choice::PASS)).unwrap();
            turns += 1;
        }
        assert_eq!(TURN_LIMIT, turns);
        assert_eq!(Some(Outcome::Tie), result.outcome);
        assert_eq!(seed, duel.random_state());
        assert_eq!(Err(DuelError::Ended), duel.advance(PerPlayer::default()));
    }

    #[test]
    fn illegal_choices_are_refused() {
        let mut duel = duel("Mew|30|tackle", "Ditto|30|tackle", 6);
        assert_eq!(Err(DuelError::NotStarted), duel.advance(PerPlayer::default()));
        duel.start().unwrap();
        assert!(matches!(
            duel.advance(PerPlayer::new(Choice::switch_slot(2), Choice::move_slot(1))),
            Err(DuelError::IllegalChoice { player: Player::P1, .. })
        ));
    }
}
