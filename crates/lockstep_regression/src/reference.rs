//! The reference side: writes raw protocol text, numbers Struggle as move 1,
//! and keeps an input log of every accepted decision.

use lockstep_core::{
    BattleSetup, Choice, ChoiceKind, EventLog, PerPlayer, Player, Request, Seed, Simulator,
    SimulatorError, TurnResult,
};
use serde_json::json;

use crate::duel::{Duel, DuelError};

pub struct ScriptedReference {
    duel: Duel,
    input_log: Vec<String>,
}

impl ScriptedReference {
    fn error(err: DuelError) -> SimulatorError {
        SimulatorError::new(Self::NAME, err.to_string())
    }

    /// Struggle arrives as `move 1` whenever the player has nothing else.
    fn canonical(&self, player: Player, choice: Choice) -> Choice {
        if self.duel.struggling(player) && choice == Choice::move_slot(1) {
            Choice::move_slot(0)
        } else {
            choice
        }
    }

    fn decision(&self, player: Player, choice: Choice) -> Option<String> {
        let body = match choice.kind {
            ChoiceKind::Pass => return None,
            ChoiceKind::Move => format!("move {}", self.duel.move_id(player, choice.data)),
            ChoiceKind::Switch => format!("switch {}", choice.data),
        };
        Some(format!(">{player} {body}"))
    }
}

impl Simulator for ScriptedReference {
    const NAME: &'static str = "reference";

    fn create(setup: &BattleSetup) -> Result<Self, SimulatorError> {
        let duel = Duel::new(setup).map_err(Self::error)?;
        let mut input_log = vec![format!(
            ">start {}",
            json!({ "formatid": setup.format, "seed": setup.seed.words() })
        )];
        for player in Player::ALL {
            let spec = setup.players.get(player);
            input_log.push(format!(
                ">player {player} {}",
                json!({ "name": spec.name, "team": spec.team })
            ));
        }
        Ok(Self { duel, input_log })
    }

    fn start(&mut self) -> Result<TurnResult, SimulatorError> {
        self.duel.start().map_err(Self::error)
    }

    fn advance(&mut self, p1: Choice, p2: Choice) -> Result<TurnResult, SimulatorError> {
        let choices = PerPlayer::new(self.canonical(Player::P1, p1), self.canonical(Player::P2, p2));
        let decisions: Vec<String> = Player::ALL
            .into_iter()
            .filter_map(|p| self.decision(p, *choices.get(p)))
            .collect();
        let result = self.duel.advance(choices).map_err(Self::error)?;
        self.input_log.extend(decisions);
        Ok(result)
    }

    fn request(&self, player: Player) -> Option<Request> {
        self.duel.request(player)
    }

    fn legal_choices(&self, player: Player) -> Vec<Choice> {
        self.duel.legal_choices(player)
    }

    fn choose(&mut self, player: Player, choice: Choice) -> bool {
        let offered_struggle = self
            .duel
            .request(player)
            .is_some_and(|request| request.forced_struggle());
        let choice = if offered_struggle && choice == Choice::move_slot(1) {
            Choice::move_slot(0)
        } else {
            choice
        };
        self.duel.try_choice(player, choice)
    }

    fn move_ids(&self, player: Player) -> Vec<String> {
        self.duel.move_ids(player)
    }

    fn events(&mut self) -> EventLog {
        let chunk = self
            .duel
            .take_events()
            .iter()
            .map(|event| event.line().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        EventLog::Raw(chunk)
    }

    fn random_state(&self) -> Seed {
        self.duel.random_state()
    }

    fn snapshot(&self) -> serde_json::Value {
        self.duel.snapshot()
    }

    fn input_log(&self) -> Vec<String> {
        self.input_log.clone()
    }
}
