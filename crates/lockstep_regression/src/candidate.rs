//! The candidate side: structured lines only, Struggle as `move 0`, and the
//! terser attribution a reimplementation would plausibly write.

use lockstep_core::{
    BattleSetup, Choice, EventLog, PerPlayer, Player, ProtocolLine, Request, Seed, Simulator,
    SimulatorError, TurnResult,
};

use crate::duel::{Duel, DuelError, Event, Source};

pub struct ScriptedCandidate {
    duel: Duel,
}

impl ScriptedCandidate {
    fn error(err: DuelError) -> SimulatorError {
        SimulatorError::new(Self::NAME, err.to_string())
    }
}

/// Leaves out bookkeeping, drops the attribution the reference adds and
/// announces each silent status right before the switch it belongs to.
pub fn render(events: &[Event]) -> Vec<ProtocolLine> {
    let mut lines: Vec<ProtocolLine> = Vec::new();
    let mut switches: Vec<(String, usize)> = Vec::new();
    for event in events.iter().filter(|e| !e.is_cosmetic()) {
        match event {
            Event::Switch { ident, .. } => {
                switches.push((ident.clone(), lines.len()));
                lines.push(event.line());
            }
            Event::SilentStatus { ident, .. } => {
                let at = switches
                    .iter()
                    .rev()
                    .find(|(switched, _)| switched == ident)
                    .map_or(lines.len(), |&(_, index)| index);
                for (_, index) in switches.iter_mut().filter(|(_, index)| *index >= at) {
                    *index += 1;
                }
                lines.insert(at, event.line());
            }
            Event::Move { .. } => {
                let mut line = event.line();
                line.kw_args.remove("from");
                lines.push(line);
            }
            Event::Damage {
                source: Some(Source::Poison { .. }),
                ..
            } => {
                let mut line = event.line();
                line.kw_args.remove("of");
                lines.push(line);
            }
            _ => lines.push(event.line()),
        }
    }
    lines
}

impl Simulator for ScriptedCandidate {
    const NAME: &'static str = "candidate";

    fn create(setup: &BattleSetup) -> Result<Self, SimulatorError> {
        let duel = Duel::new(setup).map_err(Self::error)?;
        Ok(Self { duel })
    }

    fn start(&mut self) -> Result<TurnResult, SimulatorError> {
        self.duel.start().map_err(Self::error)
    }

    fn advance(&mut self, p1: Choice, p2: Choice) -> Result<TurnResult, SimulatorError> {
        self.duel
            .advance(PerPlayer::new(p1, p2))
            .map_err(Self::error)
    }

    fn request(&self, player: Player) -> Option<Request> {
        self.duel.request(player)
    }

    fn legal_choices(&self, player: Player) -> Vec<Choice> {
        self.duel.legal_choices(player)
    }

    fn choose(&mut self, player: Player, choice: Choice) -> bool {
        self.duel.try_choice(player, choice)
    }

    fn move_ids(&self, player: Player) -> Vec<String> {
        self.duel.move_ids(player)
    }

    fn events(&mut self) -> EventLog {
        EventLog::Parsed(render(&self.duel.take_events()))
    }

    fn random_state(&self) -> Seed {
        self.duel.random_state()
    }

    fn snapshot(&self) -> serde_json::Value {
        self.duel.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_core::{compare, NormalizationRules};

    fn switch(ident: &str) -> Event {
        Event::Switch {
            ident: ident.to_owned(),
            species: "Ekans".to_owned(),
            condition: "20/30 psn".to_owned(),
        }
    }

    fn silent(ident: &str) -> Event {
        Event::SilentStatus {
            ident: ident.to_owned(),
            status: "psn",
        }
    }

    fn reference(events: &[Event]) -> EventLog {
        let chunk = events
            .iter()
            .map(|e| e.line().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        EventLog::Raw(chunk)
    }

    #[test]
    fn statuses_lead_their_own_switch() {
        let events = [switch("p1a: Ekans"), switch("p2a: Ekans"), silent("p1a: Ekans"), silent("p2a: Ekans")];
        let names: Vec<String> = render(&events)
            .iter()
            .map(|l| format!("{} {}", l.name(), l.arg(1).unwrap_or_default()))
            .collect();
        assert_eq!(
            vec![
                "-status p1a: Ekans",
                "switch p1a: Ekans",
                "-status p2a: Ekans",
                "switch p2a: Ekans",
            ],
            names
        );
    }

    #[test]
    fn rendered_turns_match_the_reference_once_normalized() {
        let events = vec![
            Event::Blank,
            Event::Timestamp(3),
            switch("p1a: Ekans"),
            silent("p1a: Ekans"),
            Event::Move {
                ident: "p2a: Mew".to_owned(),
                name: "Thrash",
                target: "p1a: Ekans".to_owned(),
                locked: true,
            },
            Event::Damage {
                ident: "p1a: Ekans".to_owned(),
                condition: "8/30 psn".to_owned(),
                source: None,
            },
            Event::Damage {
                ident: "p1a: Ekans".to_owned(),
                condition: "7/30 psn".to_owned(),
                source: Some(Source::Poison {
                    of: "p2a: Mew".to_owned(),
                }),
            },
            Event::Upkeep,
            Event::Turn(4),
        ];
        let candidate = EventLog::Parsed(render(&events));
        let rules = NormalizationRules::builtin();
        assert!(compare(&rules, &reference(&events), &candidate).is_ok());
        assert!(compare(&NormalizationRules::strict(), &reference(&events), &candidate).is_err());
    }

    #[test]
    fn drain_keeps_its_source() {
        let heal = Event::Heal {
            ident: "p1a: Bulbasaur".to_owned(),
            condition: "30/40".to_owned(),
            source: Source::Drain {
                of: "p2a: Onix".to_owned(),
            },
        };
        let lines = render(std::slice::from_ref(&heal));
        assert_eq!("|-heal|p1a: Bulbasaur|30/40|[from] drain|[of] p2a: Onix", lines[0].to_string());
    }
}
