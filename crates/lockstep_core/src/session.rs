//! Drives a reference and a candidate simulator through the same battle one
//! decision at a time, failing on the first observable disagreement.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::choice::{Choice, PerPlayer, Player};
use crate::error::{Divergence, LockstepError};
use crate::input_log::{InputLog, Replayer};
use crate::policy::Policy;
use crate::prng::Seed;
use crate::protocol::{compare, NormalizationRules};
use crate::report::{FailureReport, FailureSink};
use crate::resolver::resolve;
use crate::simulator::{BattleSetup, EventLog, Simulator, StruggleSlot, TurnResult};

/// The reference numbers Struggle as its first move slot.
pub const REFERENCE_STRUGGLE: StruggleSlot = StruggleSlot::One;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Playing,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Replay,
}

/// One simulator's view of a single state and the choices made in response.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Frame {
    pub choices: Option<PerPlayer<Choice>>,
    pub result: Option<TurnResult>,
    pub random_state: Option<Seed>,
    pub events: Option<EventLog>,
    pub snapshot: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Sides<T> {
    pub reference: T,
    pub candidate: T,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    pub turns: usize,
    pub result: TurnResult,
    pub random_state: Seed,
    pub phase: Phase,
    pub input_log: Vec<String>,
}

enum Driver<'a> {
    Live(PerPlayer<&'a mut dyn Policy>),
    Replay {
        log: &'a InputLog,
        replayer: Replayer,
    },
}

impl Driver<'_> {
    fn mode(&self) -> Mode {
        match self {
            Self::Live(_) => Mode::Live,
            Self::Replay { .. } => Mode::Replay,
        }
    }

    fn exhausted(&self) -> bool {
        match self {
            Self::Live(_) => false,
            Self::Replay { log, replayer } => replayer.is_exhausted(log),
        }
    }
}

pub struct Session<R, C> {
    setup: BattleSetup,
    rules: NormalizationRules,
    reference: R,
    candidate: C,
    phase: Phase,
    turns: usize,
    frames: Sides<Vec<Frame>>,
    partial: Sides<Frame>,
}

impl<R: Simulator, C: Simulator> Session<R, C> {
    pub fn new(setup: BattleSetup, rules: NormalizationRules) -> Result<Self, LockstepError> {
        let reference = R::create(&setup)?;
        let candidate = C::create(&setup)?;
        Ok(Self {
            setup,
            rules,
            reference,
            candidate,
            phase: Phase::NotStarted,
            turns: 0,
            frames: Sides::default(),
            partial: Sides::default(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn setup(&self) -> &BattleSetup {
        &self.setup
    }

    /// Plays the battle to completion with each player's choices coming from
    /// their policy, converged onto the reference's legal choices.
    pub fn play_live(
        mut self,
        policies: PerPlayer<&mut dyn Policy>,
        sink: &mut dyn FailureSink,
    ) -> Result<SessionOutcome, LockstepError> {
        let mut driver = Driver::Live(policies);
        let result = self.run(&mut driver);
        self.finish(Mode::Live, result, sink)
    }

    /// Re-derives every choice from a recorded input log. Stops when the
    /// battle ends or the log runs out.
    pub fn play_replay(
        mut self,
        log: &InputLog,
        sink: &mut dyn FailureSink,
    ) -> Result<SessionOutcome, LockstepError> {
        let mut driver = Driver::Replay {
            log,
            replayer: Replayer::new(),
        };
        let result = self.run(&mut driver);
        self.finish(Mode::Replay, result, sink)
    }

    fn run(&mut self, driver: &mut Driver<'_>) -> Result<TurnResult, LockstepError> {
        let mut choices = PerPlayer::new(Choice::PASS, Choice::PASS);
        loop {
            let (reference, candidate) = match self.phase {
                Phase::NotStarted => {
                    self.phase = Phase::Playing;
                    (self.reference.start()?, self.candidate.start()?)
                }
                _ => {
                    self.turns += 1;
                    let reference = self.reference.advance(
                        REFERENCE_STRUGGLE.submit(choices.p1),
                        REFERENCE_STRUGGLE.submit(choices.p2),
                    )?;
                    (reference, self.candidate.advance(choices.p1, choices.p2)?)
                }
            };
            self.capture(reference, candidate);
            self.check(reference, candidate)?;

            if reference.ended() {
                self.phase = Phase::Ended;
                self.push_frames();
                self.check_random_state()?;
                return Ok(reference);
            }
            if driver.exhausted() {
                debug!(target: "lockstep.session", turns = self.turns, "input log exhausted");
                return Ok(reference);
            }

            choices = self.next_choices(driver)?;
            self.partial.reference.choices = Some(choices);
            self.partial.candidate.choices = Some(choices);
            self.validate(choices)?;
            self.push_frames();
            debug!(
                target: "lockstep.session",
                mode = ?driver.mode(),
                turn = self.turns,
                p1 = %choices.p1,
                p2 = %choices.p2,
                "choices made"
            );
        }
    }

    fn capture(&mut self, reference: TurnResult, candidate: TurnResult) {
        let side = &mut self.partial.reference;
        side.result = Some(reference);
        side.random_state = Some(self.reference.random_state());
        side.events = Some(self.reference.events());
        side.snapshot = Some(self.reference.snapshot());

        let side = &mut self.partial.candidate;
        side.result = Some(candidate);
        side.random_state = Some(self.candidate.random_state());
        side.events = Some(self.candidate.events());
        side.snapshot = Some(self.candidate.snapshot());
    }

    fn check(&self, reference: TurnResult, candidate: TurnResult) -> Result<(), Divergence> {
        let (expected, actual) = (&self.partial.reference.events, &self.partial.candidate.events);
        if let (Some(expected), Some(actual)) = (expected, actual) {
            compare(&self.rules, expected, actual)?;
        }
        if reference != candidate {
            return Err(Divergence::Result {
                reference,
                candidate,
            });
        }
        self.check_random_state()
    }

    fn check_random_state(&self) -> Result<(), Divergence> {
        let (reference, candidate) = (self.reference.random_state(), self.candidate.random_state());
        if reference != candidate {
            return Err(Divergence::RandomState {
                reference,
                candidate,
            });
        }
        Ok(())
    }

    fn next_choices(&mut self, driver: &mut Driver<'_>) -> Result<PerPlayer<Choice>, LockstepError> {
        match driver {
            Driver::Live(policies) => {
                let mut choices = PerPlayer::default();
                for player in Player::ALL {
                    let policy = policies.get_mut(player);
                    *choices.get_mut(player) =
                        resolve(&mut self.reference, player, REFERENCE_STRUGGLE, |request| {
                            if request.forced_struggle() {
                                Choice::move_slot(0)
                            } else {
                                policy.choose(player, request)
                            }
                        })?;
                }
                Ok(choices)
            }
            Driver::Replay { log, replayer } => {
                let options = PerPlayer::from_fn(|p| self.reference.legal_choices(p));
                let moves = PerPlayer::from_fn(|p| self.reference.move_ids(p));
                Ok(replayer.next_pair(log, &options, &moves)?)
            }
        }
    }

    fn validate(&self, choices: PerPlayer<Choice>) -> Result<(), Divergence> {
        for player in Player::ALL {
            let choice = *choices.get(player);
            let options = self.candidate.legal_choices(player);
            if !options.contains(&choice) {
                return Err(Divergence::IllegalChoice {
                    player,
                    choice,
                    options,
                });
            }
        }
        Ok(())
    }

    fn push_frames(&mut self) {
        let partial = std::mem::take(&mut self.partial);
        self.frames.reference.push(partial.reference);
        self.frames.candidate.push(partial.candidate);
    }

    fn finish(
        self,
        mode: Mode,
        result: Result<TurnResult, LockstepError>,
        sink: &mut dyn FailureSink,
    ) -> Result<SessionOutcome, LockstepError> {
        match result {
            Ok(result) => {
                info!(
                    target: "lockstep.session",
                    generation = self.setup.generation.num(),
                    seed = %self.setup.seed,
                    turns = self.turns,
                    outcome = ?result.outcome,
                    "session complete"
                );
                Ok(SessionOutcome {
                    turns: self.turns,
                    result,
                    random_state: self.reference.random_state(),
                    phase: self.phase,
                    input_log: self.reference.input_log(),
                })
            }
            Err(err) => {
                warn!(
                    target: "lockstep.session",
                    generation = self.setup.generation.num(),
                    seed = %self.setup.seed,
                    turn = self.turns,
                    error = %err,
                    "session failed"
                );
                let report = FailureReport {
                    mode,
                    generation: self.setup.generation,
                    seed: self.setup.seed,
                    seed_hex: self.setup.seed.to_hex(),
                    error: err.to_string(),
                    input_log: self.reference.input_log(),
                    frames: self.frames,
                    partial: self.partial,
                };
                sink.record(&report);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::{Generation, Prng, Rng};
    use crate::protocol::ProtocolLine;
    use crate::report::MemorySink;
    use crate::simulator::{Outcome, PlayerSpec, Request, RequestState, SimulatorError};

    /// Both players press the only button until the counter runs out; the
    /// generator is advanced once per turn.
    struct Countdown {
        left: u32,
        rng: Rng,
        log: Vec<ProtocolLine>,
        skew: bool,
    }

    impl Countdown {
        fn result(&self) -> TurnResult {
            if self.left == 0 {
                TurnResult::new(Some(Outcome::Tie), RequestState::Pass, RequestState::Pass)
            } else {
                TurnResult::new(None, RequestState::Move, RequestState::Move)
            }
        }
    }

    impl Simulator for Countdown {
        const NAME: &'static str = "countdown";

        fn create(setup: &BattleSetup) -> Result<Self, SimulatorError> {
            Ok(Self {
                left: 3,
                rng: Rng::new(setup.generation, setup.seed),
                log: Vec::new(),
                skew: false,
            })
        }

        fn advance(&mut self, _p1: Choice, _p2: Choice) -> Result<TurnResult, SimulatorError> {
            self.left -= 1;
            let roll = self.rng.next(100);
            self.log.push(ProtocolLine::new(["roll".to_owned(), roll.to_string()]));
            if self.skew && self.left == 1 {
                self.rng.advance(1);
            }
            Ok(self.result())
        }

        fn start(&mut self) -> Result<TurnResult, SimulatorError> {
            self.log.push(ProtocolLine::new(["start"]));
            Ok(self.result())
        }

        fn request(&self, _player: Player) -> Option<Request> {
            (self.left > 0).then(|| Request {
                state: RequestState::Move,
                ..Request::default()
            })
        }

        fn legal_choices(&self, _player: Player) -> Vec<Choice> {
            if self.left > 0 {
                vec![Choice::move_slot(1)]
            } else {
                vec![Choice::PASS]
            }
        }

        fn choose(&mut self, _player: Player, _choice: Choice) -> bool {
            false
        }

        fn move_ids(&self, _player: Player) -> Vec<String> {
            vec!["button".into()]
        }

        fn events(&mut self) -> EventLog {
            EventLog::Parsed(std::mem::take(&mut self.log))
        }

        fn random_state(&self) -> Seed {
            self.rng.seed()
        }
    }

    /// Same battle, but its generator slips one extra step on the last turn.
    struct Skewed(Countdown);

    impl Simulator for Skewed {
        const NAME: &'static str = "skewed";

        fn create(setup: &BattleSetup) -> Result<Self, SimulatorError> {
            let mut inner = Countdown::create(setup)?;
            inner.skew = true;
            Ok(Self(inner))
        }

        fn start(&mut self) -> Result<TurnResult, SimulatorError> {
            self.0.start()
        }

        fn advance(&mut self, p1: Choice, p2: Choice) -> Result<TurnResult, SimulatorError> {
            self.0.advance(p1, p2)
        }

        fn request(&self, player: Player) -> Option<Request> {
            self.0.request(player)
        }

        fn legal_choices(&self, player: Player) -> Vec<Choice> {
            self.0.legal_choices(player)
        }

        fn choose(&mut self, player: Player, choice: Choice) -> bool {
            self.0.choose(player, choice)
        }

        fn move_ids(&self, player: Player) -> Vec<String> {
            self.0.move_ids(player)
        }

        fn events(&mut self) -> EventLog {
            self.0.events()
        }

        fn random_state(&self) -> Seed {
            self.0.random_state()
        }
    }

    fn setup() -> BattleSetup {
        let players = PerPlayer::new(PlayerSpec::new("A", "x"), PlayerSpec::new("B", "y"));
        BattleSetup::new(Generation::new(3).unwrap(), Seed([0, 0, 0, 9]), players)
    }

    fn press(_: Player, _: &Request) -> Choice {
        Choice::move_slot(1)
    }

    #[test]
    fn identical_simulators_finish_together() {
        let session = Session::<Countdown, Countdown>::new(setup(), NormalizationRules::strict()).unwrap();
        assert_eq!(Phase::NotStarted, session.phase());
        let (mut a, mut b) = (press, press);
        let mut sink = MemorySink::default();
        let outcome = session
            .play_live(PerPlayer::new(&mut a, &mut b), &mut sink)
            .unwrap();
        assert_eq!(Phase::Ended, outcome.phase);
        assert_eq!(3, outcome.turns);
        assert!(outcome.result.ended());
        assert!(sink.reports.is_empty());
    }

    #[test]
    fn generator_drift_is_reported_with_history() {
        let session = Session::<Countdown, Skewed>::new(setup(), NormalizationRules::strict()).unwrap();
        let (mut a, mut b) = (press, press);
        let mut sink = MemorySink::default();
        let err = session
            .play_live(PerPlayer::new(&mut a, &mut b), &mut sink)
            .unwrap_err();
        assert!(matches!(err, LockstepError::Divergence(Divergence::RandomState { .. })));

        let report = &sink.reports[0];
        assert_eq!(Mode::Live, report.mode);
        assert_eq!(2, report.frames.reference.len());
        assert_eq!(report.frames.reference, report.frames.candidate);
        assert!(report.partial.candidate.result.is_some());
        assert!(report.partial.candidate.choices.is_none());
    }
}
