//! Converges a desired choice onto one the reference simulator will accept.
//!
//! Hidden information means a policy can pick something the simulator refuses
//! (a move disabled by an effect not yet revealed). Each rejection may update
//! the request, so the policy is consulted again against the fresh request.

use tracing::debug;

use crate::choice::{Choice, Player};
use crate::error::ResolveError;
use crate::simulator::{Request, Simulator, StruggleSlot};

/// Returns a choice present in `sim`'s legal listing for `player`.
///
/// At most as many rejections are tolerated as there were legal choices when
/// resolution began.
pub fn resolve<S, F>(
    sim: &mut S,
    player: Player,
    addressing: StruggleSlot,
    mut decide: F,
) -> Result<Choice, ResolveError>
where
    S: Simulator,
    F: FnMut(&Request) -> Choice,
{
    let Some(mut request) = sim.request(player).filter(|r| !r.wait) else {
        return Ok(Choice::PASS);
    };
    let mut legal = sim.legal_choices(player);
    let bound = legal.len().max(1);
    let mut rejections = 0;

    loop {
        let choice = decide(&request);
        if legal.contains(&choice) {
            return Ok(choice);
        }
        if rejections == bound {
            return Err(ResolveError::NonConvergence {
                player,
                choice,
                rounds: rejections,
            });
        }
        if sim.choose(player, addressing.submit(choice)) {
            return Err(ResolveError::AcceptedUnlisted { player, choice });
        }
        rejections += 1;
        debug!(
            target: "lockstep.resolver",
            player = %player,
            choice = %choice,
            rejections,
            "choice rejected"
        );

        match sim.request(player).filter(|r| !r.wait) {
            Some(updated) => request = updated,
            None => return Ok(Choice::PASS),
        }
        legal = sim.legal_choices(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::Seed;
    use crate::simulator::{
        BattleSetup, EventLog, RequestMove, RequestState, SimulatorError, TurnResult,
    };
    use proptest::prelude::*;

    /// One player, four moves; `hidden` slots are disabled but only flagged
    /// once someone tries them.
    struct Stub {
        hidden: Vec<u8>,
        revealed: Vec<u8>,
        waiting: bool,
        accept_everything: bool,
        submitted: Vec<Choice>,
    }

    impl Stub {
        fn new(hidden: Vec<u8>) -> Self {
            Self {
                hidden,
                revealed: Vec::new(),
                waiting: false,
                accept_everything: false,
                submitted: Vec::new(),
            }
        }
    }

    impl Simulator for Stub {
        const NAME: &'static str = "stub";

        fn create(_setup: &BattleSetup) -> Result<Self, SimulatorError> {
            Ok(Self::new(Vec::new()))
        }

        fn advance(&mut self, _p1: Choice, _p2: Choice) -> Result<TurnResult, SimulatorError> {
            Ok(TurnResult::default())
        }

        fn request(&self, _player: Player) -> Option<Request> {
            if self.waiting {
                return Some(Request::wait());
            }
            Some(Request {
                state: RequestState::Move,
                wait: false,
                moves: (1..=4)
                    .map(|slot| RequestMove {
                        slot,
                        id: format!("m{slot}"),
                        disabled: self.revealed.contains(&slot),
                    })
                    .collect(),
                switches: Vec::new(),
            })
        }

        fn legal_choices(&self, _player: Player) -> Vec<Choice> {
            (1..=4)
                .filter(|slot| !self.hidden.contains(slot))
                .map(Choice::move_slot)
                .collect()
        }

        fn choose(&mut self, _player: Player, choice: Choice) -> bool {
            self.submitted.push(choice);
            if self.accept_everything {
                return true;
            }
            self.revealed.push(choice.data);
            false
        }

        fn move_ids(&self, _player: Player) -> Vec<String> {
            Vec::new()
        }

        fn events(&mut self) -> EventLog {
            EventLog::default()
        }

        fn random_state(&self) -> Seed {
            Seed::default()
        }
    }

    fn first_enabled(request: &Request) -> Choice {
        request
            .moves
            .iter()
            .find(|m| !m.disabled)
            .map_or(Choice::move_slot(0), |m| Choice::move_slot(m.slot))
    }

    #[test]
    fn legal_choice_needs_no_submission() {
        let mut sim = Stub::new(Vec::new());
        let choice = resolve(&mut sim, Player::P1, StruggleSlot::Zero, first_enabled).unwrap();
        assert_eq!(Choice::move_slot(1), choice);
        assert!(sim.submitted.is_empty());
    }

    #[test]
    fn hidden_disabled_moves_are_discovered() {
        let mut sim = Stub::new(vec![1, 2]);
        let choice = resolve(&mut sim, Player::P1, StruggleSlot::Zero, first_enabled).unwrap();
        assert_eq!(Choice::move_slot(3), choice);
        assert_eq!(vec![Choice::move_slot(1), Choice::move_slot(2)], sim.submitted);
    }

    #[test]
    fn waiting_player_passes() {
        let mut sim = Stub::new(Vec::new());
        sim.waiting = true;
        let choice = resolve(&mut sim, Player::P2, StruggleSlot::Zero, |_| Choice::move_slot(9)).unwrap();
        assert_eq!(Choice::PASS, choice);
    }

    #[test]
    fn stubborn_policy_does_not_loop_forever() {
        let mut sim = Stub::new(vec![4]);
        let err = resolve(&mut sim, Player::P1, StruggleSlot::Zero, |_| Choice::move_slot(4)).unwrap_err();
        assert_eq!(
            ResolveError::NonConvergence {
                player: Player::P1,
                choice: Choice::move_slot(4),
                rounds: 3,
            },
            err
        );
        assert_eq!(3, sim.submitted.len());
    }

    #[test]
    fn accepting_an_unlisted_choice_is_fatal() {
        let mut sim = Stub::new(vec![1]);
        sim.accept_everything = true;
        let err = resolve(&mut sim, Player::P1, StruggleSlot::Zero, first_enabled).unwrap_err();
        assert!(matches!(err, ResolveError::AcceptedUnlisted { .. }));
    }

    #[test]
    fn struggle_is_submitted_with_simulator_addressing() {
        let mut sim = Stub::new(Vec::new());
        let mut asked = 0;
        let choice = resolve(&mut sim, Player::P1, StruggleSlot::One, |_| {
            asked += 1;
            if asked == 1 {
                Choice::move_slot(0)
            } else {
                Choice::move_slot(2)
            }
        })
        .unwrap();
        assert_eq!(Choice::move_slot(2), choice);
        assert_eq!(vec![Choice::move_slot(1)], sim.submitted);
    }

    proptest! {
        #[test]
        fn enabled_first_policy_always_converges(hidden in proptest::collection::btree_set(1u8..=4, 0..3)) {
            let hidden: Vec<u8> = hidden.into_iter().collect();
            let mut sim = Stub::new(hidden.clone());
            let choice = resolve(&mut sim, Player::P1, StruggleSlot::Zero, first_enabled).unwrap();
            prop_assert!(!hidden.contains(&choice.data));
            prop_assert!(sim.submitted.len() <= hidden.len());
        }
    }
}
