//! Decision policies for live exploration.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::choice::{Choice, Player};
use crate::prng::Seed;
use crate::simulator::{Request, RequestState};

/// Chooses an action for a player given their current request.
///
/// The choice may be illegal; the resolver will ask again after the simulator
/// rejects it.
pub trait Policy {
    fn choose(&mut self, player: Player, request: &Request) -> Choice;
}

impl<F> Policy for F
where
    F: FnMut(Player, &Request) -> Choice,
{
    fn choose(&mut self, player: Player, request: &Request) -> Choice {
        self(player, request)
    }
}

pub const DEFAULT_MOVE_CHANCE: f64 = 0.7;

/// Uniform picks over the offered actions, seeded from a session seed.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
    move_chance: f64,
}

impl RandomPolicy {
    pub fn new(seed: Seed) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed.to_u64()),
            move_chance: DEFAULT_MOVE_CHANCE,
        }
    }

    /// Probability of attacking rather than switching when both are offered.
    pub fn with_move_chance(mut self, chance: f64) -> Self {
        self.move_chance = chance.clamp(0.0, 1.0);
        self
    }

    fn pick_switch(&mut self, request: &Request) -> Option<Choice> {
        if request.switches.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..request.switches.len());
        Some(Choice::switch_slot(request.switches[index]))
    }

    fn pick_move(&mut self, request: &Request) -> Option<Choice> {
        let enabled: Vec<u8> = request
            .moves
            .iter()
            .filter(|m| !m.disabled)
            .map(|m| m.slot)
            .collect();
        if enabled.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..enabled.len());
        Some(Choice::move_slot(enabled[index]))
    }
}

impl Policy for RandomPolicy {
    fn choose(&mut self, _player: Player, request: &Request) -> Choice {
        if request.wait {
            return Choice::PASS;
        }
        match request.state {
            RequestState::Pass => Choice::PASS,
            RequestState::Switch => self.pick_switch(request).unwrap_or(Choice::PASS),
            RequestState::Move => {
                let attack = request.switches.is_empty() || self.rng.gen_bool(self.move_chance);
                let picked = if attack {
                    self.pick_move(request).or_else(|| self.pick_switch(request))
                } else {
                    self.pick_switch(request).or_else(|| self.pick_move(request))
                };
                picked.unwrap_or(Choice::move_slot(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::RequestMove;

    fn move_request(disabled: &[bool], switches: Vec<u8>) -> Request {
        Request {
            state: RequestState::Move,
            wait: false,
            moves: disabled
                .iter()
                .enumerate()
                .map(|(i, &disabled)| RequestMove {
                    slot: i as u8 + 1,
                    id: format!("move{i}"),
                    disabled,
                })
                .collect(),
            switches,
        }
    }

    #[test]
    fn same_seed_same_choices() {
        let request = move_request(&[false, false, false, false], vec![2, 3]);
        let mut a = RandomPolicy::new(Seed([1, 2, 3, 4]));
        let mut b = RandomPolicy::new(Seed([1, 2, 3, 4]));
        for _ in 0..20 {
            assert_eq!(a.choose(Player::P1, &request), b.choose(Player::P1, &request));
        }
    }

    #[test]
    fn disabled_moves_are_never_picked() {
        let request = move_request(&[true, false, true], Vec::new());
        let mut policy = RandomPolicy::new(Seed([0, 0, 0, 7]));
        for _ in 0..20 {
            assert_eq!(Choice::move_slot(2), policy.choose(Player::P2, &request));
        }
    }

    #[test]
    fn nothing_usable_falls_back_to_struggle() {
        let request = move_request(&[true, true], Vec::new());
        let mut policy = RandomPolicy::new(Seed::default());
        assert_eq!(Choice::move_slot(0), policy.choose(Player::P1, &request));
    }

    #[test]
    fn waiting_and_switch_requests() {
        let mut policy = RandomPolicy::new(Seed::default()).with_move_chance(0.0);
        assert_eq!(Choice::PASS, policy.choose(Player::P1, &Request::wait()));

        let forced = Request {
            state: RequestState::Switch,
            switches: vec![3],
            ..Request::default()
        };
        assert_eq!(Choice::switch_slot(3), policy.choose(Player::P1, &forced));

        let request = move_request(&[false], vec![2]);
        assert_eq!(Choice::switch_slot(2), policy.choose(Player::P1, &request));
    }

    #[test]
    fn closures_are_policies() {
        let mut always_second = |_: Player, _: &Request| Choice::move_slot(2);
        assert_eq!(
            Choice::move_slot(2),
            Policy::choose(&mut always_second, Player::P1, &Request::default())
        );
    }
}
