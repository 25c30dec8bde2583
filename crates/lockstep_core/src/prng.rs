//! Generation-tagged pseudo-random generators.
//!
//! Both simulators draw from one of these families seeded identically, and the
//! batch driver uses the Gen V/VI family to mint fresh session seeds. Every
//! family is a plain recurrence over its accumulator: advancing `n` steps from
//! the same value always produces the same result.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const SEED_WORDS: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(pub [u16; SEED_WORDS]);

impl Seed {
    pub fn from_words(words: &[u16]) -> Result<Self, ConfigError> {
        let words: [u16; SEED_WORDS] = words
            .try_into()
            .map_err(|_| ConfigError::SeedArity { found: words.len() })?;
        Ok(Self(words))
    }

    pub fn from_u64(value: u64) -> Self {
        Self([
            (value >> 48) as u16,
            (value >> 32) as u16,
            (value >> 16) as u16,
            value as u16,
        ])
    }

    /// A fresh seed for runs that were not given one.
    pub fn random() -> Self {
        Self::from_u64(rand::random())
    }

    pub fn words(self) -> [u16; SEED_WORDS] {
        self.0
    }

    /// Big-endian concatenation of the four words.
    pub fn to_u64(self) -> u64 {
        self.0
            .iter()
            .fold(0u64, |acc, &word| (acc << 16) | u64::from(word))
    }

    pub fn to_hex(self) -> String {
        format!("0x{:X}", self.to_u64())
    }

    /// File name an input log recorded with this seed is stored under.
    pub fn log_name(self) -> String {
        format!("{}.input.log", self.to_hex())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a},{b},{c},{d}")
    }
}

impl FromStr for Seed {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words = s
            .split(',')
            .map(|part| part.trim().parse::<u16>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::MalformedSeed {
                input: s.to_owned(),
            })?;
        Self::from_words(&words)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Generation(u8);

impl Generation {
    pub const SUPPORTED: RangeInclusive<u8> = 1..=6;

    pub fn new(num: u8) -> Result<Self, ConfigError> {
        if Self::SUPPORTED.contains(&num) {
            Ok(Self(num))
        } else {
            Err(ConfigError::UnsupportedGeneration(num))
        }
    }

    pub fn num(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Generation> {
        Self::SUPPORTED.map(Generation)
    }

    /// Custom-game format used when no explicit format is supplied.
    pub fn format_id(self) -> String {
        format!("gen{}customgame", self.0)
    }

    /// Extracts the generation from a `gen<N>...` format id.
    pub fn from_format_id(format: &str) -> Result<Self, ConfigError> {
        let digits: String = format
            .strip_prefix("gen")
            .unwrap_or_default()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        let num = digits
            .parse::<u8>()
            .map_err(|_| ConfigError::UnknownFormat(format.to_owned()))?;
        Self::new(num)
    }
}

impl TryFrom<u8> for Generation {
    type Error = ConfigError;

    fn try_from(num: u8) -> Result<Self, Self::Error> {
        Self::new(num)
    }
}

impl From<Generation> for u8 {
    fn from(generation: Generation) -> Self {
        generation.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

pub trait Prng {
    /// Applies `n` steps and returns the observable word of the new state.
    fn advance(&mut self, n: u32) -> u32;

    /// One step scaled into `[0, range)`. A zero range returns the raw word.
    fn next(&mut self, range: u32) -> u32;

    /// Current state re-encoded as a seed.
    fn seed(&self) -> Seed;
}

/// Game Boy generator: an 8-bit accumulator stepping `s = 5s + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gen12Rng {
    state: u8,
}

impl Gen12Rng {
    /// Only the low byte of the last seed word is state; the other bits are
    /// ignored, so there are just 256 distinct streams and `seed()` reports
    /// `(0, 0, 0, state)`.
    pub fn new(seed: Seed) -> Self {
        Self {
            state: seed.0[3] as u8,
        }
    }

    pub fn step_from(value: u8, n: u32) -> u8 {
        (0..n).fold(value, |s, _| s.wrapping_mul(5).wrapping_add(1))
    }
}

impl Prng for Gen12Rng {
    fn advance(&mut self, n: u32) -> u32 {
        self.state = Self::step_from(self.state, n);
        u32::from(self.state)
    }

    fn next(&mut self, range: u32) -> u32 {
        let value = self.advance(1);
        if range == 0 {
            value
        } else {
            value % range
        }
    }

    fn seed(&self) -> Seed {
        Seed([0, 0, 0, u16::from(self.state)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gen34Rng {
    state: u32,
}

impl Gen34Rng {
    const MULTIPLIER: u32 = 0x41C6_4E6D;
    const INCREMENT: u32 = 0x0000_6073;

    pub fn new(seed: Seed) -> Self {
        Self {
            state: (u32::from(seed.0[2]) << 16) | u32::from(seed.0[3]),
        }
    }

    pub fn step_from(value: u32, n: u32) -> u32 {
        (0..n).fold(value, |s, _| {
            s.wrapping_mul(Self::MULTIPLIER).wrapping_add(Self::INCREMENT)
        })
    }
}

impl Prng for Gen34Rng {
    fn advance(&mut self, n: u32) -> u32 {
        self.state = Self::step_from(self.state, n);
        self.state
    }

    fn next(&mut self, range: u32) -> u32 {
        let value = self.advance(1);
        if range == 0 {
            return value;
        }
        ((u64::from(value >> 16) * u64::from(range)) >> 16) as u32
    }

    fn seed(&self) -> Seed {
        Seed([0, 0, (self.state >> 16) as u16, self.state as u16])
    }
}

/// 64-bit generator; also the process-wide source of session seeds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gen56Rng {
    state: u64,
}

impl Gen56Rng {
    const MULTIPLIER: u64 = 0x5D58_8B65_6C07_8965;
    const INCREMENT: u64 = 0x0026_9EC3;

    pub fn new(seed: Seed) -> Self {
        Self {
            state: seed.to_u64(),
        }
    }

    pub fn step_from(value: u64, n: u32) -> u64 {
        (0..n).fold(value, |s, _| {
            s.wrapping_mul(Self::MULTIPLIER).wrapping_add(Self::INCREMENT)
        })
    }
}

impl Prng for Gen56Rng {
    fn advance(&mut self, n: u32) -> u32 {
        self.state = Self::step_from(self.state, n);
        (self.state >> 32) as u32
    }

    fn next(&mut self, range: u32) -> u32 {
        let value = self.advance(1);
        if range == 0 {
            return value;
        }
        ((u64::from(value) * u64::from(range)) >> 32) as u32
    }

    fn seed(&self) -> Seed {
        Seed::from_u64(self.state)
    }
}

/// The family a generation draws from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rng {
    Gen12(Gen12Rng),
    Gen34(Gen34Rng),
    Gen56(Gen56Rng),
}

impl Rng {
    pub fn new(generation: Generation, seed: Seed) -> Self {
        match generation.num() {
            1 | 2 => Self::Gen12(Gen12Rng::new(seed)),
            3 | 4 => Self::Gen34(Gen34Rng::new(seed)),
            _ => Self::Gen56(Gen56Rng::new(seed)),
        }
    }

    pub fn for_generation(num: u8, seed: Seed) -> Result<Self, ConfigError> {
        Ok(Self::new(Generation::new(num)?, seed))
    }

    fn inner(&mut self) -> &mut dyn Prng {
        match self {
            Self::Gen12(rng) => rng,
            Self::Gen34(rng) => rng,
            Self::Gen56(rng) => rng,
        }
    }
}

impl Prng for Rng {
    fn advance(&mut self, n: u32) -> u32 {
        self.inner().advance(n)
    }

    fn next(&mut self, range: u32) -> u32 {
        self.inner().next(range)
    }

    fn seed(&self) -> Seed {
        match self {
            Self::Gen12(rng) => rng.seed(),
            Self::Gen34(rng) => rng.seed(),
            Self::Gen56(rng) => rng.seed(),
        }
    }
}

/// Draws a fresh four-word seed.
pub fn new_seed(prng: &mut impl Prng) -> Seed {
    Seed([
        prng.next(0x10000) as u16,
        prng.next(0x10000) as u16,
        prng.next(0x10000) as u16,
        prng.next(0x10000) as u16,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Rng;
    use proptest::prelude::*;

    #[test]
    fn gen12_matches_game_boy_sequence() {
        let data = [
            (1u16, 1u32, 6u32),
            (2, 3, 25),
            (3, 5, 172),
            (4, 7, 255),
            (5, 9, 82),
            (6, 11, 229),
        ];
        for (seed, n, expected) in data {
            let mut rng = Gen12Rng::new(Seed([0, 0, 0, seed]));
            assert_eq!(expected, rng.advance(n), "seed {seed} after {n} steps");
            assert_eq!(expected as u8, Gen12Rng::step_from(seed as u8, n));
        }
    }

    #[test]
    fn gen12_keeps_only_the_low_byte_of_the_seed() {
        let mut wide = Gen12Rng::new(Seed([7, 7, 7, 0x0101]));
        let mut narrow = Gen12Rng::new(Seed([0, 0, 0, 0x0001]));
        assert_eq!(Seed([0, 0, 0, 1]), wide.seed());
        for _ in 0..8 {
            assert_eq!(narrow.advance(1), wide.advance(1));
        }
        assert_eq!(narrow.seed(), wide.seed());
    }

    #[test]
    fn unseeded_runs_draw_distinct_seeds() {
        let seeds: Vec<Seed> = (0..4).map(|_| Seed::random()).collect();
        assert!(seeds.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn gen34_matches_reference_vectors() {
        let data = [
            (0x0000_0000u32, 5u32, 0x8E42_5287u32),
            (0x0000_0000, 10, 0xEF2C_F4B2),
            (0x8000_0000, 5, 0x0E42_5287),
            (0x8000_0000, 10, 0x6F2C_F4B2),
        ];
        for (seed, n, expected) in data {
            let mut rng = Gen34Rng::new(Seed([0, 0, (seed >> 16) as u16, seed as u16]));
            assert_eq!(expected, rng.advance(n));
            assert_eq!(expected, Gen34Rng::step_from(seed, n));
        }
    }

    #[test]
    fn gen56_single_step_exposes_upper_word() {
        let mut rng = Gen56Rng::new(Seed([0, 0, 0, 1]));
        assert_eq!(0x5D58_8B65, rng.advance(1));
    }

    #[test]
    fn seeds_are_minted_deterministically() {
        let mut prng = Gen56Rng::new(Seed([1, 2, 3, 4]));
        assert_eq!(Seed([30982, 57890, 43514, 8769]), new_seed(&mut prng));
        assert_eq!(Seed([55250, 37673, 62891, 25495]), new_seed(&mut prng));
    }

    #[test]
    fn seed_hex_has_no_leading_zeros() {
        let seed = Seed([1, 2, 3, 4]);
        assert_eq!("0x1000200030004", seed.to_hex());
        assert_eq!("0x1000200030004.input.log", seed.log_name());
        assert_eq!(seed, Seed::from_u64(seed.to_u64()));
    }

    #[test]
    fn wrong_arity_is_a_config_error() {
        assert_eq!(
            Err(ConfigError::SeedArity { found: 3 }),
            Seed::from_words(&[1, 2, 3])
        );
        assert_eq!(Ok(Seed([1, 2, 3, 4])), "1, 2, 3, 4".parse());
        assert!(matches!(
            "1,2,x,4".parse::<Seed>(),
            Err(ConfigError::MalformedSeed { .. })
        ));
    }

    #[test]
    fn generations_outside_the_family_table_are_rejected() {
        assert_eq!(Err(ConfigError::UnsupportedGeneration(0)), Generation::new(0));
        assert_eq!(Err(ConfigError::UnsupportedGeneration(9)), Generation::new(9));
        assert_eq!(1, Generation::from_format_id("gen1customgame").unwrap().num());
        assert!(Generation::from_format_id("customgame").is_err());
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        for generation in Generation::all() {
            let mut rng = Rng::new(generation, Seed([9, 8, 7, 6]));
            for range in [1, 2, 7, 100, 0x10000] {
                assert!(rng.next(range) < range, "{generation} range {range}");
            }
        }
    }

    proptest! {
        #[test]
        fn independent_instances_agree(
            words in proptest::array::uniform4(any::<u16>()),
            num in 1u8..=6,
            calls in proptest::collection::vec((0u32..8, 1u32..1000), 1..20),
        ) {
            let seed = Seed(words);
            let mut a = Rng::for_generation(num, seed).unwrap();
            let mut b = Rng::for_generation(num, seed).unwrap();
            for (n, range) in calls {
                prop_assert_eq!(a.advance(n), b.advance(n));
                prop_assert_eq!(a.next(range), b.next(range));
                prop_assert_eq!(a.seed(), b.seed());
            }
        }

        #[test]
        fn stepping_in_pieces_equals_stepping_at_once(value in any::<u32>(), a in 0u32..50, b in 0u32..50) {
            prop_assert_eq!(
                Gen34Rng::step_from(Gen34Rng::step_from(value, a), b),
                Gen34Rng::step_from(value, a + b)
            );
        }
    }
}
