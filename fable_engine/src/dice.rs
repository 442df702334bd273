//! Skill-check and chance rolls.
//!
//! Checks use an integer percentile roll: one draw uniformly in `1..=100`,
//! succeeding when the roll is at or below the chance. The [`Roller`] trait
//! lets tests script exact rolls.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Success chance of a check: `clamp(50 + (value - difficulty), 0, 100)`.
pub fn check_chance(value: i32, difficulty: i32) -> u32 {
    let chance = 50i64 + i64::from(value) - i64::from(difficulty);
    // clamped into 0..=100, so the cast cannot truncate
    u32::try_from(chance.clamp(0, 100)).unwrap_or(0)
}

/// Outcome of a resolved check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckRoll {
    pub roll: u32,
    pub chance: u32,
    pub success: bool,
}

impl CheckRoll {
    pub fn resolve(roll: u32, chance: u32) -> Self {
        Self {
            roll,
            chance,
            success: roll <= chance,
        }
    }
}

pub trait Roller {
    /// A uniform integer in `1..=100`.
    fn percentile(&mut self) -> u32;

    /// True with probability `p` (clamped into `0.0..=1.0`).
    fn chance(&mut self, p: f64) -> bool {
        let p = p.clamp(0.0, 1.0);
        f64::from(self.percentile()) <= p * 100.0
    }
}

/// Production roller backed by a seedable RNG.
#[derive(Debug, Clone)]
pub struct RandomRoller {
    rng: StdRng,
}

impl RandomRoller {
    /// Seeded for reproducible runs, or from OS entropy when `seed` is `None`.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl Roller for RandomRoller {
    fn percentile(&mut self) -> u32 {
        self.rng.random_range(1..=100)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }
}

/// Replays a fixed sequence of rolls, then repeats `fallback`.
#[derive(Debug, Clone)]
pub struct SequenceRoller {
    rolls: VecDeque<u32>,
    fallback: u32,
}

impl SequenceRoller {
    pub fn new(rolls: impl IntoIterator<Item = u32>, fallback: u32) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            fallback,
        }
    }
}

impl Roller for SequenceRoller {
    fn percentile(&mut self) -> u32 {
        self.rolls.pop_front().unwrap_or(self.fallback).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chance_formula_is_clamped() {
        assert_eq!(check_chance(40, 50), 40);
        assert_eq!(check_chance(50, 50), 50);
        assert_eq!(check_chance(100, 0), 100);
        assert_eq!(check_chance(0, 100), 0);
        assert_eq!(check_chance(i32::MIN, i32::MAX), 0);
    }

    #[test]
    fn roll_at_chance_succeeds() {
        assert!(CheckRoll::resolve(40, 40).success);
        assert!(!CheckRoll::resolve(41, 40).success);
        assert!(!CheckRoll::resolve(1, 0).success);
        assert!(CheckRoll::resolve(100, 100).success);
    }

    #[test]
    fn seeded_rolls_stay_in_range_and_repeat() {
        let mut a = RandomRoller::new(Some(7));
        let mut b = RandomRoller::new(Some(7));
        for _ in 0..200 {
            let roll = a.percentile();
            assert!((1..=100).contains(&roll));
            assert_eq!(roll, b.percentile());
        }
    }

    #[test]
    fn sequence_roller_replays_then_falls_back() {
        let mut roller = SequenceRoller::new([12, 90], 50);
        assert_eq!(roller.percentile(), 12);
        assert_eq!(roller.percentile(), 90);
        assert_eq!(roller.percentile(), 50);
        assert!(roller.chance(0.5));
        assert!(!roller.chance(0.0));
    }
}
