//! RNG-backed dice for play sessions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::service::DiceService;

/// Dice backed by a seeded [`StdRng`]. The same seed replays the same session.
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: StdRng,
    seed: u64,
}

impl SeededDice {
    /// Create dice from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// The seed these dice were created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DiceService for SeededDice {
    fn face(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}
