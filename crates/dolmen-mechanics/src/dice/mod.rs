//! Dice types, notation, and rolling services.
//!
//! Engines never touch a raw RNG. Every roll goes through a [`DiceService`],
//! backed either by a seeded RNG ([`SeededDice`]) for replayable sessions or
//! by a queue of predetermined faces ([`ScriptedDice`]) for tests and replays.

pub mod notation;
pub mod roll;
pub mod scripted;
pub mod seeded;
pub mod service;

pub use notation::DiceNotation;
pub use roll::DiceRoll;
pub use scripted::ScriptedDice;
pub use seeded::SeededDice;
pub use service::DiceService;

use serde::{Deserialize, Serialize};

/// One of the standard dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Die {
    /// Four-sided die.
    D4,
    /// Six-sided die.
    D6,
    /// Eight-sided die.
    D8,
    /// Ten-sided die.
    D10,
    /// Twelve-sided die.
    D12,
    /// Twenty-sided die.
    D20,
    /// Percentile, 1 to 100.
    D100,
    /// A die with any other number of sides (d2, d3, ...).
    Custom(u32),
}

impl Die {
    /// Faces on the die.
    pub fn sides(self) -> u32 {
        match self {
            Self::D4 => 4,
            Self::D6 => 6,
            Self::D8 => 8,
            Self::D10 => 10,
            Self::D12 => 12,
            Self::D20 => 20,
            Self::D100 => 100,
            Self::Custom(n) => n,
        }
    }

    /// Map a face count onto a die, falling back to [`Die::Custom`].
    pub fn from_sides(sides: u32) -> Self {
        match sides {
            4 => Self::D4,
            6 => Self::D6,
            8 => Self::D8,
            10 => Self::D10,
            12 => Self::D12,
            20 => Self::D20,
            100 => Self::D100,
            other => Self::Custom(other),
        }
    }
}

impl std::fmt::Display for Die {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.sides())
    }
}
