//! The outcome of a single dice roll.

use serde::{Deserialize, Serialize};

/// The result of rolling one notation: individual faces, modifier, and total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// The notation that was rolled, e.g. `2d6`.
    pub notation: String,
    /// Why the roll was made, for the audit trail.
    pub reason: String,
    /// Individual die faces, in roll order.
    pub rolls: Vec<u32>,
    /// Flat modifier applied to the sum.
    pub modifier: i32,
    /// Sum of faces plus modifier.
    pub total: i32,
}

impl DiceRoll {
    /// Assemble a roll from its faces.
    pub fn new(
        notation: impl Into<String>,
        reason: impl Into<String>,
        rolls: Vec<u32>,
        modifier: i32,
    ) -> Self {
        let natural: u32 = rolls.iter().sum();
        Self {
            notation: notation.into(),
            reason: reason.into(),
            total: natural as i32 + modifier,
            rolls,
            modifier,
        }
    }

    /// Sum of the faces without the modifier.
    pub fn natural(&self) -> u32 {
        self.rolls.iter().sum()
    }

    /// The highest single face, or 0 if nothing was rolled.
    pub fn highest(&self) -> u32 {
        self.rolls.iter().copied().max().unwrap_or(0)
    }

    /// The lowest single face, or 0 if nothing was rolled.
    pub fn lowest(&self) -> u32 {
        self.rolls.iter().copied().min().unwrap_or(0)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let faces: Vec<String> = self.rolls.iter().map(|r| r.to_string()).collect();
        write!(f, "{} [{}]", self.notation, faces.join(", "))?;
        if self.modifier != 0 {
            write!(f, " {:+}", self.modifier)?;
        }
        write!(f, " = {}", self.total)
    }
}
