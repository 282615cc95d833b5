//! The dice service every engine rolls through.

use super::notation::DiceNotation;
use super::roll::DiceRoll;
use crate::error::MechResult;

/// Source of all randomness in the referee.
///
/// Implementors only supply [`DiceService::face`]; every convenience form is
/// built on it, so a seeded or scripted implementation stays fully
/// deterministic.
pub trait DiceService {
    /// Roll a single die with `sides` faces, returning a value in `1..=sides`.
    fn face(&mut self, sides: u32) -> u32;

    /// Roll `count` dice of `sides` faces and add `modifier`.
    fn roll_dice(&mut self, count: u32, sides: u32, modifier: i32, reason: &str) -> DiceRoll {
        let notation = DiceNotation::new(count, sides, modifier);
        let rolls: Vec<u32> = (0..count).map(|_| self.face(sides)).collect();
        let roll = DiceRoll::new(notation.to_string(), reason, rolls, modifier);
        tracing::debug!(
            notation = %roll.notation,
            reason,
            total = roll.total,
            "dice rolled"
        );
        roll
    }

    /// Roll a parsed notation.
    fn roll_notation(&mut self, notation: &DiceNotation, reason: &str) -> DiceRoll {
        self.roll_dice(notation.count, notation.die.sides(), notation.modifier, reason)
    }

    /// Parse and roll standard notation such as `2d6+1`.
    fn roll(&mut self, notation: &str, reason: &str) -> MechResult<DiceRoll> {
        let parsed = DiceNotation::parse(notation)?;
        Ok(self.roll_notation(&parsed, reason))
    }

    /// Roll 1d20.
    fn roll_d20(&mut self, reason: &str) -> DiceRoll {
        self.roll_dice(1, 20, 0, reason)
    }

    /// Roll `count` d6.
    fn roll_d6(&mut self, count: u32, reason: &str) -> DiceRoll {
        self.roll_dice(count, 6, 0, reason)
    }

    /// Roll 2d6.
    fn roll_2d6(&mut self, reason: &str) -> DiceRoll {
        self.roll_dice(2, 6, 0, reason)
    }

    /// Roll a percentile die (1-100).
    fn roll_percentile(&mut self, reason: &str) -> DiceRoll {
        self.roll_dice(1, 100, 0, reason)
    }
}
