//! Monster and NPC reaction rolls.
//!
//! A 2d6 roll (plus modifiers) determines a creature's attitude on a
//! 5-level scale from Attacks to Friendly.

use serde::{Deserialize, Serialize};

use crate::dice::{DiceRoll, DiceService};

/// Reaction on the 2d6 table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReactionResult {
    /// 2 or less: attacks immediately.
    Attacks,
    /// 3-5: hostile, may attack.
    Hostile,
    /// 6-8: uncertain and wary.
    Uncertain,
    /// 9-11: indifferent, may negotiate.
    Indifferent,
    /// 12 or more: eager and friendly.
    Friendly,
}

impl ReactionResult {
    /// Whether this reaction ends the encounter in combat.
    pub fn leads_to_combat(self) -> bool {
        self == Self::Attacks
    }

    /// Whether this reaction opens social interaction.
    pub fn leads_to_parley(self) -> bool {
        matches!(self, Self::Indifferent | Self::Friendly)
    }
}

impl std::fmt::Display for ReactionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attacks => write!(f, "Attacks"),
            Self::Hostile => write!(f, "Hostile"),
            Self::Uncertain => write!(f, "Uncertain"),
            Self::Indifferent => write!(f, "Indifferent"),
            Self::Friendly => write!(f, "Friendly"),
        }
    }
}

/// Map a modified 2d6 total onto the reaction table.
pub fn interpret_reaction(total: i32) -> ReactionResult {
    match total {
        i32::MIN..=2 => ReactionResult::Attacks,
        3..=5 => ReactionResult::Hostile,
        6..=8 => ReactionResult::Uncertain,
        9..=11 => ReactionResult::Indifferent,
        _ => ReactionResult::Friendly,
    }
}

/// Result of a reaction roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRoll {
    /// The reaction level.
    pub result: ReactionResult,
    /// The underlying 2d6 roll, modifier included.
    pub roll: DiceRoll,
}

impl ReactionRoll {
    /// Modified total that was looked up on the table.
    pub fn total(&self) -> i32 {
        self.roll.total
    }
}

/// Roll 2d6 + `modifier` on the reaction table.
pub fn roll_reaction(dice: &mut dyn DiceService, modifier: i32, reason: &str) -> ReactionRoll {
    let roll = dice.roll_dice(2, 6, modifier, reason);
    ReactionRoll {
        result: interpret_reaction(roll.total),
        roll,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::{ScriptedDice, SeededDice};

    #[test]
    fn table_boundaries() {
        assert_eq!(interpret_reaction(-3), ReactionResult::Attacks);
        assert_eq!(interpret_reaction(2), ReactionResult::Attacks);
        assert_eq!(interpret_reaction(3), ReactionResult::Hostile);
        assert_eq!(interpret_reaction(5), ReactionResult::Hostile);
        assert_eq!(interpret_reaction(6), ReactionResult::Uncertain);
        assert_eq!(interpret_reaction(8), ReactionResult::Uncertain);
        assert_eq!(interpret_reaction(9), ReactionResult::Indifferent);
        assert_eq!(interpret_reaction(11), ReactionResult::Indifferent);
        assert_eq!(interpret_reaction(12), ReactionResult::Friendly);
        assert_eq!(interpret_reaction(15), ReactionResult::Friendly);
    }

    #[test]
    fn outcomes() {
        assert!(ReactionResult::Attacks.leads_to_combat());
        assert!(!ReactionResult::Hostile.leads_to_combat());
        assert!(ReactionResult::Indifferent.leads_to_parley());
        assert!(ReactionResult::Friendly.leads_to_parley());
        assert!(!ReactionResult::Uncertain.leads_to_parley());
    }

    #[test]
    fn modifier_shifts_result() {
        let mut dice = ScriptedDice::new([4, 4]);
        let r = roll_reaction(&mut dice, 1, "parley");
        assert_eq!(r.total(), 9);
        assert_eq!(r.result, ReactionResult::Indifferent);
    }

    #[test]
    fn every_result_reachable() {
        let mut dice = SeededDice::new(0);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..2000 {
            seen.insert(roll_reaction(&mut dice, 0, "sweep").result);
        }
        assert_eq!(seen.len(), 5, "missing reactions: {seen:?}");
    }

    #[test]
    fn reaction_ordering_and_display() {
        assert!(ReactionResult::Attacks < ReactionResult::Hostile);
        assert!(ReactionResult::Indifferent < ReactionResult::Friendly);
        assert_eq!(ReactionResult::Uncertain.to_string(), "Uncertain");
    }

    #[test]
    fn reaction_serde_roundtrip() {
        let json = serde_json::to_string(&ReactionResult::Friendly).unwrap();
        let r: ReactionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(r, ReactionResult::Friendly);
    }
}
