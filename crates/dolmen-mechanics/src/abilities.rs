//! Class ability lookups.
//!
//! The registry is built once at startup and passed by reference into the
//! engines that need it. Thief skill chances come from the per-level d6
//! targets, converted to a percentile threshold; bardic enchantment uses per
//! day come from level breakpoints.

use serde::{Deserialize, Serialize};

/// Character classes known to the referee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    /// Bard.
    Bard,
    /// Cleric.
    Cleric,
    /// Enchanter.
    Enchanter,
    /// Fighter.
    Fighter,
    /// Friar.
    Friar,
    /// Hunter.
    Hunter,
    /// Knight.
    Knight,
    /// Magician.
    Magician,
    /// Thief.
    Thief,
}

impl std::fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bard => write!(f, "Bard"),
            Self::Cleric => write!(f, "Cleric"),
            Self::Enchanter => write!(f, "Enchanter"),
            Self::Fighter => write!(f, "Fighter"),
            Self::Friar => write!(f, "Friar"),
            Self::Hunter => write!(f, "Hunter"),
            Self::Knight => write!(f, "Knight"),
            Self::Magician => write!(f, "Magician"),
            Self::Thief => write!(f, "Thief"),
        }
    }
}

/// Skills resolved with a percentile roll against a class-derived threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThiefSkill {
    /// Open a locked door or chest.
    PickLock,
    /// Disarm a trap or mechanism.
    DisarmMechanism,
}

/// Read-only ability queries used by the engines.
pub trait AbilityLookup {
    /// Percentile chance (0-100) that a character of `class` and `level`
    /// succeeds at `skill`.
    fn skill_chance(&self, class: CharacterClass, level: u32, skill: ThiefSkill) -> u32;

    /// Bardic enchantment uses per day. Zero for classes without the ability.
    fn enchantment_uses_per_day(&self, class: CharacterClass, level: u32) -> u32;
}

/// Default ability tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityRegistry {
    /// d6 target (roll at or above) to pick a lock, indexed by level - 1.
    pub pick_lock_targets: Vec<u32>,
    /// d6 target to disarm a mechanism, indexed by level - 1.
    pub disarm_targets: Vec<u32>,
    /// Percentile chance for characters without thief training.
    pub untrained_chance: u32,
    /// `(minimum level, uses per day)` breakpoints for bardic enchantment.
    pub enchantment_uses: Vec<(u32, u32)>,
}

impl Default for AbilityRegistry {
    fn default() -> Self {
        Self {
            pick_lock_targets: vec![6, 6, 5, 5, 5, 5, 4, 4, 4, 4, 3, 3, 3, 2, 2],
            disarm_targets: vec![6, 5, 5, 5, 5, 4, 4, 4, 4, 3, 3, 3, 3, 2, 2],
            untrained_chance: 5,
            enchantment_uses: vec![(1, 1), (4, 2), (8, 3), (12, 4)],
        }
    }
}

impl AbilityRegistry {
    /// Create the registry with the standard tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the chance used for untrained characters.
    pub fn with_untrained_chance(mut self, percent: u32) -> Self {
        self.untrained_chance = percent.min(100);
        self
    }

    /// The d6 target for a thief of the given level. Levels past the end of
    /// the table use the last entry.
    pub fn skill_target(&self, level: u32, skill: ThiefSkill) -> u32 {
        let table = match skill {
            ThiefSkill::PickLock => &self.pick_lock_targets,
            ThiefSkill::DisarmMechanism => &self.disarm_targets,
        };
        let index = (level.max(1) as usize - 1).min(table.len().saturating_sub(1));
        table.get(index).copied().unwrap_or(6)
    }
}

/// Convert a "roll X or higher on a d6" target into a percentile threshold.
pub fn d6_target_to_percent(target: u32) -> u32 {
    let target = target.clamp(1, 7);
    (7 - target) * 100 / 6
}

impl AbilityLookup for AbilityRegistry {
    fn skill_chance(&self, class: CharacterClass, level: u32, skill: ThiefSkill) -> u32 {
        match class {
            CharacterClass::Thief => d6_target_to_percent(self.skill_target(level, skill)),
            _ => self.untrained_chance,
        }
    }

    fn enchantment_uses_per_day(&self, class: CharacterClass, level: u32) -> u32 {
        if class != CharacterClass::Bard {
            return 0;
        }
        self.enchantment_uses
            .iter()
            .filter(|(min_level, _)| level >= *min_level)
            .map(|(_, uses)| *uses)
            .max()
            .unwrap_or(0)
    }
}
