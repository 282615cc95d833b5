//! Escaping a dungeon, and what happens to those who fail.

use dolmen_core::Mode;
use dolmen_mechanics::{DiceRoll, DiceService};
use serde::{Deserialize, Serialize};

/// An escape succeeds on 1d20 >= this minus the modifier.
pub const ESCAPE_BASE_TARGET: i32 = 14;

const MAX_SWITCHED_REROLLS: usize = 8;

/// Modifier to the escape roll: -1 per level below the first, +2 with a
/// map, +4 when the way out is known.
pub fn escape_modifier(level: u32, has_map: bool, path_known: bool) -> i32 {
    let depth = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
    let map = if has_map { 2 } else { 0 };
    let path = if path_known { 4 } else { 0 };
    map + path - depth
}

/// An entry on the Dungeon Doom table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DoomFate {
    /// Out, but lost some items.
    LostItems {
        /// Items lost.
        count: u32,
    },
    /// Out with 1 hit point.
    BarelyAlive,
    /// Out with 1 hit point and a lasting wound.
    Maimed {
        /// Points of ability score lost.
        ability_loss: u32,
    },
    /// Wanders out somewhere else entirely.
    LostWandering,
    /// Comes out changed.
    Transformed,
    /// Dead, the body stripped.
    DeadLooted,
    /// Dead, the body can be recovered.
    DeadBodyKnown,
    /// Dead, the body is never found.
    DeadBodyUnknown,
    /// Dead, nothing left.
    DeadDestroyed,
    /// A companion's doing; the fate falls elsewhere.
    Betrayal {
        /// The fate that actually applies.
        fate: Box<DoomFate>,
    },
}

impl DoomFate {
    /// Whether the character dies.
    pub fn is_death(&self) -> bool {
        match self {
            Self::DeadLooted | Self::DeadBodyKnown | Self::DeadBodyUnknown | Self::DeadDestroyed => {
                true
            }
            Self::Betrayal { fate } => fate.is_death(),
            _ => false,
        }
    }
}

impl std::fmt::Display for DoomFate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LostItems { count } => write!(f, "escapes but loses {count} item(s)"),
            Self::BarelyAlive => write!(f, "escapes with 1 hit point"),
            Self::Maimed { ability_loss } => {
                write!(f, "escapes with 1 hit point and loses {ability_loss} ability point(s)")
            }
            Self::LostWandering => write!(f, "wanders out, lost"),
            Self::Transformed => write!(f, "escapes, transformed"),
            Self::DeadLooted => write!(f, "dies, body looted"),
            Self::DeadBodyKnown => write!(f, "dies, body recoverable"),
            Self::DeadBodyUnknown => write!(f, "dies, body never found"),
            Self::DeadDestroyed => write!(f, "dies, body destroyed"),
            Self::Betrayal { fate } => write!(f, "betrayed: {fate}"),
        }
    }
}

/// A roll on the Doom table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoomRoll {
    /// The d10.
    pub roll: DiceRoll,
    /// The result.
    pub fate: DoomFate,
}

/// Roll 1d10 on the Doom table. A 10 rolls again (ignoring further 10s) for
/// the fate that is switched onto the betrayed character.
pub fn roll_doom(dice: &mut dyn DiceService) -> DoomRoll {
    let roll = dice.roll_dice(1, 10, 0, "dungeon doom");
    let fate = fate_for(roll.total, dice);
    DoomRoll { roll, fate }
}

fn fate_for(face: i32, dice: &mut dyn DiceService) -> DoomFate {
    match face {
        i32::MIN..=1 => DoomFate::LostItems {
            count: dice.roll_d6(1, "items lost").natural(),
        },
        2 => DoomFate::BarelyAlive,
        3 => DoomFate::Maimed {
            ability_loss: dice.roll_d6(1, "ability loss").natural(),
        },
        4 => DoomFate::LostWandering,
        5 => DoomFate::Transformed,
        6 => DoomFate::DeadLooted,
        7 => DoomFate::DeadBodyKnown,
        8 => DoomFate::DeadBodyUnknown,
        9 => DoomFate::DeadDestroyed,
        _ => {
            let switched = (0..MAX_SWITCHED_REROLLS)
                .map(|_| dice.roll_dice(1, 10, 0, "switched fate").total)
                .find(|&f| f != 10)
                .unwrap_or(9);
            DoomFate::Betrayal {
                fate: Box::new(fate_for(switched, dice)),
            }
        }
    }
}

/// Result of trying to get out of a dungeon in a hurry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapeResult {
    /// The d20.
    pub roll: DiceRoll,
    /// Modifier applied to the target.
    pub modifier: i32,
    /// Total needed.
    pub target: i32,
    /// Made it out.
    pub escaped: bool,
    /// The Doom roll on a failure.
    pub doom: Option<DoomRoll>,
    /// Mode after a successful escape.
    pub returned_to: Option<Mode>,
}
