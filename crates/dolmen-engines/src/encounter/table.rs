//! Location roll tables attached to an encounter.
//!
//! Entries can carry side effects that outlive the roll: time that passes
//! when the party leaves, a save-or-be-transported effect, or a pointer to a
//! sub-table. Those effects are queued on the encounter and resolved later.

use dolmen_core::clock::{TURNS_PER_DAY, TURNS_PER_HOUR};
use dolmen_mechanics::{DiceNotation, MechError, MechResult};
use serde::{Deserialize, Serialize};

/// A table rolled on with a single die.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollTable {
    /// Table name, matched case-insensitively.
    pub name: String,
    /// Die rolled, e.g. `d6`.
    pub die: String,
    /// Entries keyed by roll.
    pub entries: Vec<TableEntry>,
}

impl RollTable {
    /// Create an empty table.
    pub fn new(name: impl Into<String>, die: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            die: die.into(),
            entries: Vec::new(),
        }
    }

    /// Add an entry.
    pub fn with_entry(mut self, entry: TableEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// The entry for a rolled value.
    pub fn entry(&self, roll: i32) -> Option<&TableEntry> {
        self.entries.iter().find(|e| e.roll == roll)
    }

    /// The die as rollable notation (`d8` becomes `1d8`).
    pub fn notation(&self) -> MechResult<DiceNotation> {
        let die = self.die.trim();
        if die.starts_with(['d', 'D']) {
            DiceNotation::parse(&format!("1{die}"))
        } else {
            DiceNotation::parse(die)
        }
    }
}

/// One row of a roll table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// The value that selects this row.
    pub roll: i32,
    /// Short title.
    pub title: String,
    /// Full text.
    pub description: String,
    /// Monster ids that appear.
    pub monsters: Vec<String>,
    /// NPC ids that appear.
    pub npcs: Vec<String>,
    /// Time that passes when leaving.
    pub time_effect: Option<TimeEffect>,
    /// Save-or-be-transported effect.
    pub transportation: Option<TransportationEffect>,
    /// Name of a table to roll on next.
    pub sub_table: Option<String>,
}

impl TableEntry {
    /// Create an entry with a title.
    pub fn new(roll: i32, title: impl Into<String>) -> Self {
        Self {
            roll,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Attach a time effect.
    pub fn with_time_effect(mut self, effect: TimeEffect) -> Self {
        self.time_effect = Some(effect);
        self
    }

    /// Attach a transportation effect.
    pub fn with_transportation(mut self, effect: TransportationEffect) -> Self {
        self.transportation = Some(effect);
        self
    }

    /// Point at a sub-table.
    pub fn with_sub_table(mut self, table: impl Into<String>) -> Self {
        self.sub_table = Some(table.into());
        self
    }
}

/// Time that passes in the mortal world, e.g. `1d12 days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEffect {
    /// Dice and unit, e.g. `2d6 hours`.
    pub time_passes: String,
    /// Applied when the party leaves the location.
    pub on_exit: bool,
    /// Flavor text.
    pub description: String,
}

impl TimeEffect {
    /// An effect applied on exit.
    pub fn on_exit(time_passes: impl Into<String>) -> Self {
        Self {
            time_passes: time_passes.into(),
            on_exit: true,
            description: String::new(),
        }
    }
}

/// A save that whisks the character elsewhere on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportationEffect {
    /// Save category, e.g. `Hold`.
    pub save_type: String,
    /// Where a failed save sends the character.
    pub destination: String,
    /// Text for a failed save.
    pub failure_desc: String,
}

impl TransportationEffect {
    /// Create an effect.
    pub fn new(
        save_type: impl Into<String>,
        destination: impl Into<String>,
        failure_desc: impl Into<String>,
    ) -> Self {
        Self {
            save_type: save_type.into(),
            destination: destination.into(),
            failure_desc: failure_desc.into(),
        }
    }
}

/// Unit of a time effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    /// 144 turns each.
    Days,
    /// 6 turns each.
    Hours,
}

impl TimeUnit {
    /// Turns in one unit.
    pub fn turns(self) -> u64 {
        match self {
            Self::Days => TURNS_PER_DAY,
            Self::Hours => TURNS_PER_HOUR,
        }
    }
}

/// Split `"1d12 days"` into its dice and unit.
pub fn parse_time_passes(text: &str) -> MechResult<(DiceNotation, TimeUnit)> {
    let mut parts = text.split_whitespace();
    let dice = parts.next().ok_or(MechError::NoDice)?;
    let notation = DiceNotation::parse(dice)?;
    let unit_text = parts.collect::<Vec<_>>().join(" ").to_lowercase();
    let unit = if unit_text.contains("day") {
        TimeUnit::Days
    } else if unit_text.contains("hour") {
        TimeUnit::Hours
    } else {
        return Err(MechError::InvalidNotation(text.to_string()));
    };
    Ok((notation, unit))
}
