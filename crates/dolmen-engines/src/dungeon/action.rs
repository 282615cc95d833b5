//! Dungeon turn actions and their results.

use dolmen_core::{Mode, SurpriseStatus, TimeAdvance};
use dolmen_mechanics::DiceRoll;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// What the party spends a turn doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DungeonAction {
    /// Walk through an exit.
    Move {
        /// Exit direction.
        direction: String,
    },
    /// Search the room.
    Search,
    /// Listen for movement.
    Listen,
    /// Open or force a door.
    OpenDoor {
        /// Exit direction.
        direction: String,
    },
    /// Pick a locked door.
    PickLock {
        /// Exit direction.
        direction: String,
        /// Who tries.
        character_id: String,
    },
    /// Disarm a detected hazard.
    DisarmTrap {
        /// Hazard id.
        hazard_id: String,
        /// Who tries.
        character_id: String,
    },
    /// Rest for a turn.
    Rest,
    /// Handle something in the room.
    Interact {
        /// What.
        target: String,
    },
    /// Cast a spell.
    CastSpell {
        /// Which.
        spell: String,
    },
    /// Draw a map.
    Map,
}

impl DungeonAction {
    /// The action id.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Search => "search",
            Self::Listen => "listen",
            Self::OpenDoor { .. } => "open_door",
            Self::PickLock { .. } => "pick_lock",
            Self::DisarmTrap { .. } => "disarm_trap",
            Self::Rest => "rest",
            Self::Interact { .. } => "interact",
            Self::CastSpell { .. } => "cast_spell",
            Self::Map => "map",
        }
    }

    /// Parse a command such as `move north` or `pick_lock east pc2`.
    pub fn parse(command: &str) -> EngineResult<Self> {
        let mut words = command.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let mut arg = |what: &str| {
            words.next().map(str::to_string).ok_or_else(|| {
                EngineError::Precondition(format!("{verb} needs {what}"))
            })
        };
        let action = match verb.as_str() {
            "move" | "go" => Self::Move {
                direction: arg("a direction")?,
            },
            "search" => Self::Search,
            "listen" => Self::Listen,
            "open" | "open_door" => Self::OpenDoor {
                direction: arg("a direction")?,
            },
            "pick_lock" => Self::PickLock {
                direction: arg("a direction")?,
                character_id: arg("a character")?,
            },
            "disarm" | "disarm_trap" => Self::DisarmTrap {
                hazard_id: arg("a hazard")?,
                character_id: arg("a character")?,
            },
            "rest" => Self::Rest,
            "interact" => Self::Interact {
                target: arg("a target")?,
            },
            "cast" | "cast_spell" => Self::CastSpell {
                spell: arg("a spell")?,
            },
            "map" => Self::Map,
            _ => return Err(EngineError::UnknownAction(command.trim().to_string())),
        };
        Ok(action)
    }
}

/// Outcome of a wandering monster check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WanderingCheck {
    /// The d6.
    pub roll: DiceRoll,
    /// Rolls at or below this trigger an encounter.
    pub target: i32,
    /// Something turned up.
    pub triggered: bool,
    /// Surprise, when triggered.
    pub surprise: Option<SurpriseStatus>,
    /// Distance in feet, when triggered.
    pub distance: Option<u32>,
    /// The stored encounter, when triggered.
    pub encounter_id: Option<Uuid>,
}

/// Everything that happened in one dungeon turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    /// Dungeon turn number.
    pub turn: u32,
    /// Action id.
    pub action: String,
    /// The action achieved its aim.
    pub success: bool,
    /// What happened.
    pub message: String,
    /// Noise the action made.
    pub noise: u32,
    /// Door involved, as `<room>_<direction>`.
    pub door_id: Option<String>,
    /// Things found.
    pub discoveries: Vec<String>,
    /// Time bookkeeping.
    pub time: TimeAdvance,
    /// The party's light went out this turn.
    pub light_extinguished: bool,
    /// The party needs rest.
    pub rest_warning: Option<String>,
    /// The wandering check, on turns that have one.
    pub wandering: Option<WanderingCheck>,
    /// The alert level went up.
    pub alert_raised: bool,
    /// Alert level afterwards.
    pub alert_level: u32,
    /// Room the party ends the turn in.
    pub room: String,
}

/// Result of entering a dungeon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonEntry {
    /// Dungeon id.
    pub dungeon_id: String,
    /// Room the party is in.
    pub room: String,
    /// Exploration picked up where it left off.
    pub resumed: bool,
}

/// Result of fast travel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastTravelResult {
    /// Rooms walked through, in order.
    pub hops: Vec<String>,
    /// Room the party ended in.
    pub room: String,
    /// A wandering monster cut the trip short.
    pub interrupted: bool,
    /// Wandering checks rolled on the way.
    pub checks: Vec<WanderingCheck>,
}

/// Snapshot of a dungeon's exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationSummary {
    /// Dungeon id.
    pub dungeon_id: String,
    /// Where the party is.
    pub current_room: String,
    /// Rooms in the dungeon.
    pub rooms_total: usize,
    /// Rooms reached.
    pub rooms_explored: usize,
    /// Turns inside.
    pub turns: u32,
    /// Alert level.
    pub alert_level: u32,
    /// Noise since the last alert rise.
    pub noise: u32,
    /// Map drawn.
    pub has_map: bool,
    /// Rooms on the known way out.
    pub safe_path: Vec<String>,
    /// Turns since the last rest.
    pub turns_since_rest: u32,
    /// Turns of light left.
    pub light_turns_remaining: u32,
    /// Mode the game is in.
    pub mode: Mode,
}
