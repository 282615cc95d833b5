//! Dungeon layout: rooms, doors, features, hazards, and the persistent
//! exploration state.

use std::collections::BTreeMap;

use dolmen_core::Combatant;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How well lit a room is on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightLevel {
    /// Lit without the party's help.
    Bright,
    /// Shapes only.
    Dim,
    /// Pitch black.
    #[default]
    Dark,
}

/// State of a door in one exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorState {
    /// Standing open.
    #[default]
    Open,
    /// Shut but free.
    Closed,
    /// Needs picking.
    Locked,
    /// Needs forcing.
    Stuck,
    /// Barred from the far side.
    Barred,
    /// Not yet found.
    Secret,
}

impl DoorState {
    /// Whether the door stops the party walking through.
    pub fn blocks_movement(self) -> bool {
        !matches!(self, Self::Open | Self::Closed)
    }
}

impl std::fmt::Display for DoorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Locked => write!(f, "locked"),
            Self::Stuck => write!(f, "stuck"),
            Self::Barred => write!(f, "barred"),
            Self::Secret => write!(f, "secret"),
        }
    }
}

/// Something in a room worth finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Identifier.
    pub id: String,
    /// What it is.
    pub description: String,
    /// Only found by searching.
    pub hidden: bool,
    /// Found.
    pub discovered: bool,
}

impl Feature {
    /// A feature in plain sight.
    pub fn visible(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            hidden: false,
            discovered: true,
        }
    }

    /// A feature that must be searched for.
    pub fn hidden(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            hidden: true,
            discovered: false,
        }
    }
}

/// A trap or other mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hazard {
    /// Identifier.
    pub id: String,
    /// What it is.
    pub description: String,
    /// Damage notation when it goes off.
    pub damage: String,
    /// The party knows it is there.
    pub detected: bool,
    /// Made safe.
    pub disarmed: bool,
    /// Has gone off.
    pub triggered: bool,
}

impl Hazard {
    /// An undetected hazard.
    pub fn new(id: impl Into<String>, description: impl Into<String>, damage: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            damage: damage.into(),
            detected: false,
            disarmed: false,
            triggered: false,
        }
    }

    /// Mark as already known to the party.
    pub fn detected(mut self) -> Self {
        self.detected = true;
        self
    }
}

/// One room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonRoom {
    /// Identifier.
    pub id: String,
    /// Short name.
    pub name: String,
    /// Read-aloud text.
    pub description: String,
    /// Ambient light.
    pub light: LightLevel,
    /// Direction to room id.
    pub exits: BTreeMap<String, String>,
    /// Direction to door state. Exits without an entry are open.
    pub doors: BTreeMap<String, DoorState>,
    /// Features.
    pub features: Vec<Feature>,
    /// Hazards.
    pub hazards: Vec<Hazard>,
    /// The party has been here.
    pub visited: bool,
    /// The party has searched here.
    pub searched: bool,
    /// Noise made here.
    pub noise: u32,
}

impl DungeonRoom {
    /// Create an empty dark room.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the ambient light.
    pub fn with_light(mut self, light: LightLevel) -> Self {
        self.light = light;
        self
    }

    /// Add an exit.
    pub fn with_exit(mut self, direction: impl Into<String>, room: impl Into<String>) -> Self {
        self.exits.insert(direction.into(), room.into());
        self
    }

    /// Put a door in an exit.
    pub fn with_door(mut self, direction: impl Into<String>, state: DoorState) -> Self {
        self.doors.insert(direction.into(), state);
        self
    }

    /// Add a feature.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Add a hazard.
    pub fn with_hazard(mut self, hazard: Hazard) -> Self {
        self.hazards.push(hazard);
        self
    }

    /// Door state in `direction`.
    pub fn door(&self, direction: &str) -> DoorState {
        self.doors.get(direction).copied().unwrap_or_default()
    }

    /// Identifier of the door in `direction`.
    pub fn door_id(&self, direction: &str) -> String {
        format!("{}_{direction}", self.id)
    }

    /// Whether the room is lit without the party's light.
    pub fn is_lit(&self) -> bool {
        self.light != LightLevel::Dark
    }
}

/// A dungeon as authored, before the party goes in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonLayout {
    /// Identifier.
    pub id: String,
    /// Dungeon level, 1 at the surface.
    pub level: u32,
    /// Room the party enters into.
    pub entrance: String,
    /// Every room.
    pub rooms: Vec<DungeonRoom>,
    /// Creatures that turn up on a wandering check.
    pub wandering_monsters: Vec<Combatant>,
}

impl DungeonLayout {
    /// A first-level dungeon.
    pub fn new(id: impl Into<String>, entrance: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            level: 1,
            entrance: entrance.into(),
            rooms: Vec::new(),
            wandering_monsters: Vec::new(),
        }
    }

    /// Set the dungeon level.
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.max(1);
        self
    }

    /// Add a room.
    pub fn with_room(mut self, room: DungeonRoom) -> Self {
        self.rooms.push(room);
        self
    }

    /// Add a wandering monster.
    pub fn with_wandering_monster(mut self, monster: Combatant) -> Self {
        self.wandering_monsters.push(monster);
        self
    }
}

/// Exploration state of one dungeon. Survives leaving and re-entering until
/// it is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonState {
    /// Dungeon identifier.
    pub dungeon_id: String,
    /// Dungeon level.
    pub level: u32,
    /// Room the party is in.
    pub current_room: String,
    /// Every room by id.
    pub rooms: BTreeMap<String, DungeonRoom>,
    /// 0 (unaware) to the configured maximum.
    pub alert_level: u32,
    /// Turns spent inside.
    pub turns: u32,
    /// Noise since the last alert increase.
    pub noise: u32,
    /// Rooms reached, in discovery order.
    pub explored_rooms: Vec<String>,
    /// Turns since the party last rested.
    pub turns_since_rest: u32,
    /// The party has drawn a map.
    pub has_map: bool,
    /// Known way out, entrance-ward.
    pub safe_path: Vec<String>,
    /// Creatures that turn up on a wandering check.
    pub wandering_monsters: Vec<Combatant>,
}

impl DungeonState {
    /// Build from a layout. Every exit must lead to a room in the layout.
    pub fn from_layout(layout: DungeonLayout) -> EngineResult<Self> {
        let rooms: BTreeMap<String, DungeonRoom> = layout
            .rooms
            .into_iter()
            .map(|room| (room.id.clone(), room))
            .collect();
        if !rooms.contains_key(&layout.entrance) {
            return Err(EngineError::UnknownRoom(layout.entrance));
        }
        if let Some(missing) = rooms
            .values()
            .flat_map(|room| room.exits.values())
            .find(|target| !rooms.contains_key(*target))
        {
            return Err(EngineError::UnknownRoom(missing.clone()));
        }

        Ok(Self {
            dungeon_id: layout.id,
            level: layout.level,
            explored_rooms: vec![layout.entrance.clone()],
            current_room: layout.entrance,
            rooms,
            alert_level: 0,
            turns: 0,
            noise: 0,
            turns_since_rest: 0,
            has_map: false,
            safe_path: Vec::new(),
            wandering_monsters: layout.wandering_monsters,
        })
    }

    /// A room by id.
    pub fn room(&self, id: &str) -> EngineResult<&DungeonRoom> {
        self.rooms
            .get(id)
            .ok_or_else(|| EngineError::UnknownRoom(id.to_string()))
    }

    /// A room by id, mutably.
    pub fn room_mut(&mut self, id: &str) -> EngineResult<&mut DungeonRoom> {
        self.rooms
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownRoom(id.to_string()))
    }

    /// The room the party is in.
    pub fn current(&self) -> EngineResult<&DungeonRoom> {
        self.room(&self.current_room)
    }

    /// The room the party is in, mutably.
    pub fn current_mut(&mut self) -> EngineResult<&mut DungeonRoom> {
        let id = self.current_room.clone();
        self.room_mut(&id)
    }

    /// Whether the party has reached `room`.
    pub fn is_explored(&self, room: &str) -> bool {
        self.explored_rooms.iter().any(|r| r == room)
    }

    pub(crate) fn mark_explored(&mut self, room: &str) {
        if !self.is_explored(room) {
            self.explored_rooms.push(room.to_string());
        }
    }
}
