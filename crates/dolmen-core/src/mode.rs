//! The eight game modes.

use serde::{Deserialize, Serialize};

/// The single authoritative game mode. Exactly one is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Hex-crawl travel through the wilderness.
    WildernessTravel,
    /// Turn-by-turn dungeon exploration.
    DungeonExploration,
    /// Travel along a fairy road.
    FairyRoadTravel,
    /// An encounter being resolved phase by phase.
    Encounter,
    /// Round-based combat.
    Combat,
    /// Exploring a settlement.
    SettlementExploration,
    /// Parley, negotiation, or conversation.
    SocialInteraction,
    /// Resting, downtime activities.
    Downtime,
}

impl Mode {
    /// All modes in declaration order.
    pub const ALL: [Mode; 8] = [
        Mode::WildernessTravel,
        Mode::DungeonExploration,
        Mode::FairyRoadTravel,
        Mode::Encounter,
        Mode::Combat,
        Mode::SettlementExploration,
        Mode::SocialInteraction,
        Mode::Downtime,
    ];

    /// Canonical snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WildernessTravel => "wilderness_travel",
            Self::DungeonExploration => "dungeon_exploration",
            Self::FairyRoadTravel => "fairy_road_travel",
            Self::Encounter => "encounter",
            Self::Combat => "combat",
            Self::SettlementExploration => "settlement_exploration",
            Self::SocialInteraction => "social_interaction",
            Self::Downtime => "downtime",
        }
    }

    /// Short suffix used by `*_end_<suffix>` triggers.
    pub fn trigger_suffix(self) -> &'static str {
        match self {
            Self::WildernessTravel => "wilderness",
            Self::DungeonExploration => "dungeon",
            Self::FairyRoadTravel => "fairy_road",
            Self::Encounter => "encounter",
            Self::Combat => "combat",
            Self::SettlementExploration => "settlement",
            Self::SocialInteraction => "social",
            Self::Downtime => "downtime",
        }
    }

    /// Wilderness, dungeon, settlement, and fairy-road modes.
    pub fn is_exploration(self) -> bool {
        matches!(
            self,
            Self::WildernessTravel
                | Self::DungeonExploration
                | Self::SettlementExploration
                | Self::FairyRoadTravel
        )
    }

    /// Modes an encounter can start from and conclude back into.
    pub fn is_encounter_origin(self) -> bool {
        self.is_exploration()
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
