//! The static transition and return tables.
//!
//! [`TRANSITIONS`] is the only source of truth for which `(mode, trigger)`
//! pairs are legal. [`RETURNS`] maps `(current, previous)` onto the trigger
//! that unwinds one level of nesting.

use serde::Serialize;

use crate::mode::Mode;

/// Trigger names fired by the engines.
pub mod triggers {
    /// Any exploration mode into an encounter.
    pub const ENCOUNTER_TRIGGERED: &str = "encounter_triggered";
    /// Encounter escalates to combat.
    pub const ENCOUNTER_TO_COMBAT: &str = "encounter_to_combat";
    /// Encounter opens a parley.
    pub const ENCOUNTER_TO_PARLEY: &str = "encounter_to_parley";
    /// Combat breaks off into parley.
    pub const COMBAT_TO_PARLEY: &str = "combat_to_parley";
    /// A parley that was entered from combat resumes the fight.
    pub const PARLEY_RETURN_COMBAT: &str = "parley_return_combat";
    /// Conversation turns violent.
    pub const CONVERSATION_ESCALATES: &str = "conversation_escalates";
    /// Wilderness or settlement into a dungeon.
    pub const ENTER_DUNGEON: &str = "enter_dungeon";
    /// Dungeon back to the wilderness.
    pub const EXIT_DUNGEON: &str = "exit_dungeon";
    /// Exploration into a conversation.
    pub const INITIATE_CONVERSATION: &str = "initiate_conversation";
}

/// One legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionRule {
    /// Mode the trigger is fired from.
    pub from: Mode,
    /// Trigger name.
    pub trigger: &'static str,
    /// Resulting mode.
    pub to: Mode,
    /// What the transition means at the table.
    pub description: &'static str,
}

const fn rule(
    from: Mode,
    trigger: &'static str,
    to: Mode,
    description: &'static str,
) -> TransitionRule {
    TransitionRule {
        from,
        trigger,
        to,
        description,
    }
}

use Mode::{
    Combat, Downtime, DungeonExploration, Encounter, FairyRoadTravel, SettlementExploration,
    SocialInteraction, WildernessTravel,
};

/// Every legal transition.
pub const TRANSITIONS: &[TransitionRule] = &[
    // Wilderness
    rule(WildernessTravel, "encounter_triggered", Encounter, "Wandering monster or planned encounter"),
    rule(WildernessTravel, "enter_dungeon", DungeonExploration, "Party enters a dungeon"),
    rule(WildernessTravel, "enter_settlement", SettlementExploration, "Party arrives at a settlement"),
    rule(WildernessTravel, "begin_rest", Downtime, "Party makes camp"),
    rule(WildernessTravel, "enter_fairy_road", FairyRoadTravel, "Party steps onto a fairy road"),
    rule(WildernessTravel, "initiate_conversation", SocialInteraction, "Party hails a traveller"),
    // Fairy road
    rule(FairyRoadTravel, "encounter_triggered", Encounter, "Something waits on the road"),
    rule(FairyRoadTravel, "fairy_road_combat", Combat, "Ambush on the fairy road"),
    rule(FairyRoadTravel, "initiate_conversation", SocialInteraction, "Party speaks with a fairy"),
    rule(FairyRoadTravel, "exit_fairy_road", WildernessTravel, "Party leaves the fairy road"),
    // Dungeon
    rule(DungeonExploration, "encounter_triggered", Encounter, "Wandering monster or room inhabitant"),
    rule(DungeonExploration, "exit_dungeon", WildernessTravel, "Party leaves the dungeon"),
    rule(DungeonExploration, "begin_rest", Downtime, "Party rests in the dungeon"),
    rule(DungeonExploration, "initiate_conversation", SocialInteraction, "Party speaks with a denizen"),
    // Settlement
    rule(SettlementExploration, "encounter_triggered", Encounter, "Trouble in the streets"),
    rule(SettlementExploration, "initiate_conversation", SocialInteraction, "Party talks with a local"),
    rule(SettlementExploration, "settlement_combat", Combat, "Brawl or ambush in town"),
    rule(SettlementExploration, "exit_settlement", WildernessTravel, "Party leaves the settlement"),
    rule(SettlementExploration, "begin_downtime", Downtime, "Party takes lodgings"),
    rule(SettlementExploration, "enter_dungeon", DungeonExploration, "Party descends beneath the town"),
    // Encounter
    rule(Encounter, "encounter_to_combat", Combat, "Encounter turns violent"),
    rule(Encounter, "encounter_to_parley", SocialInteraction, "Encounter opens a parley"),
    rule(Encounter, "encounter_end_wilderness", WildernessTravel, "Encounter ends, back to travel"),
    rule(Encounter, "encounter_end_dungeon", DungeonExploration, "Encounter ends, back to exploring"),
    rule(Encounter, "encounter_end_settlement", SettlementExploration, "Encounter ends, back to town"),
    rule(Encounter, "encounter_end_fairy_road", FairyRoadTravel, "Encounter ends, back on the road"),
    // Combat
    rule(Combat, "combat_end_wilderness", WildernessTravel, "Combat over, back to travel"),
    rule(Combat, "combat_end_dungeon", DungeonExploration, "Combat over, back to exploring"),
    rule(Combat, "combat_end_settlement", SettlementExploration, "Combat over, back to town"),
    rule(Combat, "combat_end_fairy_road", FairyRoadTravel, "Combat over, back on the road"),
    rule(Combat, "combat_end_downtime", Downtime, "Combat over, rest resumes"),
    rule(Combat, "combat_end_encounter", Encounter, "Combat over, encounter continues"),
    rule(Combat, "combat_to_parley", SocialInteraction, "Combatants agree to talk"),
    // Social
    rule(SocialInteraction, "conversation_end_wilderness", WildernessTravel, "Conversation over, back to travel"),
    rule(SocialInteraction, "conversation_end_dungeon", DungeonExploration, "Conversation over, back to exploring"),
    rule(SocialInteraction, "conversation_end_settlement", SettlementExploration, "Conversation over, back to town"),
    rule(SocialInteraction, "conversation_end_fairy_road", FairyRoadTravel, "Conversation over, back on the road"),
    rule(SocialInteraction, "conversation_escalates", Combat, "Talks break down into violence"),
    rule(SocialInteraction, "parley_end_encounter", Encounter, "Parley over, encounter continues"),
    rule(SocialInteraction, "parley_return_combat", Combat, "Parley fails, fighting resumes"),
    // Downtime
    rule(Downtime, "downtime_end_wilderness", WildernessTravel, "Rest over, back to travel"),
    rule(Downtime, "downtime_end_dungeon", DungeonExploration, "Rest over, back to exploring"),
    rule(Downtime, "downtime_end_settlement", SettlementExploration, "Downtime over, back to town"),
    rule(Downtime, "rest_interrupted", Combat, "Camp attacked"),
];

/// `(current, previous, trigger)` entries used by `return_to_previous`.
pub const RETURNS: &[(Mode, Mode, &str)] = &[
    (Combat, WildernessTravel, "combat_end_wilderness"),
    (Combat, DungeonExploration, "combat_end_dungeon"),
    (Combat, SettlementExploration, "combat_end_settlement"),
    (Combat, Downtime, "combat_end_downtime"),
    (Combat, FairyRoadTravel, "combat_end_fairy_road"),
    (Combat, Encounter, "combat_end_encounter"),
    (SocialInteraction, WildernessTravel, "conversation_end_wilderness"),
    (SocialInteraction, DungeonExploration, "conversation_end_dungeon"),
    (SocialInteraction, SettlementExploration, "conversation_end_settlement"),
    (SocialInteraction, FairyRoadTravel, "conversation_end_fairy_road"),
    (SocialInteraction, Encounter, "parley_end_encounter"),
    (SocialInteraction, Combat, "parley_return_combat"),
    (Encounter, WildernessTravel, "encounter_end_wilderness"),
    (Encounter, DungeonExploration, "encounter_end_dungeon"),
    (Encounter, SettlementExploration, "encounter_end_settlement"),
    (Encounter, FairyRoadTravel, "encounter_end_fairy_road"),
];

/// Find the rule for `(from, trigger)`.
pub fn lookup(from: Mode, trigger: &str) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|r| r.from == from && r.trigger == trigger)
}

/// Triggers that are legal from `from`, in table order.
pub fn valid_triggers(from: Mode) -> Vec<&'static str> {
    TRANSITIONS
        .iter()
        .filter(|r| r.from == from)
        .map(|r| r.trigger)
        .collect()
}

/// The trigger that unwinds `current` back into `previous`, if any.
pub fn return_trigger(current: Mode, previous: Mode) -> Option<&'static str> {
    RETURNS
        .iter()
        .find(|(c, p, _)| *c == current && *p == previous)
        .map(|(_, _, t)| *t)
}

/// The mode `return_trigger(current, previous)` would land in.
pub fn return_mode(current: Mode, previous: Mode) -> Option<Mode> {
    return_trigger(current, previous)
        .and_then(|t| lookup(current, t))
        .map(|r| r.to)
}

/// The `*_end_<origin>` trigger that leaves `from` for `origin`, if legal.
pub fn end_trigger(from: Mode, origin: Mode) -> Option<&'static str> {
    TRANSITIONS
        .iter()
        .find(|r| r.from == from && r.to == origin && r.trigger.contains("_end_"))
        .map(|r| r.trigger)
}
