//! Encounter phases, per-phase results, and the engine's private state.

use dolmen_core::{EncounterKind, Mode, Side, SurpriseStatus, TimeAdvance};
use dolmen_mechanics::{DiceRoll, ReactionResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::table::{RollTable, TimeEffect, TransportationEffect};

/// The encounter sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterPhase {
    /// Who already knew about whom.
    Awareness,
    /// Who is caught unaware.
    Surprise,
    /// How far apart the sides are.
    Distance,
    /// Who acts first.
    Initiative,
    /// Declared actions.
    Actions,
    /// Escalated or concluded.
    Ended,
}

impl std::fmt::Display for EncounterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Awareness => write!(f, "awareness"),
            Self::Surprise => write!(f, "surprise"),
            Self::Distance => write!(f, "distance"),
            Self::Initiative => write!(f, "initiative"),
            Self::Actions => write!(f, "actions"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

/// Result of a phase or action call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum PhaseOutcome<T> {
    /// The step ran.
    Resolved(T),
    /// No encounter is active.
    Inactive,
    /// Called out of order. Nothing changed.
    WrongPhase {
        /// Phase the call belongs to.
        expected: EncounterPhase,
        /// Phase the encounter is in.
        current: EncounterPhase,
    },
    /// Nobody on the acting side is able to act. Nothing changed.
    CannotAct {
        /// Why each would-be actor is blocked.
        reasons: Vec<String>,
    },
}

impl<T> PhaseOutcome<T> {
    /// The resolved value, if any.
    pub fn resolved(self) -> Option<T> {
        match self {
            Self::Resolved(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the step ran.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Prior knowledge each side had.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Awareness {
    /// The party knew the enemies were there.
    pub party_aware: bool,
    /// The enemies knew the party was there.
    pub enemies_aware: bool,
}

impl Awareness {
    /// Neither side knew.
    pub fn none() -> Self {
        Self::default()
    }

    /// Both sides knew.
    pub fn both() -> Self {
        Self {
            party_aware: true,
            enemies_aware: true,
        }
    }
}

/// Surprise phase result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurpriseResult {
    /// Combined outcome.
    pub status: SurpriseStatus,
    /// Party's modified roll, `None` when aware.
    pub party_roll: Option<i32>,
    /// Enemies' modified roll, `None` when aware.
    pub enemy_roll: Option<i32>,
    /// Free rounds for the unsurprised side.
    pub surprise_rounds: u32,
}

/// Distance phase result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceResult {
    /// Final distance in feet.
    pub distance: u32,
    /// The 2d6 total.
    pub base_roll: u32,
    /// 30 outdoors, 10 elsewhere.
    pub multiplier: u32,
    /// `base_roll * multiplier`.
    pub undivided: u32,
    /// Divisor applied for mutual surprise.
    pub divisor: Option<u32>,
    /// Rolled for a wilderness origin.
    pub outdoor: bool,
}

/// Who acts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiativeOrder {
    /// The party won.
    PartyFirst,
    /// The enemies won.
    EnemiesFirst,
    /// Tie.
    Simultaneous,
}

impl InitiativeOrder {
    /// Compare two modified initiative totals.
    pub fn from_totals(party: i32, enemy: i32) -> Self {
        match party.cmp(&enemy) {
            std::cmp::Ordering::Greater => Self::PartyFirst,
            std::cmp::Ordering::Less => Self::EnemiesFirst,
            std::cmp::Ordering::Equal => Self::Simultaneous,
        }
    }

    /// The side that acts first, `None` for simultaneous.
    pub fn first(self) -> Option<Side> {
        match self {
            Self::PartyFirst => Some(Side::Party),
            Self::EnemiesFirst => Some(Side::Enemy),
            Self::Simultaneous => None,
        }
    }
}

/// Initiative phase result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeResult {
    /// Party total.
    pub party: i32,
    /// Enemy total.
    pub enemy: i32,
    /// Who acts first.
    pub order: InitiativeOrder,
}

/// Modifiers for [`super::EncounterEngine::auto_run_phases`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseModifiers {
    /// Added to the party's surprise roll.
    pub party_surprise: i32,
    /// Added to the enemies' surprise roll.
    pub enemy_surprise: i32,
    /// Added to the party's initiative.
    pub party_initiative: i32,
    /// Added to the enemies' initiative.
    pub enemy_initiative: i32,
}

/// What [`super::EncounterEngine::auto_run_phases`] ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRunResult {
    /// Surprise, if it ran.
    pub surprise: Option<SurpriseResult>,
    /// Distance, if it ran.
    pub distance: Option<DistanceResult>,
    /// Initiative, if it ran.
    pub initiative: Option<InitiativeResult>,
    /// Phase afterwards.
    pub phase: EncounterPhase,
    /// Whether actions can now be declared.
    pub ready_for_action: bool,
}

/// Result of starting or activating an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterStart {
    /// Record id.
    pub encounter_id: Uuid,
    /// Where the encounter began.
    pub origin: Mode,
    /// Prior knowledge.
    pub awareness: Awareness,
    /// Phase the encounter is now in.
    pub phase: EncounterPhase,
}

/// Result of one declared action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Action id.
    pub action: String,
    /// Side that acted.
    pub actor: Side,
    /// Whether the action achieved its aim.
    pub success: bool,
    /// Human-readable summary lines.
    pub messages: Vec<String>,
    /// The deciding roll.
    pub roll: Option<DiceRoll>,
    /// Number the roll had to reach, when there is one.
    pub target: Option<i32>,
    /// Reaction, when one was rolled or imposed.
    pub reaction: Option<ReactionResult>,
    /// The encounter engine is done with this encounter.
    pub encounter_ended: bool,
    /// Why it ended.
    pub end_reason: Option<String>,
    /// Mode the game moved to.
    pub transitioned_to: Option<Mode>,
    /// Mode the encounter began in.
    pub origin: Mode,
}

impl ActionResult {
    pub(crate) fn new(action: &str, actor: Side, origin: Mode) -> Self {
        Self {
            action: action.to_string(),
            actor,
            success: true,
            messages: Vec::new(),
            roll: None,
            target: None,
            reaction: None,
            encounter_ended: false,
            end_reason: None,
            transitioned_to: None,
            origin,
        }
    }

    pub(crate) fn fail(mut self, message: impl Into<String>) -> Self {
        self.success = false;
        self.messages.push(message.into());
        self
    }
}

/// Result of concluding an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conclusion {
    /// Why the encounter ended.
    pub reason: String,
    /// Where it began.
    pub origin: Mode,
    /// Time that passed.
    pub time: TimeAdvance,
    /// Mode returned to, `None` when the game had already left the encounter.
    pub returned_to: Option<Mode>,
}

/// Snapshot of the running encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterSummary {
    /// Where it began.
    pub origin: Mode,
    /// Current phase.
    pub phase: EncounterPhase,
    /// Kind of encounter.
    pub kind: Option<EncounterKind>,
    /// Distance in feet.
    pub distance: u32,
    /// Surprise outcome.
    pub surprise: SurpriseStatus,
    /// Reaction rolled so far.
    pub reaction: Option<ReactionResult>,
    /// Actor ids.
    pub actors: Vec<String>,
    /// Action rounds taken.
    pub round: u32,
    /// Pending transportation saves.
    pub pending_transportation: usize,
    /// Pending time effects.
    pub pending_time_effects: usize,
}

/// Result of rolling on a location table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRoll {
    /// Table rolled on.
    pub table: String,
    /// The roll.
    pub roll: DiceRoll,
    /// Matching entry, if the table has one for this roll.
    pub entry: Option<super::table::TableEntry>,
    /// The roll on the entry's sub-table.
    pub sub_roll: Option<Box<TableRoll>>,
}

/// Result of a transportation save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportationSave {
    /// Who saved.
    pub character_id: String,
    /// Save category.
    pub save_type: String,
    /// The d20 roll.
    pub roll: DiceRoll,
    /// Number needed.
    pub target: i32,
    /// Saved.
    pub success: bool,
    /// Where the character went on a failure.
    pub destination: Option<String>,
    /// Summary text.
    pub message: String,
}

/// One time effect that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTimeEffect {
    /// The effect text.
    pub effect: String,
    /// The rolled amount.
    pub rolled: i32,
    /// Turns it advanced the clock.
    pub turns: u64,
}

/// Result of [`super::EncounterEngine::apply_pending_time_effects`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEffectsApplied {
    /// Total turns advanced.
    pub turns: u64,
    /// Individual effects.
    pub effects: Vec<AppliedTimeEffect>,
}

/// Private state of the encounter engine. Exists only while the game is in
/// the Encounter mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterEngineState {
    /// Record id in the controller.
    pub encounter_id: Uuid,
    /// Where the encounter began.
    pub origin: Mode,
    /// Current phase.
    pub phase: EncounterPhase,
    /// Prior knowledge.
    pub awareness: Awareness,
    /// Surprise result.
    pub surprise: Option<SurpriseResult>,
    /// Distance result.
    pub distance: Option<DistanceResult>,
    /// Initiative result.
    pub initiative: Option<InitiativeResult>,
    /// Actions declared so far.
    pub round: u32,
    /// Bonus carried to the next reaction roll from waiting.
    pub reaction_bonus: i32,
    /// A parley was attempted.
    pub reaction_attempted: bool,
    /// Tables supplied by the location.
    pub roll_tables: Vec<RollTable>,
    /// Time effects to apply on exit.
    pub pending_time_effects: Vec<TimeEffect>,
    /// Transportation saves still to resolve.
    pub pending_transportation: Vec<TransportationEffect>,
}

impl EncounterEngineState {
    pub(crate) fn new(encounter_id: Uuid, origin: Mode, awareness: Awareness) -> Self {
        Self {
            encounter_id,
            origin,
            phase: EncounterPhase::Surprise,
            awareness,
            surprise: None,
            distance: None,
            initiative: None,
            round: 0,
            reaction_bonus: 0,
            reaction_attempted: false,
            roll_tables: Vec::new(),
            pending_time_effects: Vec::new(),
            pending_transportation: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiative_order() {
        assert_eq!(InitiativeOrder::from_totals(5, 2), InitiativeOrder::PartyFirst);
        assert_eq!(InitiativeOrder::from_totals(1, 2), InitiativeOrder::EnemiesFirst);
        assert_eq!(InitiativeOrder::from_totals(3, 3), InitiativeOrder::Simultaneous);
        assert_eq!(InitiativeOrder::PartyFirst.first(), Some(Side::Party));
        assert_eq!(InitiativeOrder::Simultaneous.first(), None);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(EncounterPhase::Awareness < EncounterPhase::Surprise);
        assert!(EncounterPhase::Initiative < EncounterPhase::Actions);
        assert_eq!(EncounterPhase::Actions.to_string(), "actions");
    }

    #[test]
    fn outcome_helpers() {
        let ok: PhaseOutcome<u32> = PhaseOutcome::Resolved(3);
        assert!(ok.is_resolved());
        assert_eq!(ok.resolved(), Some(3));
        let inactive: PhaseOutcome<u32> = PhaseOutcome::Inactive;
        assert_eq!(inactive.resolved(), None);
    }
}
