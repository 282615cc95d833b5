//! Combat bookkeeping and per-round results.

use std::collections::BTreeMap;

use dolmen_core::{Mode, Side};
use dolmen_mechanics::DiceRoll;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encounter::InitiativeOrder;

/// Morale state of one combatant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantStatus {
    /// Morale checks passed. Two means it fights to the death.
    pub morale_successes: u32,
    /// Broke and running.
    pub fleeing: bool,
    /// Already counted as a casualty.
    pub counted_dead: bool,
    /// Got away and is out of the fight.
    pub escaped: bool,
}

/// Private state of the combat engine. Exists while the game is in the
/// Combat mode, and survives a parley detour into Social.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    /// The encounter being fought out.
    pub encounter_id: Uuid,
    /// Mode to return to when the fight ends.
    pub return_mode: Mode,
    /// Rounds fought.
    pub round: u32,
    /// Last party initiative.
    pub party_initiative: i32,
    /// Last enemy initiative.
    pub enemy_initiative: i32,
    /// Every round so far.
    pub history: Vec<RoundResult>,
    /// Enemies present when combat began.
    pub starting_enemies: usize,
    /// Party members down.
    pub party_casualties: usize,
    /// Enemies down.
    pub enemy_casualties: usize,
    /// Morale status by combatant id.
    pub statuses: BTreeMap<String, CombatantStatus>,
    /// The first-death morale check has fired.
    pub first_death_checked: bool,
    /// The half-casualties morale check has fired.
    pub half_checked: bool,
    /// A lone enemy has checked morale on first being hurt.
    pub solo_harmed_checked: bool,
    /// A lone enemy has checked morale at a quarter of its hit points.
    pub solo_quarter_checked: bool,
    /// Armor class worsening by combatant id, cleared after each round.
    pub ac_penalties: BTreeMap<String, i32>,
    /// Suspended while the sides talk.
    pub in_parley: bool,
}

impl CombatState {
    /// Status for a combatant.
    pub fn status(&self, id: &str) -> CombatantStatus {
        self.statuses.get(id).copied().unwrap_or_default()
    }

    /// Whether a combatant is running.
    pub fn is_fleeing(&self, id: &str) -> bool {
        self.status(id).fleeing
    }

    /// Whether a party member got away.
    pub fn has_escaped(&self, id: &str) -> bool {
        self.status(id).escaped
    }
}

/// A party member's declared attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOrder {
    /// Attacking combatant id.
    pub attacker: String,
    /// Target combatant id.
    pub target: String,
}

impl AttackOrder {
    /// Create an order.
    pub fn new(attacker: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            attacker: attacker.into(),
            target: target.into(),
        }
    }
}

/// One resolved attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    /// Attacker id.
    pub attacker: String,
    /// Target id.
    pub target: String,
    /// The d20, modifiers included.
    pub roll: DiceRoll,
    /// Total the roll had to reach.
    pub needed: i32,
    /// Hit.
    pub hit: bool,
    /// Natural 20.
    pub critical: bool,
    /// Natural 1.
    pub fumble: bool,
    /// Damage dealt.
    pub damage: i32,
    /// Target hit points afterwards.
    pub target_hp: i32,
    /// The target went down.
    pub target_down: bool,
}

/// What set off a morale check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoraleTrigger {
    /// First enemy down.
    FirstDeath,
    /// Half the enemies down.
    HalfCasualties,
    /// A lone enemy took its first wound.
    SoloFirstHarmed,
    /// A lone enemy fell to a quarter of its hit points.
    SoloQuarterHp,
}

/// One morale check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoraleCheck {
    /// Why it was rolled.
    pub trigger: MoraleTrigger,
    /// The 2d6.
    pub roll: DiceRoll,
    /// Average morale of the enemies that checked.
    pub average_morale: u32,
    /// Ids of the enemies that checked.
    pub checked: Vec<String>,
    /// They broke.
    pub fled: bool,
}

/// Everything that happened in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Round number, from 1.
    pub round: u32,
    /// Party initiative.
    pub party_initiative: i32,
    /// Enemy initiative.
    pub enemy_initiative: i32,
    /// Who went first.
    pub order: InitiativeOrder,
    /// Attacks in resolution order.
    pub attacks: Vec<AttackResult>,
    /// Combatants that went down this round.
    pub deaths: Vec<String>,
    /// Morale checks rolled this round.
    pub morale: Vec<MoraleCheck>,
    /// The fight is over.
    pub combat_over: bool,
    /// Winner, if decided.
    pub victor: Option<Side>,
    /// Why it ended.
    pub end_reason: Option<String>,
    /// Set when the round ended the fight.
    pub summary: Option<CombatSummary>,
}

/// Final account of a fight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSummary {
    /// Encounter fought.
    pub encounter_id: Uuid,
    /// Rounds fought.
    pub rounds: u32,
    /// Party members down.
    pub party_casualties: usize,
    /// Enemies down.
    pub enemy_casualties: usize,
    /// Winner, `None` for a fight broken off.
    pub victor: Option<Side>,
    /// Why it ended.
    pub reason: String,
    /// Mode the game went to.
    pub returned_to: Mode,
}

/// Result of trying to run away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleeResult {
    /// Who ran.
    pub character_id: String,
    /// Free attacks the enemies got on the runner.
    pub free_attacks: Vec<AttackResult>,
    /// The 1d6 escape roll, if the runner survived the free attacks.
    pub roll: Option<DiceRoll>,
    /// Got away.
    pub escaped: bool,
    /// Set when the attempt ended the fight.
    pub summary: Option<CombatSummary>,
}

/// Result of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResult {
    /// The push attack.
    pub attack: AttackResult,
    /// The target's save, rolled on a hit.
    pub save: Option<DiceRoll>,
    /// The target was shoved back.
    pub pushed: bool,
}

/// How a mid-fight parley went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParleyOutcome {
    /// 9 or more: they stop to talk.
    Accepted,
    /// 6-8: they hesitate.
    Uncertain,
    /// Below 6: no.
    Refused,
}

impl ParleyOutcome {
    /// Outcome for a modified total.
    pub fn from_total(total: i32) -> Self {
        match total {
            9.. => Self::Accepted,
            6..=8 => Self::Uncertain,
            _ => Self::Refused,
        }
    }
}

/// Result of offering to talk mid-fight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatParley {
    /// 2d6 - 2.
    pub roll: DiceRoll,
    /// Outcome.
    pub outcome: ParleyOutcome,
    /// Mode the game moved to.
    pub transitioned_to: Option<Mode>,
}
