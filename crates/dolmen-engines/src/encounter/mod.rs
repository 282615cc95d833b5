//! The encounter engine.
//!
//! Runs Awareness, Surprise, Distance, Initiative, and Actions over the
//! encounter record held by the controller. The engine only keeps its own
//! phase bookkeeping; the record itself (distance, surprise, reaction,
//! combatants) lives in the [`GlobalController`] so combat can pick it up
//! after an escalation.

mod state;
mod table;

use dolmen_core::transition::end_trigger;
use dolmen_core::{
    Context, EncounterRecord, GlobalController, Mode, Side, SurpriseStatus, triggers,
};
use dolmen_mechanics::{CharacterClass, ReactionResult, roll_reaction};

pub use state::{
    ActionResult, AppliedTimeEffect, AutoRunResult, Awareness, Conclusion, DistanceResult,
    EncounterEngineState, EncounterPhase, EncounterStart, EncounterSummary, InitiativeOrder,
    InitiativeResult, PhaseModifiers, PhaseOutcome, SurpriseResult, TableRoll,
    TimeEffectsApplied, TransportationSave,
};
pub use table::{
    RollTable, TableEntry, TimeEffect, TimeUnit, TransportationEffect, parse_time_passes,
};

use crate::error::{EngineError, EngineResult};
use crate::narration::{Narration, Narrator, narrate};

/// Movement assumed for enemies without a stat block.
pub const DEFAULT_ENEMY_MOVEMENT: u32 = 30;
/// Save a charmed target must reach on 1d20 to resist.
pub const DEFAULT_ENCHANTMENT_SAVE: i32 = 15;
/// Base target for a transportation save.
pub const TRANSPORTATION_SAVE_TARGET: i32 = 14;
/// Surprise rolls at or below this are surprised.
pub const SURPRISE_THRESHOLD: i32 = 2;

const MAX_SUB_TABLE_DEPTH: usize = 4;

/// An action declared during the Actions phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncounterAction {
    /// Start a fight.
    Attack,
    /// Talk. Rolls a reaction with the given modifier.
    Parley {
        /// Added to the 2d6 reaction roll.
        modifier: i32,
    },
    /// Try to get away.
    Evade,
    /// Hold back and watch.
    Wait,
    /// A bard tries to charm the other side.
    Enchant {
        /// The bard's character id.
        bard_id: String,
        /// Save the target needs, default 15.
        target_save: Option<i32>,
    },
}

impl EncounterAction {
    /// Parse an action id. Enchantment needs a bard and is built directly.
    pub fn from_id(id: &str) -> EngineResult<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "attack" => Ok(Self::Attack),
            "parley" => Ok(Self::Parley { modifier: 0 }),
            "evasion" | "evade" => Ok(Self::Evade),
            "wait" => Ok(Self::Wait),
            _ => Err(EngineError::UnknownAction(id.to_string())),
        }
    }

    /// The action id.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Parley { .. } => "parley",
            Self::Evade => "evasion",
            Self::Wait => "wait",
            Self::Enchant { .. } => "enchantment",
        }
    }
}

/// Target on 1d6 for an evasion attempt.
///
/// Every 60 feet of distance and every 30 feet per round of speed advantage
/// make it one easier. The result stays within 1..=6.
pub fn evasion_target(distance: u32, speed_delta: i64) -> i32 {
    let target = 4 - i64::from(distance / 60) - speed_delta.div_euclid(30);
    target.clamp(1, 6) as i32
}

/// Runs encounters from first contact to escalation or conclusion.
#[derive(Default)]
pub struct EncounterEngine {
    state: Option<EncounterEngineState>,
    narrator: Option<Narrator>,
}

impl std::fmt::Debug for EncounterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncounterEngine")
            .field("state", &self.state)
            .field("narrator", &self.narrator.is_some())
            .finish()
    }
}

impl EncounterEngine {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a narrator that receives each resolved action.
    pub fn with_narrator(
        mut self,
        narrator: impl FnMut(&Narration) -> Result<(), String> + 'static,
    ) -> Self {
        self.narrator = Some(Box::new(narrator));
        self
    }

    /// The running encounter's bookkeeping.
    pub fn state(&self) -> Option<&EncounterEngineState> {
        self.state.as_ref()
    }

    /// Whether an encounter is running.
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Current phase, if an encounter is running.
    pub fn phase(&self) -> Option<EncounterPhase> {
        self.state.as_ref().map(|s| s.phase)
    }

    /// Start an encounter from the exploration mode the party is in.
    ///
    /// Fires `encounter_triggered`, stores `record` on the controller, and
    /// captures awareness. The encounter is left in the Surprise phase.
    pub fn start_encounter(
        &mut self,
        ctl: &mut GlobalController,
        record: EncounterRecord,
        origin: Mode,
        awareness: Awareness,
    ) -> EngineResult<EncounterStart> {
        if self.state.is_some() {
            return Err(EngineError::Precondition(
                "an encounter is already running".into(),
            ));
        }
        if !origin.is_encounter_origin() {
            return Err(EngineError::WrongMode {
                operation: "start_encounter",
                mode: origin,
            });
        }
        let current = ctl.current_mode();
        if current != origin {
            return Err(EngineError::Precondition(format!(
                "encounter origin {origin} does not match the current mode {current}"
            )));
        }

        let encounter_id = record.id;
        let mut context = Context::new();
        context.insert("encounter_id".into(), encounter_id.to_string().into());
        context.insert("origin".into(), origin.as_str().into());
        ctl.transition(triggers::ENCOUNTER_TRIGGERED, context)?;
        ctl.set_encounter(record);

        tracing::info!(encounter = %encounter_id, %origin, ?awareness, "encounter started");
        self.state = Some(EncounterEngineState::new(encounter_id, origin, awareness));
        Ok(EncounterStart {
            encounter_id,
            origin,
            awareness,
            phase: EncounterPhase::Surprise,
        })
    }

    /// Take over a record another engine already stored, without firing a
    /// transition. The game must already be in the Encounter mode.
    ///
    /// A record that arrives with a distance already rolled keeps its
    /// surprise and distance, and the encounter starts at initiative.
    pub fn activate_existing_encounter(
        &mut self,
        ctl: &GlobalController,
        origin: Mode,
        awareness: Awareness,
    ) -> EngineResult<EncounterStart> {
        let mode = ctl.current_mode();
        if mode != Mode::Encounter {
            return Err(EngineError::WrongMode {
                operation: "activate_existing_encounter",
                mode,
            });
        }
        if !origin.is_encounter_origin() {
            return Err(EngineError::WrongMode {
                operation: "activate_existing_encounter",
                mode: origin,
            });
        }
        let record = ctl.encounter().ok_or_else(|| {
            EngineError::Precondition("no encounter record is stored".into())
        })?;

        let mut state = EncounterEngineState::new(record.id, origin, awareness);
        if record.distance > 0 {
            state.surprise = Some(SurpriseResult {
                status: record.surprise,
                party_roll: None,
                enemy_roll: None,
                surprise_rounds: record.surprise.surprise_rounds(),
            });
            state.phase = EncounterPhase::Initiative;
        }
        tracing::info!(encounter = %record.id, %origin, phase = %state.phase, "encounter activated");

        let start = EncounterStart {
            encounter_id: record.id,
            origin,
            awareness,
            phase: state.phase,
        };
        self.state = Some(state);
        Ok(start)
    }

    /// Roll surprise for each unaware side.
    pub fn resolve_surprise(
        &mut self,
        ctl: &mut GlobalController,
        party_modifier: i32,
        enemy_modifier: i32,
    ) -> PhaseOutcome<SurpriseResult> {
        let Some(state) = self.state.as_mut() else {
            return PhaseOutcome::Inactive;
        };
        if !matches!(
            state.phase,
            EncounterPhase::Awareness | EncounterPhase::Surprise
        ) {
            return PhaseOutcome::WrongPhase {
                expected: EncounterPhase::Surprise,
                current: state.phase,
            };
        }

        let party_roll = (!state.awareness.party_aware)
            .then(|| ctl.dice().roll_dice(1, 6, party_modifier, "party surprise").total);
        let enemy_roll = (!state.awareness.enemies_aware)
            .then(|| ctl.dice().roll_dice(1, 6, enemy_modifier, "enemy surprise").total);
        let status = SurpriseStatus::from_sides(
            party_roll.is_some_and(|r| r <= SURPRISE_THRESHOLD),
            enemy_roll.is_some_and(|r| r <= SURPRISE_THRESHOLD),
        );
        if let Some(record) = ctl.encounter_mut() {
            record.surprise = status;
        }

        let result = SurpriseResult {
            status,
            party_roll,
            enemy_roll,
            surprise_rounds: status.surprise_rounds(),
        };
        tracing::debug!(?status, ?party_roll, ?enemy_roll, "surprise resolved");
        state.surprise = Some(result);
        state.phase = EncounterPhase::Distance;
        PhaseOutcome::Resolved(result)
    }

    /// Roll the distance between the sides.
    pub fn resolve_distance(&mut self, ctl: &mut GlobalController) -> PhaseOutcome<DistanceResult> {
        let Some(state) = self.state.as_mut() else {
            return PhaseOutcome::Inactive;
        };
        if state.phase != EncounterPhase::Distance {
            return PhaseOutcome::WrongPhase {
                expected: EncounterPhase::Distance,
                current: state.phase,
            };
        }

        let outdoor = state.origin == Mode::WildernessTravel;
        let multiplier = if outdoor { 30 } else { 10 };
        let base_roll = ctl.dice().roll_2d6("encounter distance").natural();
        let undivided = base_roll * multiplier;
        let mutual = state
            .surprise
            .is_some_and(|s| s.status == SurpriseStatus::MutualSurprise);
        let divisor = mutual.then(|| {
            ctl.dice()
                .roll_d6(1, "mutual surprise distance")
                .natural()
                .clamp(1, 4)
        });
        let distance = divisor.map_or(undivided, |d| undivided / d);
        if let Some(record) = ctl.encounter_mut() {
            record.distance = distance;
        }

        let result = DistanceResult {
            distance,
            base_roll,
            multiplier,
            undivided,
            divisor,
            outdoor,
        };
        tracing::debug!(distance, outdoor, ?divisor, "distance resolved");
        state.distance = Some(result);
        state.phase = EncounterPhase::Initiative;
        PhaseOutcome::Resolved(result)
    }

    /// Roll 1d6 initiative per side.
    pub fn resolve_initiative(
        &mut self,
        ctl: &mut GlobalController,
        party_modifier: i32,
        enemy_modifier: i32,
    ) -> PhaseOutcome<InitiativeResult> {
        let Some(state) = self.state.as_mut() else {
            return PhaseOutcome::Inactive;
        };
        if state.phase != EncounterPhase::Initiative {
            return PhaseOutcome::WrongPhase {
                expected: EncounterPhase::Initiative,
                current: state.phase,
            };
        }

        let party = ctl.dice().roll_dice(1, 6, party_modifier, "party initiative").total;
        let enemy = ctl.dice().roll_dice(1, 6, enemy_modifier, "enemy initiative").total;
        let result = InitiativeResult {
            party,
            enemy,
            order: InitiativeOrder::from_totals(party, enemy),
        };
        tracing::debug!(party, enemy, order = ?result.order, "initiative resolved");
        state.initiative = Some(result);
        state.phase = EncounterPhase::Actions;
        PhaseOutcome::Resolved(result)
    }

    /// Run whichever of Surprise, Distance, and Initiative are still due.
    pub fn auto_run_phases(
        &mut self,
        ctl: &mut GlobalController,
        modifiers: PhaseModifiers,
    ) -> PhaseOutcome<AutoRunResult> {
        if self.state.is_none() {
            return PhaseOutcome::Inactive;
        }
        let mut result = AutoRunResult {
            surprise: None,
            distance: None,
            initiative: None,
            phase: EncounterPhase::Awareness,
            ready_for_action: false,
        };
        if matches!(
            self.phase(),
            Some(EncounterPhase::Awareness | EncounterPhase::Surprise)
        ) {
            result.surprise = self
                .resolve_surprise(ctl, modifiers.party_surprise, modifiers.enemy_surprise)
                .resolved();
        }
        if self.phase() == Some(EncounterPhase::Distance) {
            result.distance = self.resolve_distance(ctl).resolved();
        }
        if self.phase() == Some(EncounterPhase::Initiative) {
            result.initiative = self
                .resolve_initiative(ctl, modifiers.party_initiative, modifiers.enemy_initiative)
                .resolved();
        }
        result.phase = self.phase().unwrap_or(EncounterPhase::Ended);
        result.ready_for_action = result.phase == EncounterPhase::Actions;
        PhaseOutcome::Resolved(result)
    }

    /// Resolve one declared action.
    ///
    /// Attack and a hostile reaction fire `encounter_to_combat`; a friendly
    /// reaction fires `encounter_to_parley`; a successful evasion returns to
    /// the origin. In each case the engine lets go of the encounter and the
    /// record stays on the controller for the next engine (evasion clears it).
    pub fn take_action(
        &mut self,
        ctl: &mut GlobalController,
        actor: Side,
        action: EncounterAction,
    ) -> EngineResult<PhaseOutcome<ActionResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        if state.phase != EncounterPhase::Actions {
            return Ok(PhaseOutcome::WrongPhase {
                expected: EncounterPhase::Actions,
                current: state.phase,
            });
        }
        if let Some(reasons) = side_blocked(ctl, actor) {
            return Ok(PhaseOutcome::CannotAct { reasons });
        }
        state.round += 1;
        let origin = state.origin;

        let mut result = ActionResult::new(action.id(), actor, origin);
        match action {
            EncounterAction::Attack => {
                result.messages.push(format!("the {actor} side attacks"));
                self.escalate(ctl, triggers::ENCOUNTER_TO_COMBAT, "attack", &mut result)?;
            }
            EncounterAction::Parley { modifier } => self.parley(ctl, modifier, &mut result)?,
            EncounterAction::Evade => self.evade(ctl, &mut result)?,
            EncounterAction::Wait => {
                if let Some(state) = self.state.as_mut() {
                    state.reaction_bonus += 1;
                }
                result
                    .messages
                    .push("waiting: +1 to the next reaction roll".into());
            }
            EncounterAction::Enchant {
                bard_id,
                target_save,
            } => {
                let save = target_save.unwrap_or(DEFAULT_ENCHANTMENT_SAVE);
                self.enchant(ctl, &bard_id, save, &mut result)?;
            }
        }

        narrate(
            &mut self.narrator,
            Narration {
                source: "encounter",
                event: result.action.clone(),
                facts: serde_json::to_value(&result).unwrap_or_default(),
            },
        );
        Ok(PhaseOutcome::Resolved(result))
    }

    fn parley(
        &mut self,
        ctl: &mut GlobalController,
        modifier: i32,
        result: &mut ActionResult,
    ) -> EngineResult<()> {
        let bonus = match self.state.as_mut() {
            Some(state) => {
                state.reaction_attempted = true;
                std::mem::take(&mut state.reaction_bonus)
            }
            None => 0,
        };
        let reaction = roll_reaction(ctl.dice(), modifier + bonus, "encounter reaction");
        if let Some(record) = ctl.encounter_mut() {
            record.reaction = Some(reaction.result);
        }
        result.reaction = Some(reaction.result);
        result.success = reaction.result.leads_to_parley();
        result
            .messages
            .push(format!("reaction {} ({})", reaction.result, reaction.total()));
        result.roll = Some(reaction.roll);

        if reaction.result.leads_to_combat() {
            self.escalate(ctl, triggers::ENCOUNTER_TO_COMBAT, "reaction_attacks", result)?;
        } else if reaction.result.leads_to_parley() {
            self.escalate(ctl, triggers::ENCOUNTER_TO_PARLEY, "reaction_parley", result)?;
        }
        Ok(())
    }

    fn evade(&mut self, ctl: &mut GlobalController, result: &mut ActionResult) -> EngineResult<()> {
        let actor = result.actor;
        let Some(record) = ctl.encounter() else {
            result.success = false;
            result.messages.push("no encounter record".into());
            return Ok(());
        };
        if record.surprise.caught_alone(actor) {
            result.success = false;
            result
                .messages
                .push(format!("the {actor} side is surprised and cannot evade"));
            return Ok(());
        }

        let distance = record.distance;
        let enemy_speed = record
            .living(Side::Enemy)
            .map(|c| c.stats.movement)
            .max()
            .unwrap_or(DEFAULT_ENEMY_MOVEMENT)
            * 3;
        let party_speed = ctl.party_speed() * 3;
        let (evader, pursuer) = match actor {
            Side::Party => (party_speed, enemy_speed),
            Side::Enemy => (enemy_speed, party_speed),
        };
        let target = evasion_target(distance, i64::from(evader) - i64::from(pursuer));
        let roll = ctl.dice().roll_d6(1, "evasion");
        result.success = roll.total >= target;
        result.target = Some(target);
        result.messages.push(format!(
            "evasion {} (needed {target}, rolled {})",
            if result.success { "succeeds" } else { "fails" },
            roll.total
        ));
        result.roll = Some(roll);

        if result.success {
            let trigger = end_trigger(Mode::Encounter, result.origin).ok_or(
                EngineError::WrongMode {
                    operation: "evade",
                    mode: result.origin,
                },
            )?;
            self.escalate(ctl, trigger, "evaded", result)?;
            ctl.clear_encounter();
        }
        Ok(())
    }

    fn enchant(
        &mut self,
        ctl: &mut GlobalController,
        bard_id: &str,
        save: i32,
        result: &mut ActionResult,
    ) -> EngineResult<()> {
        if result.actor != Side::Party {
            result.success = false;
            result.messages.push("only the party can enchant".into());
            return Ok(());
        }
        let Some(bard) = ctl.character(bard_id) else {
            result.success = false;
            result.messages.push(format!("{bard_id} is not in the party"));
            return Ok(());
        };
        if bard.class != CharacterClass::Bard || !bard.can_act() {
            result.success = false;
            result
                .messages
                .push(format!("{} cannot use enchantment", bard.name));
            return Ok(());
        }
        if !ctl.use_enchantment(bard_id)? {
            result.success = false;
            result.messages.push("no enchantments left today".into());
            return Ok(());
        }

        let roll = ctl.dice().roll_d20("enchantment save");
        result.target = Some(save);
        if roll.total >= save {
            result.success = false;
            result.messages.push("the target resists".into());
        } else {
            if let Some(record) = ctl.encounter_mut() {
                record.reaction = Some(ReactionResult::Friendly);
            }
            result.reaction = Some(ReactionResult::Friendly);
            result.messages.push("the target is charmed".into());
        }
        result.roll = Some(roll);
        Ok(())
    }

    fn escalate(
        &mut self,
        ctl: &mut GlobalController,
        trigger: &str,
        reason: &str,
        result: &mut ActionResult,
    ) -> EngineResult<()> {
        let mut context = Context::new();
        context.insert("reason".into(), reason.into());
        context.insert("origin".into(), result.origin.as_str().into());
        let to = ctl.transition(trigger, context)?;
        tracing::info!(trigger, %to, reason, "encounter ended");
        result.transitioned_to = Some(to);
        result.encounter_ended = true;
        result.end_reason = Some(reason.to_string());
        self.state = None;
        Ok(())
    }

    /// End the encounter peacefully: one turn passes, the record is cleared,
    /// and the game returns to the origin.
    ///
    /// When something else already moved the game out of the Encounter mode,
    /// only the bookkeeping is dropped.
    pub fn conclude(
        &mut self,
        ctl: &mut GlobalController,
        reason: &str,
    ) -> EngineResult<PhaseOutcome<Conclusion>> {
        let Some(origin) = self.state.as_ref().map(|s| s.origin) else {
            return Ok(PhaseOutcome::Inactive);
        };
        let trigger = if ctl.current_mode() == Mode::Encounter {
            Some(
                end_trigger(Mode::Encounter, origin).ok_or(EngineError::WrongMode {
                    operation: "conclude",
                    mode: origin,
                })?,
            )
        } else {
            None
        };

        let time = ctl.advance_time(1);
        ctl.clear_encounter();
        let returned_to = match trigger {
            Some(trigger) => {
                let mut context = Context::new();
                context.insert("reason".into(), reason.into());
                Some(ctl.transition(trigger, context)?)
            }
            None => None,
        };
        self.state = None;
        tracing::info!(%origin, reason, "encounter concluded");
        Ok(PhaseOutcome::Resolved(Conclusion {
            reason: reason.to_string(),
            origin,
            time,
            returned_to,
        }))
    }

    /// Attach a location table. Returns `false` when no encounter is running.
    pub fn attach_table(&mut self, table: RollTable) -> bool {
        match self.state.as_mut() {
            Some(state) => {
                state.roll_tables.retain(|t| !t.name.eq_ignore_ascii_case(&table.name));
                state.roll_tables.push(table);
                true
            }
            None => false,
        }
    }

    /// Roll on an attached table. Time and transportation effects on the
    /// result are queued; a sub-table is rolled on in turn.
    pub fn roll_on_table(
        &mut self,
        ctl: &mut GlobalController,
        name: &str,
    ) -> EngineResult<PhaseOutcome<TableRoll>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        let mut rolls = Vec::new();
        let mut next = Some(name.to_string());
        while let Some(table_name) = next.take() {
            if rolls.len() >= MAX_SUB_TABLE_DEPTH {
                break;
            }
            let table = state
                .roll_tables
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&table_name))
                .ok_or_else(|| EngineError::UnknownTable(table_name.clone()))?;
            let notation = table.notation()?;
            let roll = ctl
                .dice()
                .roll_notation(&notation, &format!("{} table", table.name));
            let entry = table.entry(roll.total).cloned();
            let table_roll = TableRoll {
                table: table.name.clone(),
                roll,
                entry,
                sub_roll: None,
            };
            if let Some(entry) = &table_roll.entry {
                if let Some(effect) = entry.time_effect.as_ref().filter(|e| e.on_exit) {
                    state.pending_time_effects.push(effect.clone());
                }
                if let Some(effect) = &entry.transportation {
                    state.pending_transportation.push(effect.clone());
                }
                next.clone_from(&entry.sub_table);
            }
            tracing::debug!(table = %table_roll.table, total = table_roll.roll.total, "table rolled");
            rolls.push(table_roll);
        }

        let nested = rolls.into_iter().rev().reduce(|child, mut parent| {
            parent.sub_roll = Some(Box::new(child));
            parent
        });
        Ok(nested.map_or(PhaseOutcome::Inactive, PhaseOutcome::Resolved))
    }

    /// Resolve the oldest pending transportation effect for one character:
    /// d20 >= 14 - `modifier` saves. The effect is used up either way.
    pub fn resolve_transportation_save(
        &mut self,
        ctl: &mut GlobalController,
        character_id: &str,
        modifier: i32,
    ) -> EngineResult<PhaseOutcome<TransportationSave>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        if state.pending_transportation.is_empty() {
            return Err(EngineError::Precondition(
                "no transportation effect is pending".into(),
            ));
        }
        let name = ctl
            .character(character_id)
            .map(|c| c.name.clone())
            .ok_or_else(|| dolmen_core::CoreError::CharacterNotFound(character_id.to_string()))?;

        let effect = state.pending_transportation.remove(0);
        let target = TRANSPORTATION_SAVE_TARGET - modifier;
        let roll = ctl
            .dice()
            .roll_d20(&format!("save versus {}", effect.save_type));
        let success = roll.total >= target;
        let message = if success {
            format!("{name} resists the pull")
        } else if effect.failure_desc.is_empty() {
            format!("{name} is transported to {}", effect.destination)
        } else {
            effect.failure_desc.clone()
        };
        Ok(PhaseOutcome::Resolved(TransportationSave {
            character_id: character_id.to_string(),
            save_type: effect.save_type,
            roll,
            target,
            success,
            destination: (!success).then_some(effect.destination),
            message,
        }))
    }

    /// Roll and apply every queued time effect. Nothing is applied if any
    /// effect text is malformed.
    pub fn apply_pending_time_effects(
        &mut self,
        ctl: &mut GlobalController,
    ) -> EngineResult<PhaseOutcome<TimeEffectsApplied>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        let parsed = state
            .pending_time_effects
            .iter()
            .map(|effect| {
                parse_time_passes(&effect.time_passes).map(|p| (effect.time_passes.clone(), p))
            })
            .collect::<Result<Vec<_>, _>>()?;
        state.pending_time_effects.clear();

        let mut applied = TimeEffectsApplied::default();
        for (effect, (notation, unit)) in parsed {
            let roll = ctl.dice().roll_notation(&notation, "time passes");
            let rolled = roll.total.max(0);
            let turns = u64::from(rolled.unsigned_abs()) * unit.turns();
            applied.turns += turns;
            applied.effects.push(AppliedTimeEffect {
                effect,
                rolled,
                turns,
            });
        }
        if applied.turns > 0 {
            ctl.advance_time(applied.turns);
            tracing::info!(turns = applied.turns, "time passes outside");
        }
        Ok(PhaseOutcome::Resolved(applied))
    }

    /// Snapshot of the running encounter.
    pub fn summary(&self, ctl: &GlobalController) -> PhaseOutcome<EncounterSummary> {
        let Some(state) = self.state.as_ref() else {
            return PhaseOutcome::Inactive;
        };
        let record = ctl.encounter();
        PhaseOutcome::Resolved(EncounterSummary {
            origin: state.origin,
            phase: state.phase,
            kind: record.map(|r| r.kind),
            distance: record.map_or(0, |r| r.distance),
            surprise: record.map(|r| r.surprise).unwrap_or_default(),
            reaction: record.and_then(|r| r.reaction),
            actors: record.map(|r| r.actor_ids.clone()).unwrap_or_default(),
            round: state.round,
            pending_transportation: state.pending_transportation.len(),
            pending_time_effects: state.pending_time_effects.len(),
        })
    }
}

/// Reasons nobody on `side` can act, or `None` when someone can.
fn side_blocked(ctl: &GlobalController, side: Side) -> Option<Vec<String>> {
    let combatants: Vec<_> = ctl
        .encounter()
        .map(|r| r.side(side).collect::<Vec<_>>())
        .unwrap_or_default();
    let mut reasons = Vec::new();
    let mut anyone_ready = false;

    if combatants.is_empty() {
        if side == Side::Enemy || ctl.characters().is_empty() {
            return None;
        }
        for character in ctl.characters() {
            if character.can_act() {
                anyone_ready = true;
            } else {
                reasons.push(format!("{} cannot act", character.name));
            }
        }
    } else {
        for combatant in combatants {
            if !combatant.is_alive() {
                reasons.push(format!("{} is down", combatant.name));
                continue;
            }
            match combatant.character_ref.as_deref() {
                Some(id) if !ctl.can_character_act(id) => {
                    reasons.push(format!("{} cannot act", combatant.name));
                }
                _ => anyone_ready = true,
            }
        }
    }
    (!anyone_ready).then_some(reasons)
}

#[cfg(test)]
mod tests {
    use dolmen_core::{Character, Combatant, EncounterKind, RefereeConfig, StatBlock};
    use dolmen_mechanics::ScriptedDice;

    use super::*;

    fn controller(faces: &[u32]) -> GlobalController {
        GlobalController::default().with_dice(ScriptedDice::new(faces.iter().copied()))
    }

    fn dungeon_controller(faces: &[u32]) -> GlobalController {
        GlobalController::new(RefereeConfig::default().with_initial_mode(Mode::DungeonExploration))
            .with_dice(ScriptedDice::new(faces.iter().copied()))
    }

    fn goblins() -> EncounterRecord {
        EncounterRecord::new(EncounterKind::Monster).with_combatant(Combatant::new(
            "gob1",
            "Goblin",
            Side::Enemy,
            StatBlock::new(6, "1d8", 4, 60, 7),
        ))
    }

    fn started(ctl: &mut GlobalController, awareness: Awareness) -> EncounterEngine {
        let mut engine = EncounterEngine::new();
        engine
            .start_encounter(ctl, goblins(), Mode::WildernessTravel, awareness)
            .unwrap();
        engine
    }

    fn ready(ctl: &mut GlobalController) -> EncounterEngine {
        let mut engine = started(ctl, Awareness::both());
        let run = engine
            .auto_run_phases(ctl, PhaseModifiers::default())
            .resolved()
            .unwrap();
        assert!(run.ready_for_action);
        engine
    }

    #[test]
    fn start_requires_matching_origin() {
        let mut ctl = controller(&[]);
        let mut engine = EncounterEngine::new();
        let err = engine
            .start_encounter(&mut ctl, goblins(), Mode::DungeonExploration, Awareness::none())
            .unwrap_err();
        assert!(matches!(err, EngineError::Precondition(_)));
        assert_eq!(ctl.current_mode(), Mode::WildernessTravel);
        assert!(ctl.encounter().is_none());
        assert!(!engine.is_active());

        let err = engine
            .start_encounter(&mut ctl, goblins(), Mode::Combat, Awareness::none())
            .unwrap_err();
        assert!(matches!(err, EngineError::WrongMode { .. }));
    }

    #[test]
    fn start_moves_into_encounter() {
        let mut ctl = controller(&[]);
        let engine = started(&mut ctl, Awareness::none());
        assert_eq!(ctl.current_mode(), Mode::Encounter);
        assert_eq!(engine.phase(), Some(EncounterPhase::Surprise));
        assert_eq!(ctl.encounter().unwrap().id, engine.state().unwrap().encounter_id);
    }

    #[test]
    fn phases_without_encounter_are_inactive() {
        let mut ctl = controller(&[]);
        let mut engine = EncounterEngine::new();
        assert_eq!(engine.resolve_surprise(&mut ctl, 0, 0), PhaseOutcome::Inactive);
        assert_eq!(engine.resolve_distance(&mut ctl), PhaseOutcome::Inactive);
        assert_eq!(engine.summary(&ctl), PhaseOutcome::Inactive);
        assert_eq!(
            engine.take_action(&mut ctl, Side::Party, EncounterAction::Attack),
            Ok(PhaseOutcome::Inactive)
        );
    }

    #[test]
    fn phases_run_in_order() {
        let mut ctl = controller(&[]);
        let mut engine = started(&mut ctl, Awareness::none());
        assert_eq!(
            engine.resolve_initiative(&mut ctl, 0, 0),
            PhaseOutcome::WrongPhase {
                expected: EncounterPhase::Initiative,
                current: EncounterPhase::Surprise,
            }
        );
        assert!(matches!(
            engine.take_action(&mut ctl, Side::Party, EncounterAction::Wait),
            Ok(PhaseOutcome::WrongPhase { .. })
        ));
    }

    #[test]
    fn aware_sides_are_never_surprised() {
        let mut ctl = controller(&[]);
        let mut engine = started(&mut ctl, Awareness::both());
        let surprise = engine.resolve_surprise(&mut ctl, 0, 0).resolved().unwrap();
        assert_eq!(surprise.status, SurpriseStatus::NoSurprise);
        assert_eq!(surprise.party_roll, None);
        assert_eq!(surprise.surprise_rounds, 0);
    }

    #[test]
    fn one_sided_surprise_grants_a_round() {
        let mut ctl = controller(&[2, 5]);
        let mut engine = started(&mut ctl, Awareness::none());
        let surprise = engine.resolve_surprise(&mut ctl, 0, 0).resolved().unwrap();
        assert_eq!(surprise.status, SurpriseStatus::PartySurprised);
        assert_eq!(surprise.surprise_rounds, 1);
        assert_eq!(ctl.encounter().unwrap().surprise, SurpriseStatus::PartySurprised);
        assert_eq!(engine.phase(), Some(EncounterPhase::Distance));
    }

    #[test]
    fn mutual_surprise_divides_distance() {
        let mut ctl = controller(&[1, 1, 6, 6, 3]);
        let mut engine = started(&mut ctl, Awareness::none());
        engine.resolve_surprise(&mut ctl, 0, 0);
        let distance = engine.resolve_distance(&mut ctl).resolved().unwrap();
        assert!(distance.outdoor);
        assert_eq!(distance.undivided, 360);
        assert_eq!(distance.divisor, Some(3));
        assert_eq!(distance.distance, 120);
        assert_eq!(ctl.encounter().unwrap().distance, 120);
    }

    #[test]
    fn indoor_distance_uses_tens() {
        let mut ctl = dungeon_controller(&[3, 4]);
        let mut engine = EncounterEngine::new();
        engine
            .start_encounter(&mut ctl, goblins(), Mode::DungeonExploration, Awareness::both())
            .unwrap();
        engine.resolve_surprise(&mut ctl, 0, 0);
        let distance = engine.resolve_distance(&mut ctl).resolved().unwrap();
        assert!(!distance.outdoor);
        assert_eq!(distance.distance, 70);
    }

    #[test]
    fn higher_initiative_acts_first() {
        let mut ctl = controller(&[3, 3, 5, 2]);
        let mut engine = started(&mut ctl, Awareness::both());
        engine.resolve_surprise(&mut ctl, 0, 0);
        engine.resolve_distance(&mut ctl);
        let init = engine.resolve_initiative(&mut ctl, 0, 0).resolved().unwrap();
        assert_eq!(init.order, InitiativeOrder::PartyFirst);
        assert_eq!(engine.phase(), Some(EncounterPhase::Actions));
    }

    #[test]
    fn friendly_reaction_opens_parley() {
        let mut ctl = controller(&[3, 3, 4, 2, 6, 6]);
        let mut engine = ready(&mut ctl);
        let result = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Parley { modifier: 0 })
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(result.reaction, Some(ReactionResult::Friendly));
        assert_eq!(result.transitioned_to, Some(Mode::SocialInteraction));
        assert!(result.encounter_ended);
        assert!(!engine.is_active());
        assert_eq!(
            ctl.encounter().unwrap().reaction,
            Some(ReactionResult::Friendly)
        );
    }

    #[test]
    fn hostile_reaction_stays_in_encounter() {
        let mut ctl = controller(&[3, 3, 4, 2, 2, 2]);
        let mut engine = ready(&mut ctl);
        let result = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Parley { modifier: 0 })
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(result.reaction, Some(ReactionResult::Hostile));
        assert!(!result.encounter_ended);
        assert_eq!(ctl.current_mode(), Mode::Encounter);
        assert!(engine.is_active());
    }

    #[test]
    fn waiting_improves_the_next_reaction() {
        let mut ctl = controller(&[3, 3, 4, 2, 4, 4]);
        let mut engine = ready(&mut ctl);
        engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Wait)
            .unwrap();
        assert_eq!(engine.state().unwrap().reaction_bonus, 1);
        let result = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Parley { modifier: 0 })
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(result.roll.unwrap().total, 9);
        assert_eq!(result.reaction, Some(ReactionResult::Indifferent));
    }

    #[test]
    fn evasion_returns_to_origin() {
        // distance 60, party 120 vs goblins 180: target 4 - 1 + 2 = 5
        let mut ctl = controller(&[1, 1, 4, 2, 5]);
        let mut engine = ready(&mut ctl);
        let result = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Evade)
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(result.target, Some(5));
        assert!(result.success);
        assert_eq!(ctl.current_mode(), Mode::WildernessTravel);
        assert!(ctl.encounter().is_none());
        assert!(!engine.is_active());
    }

    #[test]
    fn mutual_surprise_still_allows_evasion() {
        // surprise 1/1, distance 1+1 = 60 divided by 1, initiative 4/2, evasion 5
        let mut ctl = controller(&[1, 1, 1, 1, 1, 4, 2, 5]);
        let mut engine = started(&mut ctl, Awareness::none());
        let run = engine
            .auto_run_phases(&mut ctl, PhaseModifiers::default())
            .resolved()
            .unwrap();
        assert_eq!(run.surprise.unwrap().status, SurpriseStatus::MutualSurprise);
        let result = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Evade)
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(result.target, Some(5));
        assert!(result.success);
        assert_eq!(ctl.current_mode(), Mode::WildernessTravel);
    }

    #[test]
    fn surprised_side_cannot_evade() {
        let mut ctl = controller(&[1, 3, 3, 4, 2]);
        let mut engine = started(
            &mut ctl,
            Awareness {
                party_aware: false,
                enemies_aware: true,
            },
        );
        engine.auto_run_phases(&mut ctl, PhaseModifiers::default());
        let result = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Evade)
            .unwrap()
            .resolved()
            .unwrap();
        assert!(!result.success);
        assert!(result.roll.is_none());
        assert_eq!(ctl.current_mode(), Mode::Encounter);
    }

    #[test]
    fn evasion_target_is_clamped() {
        assert_eq!(evasion_target(0, 0), 4);
        assert_eq!(evasion_target(600, 0), 1);
        assert_eq!(evasion_target(0, -300), 6);
        assert_eq!(evasion_target(59, -1), 5);
    }

    #[test]
    fn downed_party_cannot_act() {
        let mut ctl = controller(&[3, 3, 4, 2]);
        ctl.add_character(Character::new("pc1", "Aldric", CharacterClass::Fighter, 1, 5));
        let mut engine = ready(&mut ctl);
        ctl.apply_damage("pc1", 5).unwrap();
        let outcome = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Attack)
            .unwrap();
        assert!(matches!(outcome, PhaseOutcome::CannotAct { ref reasons } if reasons.len() == 1));
        assert_eq!(engine.state().unwrap().round, 0);
        assert_eq!(ctl.current_mode(), Mode::Encounter);
    }

    #[test]
    fn enchantment_charms_and_uses_up() {
        let mut ctl = controller(&[3, 3, 4, 2, 10]);
        ctl.add_character(Character::new("bard", "Wenna", CharacterClass::Bard, 1, 6));
        let mut engine = ready(&mut ctl);
        let enchant = || EncounterAction::Enchant {
            bard_id: "bard".into(),
            target_save: None,
        };
        let result = engine
            .take_action(&mut ctl, Side::Party, enchant())
            .unwrap()
            .resolved()
            .unwrap();
        assert!(result.success);
        assert_eq!(result.target, Some(15));
        assert_eq!(ctl.encounter().unwrap().reaction, Some(ReactionResult::Friendly));
        assert_eq!(ctl.current_mode(), Mode::Encounter);

        let again = engine
            .take_action(&mut ctl, Side::Party, enchant())
            .unwrap()
            .resolved()
            .unwrap();
        assert!(!again.success);
        assert!(again.roll.is_none());
    }

    #[test]
    fn attack_escalates_and_keeps_record() {
        let mut ctl = controller(&[3, 3, 4, 2]);
        let mut engine = ready(&mut ctl);
        let result = engine
            .take_action(&mut ctl, Side::Enemy, EncounterAction::Attack)
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(result.transitioned_to, Some(Mode::Combat));
        assert_eq!(result.origin, Mode::WildernessTravel);
        assert!(ctl.encounter().is_some());
        assert!(!engine.is_active());
    }

    #[test]
    fn conclude_returns_to_origin() {
        let mut ctl = dungeon_controller(&[]);
        let mut engine = EncounterEngine::new();
        engine
            .start_encounter(&mut ctl, goblins(), Mode::DungeonExploration, Awareness::both())
            .unwrap();
        let before = ctl.clock().turn();
        let conclusion = engine
            .conclude(&mut ctl, "talked it out")
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(conclusion.returned_to, Some(Mode::DungeonExploration));
        assert_eq!(ctl.clock().turn(), before + 1);
        assert!(ctl.encounter().is_none());
        assert_eq!(engine.conclude(&mut ctl, "again"), Ok(PhaseOutcome::Inactive));
    }

    #[test]
    fn activation_adopts_prerolled_record() {
        let mut ctl = dungeon_controller(&[]);
        ctl.transition(triggers::ENCOUNTER_TRIGGERED, Context::new())
            .unwrap();
        let mut record = goblins();
        record.distance = 30;
        record.surprise = SurpriseStatus::PartySurprised;
        ctl.set_encounter(record);

        let mut engine = EncounterEngine::new();
        let start = engine
            .activate_existing_encounter(&ctl, Mode::DungeonExploration, Awareness::none())
            .unwrap();
        assert_eq!(start.phase, EncounterPhase::Initiative);
        assert_eq!(
            engine.state().unwrap().surprise.unwrap().surprise_rounds,
            1
        );
        assert_eq!(ctl.machine().history().len(), 2);
    }

    #[test]
    fn activation_needs_encounter_mode() {
        let ctl = controller(&[]);
        let mut engine = EncounterEngine::new();
        assert!(matches!(
            engine.activate_existing_encounter(&ctl, Mode::WildernessTravel, Awareness::none()),
            Err(EngineError::WrongMode { .. })
        ));
    }

    #[test]
    fn tables_queue_effects() {
        let mut ctl = controller(&[3, 2, 14]);
        ctl.add_character(Character::new("pc1", "Aldric", CharacterClass::Fighter, 1, 5));
        let mut engine = started(&mut ctl, Awareness::both());
        let table = RollTable::new("Glade", "d6").with_entry(
            TableEntry::new(3, "Fairy ring")
                .with_time_effect(TimeEffect::on_exit("1d6 days"))
                .with_transportation(TransportationEffect::new("Hold", "the Hollow", "")),
        );
        assert!(engine.attach_table(table));

        let rolled = engine
            .roll_on_table(&mut ctl, "glade")
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(rolled.entry.unwrap().title, "Fairy ring");
        let summary = engine.summary(&ctl).resolved().unwrap();
        assert_eq!(summary.pending_time_effects, 1);
        assert_eq!(summary.pending_transportation, 1);

        let before = ctl.clock().turn();
        let applied = engine
            .apply_pending_time_effects(&mut ctl)
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(applied.turns, 288);
        assert_eq!(ctl.clock().turn(), before + 288);

        let save = engine
            .resolve_transportation_save(&mut ctl, "pc1", 0)
            .unwrap()
            .resolved()
            .unwrap();
        assert!(save.success);
        assert_eq!(save.target, 14);
        assert!(engine.resolve_transportation_save(&mut ctl, "pc1", 0).is_err());
        assert_eq!(
            engine.roll_on_table(&mut ctl, "Swamp"),
            Err(EngineError::UnknownTable("Swamp".into()))
        );
    }

    #[test]
    fn sub_tables_are_followed() {
        let mut ctl = controller(&[1, 2]);
        let mut engine = started(&mut ctl, Awareness::both());
        engine.attach_table(
            RollTable::new("Hall", "d4").with_entry(TableEntry::new(1, "Mirrors").with_sub_table("Mirror")),
        );
        engine.attach_table(RollTable::new("Mirror", "d4").with_entry(TableEntry::new(2, "Reflection")));
        let rolled = engine
            .roll_on_table(&mut ctl, "Hall")
            .unwrap()
            .resolved()
            .unwrap();
        let sub = rolled.sub_roll.unwrap();
        assert_eq!(sub.table, "Mirror");
        assert_eq!(sub.entry.unwrap().title, "Reflection");
    }

    #[test]
    fn action_ids_parse() {
        assert_eq!(EncounterAction::from_id("Attack"), Ok(EncounterAction::Attack));
        assert_eq!(EncounterAction::from_id("evasion"), Ok(EncounterAction::Evade));
        assert_eq!(
            EncounterAction::from_id("juggle"),
            Err(EngineError::UnknownAction("juggle".into()))
        );
    }

    #[test]
    fn narrator_sees_actions_and_errors_are_ignored() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut ctl = controller(&[3, 3, 4, 2]);
        let mut engine = EncounterEngine::new().with_narrator(move |n| {
            sink.borrow_mut().push(n.event.clone());
            Err("offline".into())
        });
        engine
            .start_encounter(&mut ctl, goblins(), Mode::WildernessTravel, Awareness::both())
            .unwrap();
        engine.auto_run_phases(&mut ctl, PhaseModifiers::default());
        let outcome = engine
            .take_action(&mut ctl, Side::Party, EncounterAction::Wait)
            .unwrap();
        assert!(outcome.is_resolved());
        assert_eq!(*seen.borrow(), vec!["wait".to_string()]);
    }
}
