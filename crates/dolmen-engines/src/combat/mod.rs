//! The combat engine.
//!
//! Fights out the encounter record stored on the controller. Each round rolls
//! side initiative, resolves declared party attacks and enemy attacks, counts
//! casualties, checks enemy morale, and ends the fight when one side is down
//! or the enemies have broken.

mod state;

use dolmen_core::transition::end_trigger;
use dolmen_core::{Combatant, Context, CoreError, GlobalController, Mode, Side, triggers};

pub use state::{
    AttackOrder, AttackResult, CombatParley, CombatState, CombatSummary, CombatantStatus,
    FleeResult, MoraleCheck, MoraleTrigger, ParleyOutcome, PushResult, RoundResult,
};

use crate::encounter::{InitiativeOrder, PhaseOutcome};
use crate::error::{EngineError, EngineResult};
use crate::narration::{Narration, Narrator, narrate};

/// To-hit bonus for a charge.
pub const CHARGE_BONUS: i32 = 2;
/// To-hit penalty for a push.
pub const PUSH_PENALTY: i32 = -4;
/// Save versus hold a pushed target needs.
pub const PUSH_SAVE: i32 = 16;
/// To-hit bonus for free attacks on a fleeing party.
pub const FREE_ATTACK_BONUS: i32 = 2;
/// 1d6 needed to get away.
pub const FLEE_TARGET: i32 = 4;
/// Morale at which a creature never checks.
pub const FEARLESS_MORALE: u32 = 12;
/// Passed checks after which a creature fights to the death.
pub const STAND_FAST_AFTER: u32 = 2;

struct Declared {
    attacker: String,
    target: String,
    modifier: i32,
    deals_damage: bool,
}

impl Declared {
    fn strike(attacker: &str, target: &str, modifier: i32) -> Self {
        Self {
            attacker: attacker.to_string(),
            target: target.to_string(),
            modifier,
            deals_damage: true,
        }
    }
}

/// Runs combat rounds until one side wins, flees, or talks.
#[derive(Default)]
pub struct CombatEngine {
    state: Option<CombatState>,
    narrator: Option<Narrator>,
}

impl std::fmt::Debug for CombatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatEngine")
            .field("state", &self.state)
            .field("narrator", &self.narrator.is_some())
            .finish()
    }
}

impl CombatEngine {
    /// Create an idle engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a narrator that receives each round.
    pub fn with_narrator(
        mut self,
        narrator: impl FnMut(&Narration) -> Result<(), String> + 'static,
    ) -> Self {
        self.narrator = Some(Box::new(narrator));
        self
    }

    /// The running fight.
    pub fn state(&self) -> Option<&CombatState> {
        self.state.as_ref()
    }

    /// Whether a fight is running (or suspended for a parley).
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Begin fighting out the controller's encounter record. The game must
    /// already be in the Combat mode; `return_mode` is where it goes back to
    /// when the fight ends.
    pub fn start_combat(
        &mut self,
        ctl: &GlobalController,
        return_mode: Mode,
    ) -> EngineResult<&CombatState> {
        require_combat(ctl, "start_combat")?;
        if self.state.is_some() {
            return Err(EngineError::Precondition("a fight is already running".into()));
        }
        if end_trigger(Mode::Combat, return_mode).is_none() {
            return Err(EngineError::WrongMode {
                operation: "start_combat",
                mode: return_mode,
            });
        }
        let record = ctl.encounter().ok_or_else(|| {
            EngineError::Precondition("no encounter record to fight out".into())
        })?;

        let statuses = record
            .combatants
            .iter()
            .map(|c| {
                let status = CombatantStatus {
                    counted_dead: !c.is_alive(),
                    ..CombatantStatus::default()
                };
                (c.id.clone(), status)
            })
            .collect();
        let starting_enemies = record.living(Side::Enemy).count();
        tracing::info!(encounter = %record.id, %return_mode, starting_enemies, "combat started");

        Ok(&*self.state.insert(CombatState {
            encounter_id: record.id,
            return_mode,
            round: 0,
            party_initiative: 0,
            enemy_initiative: 0,
            history: Vec::new(),
            starting_enemies,
            party_casualties: 0,
            enemy_casualties: 0,
            statuses,
            first_death_checked: false,
            half_checked: false,
            solo_harmed_checked: false,
            solo_quarter_checked: false,
            ac_penalties: Default::default(),
            in_parley: false,
        }))
    }

    /// Fight one round. `party_orders` are the party's declared attacks;
    /// every enemy that is still fighting picks a random living party member.
    ///
    /// A round that decides the fight also ends it and carries the summary.
    pub fn run_round(
        &mut self,
        ctl: &mut GlobalController,
        party_orders: &[AttackOrder],
    ) -> EngineResult<PhaseOutcome<RoundResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_combat(ctl, "run_round")?;
        for order in party_orders {
            let attacker = combatant(ctl, &order.attacker)?;
            combatant(ctl, &order.target)?;
            if attacker.side != Side::Party {
                return Err(EngineError::Precondition(format!(
                    "{} is not in the party",
                    order.attacker
                )));
            }
        }

        state.round += 1;
        let party_initiative = ctl.dice().roll_d6(1, "party initiative").total;
        let enemy_initiative = ctl.dice().roll_d6(1, "enemy initiative").total;
        state.party_initiative = party_initiative;
        state.enemy_initiative = enemy_initiative;
        let order = InitiativeOrder::from_totals(party_initiative, enemy_initiative);

        let party_actions: Vec<_> = party_orders
            .iter()
            .map(|o| Declared::strike(&o.attacker, &o.target, 0))
            .collect();
        let enemy_actions = enemy_attacks(ctl, state, 0);

        let mut attacks = Vec::new();
        match order.first() {
            None => {
                let mut pending = Vec::new();
                for declared in party_actions.iter().chain(&enemy_actions) {
                    if let Some(attack) = roll_attack(ctl, state, declared)? {
                        pending.push(attack);
                    }
                }
                for mut attack in pending {
                    apply_attack(ctl, &mut attack)?;
                    attacks.push(attack);
                }
            }
            Some(first) => {
                let (lead, follow) = match first {
                    Side::Party => (&party_actions, &enemy_actions),
                    Side::Enemy => (&enemy_actions, &party_actions),
                };
                for declared in lead.iter().chain(follow) {
                    if let Some(mut attack) = roll_attack(ctl, state, declared)? {
                        apply_attack(ctl, &mut attack)?;
                        attacks.push(attack);
                    }
                }
            }
        }

        let deaths = tally_casualties(ctl, state);
        let morale = run_morale(ctl, state, &attacks);
        let ending = check_end(ctl, state);
        state.ac_penalties.clear();

        let mut result = RoundResult {
            round: state.round,
            party_initiative,
            enemy_initiative,
            order,
            attacks,
            deaths,
            morale,
            combat_over: ending.is_some(),
            victor: ending.and_then(|(victor, _)| victor),
            end_reason: ending.map(|(_, reason)| reason.to_string()),
            summary: None,
        };
        state.history.push(result.clone());
        tracing::debug!(
            round = result.round,
            attacks = result.attacks.len(),
            deaths = ?result.deaths,
            "combat round resolved"
        );

        if let Some((victor, reason)) = ending {
            result.summary = Some(self.finish(ctl, victor, reason)?);
        }
        narrate(
            &mut self.narrator,
            Narration {
                source: "combat",
                event: "round".into(),
                facts: serde_json::to_value(&result).unwrap_or_default(),
            },
        );
        Ok(PhaseOutcome::Resolved(result))
    }

    /// End the fight now. The victor is whichever side the end checks
    /// currently favor, if any.
    pub fn end_combat(
        &mut self,
        ctl: &mut GlobalController,
        reason: &str,
    ) -> EngineResult<PhaseOutcome<CombatSummary>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_combat(ctl, "end_combat")?;
        let victor = check_end(ctl, state).and_then(|(victor, _)| victor);
        Ok(PhaseOutcome::Resolved(self.finish(ctl, victor, reason)?))
    }

    /// One party member breaks off. Every enemy still fighting gets a free
    /// attack at +2 on the runner, who then escapes on 1d6 >= 4.
    ///
    /// The fight ends only once no party member is left on the field.
    pub fn attempt_flee(
        &mut self,
        ctl: &mut GlobalController,
        character_id: &str,
    ) -> EngineResult<PhaseOutcome<FleeResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_combat(ctl, "attempt_flee")?;
        let runner = combatant(ctl, character_id)?;
        if runner.side != Side::Party {
            return Err(EngineError::Precondition(format!(
                "{character_id} is not in the party"
            )));
        }
        if !runner.is_alive() || state.has_escaped(character_id) {
            return Err(EngineError::Precondition(format!(
                "{character_id} is not in the fight"
            )));
        }

        let mut free_attacks = Vec::new();
        for attacker in fighting_enemies(ctl, state) {
            let declared = Declared::strike(&attacker, character_id, FREE_ATTACK_BONUS);
            if let Some(mut attack) = roll_attack(ctl, state, &declared)? {
                apply_attack(ctl, &mut attack)?;
                free_attacks.push(attack);
            }
        }
        tally_casualties(ctl, state);

        let (roll, escaped) = if combatant(ctl, character_id)?.is_alive() {
            let roll = ctl.dice().roll_d6(1, "flee");
            let escaped = roll.total >= FLEE_TARGET;
            if escaped {
                state.statuses.entry(character_id.to_string()).or_default().escaped = true;
            }
            (Some(roll), escaped)
        } else {
            (None, false)
        };
        tracing::info!(
            character = character_id,
            escaped,
            free_attacks = free_attacks.len(),
            "flee attempted"
        );

        let summary = match check_end(ctl, state) {
            Some((victor, reason)) => Some(self.finish(ctl, victor, reason)?),
            None => None,
        };
        let result = FleeResult {
            character_id: character_id.to_string(),
            free_attacks,
            roll,
            escaped,
            summary,
        };
        narrate(
            &mut self.narrator,
            Narration {
                source: "combat",
                event: "flee".into(),
                facts: serde_json::to_value(&result).unwrap_or_default(),
            },
        );
        Ok(PhaseOutcome::Resolved(result))
    }

    /// A charging attack at +2. The charger's armor class is one worse until
    /// the end of the next round.
    pub fn attempt_charge(
        &mut self,
        ctl: &mut GlobalController,
        attacker: &str,
        target: &str,
    ) -> EngineResult<PhaseOutcome<AttackResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_combat(ctl, "attempt_charge")?;
        let declared = Declared::strike(attacker, target, CHARGE_BONUS);
        let Some(mut attack) = roll_attack(ctl, state, &declared)? else {
            return Err(EngineError::Precondition(format!(
                "{attacker} cannot charge {target}"
            )));
        };
        state.ac_penalties.insert(attacker.to_string(), 1);
        apply_attack(ctl, &mut attack)?;
        tally_casualties(ctl, state);
        Ok(PhaseOutcome::Resolved(attack))
    }

    /// A shove at -4 that deals no damage. On a hit the target saves versus
    /// hold (1d20 >= 16) or is pushed back.
    pub fn attempt_push(
        &mut self,
        ctl: &mut GlobalController,
        attacker: &str,
        target: &str,
    ) -> EngineResult<PhaseOutcome<PushResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_combat(ctl, "attempt_push")?;
        let declared = Declared {
            deals_damage: false,
            ..Declared::strike(attacker, target, PUSH_PENALTY)
        };
        let Some(mut attack) = roll_attack(ctl, state, &declared)? else {
            return Err(EngineError::Precondition(format!(
                "{attacker} cannot push {target}"
            )));
        };
        apply_attack(ctl, &mut attack)?;

        let save = attack
            .hit
            .then(|| ctl.dice().roll_d20("save versus hold"));
        let pushed = save.as_ref().is_some_and(|s| s.total < PUSH_SAVE);
        Ok(PhaseOutcome::Resolved(PushResult {
            attack,
            save,
            pushed,
        }))
    }

    /// Offer to talk: 2d6 - 2. On 9 or more the fight is suspended and the
    /// game moves to Social; the fight's state is kept for a possible return.
    pub fn attempt_parley(&mut self, ctl: &mut GlobalController) -> EngineResult<PhaseOutcome<CombatParley>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_combat(ctl, "attempt_parley")?;
        let roll = ctl.dice().roll_dice(2, 6, -2, "parley in combat");
        let outcome = ParleyOutcome::from_total(roll.total);
        let transitioned_to = if outcome == ParleyOutcome::Accepted {
            let mut context = Context::new();
            context.insert("round".into(), state.round.into());
            let to = ctl.transition(triggers::COMBAT_TO_PARLEY, context)?;
            state.in_parley = true;
            Some(to)
        } else {
            None
        };
        tracing::info!(?outcome, total = roll.total, "parley offered in combat");
        Ok(PhaseOutcome::Resolved(CombatParley {
            roll,
            outcome,
            transitioned_to,
        }))
    }

    /// Talks broke down: back to the suspended fight.
    pub fn resume_after_parley(&mut self, ctl: &mut GlobalController) -> EngineResult<PhaseOutcome<Mode>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_parley(ctl, state, "resume_after_parley")?;
        let to = ctl.transition(triggers::PARLEY_RETURN_COMBAT, Context::new())?;
        state.in_parley = false;
        Ok(PhaseOutcome::Resolved(to))
    }

    /// Talks succeeded: leave Social for the fight's return mode and drop
    /// the fight and the encounter record.
    pub fn conclude_parley(&mut self, ctl: &mut GlobalController) -> EngineResult<PhaseOutcome<CombatSummary>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_parley(ctl, state, "conclude_parley")?;
        let trigger = end_trigger(Mode::SocialInteraction, state.return_mode).ok_or(
            EngineError::WrongMode {
                operation: "conclude_parley",
                mode: state.return_mode,
            },
        )?;
        ctl.transition(trigger, Context::new())?;
        Ok(PhaseOutcome::Resolved(self.finish(ctl, None, "parley")?))
    }

    fn finish(
        &mut self,
        ctl: &mut GlobalController,
        victor: Option<Side>,
        reason: &str,
    ) -> EngineResult<CombatSummary> {
        let Some(state) = self.state.as_ref() else {
            return Err(EngineError::Precondition("no fight is running".into()));
        };
        let mut returned_to = ctl.current_mode();
        if returned_to == Mode::Combat {
            let trigger = end_trigger(Mode::Combat, state.return_mode).ok_or(
                EngineError::WrongMode {
                    operation: "end_combat",
                    mode: state.return_mode,
                },
            )?;
            let mut context = Context::new();
            context.insert("reason".into(), reason.into());
            returned_to = ctl.transition(trigger, context)?;
        }
        ctl.clear_encounter();

        let summary = CombatSummary {
            encounter_id: state.encounter_id,
            rounds: state.round,
            party_casualties: state.party_casualties,
            enemy_casualties: state.enemy_casualties,
            victor,
            reason: reason.to_string(),
            returned_to,
        };
        self.state = None;
        tracing::info!(reason, ?victor, rounds = summary.rounds, %returned_to, "combat ended");
        Ok(summary)
    }
}

fn require_combat(ctl: &GlobalController, operation: &'static str) -> EngineResult<()> {
    match ctl.current_mode() {
        Mode::Combat => Ok(()),
        mode => Err(EngineError::WrongMode { operation, mode }),
    }
}

fn require_parley(
    ctl: &GlobalController,
    state: &CombatState,
    operation: &'static str,
) -> EngineResult<()> {
    match ctl.current_mode() {
        Mode::SocialInteraction if state.in_parley => Ok(()),
        mode => Err(EngineError::WrongMode { operation, mode }),
    }
}

fn combatant<'a>(ctl: &'a GlobalController, id: &str) -> EngineResult<&'a Combatant> {
    ctl.encounter()
        .and_then(|r| r.combatant(id))
        .ok_or_else(|| CoreError::CombatantNotFound(id.to_string()).into())
}

/// Enemies that have not broken.
fn fighting_enemies(ctl: &GlobalController, state: &CombatState) -> Vec<String> {
    ctl.encounter()
        .map(|record| {
            record
                .living(Side::Enemy)
                .filter(|c| !state.is_fleeing(&c.id))
                .map(|c| c.id.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Every enemy still fighting picks a party member still on the field, each
/// equally likely.
fn enemy_attacks(ctl: &mut GlobalController, state: &CombatState, modifier: i32) -> Vec<Declared> {
    let party: Vec<String> = ctl
        .encounter()
        .map(|record| {
            record
                .living(Side::Party)
                .filter(|c| !state.has_escaped(&c.id))
                .map(|c| c.id.clone())
                .collect()
        })
        .unwrap_or_default();
    if party.is_empty() {
        return Vec::new();
    }
    let sides = u32::try_from(party.len()).unwrap_or(u32::MAX);

    fighting_enemies(ctl, state)
        .iter()
        .map(|attacker| {
            let target = if sides == 1 {
                &party[0]
            } else {
                let face = ctl.dice().roll_dice(1, sides, 0, "enemy target").natural();
                &party[(face.saturating_sub(1) as usize).min(party.len() - 1)]
            };
            Declared::strike(attacker, target, modifier)
        })
        .collect()
}

/// Roll one attack without applying it. `None` when the attacker is down or
/// fleeing, or the target is already down.
fn roll_attack(
    ctl: &mut GlobalController,
    state: &CombatState,
    declared: &Declared,
) -> EngineResult<Option<AttackResult>> {
    let attacker = combatant(ctl, &declared.attacker)?;
    let target = combatant(ctl, &declared.target)?;
    if !attacker.is_alive()
        || state.is_fleeing(&attacker.id)
        || state.has_escaped(&attacker.id)
        || !target.is_alive()
        || state.has_escaped(&target.id)
    {
        return Ok(None);
    }

    let weapon = attacker.stats.primary_attack();
    let target_ac = target.stats.armor_class
        + state.ac_penalties.get(&target.id).copied().unwrap_or(0);
    let needed = attacker.stats.base_to_hit - target_ac;
    let target_hp = target.stats.hp_current;
    let reason = format!("{} attacks {}", attacker.name, target.name);

    let roll = ctl
        .dice()
        .roll_dice(1, 20, weapon.bonus + declared.modifier, &reason);
    let critical = roll.natural() == 20;
    let fumble = roll.natural() == 1;
    let hit = critical || (!fumble && roll.total >= needed);
    let damage = if hit && declared.deals_damage {
        ctl.dice()
            .roll(&weapon.damage, &format!("{} damage", weapon.name))?
            .total
            .max(1)
    } else {
        0
    };

    Ok(Some(AttackResult {
        attacker: declared.attacker.clone(),
        target: declared.target.clone(),
        roll,
        needed,
        hit,
        critical,
        fumble,
        damage,
        target_hp,
        target_down: false,
    }))
}

fn apply_attack(ctl: &mut GlobalController, attack: &mut AttackResult) -> EngineResult<()> {
    if attack.damage > 0 {
        attack.target_hp = ctl.apply_combatant_damage(&attack.target, attack.damage)?;
    }
    attack.target_down = attack.target_hp <= 0;
    Ok(())
}

/// Count newly fallen combatants once each.
fn tally_casualties(ctl: &GlobalController, state: &mut CombatState) -> Vec<String> {
    let Some(record) = ctl.encounter() else {
        return Vec::new();
    };
    let mut deaths = Vec::new();
    for fallen in record.combatants.iter().filter(|c| !c.is_alive()) {
        let status = state.statuses.entry(fallen.id.clone()).or_default();
        if status.counted_dead {
            continue;
        }
        status.counted_dead = true;
        match fallen.side {
            Side::Party => state.party_casualties += 1,
            Side::Enemy => state.enemy_casualties += 1,
        }
        deaths.push(fallen.id.clone());
    }
    deaths
}

/// Fire the first-death and half-casualties checks, and for a lone enemy the
/// first-wound and quarter-hit-points checks, each at most once.
fn run_morale(
    ctl: &mut GlobalController,
    state: &mut CombatState,
    attacks: &[AttackResult],
) -> Vec<MoraleCheck> {
    let mut fired = Vec::new();
    if state.enemy_casualties >= 1 && !state.first_death_checked {
        state.first_death_checked = true;
        fired.push(MoraleTrigger::FirstDeath);
    }
    if state.round >= 2
        && !state.half_checked
        && state.starting_enemies > 0
        && state.enemy_casualties * 2 >= state.starting_enemies
    {
        state.half_checked = true;
        fired.push(MoraleTrigger::HalfCasualties);
    }
    if state.starting_enemies == 1 {
        let solo = ctl.encounter().and_then(|r| r.living(Side::Enemy).next()).map(|c| {
            let harmed = attacks.iter().any(|a| a.target == c.id && a.damage > 0);
            (harmed, c.stats.hp_current * 4 <= c.stats.hp_max)
        });
        if let Some((true, quartered)) = solo {
            if !state.solo_harmed_checked {
                state.solo_harmed_checked = true;
                fired.push(MoraleTrigger::SoloFirstHarmed);
            }
            if quartered && !state.solo_quarter_checked {
                state.solo_quarter_checked = true;
                fired.push(MoraleTrigger::SoloQuarterHp);
            }
        }
    }
    fired
        .into_iter()
        .filter_map(|trigger| morale_check(ctl, state, trigger))
        .collect()
}

fn morale_check(
    ctl: &mut GlobalController,
    state: &mut CombatState,
    trigger: MoraleTrigger,
) -> Option<MoraleCheck> {
    let checking: Vec<(String, u32)> = ctl
        .encounter()?
        .living(Side::Enemy)
        .filter(|c| {
            let status = state.status(&c.id);
            !status.fleeing
                && c.stats.morale < FEARLESS_MORALE
                && status.morale_successes < STAND_FAST_AFTER
        })
        .map(|c| (c.id.clone(), c.stats.morale))
        .collect();
    if checking.is_empty() {
        return None;
    }

    let average_morale = checking.iter().map(|(_, m)| m).sum::<u32>() / checking.len() as u32;
    let roll = ctl.dice().roll_2d6("morale");
    let fled = roll.total > average_morale as i32;
    for (id, _) in &checking {
        let status = state.statuses.entry(id.clone()).or_default();
        if fled {
            status.fleeing = true;
        } else {
            status.morale_successes += 1;
        }
    }
    tracing::info!(?trigger, average_morale, total = roll.total, fled, "morale checked");
    Some(MoraleCheck {
        trigger,
        roll,
        average_morale,
        checked: checking.into_iter().map(|(id, _)| id).collect(),
        fled,
    })
}

/// Victor and reason once the fight is decided.
fn check_end(ctl: &GlobalController, state: &CombatState) -> Option<(Option<Side>, &'static str)> {
    let record = ctl.encounter()?;
    let enemies: Vec<&Combatant> = record.living(Side::Enemy).collect();
    if enemies.is_empty() {
        return Some((Some(Side::Party), "all_enemies_defeated"));
    }
    if record.living(Side::Party).all(|c| state.has_escaped(&c.id)) {
        let fled = record.side(Side::Party).any(|c| state.has_escaped(&c.id));
        return Some(if fled {
            (None, "party_fled")
        } else {
            (Some(Side::Enemy), "party_defeated")
        });
    }
    if enemies.iter().all(|c| state.is_fleeing(&c.id)) {
        return Some((Some(Side::Party), "enemies_fled"));
    }
    None
}

#[cfg(test)]
mod tests {
    use dolmen_core::{AttackProfile, EncounterKind, EncounterRecord, StatBlock};
    use dolmen_mechanics::ScriptedDice;

    use super::*;

    fn fighter() -> Combatant {
        Combatant::new(
            "pc",
            "Aldric",
            Side::Party,
            StatBlock::new(4, "1d8", 8, 40, 12).with_attack(AttackProfile::new("sword", "1d8", 0)),
        )
    }

    fn goblin(id: &str, hp: i32, morale: u32) -> Combatant {
        Combatant::new(
            id,
            "Goblin",
            Side::Enemy,
            StatBlock::new(4, "1d8", hp, 60, morale).with_attack(AttackProfile::new("spear", "1d6", 0)),
        )
    }

    fn member(id: &str) -> Combatant {
        Combatant {
            id: id.to_string(),
            name: id.to_string(),
            ..fighter()
        }
    }

    fn in_combat(faces: &[u32], enemies: Vec<Combatant>) -> (GlobalController, CombatEngine) {
        in_party_combat(faces, vec![fighter()], enemies)
    }

    fn in_party_combat(
        faces: &[u32],
        party: Vec<Combatant>,
        enemies: Vec<Combatant>,
    ) -> (GlobalController, CombatEngine) {
        let mut ctl = GlobalController::default().with_dice(ScriptedDice::new(faces.iter().copied()));
        let mut record = EncounterRecord::new(EncounterKind::Monster);
        for combatant in party.into_iter().chain(enemies) {
            record = record.with_combatant(combatant);
        }
        ctl.transition(triggers::ENCOUNTER_TRIGGERED, Context::new()).unwrap();
        ctl.set_encounter(record);
        ctl.transition(triggers::ENCOUNTER_TO_COMBAT, Context::new()).unwrap();
        let mut engine = CombatEngine::new();
        engine.start_combat(&ctl, Mode::WildernessTravel).unwrap();
        (ctl, engine)
    }

    fn strike() -> Vec<AttackOrder> {
        vec![AttackOrder::new("pc", "gob1")]
    }

    #[test]
    fn to_hit_is_base_minus_armor_class() {
        let (mut ctl, mut engine) = in_combat(&[5, 2, 15, 3, 1, 3, 3], vec![goblin("gob1", 5, 7)]);
        let round = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(round.order, InitiativeOrder::PartyFirst);
        assert_eq!(round.attacks.len(), 2);
        assert_eq!(round.attacks[0].needed, 15);
        assert!(round.attacks[0].hit);
        assert_eq!(round.attacks[0].target_hp, 2);
        assert!(round.attacks[1].fumble);
        assert!(!round.attacks[1].hit);
        assert!(!round.combat_over);
        assert_eq!(ctl.current_mode(), Mode::Combat);
    }

    #[test]
    fn natural_twenty_always_hits() {
        let mut armored = goblin("gob1", 5, 7);
        armored.stats.armor_class = -10;
        let (mut ctl, mut engine) = in_combat(&[5, 2, 20, 3, 1, 3, 3], vec![armored]);
        let round = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(round.attacks[0].needed, 29);
        assert!(round.attacks[0].critical);
        assert!(round.attacks[0].hit);
    }

    #[test]
    fn dead_attackers_do_not_swing() {
        let (mut ctl, mut engine) = in_combat(&[5, 2, 15, 3], vec![goblin("gob1", 3, 7)]);
        let round = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(round.attacks.len(), 1);
        assert_eq!(round.deaths, vec!["gob1".to_string()]);
        assert_eq!(round.end_reason.as_deref(), Some("all_enemies_defeated"));
    }

    #[test]
    fn simultaneous_rounds_apply_damage_after_both_sides() {
        let (mut ctl, mut engine) = in_combat(&[3, 3, 15, 3, 15, 2], vec![goblin("gob1", 3, 7)]);
        let round = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(round.order, InitiativeOrder::Simultaneous);
        assert_eq!(round.attacks.len(), 2);
        assert!(round.attacks[1].hit);
        assert_eq!(round.victor, Some(Side::Party));

        let summary = round.summary.unwrap();
        assert_eq!(summary.returned_to, Mode::WildernessTravel);
        assert_eq!(summary.enemy_casualties, 1);
        assert_eq!(ctl.current_mode(), Mode::WildernessTravel);
        assert!(ctl.encounter().is_none());
        assert!(!engine.is_active());
    }

    #[test]
    fn broken_morale_ends_the_fight() {
        let (mut ctl, mut engine) = in_combat(
            &[5, 2, 15, 3, 1, 6, 6],
            vec![goblin("gob1", 3, 7), goblin("gob2", 3, 7)],
        );
        let round = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(round.morale.len(), 1);
        assert_eq!(round.morale[0].trigger, MoraleTrigger::FirstDeath);
        assert_eq!(round.morale[0].average_morale, 7);
        assert!(round.morale[0].fled);
        assert_eq!(round.end_reason.as_deref(), Some("enemies_fled"));
        assert_eq!(round.victor, Some(Side::Party));
    }

    #[test]
    fn fearless_enemies_never_check() {
        let (mut ctl, mut engine) = in_combat(
            &[5, 2, 15, 3, 1],
            vec![goblin("gob1", 3, 12), goblin("gob2", 3, 12)],
        );
        let round = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert!(round.morale.is_empty());
        assert!(engine.state().unwrap().first_death_checked);
        assert!(!round.combat_over);
    }

    #[test]
    fn flee_takes_free_attacks_then_rolls() {
        let (mut ctl, mut engine) = in_combat(&[10, 4], vec![goblin("gob1", 3, 7)]);
        let flee = engine.attempt_flee(&mut ctl, "pc").unwrap().resolved().unwrap();
        assert_eq!(flee.character_id, "pc");
        assert_eq!(flee.free_attacks.len(), 1);
        assert_eq!(flee.free_attacks[0].target, "pc");
        assert_eq!(flee.free_attacks[0].roll.total, 12);
        assert!(!flee.free_attacks[0].hit);
        assert!(flee.escaped);
        let summary = flee.summary.unwrap();
        assert_eq!(summary.reason, "party_fled");
        assert_eq!(summary.victor, None);
        assert_eq!(ctl.current_mode(), Mode::WildernessTravel);
    }

    #[test]
    fn only_the_runner_draws_free_attacks() {
        #[rustfmt::skip]
        let faces = [
            19, 3, 14, 2, 6, // free attacks on the runner, then the flee roll
            5, 2, 2, 2, 2,   // next round: initiative, stayer misses, both goblins miss
        ];
        let (mut ctl, mut engine) = in_party_combat(
            &faces,
            vec![member("runner"), member("stayer")],
            vec![goblin("gob1", 3, 7), goblin("gob2", 3, 7)],
        );

        let flee = engine.attempt_flee(&mut ctl, "runner").unwrap().resolved().unwrap();
        assert_eq!(flee.free_attacks.len(), 2);
        assert!(flee.free_attacks.iter().all(|a| a.target == "runner" && a.hit));
        assert!(flee.escaped);
        assert!(flee.summary.is_none());
        let record = ctl.encounter().unwrap();
        assert_eq!(record.combatant("runner").unwrap().stats.hp_current, 3);
        assert_eq!(record.combatant("stayer").unwrap().stats.hp_current, 8);
        assert!(engine.state().unwrap().has_escaped("runner"));
        assert_eq!(ctl.current_mode(), Mode::Combat);

        let orders = [
            AttackOrder::new("runner", "gob1"),
            AttackOrder::new("stayer", "gob1"),
        ];
        let round = engine.run_round(&mut ctl, &orders).unwrap().resolved().unwrap();
        assert_eq!(round.attacks.len(), 3);
        assert!(round.attacks.iter().all(|a| a.attacker != "runner"));
        assert!(
            round
                .attacks
                .iter()
                .filter(|a| a.attacker.starts_with("gob"))
                .all(|a| a.target == "stayer")
        );
        assert!(!round.combat_over);
        assert!(matches!(
            engine.attempt_flee(&mut ctl, "runner"),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn enemies_pick_targets_across_the_whole_party() {
        let party = (1..=7).map(|n| member(&format!("m{n}"))).collect();
        let (mut ctl, mut engine) =
            in_party_combat(&[2, 5, 7, 2], party, vec![goblin("gob1", 3, 7)]);
        let round = engine.run_round(&mut ctl, &[]).unwrap().resolved().unwrap();
        assert_eq!(round.order, InitiativeOrder::EnemiesFirst);
        assert_eq!(round.attacks.len(), 1);
        assert_eq!(round.attacks[0].target, "m7");
    }

    #[test]
    fn lone_enemy_checks_when_first_hurt_and_at_a_quarter() {
        #[rustfmt::skip]
        let faces = [
            5, 2, 15, 1, 2, 3, 3, // first wound: 8 -> 7
            5, 2, 15, 5, 2, 3, 3, // down to 2 of 8
            5, 2, 15, 1, 2,       // both checks spent
        ];
        let (mut ctl, mut engine) = in_combat(&faces, vec![goblin("gob1", 8, 7)]);

        let first = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(first.morale.len(), 1);
        assert_eq!(first.morale[0].trigger, MoraleTrigger::SoloFirstHarmed);
        assert!(!first.morale[0].fled);

        let second = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert_eq!(second.morale.len(), 1);
        assert_eq!(second.morale[0].trigger, MoraleTrigger::SoloQuarterHp);

        let third = engine.run_round(&mut ctl, &strike()).unwrap().resolved().unwrap();
        assert!(third.morale.is_empty());
        assert_eq!(
            ctl.encounter().unwrap().combatant("gob1").unwrap().stats.hp_current,
            1
        );
        let state = engine.state().unwrap();
        assert!(state.solo_harmed_checked && state.solo_quarter_checked);
    }

    #[test]
    fn charge_worsens_armor_class() {
        let (mut ctl, mut engine) = in_combat(&[13, 2], vec![goblin("gob1", 5, 7)]);
        let attack = engine
            .attempt_charge(&mut ctl, "pc", "gob1")
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(attack.roll.total, 15);
        assert!(attack.hit);
        assert_eq!(engine.state().unwrap().ac_penalties.get("pc"), Some(&1));
    }

    #[test]
    fn push_deals_no_damage() {
        let (mut ctl, mut engine) = in_combat(&[19, 10], vec![goblin("gob1", 5, 7)]);
        let push = engine
            .attempt_push(&mut ctl, "pc", "gob1")
            .unwrap()
            .resolved()
            .unwrap();
        assert!(push.attack.hit);
        assert_eq!(push.attack.damage, 0);
        assert!(push.pushed);
        assert_eq!(ctl.encounter().unwrap().combatant("gob1").unwrap().stats.hp_current, 5);
    }

    #[test]
    fn parley_detour_keeps_the_fight() {
        let (mut ctl, mut engine) = in_combat(&[6, 5, 1, 1], vec![goblin("gob1", 5, 7)]);
        let parley = engine.attempt_parley(&mut ctl).unwrap().resolved().unwrap();
        assert_eq!(parley.outcome, ParleyOutcome::Accepted);
        assert_eq!(ctl.current_mode(), Mode::SocialInteraction);
        assert!(engine.is_active());
        assert!(matches!(
            engine.run_round(&mut ctl, &strike()),
            Err(EngineError::WrongMode { .. })
        ));

        assert_eq!(
            engine.resume_after_parley(&mut ctl).unwrap(),
            PhaseOutcome::Resolved(Mode::Combat)
        );
        let refused = engine.attempt_parley(&mut ctl).unwrap().resolved().unwrap();
        assert_eq!(refused.outcome, ParleyOutcome::Refused);
        assert_eq!(ctl.current_mode(), Mode::Combat);
    }

    #[test]
    fn concluded_parley_clears_everything() {
        let (mut ctl, mut engine) = in_combat(&[6, 6], vec![goblin("gob1", 5, 7)]);
        engine.attempt_parley(&mut ctl).unwrap();
        let summary = engine.conclude_parley(&mut ctl).unwrap().resolved().unwrap();
        assert_eq!(summary.reason, "parley");
        assert_eq!(summary.returned_to, Mode::WildernessTravel);
        assert!(ctl.encounter().is_none());
        assert!(!engine.is_active());
    }

    #[test]
    fn start_needs_combat_mode_and_record() {
        let ctl = GlobalController::default();
        let mut engine = CombatEngine::new();
        assert!(matches!(
            engine.start_combat(&ctl, Mode::WildernessTravel),
            Err(EngineError::WrongMode { .. })
        ));

        let mut ctl = GlobalController::default();
        ctl.force_state(Mode::Combat, "ambush", Context::new());
        assert!(matches!(
            engine.start_combat(&ctl, Mode::WildernessTravel),
            Err(EngineError::Precondition(_))
        ));
        assert!(matches!(
            engine.start_combat(&ctl, Mode::SocialInteraction),
            Err(EngineError::WrongMode { .. })
        ));
    }

    #[test]
    fn idle_engine_is_inactive() {
        let mut ctl = GlobalController::default();
        let mut engine = CombatEngine::new();
        assert_eq!(engine.run_round(&mut ctl, &[]), Ok(PhaseOutcome::Inactive));
        assert_eq!(engine.end_combat(&mut ctl, "done"), Ok(PhaseOutcome::Inactive));
    }

    #[test]
    fn unknown_combatants_are_errors() {
        let (mut ctl, mut engine) = in_combat(&[], vec![goblin("gob1", 5, 7)]);
        let err = engine
            .run_round(&mut ctl, &[AttackOrder::new("pc", "ghost")])
            .unwrap_err();
        assert_eq!(err, EngineError::Core(CoreError::CombatantNotFound("ghost".into())));
        assert_eq!(engine.state().unwrap().round, 0);
    }
}
