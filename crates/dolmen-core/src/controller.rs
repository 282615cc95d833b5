//! The global controller: single owner of shared session state.
//!
//! Engines never hold their own copy of the mode, the party, the clock, or
//! the active encounter. They borrow the controller mutably for the duration
//! of one call and go through its methods, which keeps every mutation in one
//! place and every roll on the one [`DiceService`].

use dolmen_mechanics::{AbilityLookup, AbilityRegistry, DiceService, SeededDice};
use serde::{Deserialize, Serialize};

use crate::clock::WorldClock;
use crate::config::RefereeConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::{EventLog, SessionEvent, SessionEventKind};
use crate::machine::{Context, StateMachine};
use crate::mode::Mode;
use crate::model::{Character, EncounterRecord, LightSource, PartyResources};

/// The light the party currently carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLight {
    /// What is burning.
    pub source: LightSource,
    /// Turns left before it goes out.
    pub turns_remaining: u32,
}

/// What happened when time was advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAdvance {
    /// Turns that passed.
    pub turns: u64,
    /// Clock turn afterwards.
    pub now: u64,
    /// The light ran out during this advance.
    pub light_extinguished: bool,
    /// Turns of light left, if any light is burning.
    pub light_remaining: Option<u32>,
    /// A new day started and daily abilities were refreshed.
    pub new_day: bool,
}

/// Quantities of supplies to use up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUse {
    /// Days of food per active party member.
    pub food_days: u32,
    /// Days of water per active party member.
    pub water_days: u32,
    /// Torches.
    pub torches: u32,
    /// Oil flasks.
    pub oil_flasks: u32,
}

/// Outcome of [`GlobalController::consume_resources`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    /// What was actually removed from the stores.
    pub consumed: ResourceUse,
    /// Shortages encountered.
    pub warnings: Vec<String>,
}

/// Orchestrates the state machine, the party, time, light, and the active
/// encounter.
pub struct GlobalController {
    config: RefereeConfig,
    machine: StateMachine,
    dice: Box<dyn DiceService>,
    abilities: Box<dyn AbilityLookup>,
    clock: WorldClock,
    party: Vec<Character>,
    resources: PartyResources,
    light: Option<ActiveLight>,
    encounter: Option<EncounterRecord>,
    events: EventLog,
    party_speed: u32,
}

impl std::fmt::Debug for GlobalController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalController")
            .field("mode", &self.machine.current())
            .field("clock", &self.clock)
            .field("party", &self.party.len())
            .field("light", &self.light)
            .field("encounter", &self.encounter.as_ref().map(|e| e.id))
            .finish_non_exhaustive()
    }
}

impl Default for GlobalController {
    fn default() -> Self {
        Self::new(RefereeConfig::default())
    }
}

impl GlobalController {
    /// Create a controller with seeded dice and the standard ability tables.
    pub fn new(config: RefereeConfig) -> Self {
        let machine =
            StateMachine::new(config.initial_mode).with_history_limit(config.max_log_entries);
        Self {
            machine,
            dice: Box::new(SeededDice::new(config.seed)),
            abilities: Box::new(AbilityRegistry::default()),
            clock: WorldClock::new(),
            party: Vec::new(),
            resources: PartyResources::default(),
            light: None,
            encounter: None,
            events: EventLog::new(config.max_log_entries),
            party_speed: config.party_speed,
            config,
        }
    }

    /// Replace the dice service.
    pub fn with_dice(mut self, dice: impl DiceService + 'static) -> Self {
        self.dice = Box::new(dice);
        self
    }

    /// Replace the ability lookup.
    pub fn with_abilities(mut self, abilities: impl AbilityLookup + 'static) -> Self {
        self.abilities = Box::new(abilities);
        self
    }

    /// Start the clock at a given turn.
    pub fn with_clock(mut self, clock: WorldClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the party's supplies.
    pub fn with_resources(mut self, resources: PartyResources) -> Self {
        self.resources = resources;
        self
    }

    /// Session configuration.
    pub fn config(&self) -> &RefereeConfig {
        &self.config
    }

    /// The dice every engine rolls through.
    pub fn dice(&mut self) -> &mut dyn DiceService {
        self.dice.as_mut()
    }

    /// Class ability tables.
    pub fn abilities(&self) -> &dyn AbilityLookup {
        self.abilities.as_ref()
    }

    // ---- mode ----

    /// The state machine, for queries.
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// The state machine, for registering hooks.
    pub fn machine_mut(&mut self) -> &mut StateMachine {
        &mut self.machine
    }

    /// Current mode.
    pub fn current_mode(&self) -> Mode {
        self.machine.current()
    }

    /// Mode before the last transition.
    pub fn previous_mode(&self) -> Option<Mode> {
        self.machine.previous()
    }

    /// Whether `trigger` is legal now.
    pub fn can_transition(&self, trigger: &str) -> bool {
        self.machine.can_transition(trigger)
    }

    /// Fire a trigger on the state machine.
    pub fn transition(&mut self, trigger: &str, context: Context) -> CoreResult<Mode> {
        let from = self.machine.current();
        let to = self.machine.transition(trigger, context)?;
        self.record_mode_change(from, to, trigger);
        Ok(to)
    }

    /// Unwind one level of nesting.
    pub fn return_to_previous(&mut self, context: Context) -> CoreResult<Mode> {
        let from = self.machine.current();
        let to = self.machine.return_to_previous(context)?;
        let trigger = self
            .machine
            .history()
            .last()
            .map(|e| e.trigger.clone())
            .unwrap_or_default();
        self.record_mode_change(from, to, &trigger);
        Ok(to)
    }

    /// Override the mode.
    pub fn force_state(&mut self, mode: Mode, reason: &str, context: Context) -> Mode {
        let to = self.machine.force_state(mode, reason, context);
        self.record_event(
            SessionEventKind::ModeForced {
                to,
                reason: reason.to_string(),
            },
            format!("forced into {to}: {reason}"),
        );
        to
    }

    fn record_mode_change(&mut self, from: Mode, to: Mode, trigger: &str) {
        self.record_event(
            SessionEventKind::ModeChanged {
                from,
                to,
                trigger: trigger.to_string(),
            },
            format!("{from} -> {to} ({trigger})"),
        );
    }

    // ---- time and light ----

    /// The world clock.
    pub fn clock(&self) -> &WorldClock {
        &self.clock
    }

    /// Advance game time, burning light and refreshing daily abilities at
    /// the turn of the day.
    pub fn advance_time(&mut self, turns: u64) -> TimeAdvance {
        let before = self.clock.turn();
        let now = self.clock.advance(turns);

        let mut light_extinguished = false;
        if let Some(light) = self.light.as_mut() {
            let burned = u32::try_from(turns).unwrap_or(u32::MAX);
            light.turns_remaining = light.turns_remaining.saturating_sub(burned);
            if light.turns_remaining == 0 {
                let source = light.source;
                self.light = None;
                light_extinguished = true;
                tracing::warn!(%source, turn = now, "light extinguished");
                self.record_event(
                    SessionEventKind::LightExtinguished,
                    format!("the {source} goes out"),
                );
            }
        }

        let new_day = self.clock.crossed_day_since(before);
        if new_day {
            self.reset_daily_abilities();
        }

        if turns > 0 {
            self.record_event(
                SessionEventKind::TimeAdvanced { turns },
                format!("{turns} turn(s) pass, now {}", self.clock),
            );
        }

        TimeAdvance {
            turns,
            now,
            light_extinguished,
            light_remaining: self.light.map(|l| l.turns_remaining),
            new_day,
        }
    }

    /// Light a new source, replacing whatever was burning. Torches and
    /// lanterns use up a torch or an oil flask.
    pub fn light_source(&mut self, source: LightSource) -> CoreResult<ActiveLight> {
        match source {
            LightSource::Torch => {
                if self.resources.torches == 0 {
                    return Err(CoreError::NoLightSupply(source.to_string()));
                }
                self.resources.torches -= 1;
            }
            LightSource::Lantern => {
                if self.resources.oil_flasks == 0 {
                    return Err(CoreError::NoLightSupply(source.to_string()));
                }
                self.resources.oil_flasks -= 1;
            }
            LightSource::Candle | LightSource::Magical => {}
        }
        let light = ActiveLight {
            source,
            turns_remaining: source.duration_turns(),
        };
        self.light = Some(light);
        self.record_event(
            SessionEventKind::LightLit {
                source: source.to_string(),
            },
            format!("a {source} is lit"),
        );
        Ok(light)
    }

    /// The light currently burning.
    pub fn light(&self) -> Option<ActiveLight> {
        self.light
    }

    /// Whether any light is burning.
    pub fn has_light(&self) -> bool {
        self.light.is_some()
    }

    /// Turns of light left, 0 in darkness.
    pub fn light_turns_remaining(&self) -> u32 {
        self.light.map_or(0, |l| l.turns_remaining)
    }

    /// Put out the light.
    pub fn extinguish_light(&mut self) -> Option<ActiveLight> {
        self.light.take()
    }

    // ---- party ----

    /// Add a party member.
    pub fn add_character(&mut self, character: Character) {
        self.party.push(character);
    }

    /// All party members in marching order.
    pub fn characters(&self) -> &[Character] {
        &self.party
    }

    /// Party members able to act.
    pub fn active_characters(&self) -> impl Iterator<Item = &Character> {
        self.party.iter().filter(|c| c.can_act())
    }

    /// Look up a party member.
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.party.iter().find(|c| c.id == id)
    }

    /// Look up a party member mutably.
    pub fn character_mut(&mut self, id: &str) -> Option<&mut Character> {
        self.party.iter_mut().find(|c| c.id == id)
    }

    fn require_character_mut(&mut self, id: &str) -> CoreResult<&mut Character> {
        self.character_mut(id)
            .ok_or_else(|| CoreError::CharacterNotFound(id.to_string()))
    }

    /// Damage a party member. Hit points stop at 0, which also knocks the
    /// character out. Returns the remaining hit points.
    pub fn apply_damage(&mut self, id: &str, amount: i32) -> CoreResult<i32> {
        let character = self.require_character_mut(id)?;
        character.hp_current = (character.hp_current - amount.max(0)).max(0);
        if character.hp_current == 0 {
            character.conscious = false;
        }
        let hp = character.hp_current;
        self.record_event(
            SessionEventKind::CharacterDamaged {
                character: id.to_string(),
                amount,
            },
            format!("{id} takes {amount} damage ({hp} hp left)"),
        );
        Ok(hp)
    }

    /// Heal a party member up to their maximum. Returns the new hit points.
    pub fn heal_character(&mut self, id: &str, amount: i32) -> CoreResult<i32> {
        let character = self.require_character_mut(id)?;
        character.hp_current = (character.hp_current + amount.max(0)).min(character.hp_max);
        if character.hp_current > 0 {
            character.conscious = true;
        }
        let hp = character.hp_current;
        self.record_event(
            SessionEventKind::CharacterHealed {
                character: id.to_string(),
                amount,
            },
            format!("{id} heals {amount} ({hp} hp)"),
        );
        Ok(hp)
    }

    /// Whether the character exists and can act.
    pub fn can_character_act(&self, id: &str) -> bool {
        self.character(id).is_some_and(Character::can_act)
    }

    /// Party movement rate in feet.
    pub fn party_speed(&self) -> u32 {
        self.party_speed
    }

    /// Change the party movement rate.
    pub fn set_party_speed(&mut self, speed: u32) {
        self.party_speed = speed;
    }

    /// Enchantments the character can still use today.
    pub fn enchantment_uses_remaining(&self, id: &str) -> CoreResult<u32> {
        let character = self
            .character(id)
            .ok_or_else(|| CoreError::CharacterNotFound(id.to_string()))?;
        let per_day = self
            .abilities
            .enchantment_uses_per_day(character.class, character.level);
        Ok(per_day.saturating_sub(character.enchantments_used))
    }

    /// Spend one enchantment use. Returns `false` when none are left.
    pub fn use_enchantment(&mut self, id: &str) -> CoreResult<bool> {
        if self.enchantment_uses_remaining(id)? == 0 {
            return Ok(false);
        }
        self.require_character_mut(id)?.enchantments_used += 1;
        Ok(true)
    }

    /// Refresh per-day abilities for the whole party.
    pub fn reset_daily_abilities(&mut self) {
        for character in &mut self.party {
            character.enchantments_used = 0;
        }
    }

    // ---- resources ----

    /// Party supplies.
    pub fn resources(&self) -> &PartyResources {
        &self.resources
    }

    /// Party supplies, mutably.
    pub fn resources_mut(&mut self) -> &mut PartyResources {
        &mut self.resources
    }

    /// Use up supplies. Food and water are multiplied by the number of
    /// active party members. Shortfalls empty the store and produce a warning.
    pub fn consume_resources(&mut self, usage: ResourceUse) -> ResourceReport {
        let party_size = u32::try_from(self.active_characters().count()).unwrap_or(u32::MAX);
        let mut report = ResourceReport::default();

        let stores = [
            (
                usage.food_days.saturating_mul(party_size),
                &mut self.resources.food_days,
                &mut report.consumed.food_days,
                "Party is out of food!",
            ),
            (
                usage.water_days.saturating_mul(party_size),
                &mut self.resources.water_days,
                &mut report.consumed.water_days,
                "Party is out of water!",
            ),
            (
                usage.torches,
                &mut self.resources.torches,
                &mut report.consumed.torches,
                "No more torches!",
            ),
            (
                usage.oil_flasks,
                &mut self.resources.oil_flasks,
                &mut report.consumed.oil_flasks,
                "No more lantern oil!",
            ),
        ];
        for (wanted, store, consumed, warning) in stores {
            if wanted == 0 {
                continue;
            }
            *consumed = wanted.min(*store);
            if wanted > *store {
                report.warnings.push(warning.to_string());
            }
            *store = store.saturating_sub(wanted);
        }

        for warning in report.warnings.clone() {
            self.record_event(
                SessionEventKind::ResourceWarning {
                    message: warning.clone(),
                },
                warning,
            );
        }
        report
    }

    // ---- encounter ----

    /// Store the active encounter record, replacing any previous one.
    pub fn set_encounter(&mut self, record: EncounterRecord) {
        tracing::info!(encounter = %record.id, kind = ?record.kind, "encounter stored");
        self.record_event(
            SessionEventKind::EncounterStarted {
                encounter: record.id.to_string(),
            },
            format!("encounter {} begins", record.id),
        );
        self.encounter = Some(record);
    }

    /// The active encounter record.
    pub fn encounter(&self) -> Option<&EncounterRecord> {
        self.encounter.as_ref()
    }

    /// The active encounter record, mutably.
    pub fn encounter_mut(&mut self) -> Option<&mut EncounterRecord> {
        self.encounter.as_mut()
    }

    /// Remove and return the active encounter record.
    pub fn clear_encounter(&mut self) -> Option<EncounterRecord> {
        let record = self.encounter.take()?;
        self.record_event(
            SessionEventKind::EncounterCleared {
                encounter: record.id.to_string(),
            },
            format!("encounter {} cleared", record.id),
        );
        Some(record)
    }

    /// Damage a combatant in the active encounter, mirroring the damage to
    /// the linked party member. Returns the combatant's remaining hit points.
    pub fn apply_combatant_damage(&mut self, combatant_id: &str, amount: i32) -> CoreResult<i32> {
        let not_found = || CoreError::CombatantNotFound(combatant_id.to_string());
        let combatant = self
            .encounter
            .as_ref()
            .and_then(|e| e.combatant(combatant_id))
            .ok_or_else(not_found)?;
        let character_ref = combatant.character_ref.clone();
        if let Some(missing) = character_ref
            .as_deref()
            .filter(|id| self.character(id).is_none())
        {
            return Err(CoreError::CharacterNotFound(missing.to_string()));
        }

        let combatant = self
            .encounter
            .as_mut()
            .and_then(|e| e.combatant_mut(combatant_id))
            .ok_or_else(not_found)?;
        combatant.stats.hp_current = (combatant.stats.hp_current - amount.max(0)).max(0);
        let hp = combatant.stats.hp_current;

        if let Some(character_id) = character_ref {
            self.apply_damage(&character_id, amount)?;
        }
        Ok(hp)
    }

    // ---- events ----

    /// The session event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Append an event stamped with the current turn.
    pub fn record_event(&mut self, kind: SessionEventKind, description: impl Into<String>) {
        self.events
            .push(SessionEvent::new(self.clock.turn(), kind, description));
    }
}

#[cfg(test)]
mod tests {
    use dolmen_mechanics::{CharacterClass, ScriptedDice};

    use super::*;
    use crate::model::{Combatant, EncounterKind, Side, StatBlock};

    fn controller() -> GlobalController {
        let mut ctl = GlobalController::default();
        ctl.add_character(Character::new("pc1", "Aldric", CharacterClass::Fighter, 2, 10));
        ctl.add_character(Character::new("pc2", "Wenna", CharacterClass::Bard, 4, 6));
        ctl
    }

    #[test]
    fn transitions_are_recorded() {
        let mut ctl = controller();
        assert_eq!(ctl.current_mode(), Mode::WildernessTravel);
        ctl.transition("enter_dungeon", Context::new()).unwrap();
        assert_eq!(ctl.current_mode(), Mode::DungeonExploration);
        assert_eq!(ctl.previous_mode(), Some(Mode::WildernessTravel));
        assert!(matches!(
            ctl.events().events().last().unwrap().kind,
            SessionEventKind::ModeChanged { to: Mode::DungeonExploration, .. }
        ));
        assert!(ctl.transition("combat_to_parley", Context::new()).is_err());
    }

    #[test]
    fn torch_burns_out() {
        let mut ctl = controller();
        let torches = ctl.resources().torches;
        ctl.light_source(LightSource::Torch).unwrap();
        assert_eq!(ctl.resources().torches, torches - 1);
        let tick = ctl.advance_time(5);
        assert!(!tick.light_extinguished);
        assert_eq!(tick.light_remaining, Some(1));
        let tick = ctl.advance_time(1);
        assert!(tick.light_extinguished);
        assert!(!ctl.has_light());
        assert_eq!(ctl.light_turns_remaining(), 0);
    }

    #[test]
    fn lantern_needs_oil() {
        let mut ctl = controller().with_resources(PartyResources {
            oil_flasks: 0,
            ..PartyResources::default()
        });
        assert_eq!(
            ctl.light_source(LightSource::Lantern),
            Err(CoreError::NoLightSupply("lantern".into()))
        );
        assert!(ctl.light_source(LightSource::Magical).is_ok());
        assert_eq!(ctl.light_turns_remaining(), 144);
    }

    #[test]
    fn damage_and_healing_clamp() {
        let mut ctl = controller();
        assert_eq!(ctl.apply_damage("pc1", 4).unwrap(), 6);
        assert_eq!(ctl.apply_damage("pc1", 40).unwrap(), 0);
        assert!(!ctl.can_character_act("pc1"));
        assert_eq!(ctl.heal_character("pc1", 100).unwrap(), 10);
        assert!(ctl.can_character_act("pc1"));
        assert!(matches!(
            ctl.apply_damage("nobody", 1),
            Err(CoreError::CharacterNotFound(_))
        ));
        assert!(!ctl.can_character_act("nobody"));
        assert_eq!(ctl.events().events_for_character("pc1").len(), 3);
    }

    #[test]
    fn combatant_damage_is_mirrored() {
        let mut ctl = controller();
        let record = EncounterRecord::new(EncounterKind::Monster)
            .with_combatant(
                Combatant::new("c-pc1", "Aldric", Side::Party, StatBlock::new(4, "2d8", 10, 40, 12))
                    .with_character("pc1"),
            )
            .with_combatant(Combatant::new(
                "wolf",
                "Wolf",
                Side::Enemy,
                StatBlock::new(7, "2d8", 9, 60, 8),
            ));
        ctl.set_encounter(record);

        assert_eq!(ctl.apply_combatant_damage("c-pc1", 3).unwrap(), 7);
        assert_eq!(ctl.character("pc1").unwrap().hp_current, 7);
        assert_eq!(ctl.apply_combatant_damage("wolf", 12).unwrap(), 0);
        assert!(matches!(
            ctl.apply_combatant_damage("ghost", 1),
            Err(CoreError::CombatantNotFound(_))
        ));

        let cleared = ctl.clear_encounter().unwrap();
        assert_eq!(cleared.combatants.len(), 2);
        assert!(ctl.encounter().is_none());
        assert!(ctl.clear_encounter().is_none());
    }

    #[test]
    fn resources_warn_on_shortage() {
        let mut ctl = controller().with_resources(PartyResources {
            food_days: 3,
            water_days: 10,
            torches: 1,
            oil_flasks: 0,
        });
        let report = ctl.consume_resources(ResourceUse {
            food_days: 2,
            water_days: 2,
            torches: 2,
            oil_flasks: 0,
        });
        assert_eq!(report.consumed.food_days, 3);
        assert_eq!(report.consumed.water_days, 4);
        assert_eq!(report.consumed.torches, 1);
        assert_eq!(
            report.warnings,
            vec!["Party is out of food!".to_string(), "No more torches!".to_string()]
        );
        assert_eq!(ctl.resources().food_days, 0);
        assert_eq!(ctl.resources().water_days, 6);
    }

    #[test]
    fn enchantments_refresh_daily() {
        let mut ctl = controller();
        assert_eq!(ctl.enchantment_uses_remaining("pc2").unwrap(), 2);
        assert!(ctl.use_enchantment("pc2").unwrap());
        assert!(ctl.use_enchantment("pc2").unwrap());
        assert!(!ctl.use_enchantment("pc2").unwrap());
        assert_eq!(ctl.enchantment_uses_remaining("pc1").unwrap(), 0);
        let tick = ctl.advance_time(crate::clock::TURNS_PER_DAY);
        assert!(tick.new_day);
        assert_eq!(ctl.enchantment_uses_remaining("pc2").unwrap(), 2);
    }

    #[test]
    fn injected_dice_are_used() {
        let mut ctl = controller().with_dice(ScriptedDice::new([6, 6]));
        assert_eq!(ctl.dice().roll_2d6("test").total, 12);
    }

    #[test]
    fn forced_state_is_logged() {
        let mut ctl = controller();
        ctl.force_state(Mode::Combat, "ambush", Context::new());
        assert_eq!(ctl.current_mode(), Mode::Combat);
        assert!(ctl.machine().history().last().unwrap().is_forced());
        assert_eq!(ctl.return_to_previous(Context::new()).unwrap(), Mode::WildernessTravel);
    }

    #[test]
    fn log_limit_applies_to_both_logs() {
        let mut ctl = GlobalController::new(RefereeConfig::default().with_max_log_entries(3));
        for _ in 0..4 {
            ctl.transition("enter_dungeon", Context::new()).unwrap();
            ctl.transition("exit_dungeon", Context::new()).unwrap();
        }
        assert_eq!(ctl.machine().history().len(), 3);
        assert_eq!(ctl.events().len(), 3);
    }
}
