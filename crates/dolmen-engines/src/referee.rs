//! The referee: one owner for the controller and the three engines.
//!
//! `Referee` forwards calls to the engine that owns them and wires the
//! hand-offs between engines, so a caller never has to notice that an
//! encounter turned into a fight or that a dungeon turn turned up a monster.

use dolmen_core::{EncounterRecord, GlobalController, Mode, RefereeConfig, Side};
use dolmen_mechanics::DiceService;

use crate::combat::{AttackOrder, CombatEngine, RoundResult};
use crate::dungeon::{
    DungeonAction, DungeonEngine, DungeonEntry, DungeonLayout, FastTravelResult, TurnResult,
    WanderingCheck,
};
use crate::encounter::{
    ActionResult, Awareness, EncounterAction, EncounterEngine, EncounterStart, PhaseOutcome,
};
use crate::error::EngineResult;

/// A running game session.
#[derive(Debug)]
pub struct Referee {
    controller: GlobalController,
    encounters: EncounterEngine,
    combat: CombatEngine,
    dungeon: DungeonEngine,
}

impl Default for Referee {
    fn default() -> Self {
        Self::new(RefereeConfig::default())
    }
}

impl Referee {
    /// Create a session from `config`.
    pub fn new(config: RefereeConfig) -> Self {
        let dungeon = DungeonEngine::new(config.dungeon());
        Self {
            controller: GlobalController::new(config),
            encounters: EncounterEngine::new(),
            combat: CombatEngine::new(),
            dungeon,
        }
    }

    /// Replace the dice service.
    pub fn with_dice(mut self, dice: impl DiceService + 'static) -> Self {
        self.controller = self.controller.with_dice(dice);
        self
    }

    /// Get the controller.
    pub fn controller(&self) -> &GlobalController {
        &self.controller
    }

    /// Get the controller mutably.
    pub fn controller_mut(&mut self) -> &mut GlobalController {
        &mut self.controller
    }

    /// Get the encounter engine.
    pub fn encounters(&self) -> &EncounterEngine {
        &self.encounters
    }

    /// Get the combat engine.
    pub fn combat(&self) -> &CombatEngine {
        &self.combat
    }

    /// Get the dungeon engine.
    pub fn dungeon(&self) -> &DungeonEngine {
        &self.dungeon
    }

    /// Get the encounter engine mutably, with the controller it drives.
    pub fn encounters_mut(&mut self) -> (&mut EncounterEngine, &mut GlobalController) {
        (&mut self.encounters, &mut self.controller)
    }

    /// Get the combat engine mutably, with the controller it drives.
    pub fn combat_mut(&mut self) -> (&mut CombatEngine, &mut GlobalController) {
        (&mut self.combat, &mut self.controller)
    }

    /// Get the dungeon engine mutably, with the controller it drives.
    pub fn dungeon_mut(&mut self) -> (&mut DungeonEngine, &mut GlobalController) {
        (&mut self.dungeon, &mut self.controller)
    }

    /// The current mode.
    pub fn mode(&self) -> Mode {
        self.controller.current_mode()
    }

    /// Start an encounter from wherever the party is.
    pub fn start_encounter(
        &mut self,
        record: EncounterRecord,
        awareness: Awareness,
    ) -> EngineResult<EncounterStart> {
        let origin = self.controller.current_mode();
        self.encounters
            .start_encounter(&mut self.controller, record, origin, awareness)
    }

    /// Resolve an encounter action. An action that ends in violence starts
    /// combat, which returns to the encounter's origin when it ends.
    pub fn encounter_action(
        &mut self,
        actor: Side,
        action: EncounterAction,
    ) -> EngineResult<PhaseOutcome<ActionResult>> {
        let outcome = self
            .encounters
            .take_action(&mut self.controller, actor, action)?;
        if let PhaseOutcome::Resolved(ActionResult {
            transitioned_to: Some(Mode::Combat),
            origin,
            ..
        }) = &outcome
        {
            self.combat.start_combat(&self.controller, *origin)?;
        }
        Ok(outcome)
    }

    /// Fight a round of the running combat.
    pub fn combat_round(&mut self, orders: &[AttackOrder]) -> EngineResult<PhaseOutcome<RoundResult>> {
        self.combat.run_round(&mut self.controller, orders)
    }

    /// Enter a dungeon.
    pub fn enter_dungeon(&mut self, layout: DungeonLayout) -> EngineResult<DungeonEntry> {
        self.dungeon.enter_dungeon(&mut self.controller, layout)
    }

    /// Spend a dungeon turn. A wandering monster hands the game to the
    /// encounter engine with the dungeon as origin.
    pub fn dungeon_turn(&mut self, action: DungeonAction) -> EngineResult<PhaseOutcome<TurnResult>> {
        let outcome = self.dungeon.execute_turn(&mut self.controller, action)?;
        if let PhaseOutcome::Resolved(TurnResult {
            wandering: Some(WanderingCheck { triggered: true, .. }),
            ..
        }) = &outcome
        {
            self.activate_wandering_encounter()?;
        }
        Ok(outcome)
    }

    /// Fast travel through explored rooms, handing any wandering monster to
    /// the encounter engine.
    pub fn fast_travel(&mut self, route: &[&str]) -> EngineResult<PhaseOutcome<FastTravelResult>> {
        let outcome = self.dungeon.fast_travel(&mut self.controller, route)?;
        if let PhaseOutcome::Resolved(FastTravelResult {
            interrupted: true, ..
        }) = &outcome
        {
            self.activate_wandering_encounter()?;
        }
        Ok(outcome)
    }

    fn activate_wandering_encounter(&mut self) -> EngineResult<EncounterStart> {
        self.encounters.activate_existing_encounter(
            &self.controller,
            Mode::DungeonExploration,
            Awareness::none(),
        )
    }
}
