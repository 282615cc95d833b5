//! The dungeon turn engine.
//!
//! Each call to [`DungeonEngine::execute_turn`] is one 10-minute turn: time
//! and light burn, the action is resolved, noise builds toward the alert
//! threshold, and on every interval a wandering monster check may hand the
//! game over to an encounter.

mod action;
mod doom;
mod room;

use dolmen_core::{
    Context, CoreError, DungeonConfig, EncounterKind, EncounterRecord, GlobalController, Mode,
    SurpriseStatus, TimeAdvance, triggers,
};
use dolmen_mechanics::{DiceNotation, ReactionRoll, ThiefSkill, roll_reaction};

pub use action::{
    DungeonAction, DungeonEntry, ExplorationSummary, FastTravelResult, TurnResult,
    WanderingCheck,
};
pub use doom::{
    DoomFate, DoomRoll, ESCAPE_BASE_TARGET, EscapeResult, escape_modifier, roll_doom,
};
pub use room::{
    DoorState, DungeonLayout, DungeonRoom, DungeonState, Feature, Hazard, LightLevel,
};

use crate::encounter::PhaseOutcome;
use crate::error::{EngineError, EngineResult};
use crate::narration::{Narration, Narrator, narrate};

/// 1d6 at or below this finds a hidden thing or forces a stuck door.
pub const SEARCH_CHANCE: i32 = 2;
/// Party surprise threshold when neither the party nor the room has light.
pub const DARK_SURPRISE_THRESHOLD: i32 = 3;
/// Surprise threshold otherwise.
pub const SURPRISE_THRESHOLD: i32 = 2;
/// Alert level above which dungeon denizens react worse.
pub const HOSTILE_ALERT_LEVEL: u32 = 2;

/// What an action handler reports back to the turn loop.
struct Handled {
    success: bool,
    message: String,
    noise: u32,
    door_id: Option<String>,
    discoveries: Vec<String>,
    moved_to: Option<String>,
}

impl Handled {
    fn success(message: impl Into<String>, noise: u32) -> Self {
        Self {
            success: true,
            message: message.into(),
            noise,
            door_id: None,
            discoveries: Vec::new(),
            moved_to: None,
        }
    }

    fn fail(message: impl Into<String>, noise: u32) -> Self {
        Self {
            success: false,
            ..Self::success(message, noise)
        }
    }

    fn at_door(mut self, door_id: String) -> Self {
        self.door_id = Some(door_id);
        self
    }
}

/// Runs dungeon exploration turn by turn.
#[derive(Default)]
pub struct DungeonEngine {
    config: DungeonConfig,
    state: Option<DungeonState>,
    narrator: Option<Narrator>,
}

impl std::fmt::Debug for DungeonEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DungeonEngine")
            .field("config", &self.config)
            .field("dungeon", &self.state.as_ref().map(|s| &s.dungeon_id))
            .field("narrator", &self.narrator.is_some())
            .finish()
    }
}

impl DungeonEngine {
    /// Create an engine with the given turn parameters.
    pub fn new(config: DungeonConfig) -> Self {
        Self {
            config,
            state: None,
            narrator: None,
        }
    }

    /// Register a narrator that receives each resolved turn.
    pub fn with_narrator(
        mut self,
        narrator: impl FnMut(&Narration) -> Result<(), String> + 'static,
    ) -> Self {
        self.narrator = Some(Box::new(narrator));
        self
    }

    /// Load a saved exploration state. The party is not moved; call
    /// [`enter_dungeon`](Self::enter_dungeon) with a layout of the same id
    /// to resume it.
    pub fn restore(&mut self, state: DungeonState) {
        tracing::debug!(dungeon = %state.dungeon_id, room = %state.current_room, "dungeon state restored");
        self.state = Some(state);
    }

    /// Turn parameters.
    pub fn config(&self) -> DungeonConfig {
        self.config
    }

    /// Exploration state of the current dungeon.
    pub fn state(&self) -> Option<&DungeonState> {
        self.state.as_ref()
    }

    /// Enter `layout` from the wilderness or a settlement.
    ///
    /// If exploration of a dungeon with the same id is on record it is
    /// resumed where the party left off; otherwise a fresh state is built.
    /// The layout is validated before the transition fires.
    pub fn enter_dungeon(
        &mut self,
        ctl: &mut GlobalController,
        layout: DungeonLayout,
    ) -> EngineResult<DungeonEntry> {
        let mode = ctl.current_mode();
        if !matches!(mode, Mode::WildernessTravel | Mode::SettlementExploration) {
            return Err(EngineError::WrongMode {
                operation: "enter_dungeon",
                mode,
            });
        }

        let resumed = self
            .state
            .as_ref()
            .is_some_and(|s| s.dungeon_id == layout.id);
        let fresh = if resumed {
            None
        } else {
            Some(DungeonState::from_layout(layout)?)
        };

        let mut context = Context::new();
        let dungeon_id = fresh
            .as_ref()
            .or(self.state.as_ref())
            .map(|s| s.dungeon_id.clone())
            .unwrap_or_default();
        context.insert("dungeon_id".into(), dungeon_id.clone().into());
        ctl.transition(triggers::ENTER_DUNGEON, context)?;

        if let Some(state) = fresh {
            self.state = Some(state);
        }
        let room = self
            .state
            .as_ref()
            .map(|s| s.current_room.clone())
            .unwrap_or_default();
        tracing::info!(dungeon = %dungeon_id, %room, resumed, "entered dungeon");
        Ok(DungeonEntry {
            dungeon_id,
            room,
            resumed,
        })
    }

    /// Leave for the wilderness. Exploration state is kept for a return.
    pub fn exit_dungeon(&mut self, ctl: &mut GlobalController) -> EngineResult<Mode> {
        require_dungeon(ctl, "exit_dungeon")?;
        let mut context = Context::new();
        if let Some(state) = &self.state {
            context.insert("dungeon_id".into(), state.dungeon_id.clone().into());
        }
        let mode = ctl.transition(triggers::EXIT_DUNGEON, context)?;
        tracing::info!(dungeon = ?self.state.as_ref().map(|s| &s.dungeon_id), "left dungeon");
        Ok(mode)
    }

    /// Forget the current dungeon.
    pub fn discard_dungeon(&mut self) -> Option<DungeonState> {
        let state = self.state.take()?;
        tracing::info!(dungeon = %state.dungeon_id, "dungeon discarded");
        Some(state)
    }

    /// Spend one turn on `action`.
    ///
    /// Missing characters, bad hazard data, and the wrong mode are errors and
    /// leave everything untouched. A party in which nobody can act gets
    /// [`PhaseOutcome::CannotAct`].
    pub fn execute_turn(
        &mut self,
        ctl: &mut GlobalController,
        action: DungeonAction,
    ) -> EngineResult<PhaseOutcome<TurnResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_dungeon(ctl, "execute_turn")?;
        if let Some(reasons) = party_blocked(ctl) {
            return Ok(PhaseOutcome::CannotAct { reasons });
        }
        validate(ctl, state, &action)?;
        let config = self.config;

        let (time, rest_warning) = begin_turn(ctl, state, &config, action == DungeonAction::Rest);
        let acting_room = state.current_room.clone();
        let handled = match &action {
            DungeonAction::Move { direction } => move_party(state, direction)?,
            DungeonAction::Search => search(ctl, state)?,
            DungeonAction::Listen => listen(ctl),
            DungeonAction::OpenDoor { direction } => open_door(ctl, state, direction)?,
            DungeonAction::PickLock {
                direction,
                character_id,
            } => pick_lock(ctl, state, direction, character_id)?,
            DungeonAction::DisarmTrap {
                hazard_id,
                character_id,
            } => disarm(ctl, state, hazard_id, character_id)?,
            DungeonAction::Rest => Handled::success("the party rests", 0),
            DungeonAction::Interact { target } => interact(state, target)?,
            DungeonAction::CastSpell { spell } => {
                Handled::success(format!("{spell} is cast"), 2)
            }
            DungeonAction::Map => {
                state.has_map = true;
                Handled::success("the party maps its route", 0)
            }
        };

        state.noise += handled.noise;
        state.room_mut(&acting_room)?.noise += handled.noise;
        if let Some(room) = &handled.moved_to {
            state.mark_explored(room);
        }
        let (wandering, alert_raised) = end_turn(ctl, state, &config)?;

        let result = TurnResult {
            turn: state.turns,
            action: action.id().to_string(),
            success: handled.success,
            message: handled.message,
            noise: handled.noise,
            door_id: handled.door_id,
            discoveries: handled.discoveries,
            time,
            light_extinguished: time.light_extinguished,
            rest_warning,
            wandering,
            alert_raised,
            alert_level: state.alert_level,
            room: state.current_room.clone(),
        };
        tracing::debug!(
            turn = result.turn,
            action = %result.action,
            success = result.success,
            noise = result.noise,
            alert = result.alert_level,
            "dungeon turn"
        );
        narrate(
            &mut self.narrator,
            Narration {
                source: "dungeon",
                event: result.action.clone(),
                facts: serde_json::to_value(&result).unwrap_or_default(),
            },
        );
        Ok(PhaseOutcome::Resolved(result))
    }

    /// Walk quickly through explored rooms, one turn per room.
    ///
    /// Every room on `route` must already be explored and reachable from the
    /// one before through a passable exit, and the party's light must last
    /// the trip unless every room is lit. Wandering checks still happen on
    /// schedule, and a triggered encounter stops the party where it is.
    pub fn fast_travel(
        &mut self,
        ctl: &mut GlobalController,
        route: &[&str],
    ) -> EngineResult<PhaseOutcome<FastTravelResult>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_dungeon(ctl, "fast_travel")?;
        if route.is_empty() {
            return Err(EngineError::Precondition("fast travel needs a route".into()));
        }

        let mut from = state.current_room.clone();
        let mut all_lit = true;
        for &room_id in route {
            let room = state.room(room_id)?;
            if !state.is_explored(room_id) {
                return Err(EngineError::Precondition(format!(
                    "{room_id} has not been explored"
                )));
            }
            let previous = state.room(&from)?;
            let passable = previous.exits.iter().any(|(direction, target)| {
                target == room_id && !previous.door(direction).blocks_movement()
            });
            if !passable {
                return Err(EngineError::Precondition(format!(
                    "no open way from {from} to {room_id}"
                )));
            }
            all_lit &= room.is_lit();
            from = room_id.to_string();
        }
        let hops = u32::try_from(route.len()).unwrap_or(u32::MAX);
        if !all_lit && ctl.light_turns_remaining() < hops {
            return Err(EngineError::Precondition(format!(
                "not enough light for {hops} turn(s) of travel"
            )));
        }

        let config = self.config;
        let mut result = FastTravelResult {
            hops: Vec::new(),
            room: state.current_room.clone(),
            interrupted: false,
            checks: Vec::new(),
        };
        for &room_id in route {
            begin_turn(ctl, state, &config, false);
            state.current_room = room_id.to_string();
            state.noise += 1;
            state.room_mut(room_id)?.noise += 1;
            result.hops.push(room_id.to_string());
            let (check, _) = end_turn(ctl, state, &config)?;
            if let Some(check) = check {
                let triggered = check.triggered;
                result.checks.push(check);
                if triggered {
                    result.interrupted = true;
                    break;
                }
            }
        }
        result.room = state.current_room.clone();
        tracing::info!(hops = result.hops.len(), room = %result.room, interrupted = result.interrupted, "fast travel");
        Ok(PhaseOutcome::Resolved(result))
    }

    /// Record the known way out. Only explored rooms can be part of it.
    pub fn establish_safe_path(&mut self, rooms: &[&str]) -> EngineResult<PhaseOutcome<Vec<String>>> {
        let Some(state) = self.state.as_mut() else {
            return Ok(PhaseOutcome::Inactive);
        };
        for &room in rooms {
            state.room(room)?;
            if !state.is_explored(room) {
                return Err(EngineError::Precondition(format!(
                    "{room} has not been explored"
                )));
            }
        }
        state.safe_path = rooms.iter().map(|r| (*r).to_string()).collect();
        Ok(PhaseOutcome::Resolved(state.safe_path.clone()))
    }

    /// Try to get out in a hurry.
    ///
    /// Rolls 1d20 against [`ESCAPE_BASE_TARGET`] less [`escape_modifier`].
    /// Success leaves the dungeon; failure rolls on the Doom table and leaves
    /// the outcome to the caller.
    pub fn attempt_escape(
        &mut self,
        ctl: &mut GlobalController,
    ) -> EngineResult<PhaseOutcome<EscapeResult>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(PhaseOutcome::Inactive);
        };
        require_dungeon(ctl, "attempt_escape")?;

        let modifier = escape_modifier(state.level, state.has_map, !state.safe_path.is_empty());
        let target = ESCAPE_BASE_TARGET - modifier;
        let roll = ctl.dice().roll_d20("dungeon escape");
        let escaped = roll.total >= target;
        let mut result = EscapeResult {
            roll,
            modifier,
            target,
            escaped,
            doom: None,
            returned_to: None,
        };
        if escaped {
            result.returned_to = Some(self.exit_dungeon(ctl)?);
        } else {
            let doom = roll_doom(ctl.dice());
            tracing::warn!(fate = %doom.fate, "escape failed");
            result.doom = Some(doom);
        }
        Ok(PhaseOutcome::Resolved(result))
    }

    /// Roll 2d6 reaction for a dungeon denizen, at -1 once the dungeon is
    /// on high alert. The result is stored on the active encounter, if any.
    pub fn resolve_dungeon_reaction(&mut self, ctl: &mut GlobalController) -> PhaseOutcome<ReactionRoll> {
        let Some(state) = self.state.as_ref() else {
            return PhaseOutcome::Inactive;
        };
        let modifier = if state.alert_level > HOSTILE_ALERT_LEVEL { -1 } else { 0 };
        let reaction = roll_reaction(ctl.dice(), modifier, "dungeon reaction");
        if let Some(record) = ctl.encounter_mut() {
            record.reaction = Some(reaction.result);
        }
        tracing::debug!(result = ?reaction.result, total = reaction.total(), "dungeon reaction");
        PhaseOutcome::Resolved(reaction)
    }

    /// Where exploration stands.
    pub fn exploration_summary(&self, ctl: &GlobalController) -> PhaseOutcome<ExplorationSummary> {
        let Some(state) = self.state.as_ref() else {
            return PhaseOutcome::Inactive;
        };
        PhaseOutcome::Resolved(ExplorationSummary {
            dungeon_id: state.dungeon_id.clone(),
            current_room: state.current_room.clone(),
            rooms_total: state.rooms.len(),
            rooms_explored: state.explored_rooms.len(),
            turns: state.turns,
            alert_level: state.alert_level,
            noise: state.noise,
            has_map: state.has_map,
            safe_path: state.safe_path.clone(),
            turns_since_rest: state.turns_since_rest,
            light_turns_remaining: ctl.light_turns_remaining(),
            mode: ctl.current_mode(),
        })
    }
}

fn require_dungeon(ctl: &GlobalController, operation: &'static str) -> EngineResult<()> {
    match ctl.current_mode() {
        Mode::DungeonExploration => Ok(()),
        mode => Err(EngineError::WrongMode { operation, mode }),
    }
}

fn party_blocked(ctl: &GlobalController) -> Option<Vec<String>> {
    let party = ctl.characters();
    if party.is_empty() || party.iter().any(|c| c.can_act()) {
        return None;
    }
    Some(
        party
            .iter()
            .map(|c| format!("{} cannot act", c.name))
            .collect(),
    )
}

fn validate(ctl: &GlobalController, state: &DungeonState, action: &DungeonAction) -> EngineResult<()> {
    let actor = match action {
        DungeonAction::PickLock { character_id, .. } => character_id,
        DungeonAction::DisarmTrap {
            hazard_id,
            character_id,
        } => {
            let hazard = state
                .current()?
                .hazards
                .iter()
                .find(|h| &h.id == hazard_id);
            if let Some(hazard) = hazard {
                DiceNotation::parse(&hazard.damage)?;
            }
            character_id
        }
        _ => return Ok(()),
    };
    let character = ctl
        .character(actor)
        .ok_or_else(|| CoreError::CharacterNotFound(actor.clone()))?;
    if !character.can_act() {
        return Err(EngineError::Precondition(format!(
            "{} cannot act",
            character.name
        )));
    }
    Ok(())
}

fn begin_turn(
    ctl: &mut GlobalController,
    state: &mut DungeonState,
    config: &DungeonConfig,
    resting: bool,
) -> (TimeAdvance, Option<String>) {
    let time = ctl.advance_time(1);
    state.turns += 1;
    if resting {
        state.turns_since_rest = 0;
        return (time, None);
    }
    state.turns_since_rest += 1;
    let warning = (config.rest_interval > 0 && state.turns_since_rest >= config.rest_interval)
        .then(|| format!("the party has gone {} turns without rest", state.turns_since_rest));
    (time, warning)
}

fn end_turn(
    ctl: &mut GlobalController,
    state: &mut DungeonState,
    config: &DungeonConfig,
) -> EngineResult<(Option<WanderingCheck>, bool)> {
    let due = config.wandering_check_interval > 0
        && state.turns % config.wandering_check_interval == 0
        && ctl.current_mode() == Mode::DungeonExploration;
    let wandering = if due {
        Some(wandering_check(ctl, state)?)
    } else {
        None
    };

    let mut alert_raised = false;
    if config.noise_alert_threshold > 0 && state.noise >= config.noise_alert_threshold {
        state.noise = 0;
        if state.alert_level < config.max_alert_level {
            state.alert_level += 1;
            alert_raised = true;
            tracing::info!(alert = state.alert_level, dungeon = %state.dungeon_id, "dungeon alert raised");
        }
    }
    state.current_mut()?.visited = true;
    Ok((wandering, alert_raised))
}

fn wandering_check(ctl: &mut GlobalController, state: &DungeonState) -> EngineResult<WanderingCheck> {
    let target = 1 + i32::try_from(state.alert_level).unwrap_or(i32::MAX);
    let roll = ctl.dice().roll_d6(1, "wandering monster");
    let mut check = WanderingCheck {
        triggered: roll.total <= target,
        roll,
        target,
        surprise: None,
        distance: None,
        encounter_id: None,
    };
    if !check.triggered {
        return Ok(check);
    }

    let dark = !ctl.has_light() && !state.current()?.is_lit();
    let party_threshold = if dark {
        DARK_SURPRISE_THRESHOLD
    } else {
        SURPRISE_THRESHOLD
    };
    let party_surprised = ctl.dice().roll_d6(1, "party surprise").total <= party_threshold;
    let monsters_surprised = ctl.dice().roll_d6(1, "monster surprise").total <= SURPRISE_THRESHOLD;
    let surprise = SurpriseStatus::from_sides(party_surprised, monsters_surprised);
    let distance = if surprise == SurpriseStatus::MutualSurprise {
        ctl.dice().roll_dice(1, 4, 0, "wandering distance").natural() * 10
    } else {
        ctl.dice().roll_2d6("wandering distance").natural() * 10
    };

    let mut record = EncounterRecord::new(EncounterKind::Monster)
        .with_context(format!("wandering monster in {}", state.current_room))
        .with_terrain(state.dungeon_id.clone());
    record.combatants = state.wandering_monsters.clone();
    record.distance = distance;
    record.surprise = surprise;
    let encounter_id = record.id;

    let mut context = Context::new();
    context.insert("encounter_id".into(), encounter_id.to_string().into());
    context.insert("origin".into(), Mode::DungeonExploration.as_str().into());
    context.insert("room".into(), state.current_room.clone().into());
    ctl.transition(triggers::ENCOUNTER_TRIGGERED, context)?;
    ctl.set_encounter(record);
    tracing::info!(encounter = %encounter_id, ?surprise, distance, room = %state.current_room, "wandering monster");

    check.surprise = Some(surprise);
    check.distance = Some(distance);
    check.encounter_id = Some(encounter_id);
    Ok(check)
}

fn move_party(state: &mut DungeonState, direction: &str) -> EngineResult<Handled> {
    let room = state.current()?;
    let target = match (room.exits.get(direction), room.door(direction)) {
        (None, _) | (Some(_), DoorState::Secret) => {
            return Ok(Handled::fail(format!("there is no exit {direction}"), 0));
        }
        (Some(_), door) if door.blocks_movement() => {
            return Ok(Handled::fail(format!("the door {direction} is {door}"), 0)
                .at_door(room.door_id(direction)));
        }
        (Some(target), _) => target.clone(),
    };
    state.current_room = target.clone();
    let name = state.current()?.name.clone();
    Ok(Handled {
        moved_to: Some(target),
        ..Handled::success(format!("the party moves {direction} into {name}"), 1)
    })
}

fn search(ctl: &mut GlobalController, state: &mut DungeonState) -> EngineResult<Handled> {
    let room = state.current_mut()?;
    room.searched = true;
    let mut found = Vec::new();

    for feature in room.features.iter_mut().filter(|f| f.hidden && !f.discovered) {
        if ctl.dice().roll_d6(1, "search feature").total <= SEARCH_CHANCE {
            feature.discovered = true;
            found.push(feature.description.clone());
        }
    }
    for hazard in room
        .hazards
        .iter_mut()
        .filter(|h| !h.detected && !h.disarmed && !h.triggered)
    {
        if ctl.dice().roll_d6(1, "search hazard").total <= SEARCH_CHANCE {
            hazard.detected = true;
            found.push(hazard.description.clone());
        }
    }
    for (direction, door) in room
        .doors
        .iter_mut()
        .filter(|(_, door)| **door == DoorState::Secret)
    {
        if ctl.dice().roll_d6(1, "search secret door").total <= SEARCH_CHANCE {
            *door = DoorState::Closed;
            found.push(format!("a secret door {direction}"));
        }
    }

    let message = if found.is_empty() {
        "the search turns up nothing".to_string()
    } else {
        format!("the search turns up {}", found.join(", "))
    };
    Ok(Handled {
        success: !found.is_empty(),
        discoveries: found,
        ..Handled::success(message, 1)
    })
}

fn listen(ctl: &mut GlobalController) -> Handled {
    if ctl.dice().roll_d6(1, "listen").total == 1 {
        Handled::success("something moves beyond the walls", 0)
    } else {
        Handled::fail("only silence", 0)
    }
}

fn open_door(ctl: &mut GlobalController, state: &mut DungeonState, direction: &str) -> EngineResult<Handled> {
    let room = state.current_mut()?;
    if !room.exits.contains_key(direction) {
        return Ok(Handled::fail(format!("there is no exit {direction}"), 0));
    }
    let door_id = room.door_id(direction);
    let handled = match room.door(direction) {
        DoorState::Open => Handled::success("the way is already open", 0),
        DoorState::Closed => {
            room.doors.insert(direction.to_string(), DoorState::Open);
            Handled::success("the door swings open", 1)
        }
        door @ (DoorState::Locked | DoorState::Barred) => {
            Handled::fail(format!("the door is {door}"), 2)
        }
        DoorState::Stuck => {
            if ctl.dice().roll_d6(1, "force door").total <= SEARCH_CHANCE {
                room.doors.insert(direction.to_string(), DoorState::Open);
                Handled::success("the door is forced open", 4)
            } else {
                Handled::fail("the door holds fast", 3)
            }
        }
        DoorState::Secret => return Ok(Handled::fail(format!("there is no door {direction}"), 0)),
    };
    Ok(handled.at_door(door_id))
}

fn skill_roll(ctl: &mut GlobalController, character_id: &str, skill: ThiefSkill) -> EngineResult<bool> {
    let character = ctl
        .character(character_id)
        .ok_or_else(|| CoreError::CharacterNotFound(character_id.to_string()))?;
    let chance = ctl
        .abilities()
        .skill_chance(character.class, character.level, skill);
    let roll = ctl.dice().roll_percentile("thief skill");
    Ok(roll.total <= i32::try_from(chance).unwrap_or(i32::MAX))
}

fn pick_lock(
    ctl: &mut GlobalController,
    state: &mut DungeonState,
    direction: &str,
    character_id: &str,
) -> EngineResult<Handled> {
    let room = state.current_mut()?;
    if !room.exits.contains_key(direction) || room.door(direction) == DoorState::Secret {
        return Ok(Handled::fail(format!("there is no door {direction}"), 0));
    }
    let door_id = room.door_id(direction);
    if room.door(direction) != DoorState::Locked {
        return Ok(Handled::fail("the door is not locked", 0).at_door(door_id));
    }
    let handled = if skill_roll(ctl, character_id, ThiefSkill::PickLock)? {
        room.doors.insert(direction.to_string(), DoorState::Closed);
        Handled::success("the lock clicks open", 1)
    } else {
        Handled::fail("the lock resists", 1)
    };
    Ok(handled.at_door(door_id))
}

fn disarm(
    ctl: &mut GlobalController,
    state: &mut DungeonState,
    hazard_id: &str,
    character_id: &str,
) -> EngineResult<Handled> {
    let room = state.current_mut()?;
    let Some(hazard) = room.hazards.iter_mut().find(|h| h.id == hazard_id && h.detected) else {
        return Ok(Handled::fail(format!("no known hazard {hazard_id}"), 0));
    };
    if hazard.disarmed || hazard.triggered {
        return Ok(Handled::fail(format!("{} is no longer a threat", hazard.description), 0));
    }
    if skill_roll(ctl, character_id, ThiefSkill::DisarmMechanism)? {
        hazard.disarmed = true;
        return Ok(Handled::success(format!("{} is disarmed", hazard.description), 1));
    }
    if ctl.dice().roll_d6(1, "trap springs").total != 1 {
        return Ok(Handled::fail(format!("{} cannot be disarmed", hazard.description), 1));
    }

    hazard.triggered = true;
    let damage = ctl.dice().roll(&hazard.damage, "hazard damage")?.total.max(0);
    let hp = ctl.apply_damage(character_id, damage)?;
    tracing::info!(hazard = %hazard.id, character = character_id, damage, hp, "hazard triggered");
    Ok(Handled::fail(
        format!("{} goes off for {damage} damage", hazard.description),
        3,
    ))
}

fn interact(state: &DungeonState, target: &str) -> EngineResult<Handled> {
    let room = state.current()?;
    let feature = room
        .features
        .iter()
        .find(|f| f.id == target && f.discovered);
    Ok(match feature {
        Some(feature) => Handled::success(format!("the party examines {}", feature.description), 1),
        None => Handled::fail(format!("there is no {target} here"), 1),
    })
}
