//! Integration tests for referee mode flows.

use dolmen_core::{
    AttackProfile, Character, Combatant, EncounterKind, EncounterRecord, GlobalController, Mode,
    RefereeConfig, Side, StatBlock,
};
use dolmen_engines::Referee;
use dolmen_engines::combat::AttackOrder;
use dolmen_engines::dungeon::{DoorState, DungeonAction, DungeonLayout, DungeonRoom};
use dolmen_engines::encounter::{Awareness, EncounterAction, PhaseModifiers};
use dolmen_mechanics::{CharacterClass, ReactionResult, ScriptedDice};

fn fighter() -> Combatant {
    Combatant::new(
        "pc",
        "Aldric",
        Side::Party,
        StatBlock::new(4, "1d8", 8, 40, 12).with_attack(AttackProfile::new("sword", "1d8", 0)),
    )
    .with_character("pc")
}

fn goblin(hp: i32) -> Combatant {
    Combatant::new(
        "gob",
        "Goblin",
        Side::Enemy,
        StatBlock::new(6, "1d8", hp, 60, 7).with_attack(AttackProfile::new("spear", "1d6", 0)),
    )
}

fn referee(config: RefereeConfig, faces: &[u32]) -> Referee {
    let mut referee = Referee::new(config).with_dice(ScriptedDice::new(faces.iter().copied()));
    referee
        .controller_mut()
        .add_character(Character::new("pc", "Aldric", CharacterClass::Fighter, 1, 8));
    referee
}

/// Start an encounter with both sides aware and run it up to the Actions
/// phase. Consumes four faces: two for distance, two for initiative.
fn ready_encounter(referee: &mut Referee) {
    referee
        .start_encounter(
            EncounterRecord::new(EncounterKind::Monster)
                .with_combatant(fighter())
                .with_combatant(goblin(3)),
            Awareness::both(),
        )
        .unwrap();
    let (encounters, ctl) = referee.encounters_mut();
    let run = encounters
        .auto_run_phases(ctl, PhaseModifiers::default())
        .resolved()
        .unwrap();
    assert!(run.ready_for_action);
}

#[test]
fn wilderness_fight_returns_to_travel_and_clears_state() {
    // distance 3+3, initiative 4/2, round initiative 5/2, sword 15, damage 3
    let mut referee = referee(RefereeConfig::default(), &[3, 3, 4, 2, 5, 2, 15, 3]);
    ready_encounter(&mut referee);

    referee
        .encounter_action(Side::Party, EncounterAction::Attack)
        .unwrap();
    assert_eq!(referee.mode(), Mode::Combat);
    assert!(referee.combat().is_active());

    let round = referee
        .combat_round(&[AttackOrder::new("pc", "gob")])
        .unwrap()
        .resolved()
        .unwrap();
    assert!(round.combat_over);
    assert_eq!(round.victor, Some(Side::Party));
    assert_eq!(round.summary.unwrap().returned_to, Mode::WildernessTravel);

    assert_eq!(referee.mode(), Mode::WildernessTravel);
    assert_eq!(referee.controller().previous_mode(), Some(Mode::Combat));
    assert!(referee.controller().encounter().is_none());
    assert!(referee.combat().state().is_none());
    assert!(referee.encounters().state().is_none());
}

#[test]
fn parley_detour_unwinds_back_to_the_dungeon() {
    // distance 2+2, initiative 3/3, parley 6+6
    let config = RefereeConfig::default().with_initial_mode(Mode::DungeonExploration);
    let mut referee = referee(config, &[2, 2, 3, 3, 6, 6]);
    ready_encounter(&mut referee);
    assert_eq!(referee.controller().encounter().unwrap().distance, 40);

    referee
        .encounter_action(Side::Party, EncounterAction::Attack)
        .unwrap();
    assert_eq!(referee.mode(), Mode::Combat);

    let (combat, ctl) = referee.combat_mut();
    let parley = combat.attempt_parley(ctl).unwrap().resolved().unwrap();
    assert_eq!(parley.transitioned_to, Some(Mode::SocialInteraction));
    assert!(combat.state().unwrap().in_parley);

    assert_eq!(
        combat.resume_after_parley(ctl).unwrap().resolved(),
        Some(Mode::Combat)
    );
    let summary = combat
        .end_combat(ctl, "withdrawn")
        .unwrap()
        .resolved()
        .unwrap();
    assert_eq!(summary.returned_to, Mode::DungeonExploration);

    let modes: Vec<Mode> = referee
        .controller()
        .machine()
        .history()
        .iter()
        .map(|entry| entry.to)
        .collect();
    assert_eq!(
        modes,
        [
            Mode::DungeonExploration,
            Mode::Encounter,
            Mode::Combat,
            Mode::SocialInteraction,
            Mode::Combat,
            Mode::DungeonExploration,
        ]
    );
    assert!(referee.controller().encounter().is_none());
    assert!(referee.combat().state().is_none());
}

#[test]
fn concluded_parley_ends_the_fight_peacefully() {
    let config = RefereeConfig::default().with_initial_mode(Mode::DungeonExploration);
    let mut referee = referee(config, &[2, 2, 3, 3, 6, 6]);
    ready_encounter(&mut referee);
    referee
        .encounter_action(Side::Party, EncounterAction::Attack)
        .unwrap();

    let (combat, ctl) = referee.combat_mut();
    combat.attempt_parley(ctl).unwrap();
    let summary = combat.conclude_parley(ctl).unwrap().resolved().unwrap();
    assert_eq!(summary.victor, None);
    assert_eq!(summary.reason, "parley");
    assert_eq!(referee.mode(), Mode::DungeonExploration);
    assert!(referee.controller().encounter().is_none());
}

#[test]
fn reaction_of_two_starts_a_fight() {
    let mut referee = referee(RefereeConfig::default(), &[3, 3, 4, 2, 1, 1]);
    ready_encounter(&mut referee);
    let result = referee
        .encounter_action(Side::Party, EncounterAction::Parley { modifier: 0 })
        .unwrap()
        .resolved()
        .unwrap();
    assert_eq!(result.reaction, Some(ReactionResult::Attacks));
    assert_eq!(result.transitioned_to, Some(Mode::Combat));
    assert_eq!(
        referee.combat().state().unwrap().return_mode,
        Mode::WildernessTravel
    );
}

#[test]
fn reaction_of_twelve_opens_talks() {
    let mut referee = referee(RefereeConfig::default(), &[3, 3, 4, 2, 6, 6]);
    ready_encounter(&mut referee);
    let result = referee
        .encounter_action(Side::Party, EncounterAction::Parley { modifier: 0 })
        .unwrap()
        .resolved()
        .unwrap();
    assert_eq!(result.reaction, Some(ReactionResult::Friendly));
    assert_eq!(referee.mode(), Mode::SocialInteraction);
    assert!(!referee.combat().is_active());
    assert!(referee.controller().encounter().is_some());
}

#[test]
fn forcing_a_stuck_door_alerts_the_dungeon() {
    let mut referee = referee(RefereeConfig::default(), &[5, 5, 6, 1]);
    referee
        .enter_dungeon(
            DungeonLayout::new("keep", "gate")
                .with_room(
                    DungeonRoom::new("gate", "Gatehouse")
                        .with_exit("north", "yard")
                        .with_door("north", DoorState::Stuck),
                )
                .with_room(DungeonRoom::new("yard", "Yard").with_exit("south", "gate")),
        )
        .unwrap();

    let noise: Vec<u32> = (0..3)
        .map(|_| {
            referee
                .dungeon_turn(DungeonAction::OpenDoor {
                    direction: "north".into(),
                })
                .unwrap()
                .resolved()
                .unwrap()
                .noise
        })
        .collect();
    assert_eq!(noise, [3, 3, 4]);

    let state = referee.dungeon().state().unwrap();
    assert_eq!(state.alert_level, 1);
    assert_eq!(state.noise, 0);
    assert_eq!(referee.mode(), Mode::DungeonExploration);
}

mod combat_rules {
    use dolmen_core::{Context, triggers};
    use dolmen_engines::CombatEngine;
    use dolmen_engines::combat::MoraleTrigger;
    use dolmen_engines::encounter::InitiativeOrder;

    use super::*;

    fn enemy(id: &str, armor_class: i32, hp: i32) -> Combatant {
        Combatant::new(
            id,
            "Ghoul",
            Side::Enemy,
            StatBlock::new(armor_class, "2d8", hp, 30, 7)
                .with_attack(AttackProfile::new("claw", "1d3", 0)),
        )
    }

    fn fight(faces: &[u32], enemies: Vec<Combatant>) -> (GlobalController, CombatEngine) {
        let mut ctl =
            GlobalController::default().with_dice(ScriptedDice::new(faces.iter().copied()));
        let mut record = EncounterRecord::new(EncounterKind::Monster).with_combatant(Combatant {
            character_ref: None,
            ..fighter()
        });
        for enemy in enemies {
            record = record.with_combatant(enemy);
        }
        ctl.transition(triggers::ENCOUNTER_TRIGGERED, Context::new())
            .unwrap();
        ctl.set_encounter(record);
        ctl.transition(triggers::ENCOUNTER_TO_COMBAT, Context::new())
            .unwrap();
        let mut engine = CombatEngine::new();
        engine.start_combat(&ctl, Mode::WildernessTravel).unwrap();
        (ctl, engine)
    }

    #[test]
    fn morale_checks_fire_on_first_death_and_half_losses() {
        let enemies = (1..=4).map(|n| enemy(&format!("g{n}"), 6, 1)).collect();
        #[rustfmt::skip]
        let faces = [
            5, 2, 15, 1, 2, 2, 2, 3, 3, // round 1: g1 falls, first-death check holds
            5, 2, 15, 1, 2, 2, 3, 3,    // round 2: g2 falls, half-losses check holds
            5, 2, 15, 1, 2,             // round 3: g3 falls, no further checks
        ];
        let (mut ctl, mut engine) = fight(&faces, enemies);

        let round = |engine: &mut CombatEngine, ctl: &mut GlobalController, target: &str| {
            engine
                .run_round(ctl, &[AttackOrder::new("pc", target)])
                .unwrap()
                .resolved()
                .unwrap()
        };

        let first = round(&mut engine, &mut ctl, "g1");
        assert_eq!(first.deaths, ["g1"]);
        assert_eq!(first.morale.len(), 1);
        assert_eq!(first.morale[0].trigger, MoraleTrigger::FirstDeath);
        assert!(!first.morale[0].fled);

        let second = round(&mut engine, &mut ctl, "g2");
        assert_eq!(second.morale.len(), 1);
        assert_eq!(second.morale[0].trigger, MoraleTrigger::HalfCasualties);

        let third = round(&mut engine, &mut ctl, "g3");
        assert!(third.morale.is_empty());
        assert_eq!(engine.state().unwrap().enemy_casualties, 3);
    }

    #[test]
    fn higher_initiative_strikes_first() {
        let (mut ctl, mut engine) = fight(&[5, 2, 3, 14], vec![enemy("ghoul", 6, 9)]);
        let round = engine
            .run_round(&mut ctl, &[AttackOrder::new("pc", "ghoul")])
            .unwrap()
            .resolved()
            .unwrap();
        assert_eq!(round.order, InitiativeOrder::PartyFirst);
        assert_eq!(round.attacks[0].attacker, "pc");
        assert_eq!(round.attacks[1].attacker, "ghoul");
    }

    #[test]
    fn to_hit_uses_base_minus_armor_class_and_natural_twenty_always_hits() {
        let (mut ctl, mut engine) = fight(&[5, 2, 20, 4, 14, 3, 3], vec![enemy("ghoul", -5, 10)]);
        let round = engine
            .run_round(&mut ctl, &[AttackOrder::new("pc", "ghoul")])
            .unwrap()
            .resolved()
            .unwrap();

        let sword = &round.attacks[0];
        assert_eq!(sword.needed, 24);
        assert!(sword.critical);
        assert!(sword.hit);
        assert_eq!(sword.damage, 4);
        assert_eq!(sword.target_hp, 6);

        let claw = &round.attacks[1];
        assert_eq!(claw.needed, 15);
        assert!(!claw.hit);
        assert_eq!(claw.damage, 0);

        assert_eq!(round.morale.len(), 1);
        assert_eq!(round.morale[0].trigger, MoraleTrigger::SoloFirstHarmed);
        assert!(!round.combat_over);
    }
}
