//! Integration tests for encounter distance bounds.

use dolmen_core::{
    Combatant, EncounterKind, EncounterRecord, GlobalController, Mode, RefereeConfig, Side,
    StatBlock, SurpriseStatus,
};
use dolmen_engines::EncounterEngine;
use dolmen_engines::encounter::Awareness;

fn resolve(seed: u64, origin: Mode, awareness: Awareness) -> (u32, u32, SurpriseStatus) {
    let mut ctl = GlobalController::new(
        RefereeConfig::default()
            .with_seed(seed)
            .with_initial_mode(origin),
    );
    let record = EncounterRecord::new(EncounterKind::Monster).with_combatant(Combatant::new(
        "orc",
        "Orc",
        Side::Enemy,
        StatBlock::new(6, "1d8", 5, 120, 8),
    ));
    let mut engine = EncounterEngine::new();
    engine
        .start_encounter(&mut ctl, record, origin, awareness)
        .unwrap();
    let surprise = engine
        .resolve_surprise(&mut ctl, 0, 0)
        .resolved()
        .unwrap()
        .status;
    let distance = engine.resolve_distance(&mut ctl).resolved().unwrap();
    (distance.distance, distance.undivided, surprise)
}

proptest::proptest! {
    #[test]
    fn outdoor_distance_is_two_d6_times_thirty(seed in 0u64..10_000) {
        let (distance, undivided, surprise) = resolve(seed, Mode::WildernessTravel, Awareness::none());
        proptest::prop_assert!((60..=360).contains(&undivided));
        proptest::prop_assert_eq!(undivided % 30, 0);
        proptest::prop_assert!(distance <= undivided);
        if surprise != SurpriseStatus::MutualSurprise {
            proptest::prop_assert_eq!(distance, undivided);
        }
    }

    #[test]
    fn dungeon_distance_is_two_d6_times_ten(seed in 0u64..10_000) {
        let (distance, undivided, surprise) = resolve(seed, Mode::DungeonExploration, Awareness::none());
        proptest::prop_assert!((20..=120).contains(&undivided));
        proptest::prop_assert_eq!(undivided % 10, 0);
        proptest::prop_assert!(distance <= undivided);
        if surprise != SurpriseStatus::MutualSurprise {
            proptest::prop_assert_eq!(distance, undivided);
        }
    }

    #[test]
    fn aware_sides_are_never_surprised(seed in 0u64..10_000) {
        let (distance, undivided, surprise) = resolve(seed, Mode::DungeonExploration, Awareness::both());
        proptest::prop_assert_eq!(surprise, SurpriseStatus::NoSurprise);
        proptest::prop_assert_eq!(distance, undivided);
    }
}
