//! Integration tests for the combat turn engine: turn flow, damage over
//! time, concentration saves, action economy, and movement charging.
//!
//! All encounters are seeded so dice rolls stay deterministic per run while
//! assertions remain range-based where the roll itself is not pinned.

use encounter_core::{
    ActionSlot, BattleGrid, CombatantId, ConditionKind, DicePool, DieType, DotKind, Encounter,
    Event, GridPos, MoveError, MovementMode, NewCombatant, OverlayId, Speed, TurnKey, TurnState,
};

fn duelists() -> (Encounter, CombatantId, CombatantId) {
    let mut enc = Encounter::with_seed("duel", 99);
    let a = enc
        .add_combatant(NewCombatant::new("Aela", 24).with_initiative(17, false, Some(14)))
        .unwrap();
    let b = enc
        .add_combatant(NewCombatant::new("Troll", 84).with_initiative(9, false, Some(13)))
        .unwrap();
    (enc, a, b)
}

// =============================================================================
// Turn flow
// =============================================================================

#[test]
fn turn_counter_is_monotone_across_rounds() {
    let (mut enc, a, b) = duelists();
    enc.start();

    let mut last_turn = 0;
    for _ in 0..7 {
        let TurnState::Active { turn, .. } = enc.state() else {
            panic!("combat should stay active");
        };
        assert!(turn > last_turn, "turn counter must keep increasing");
        last_turn = turn;
        enc.next_turn();
    }

    // 8 turns over 2 combatants: rounds 1..=4 were all announced.
    assert_eq!(enc.round(), Some(4));
    let rounds: Vec<u32> = enc
        .log()
        .iter()
        .filter_map(|e| match e {
            Event::RoundStarted { round } => Some(*round),
            _ => None,
        })
        .collect();
    assert_eq!(rounds, vec![2, 3, 4]);
    assert_eq!(enc.active(), Some(b));
    assert_eq!(enc.display_order(), vec![a, b]);
}

#[test]
fn set_turn_jumps_and_processes() {
    let mut enc = Encounter::with_seed("ambush", 4);
    let a = enc
        .add_combatant(NewCombatant::new("Aela", 24).with_initiative(20, false, None))
        .unwrap();
    let b = enc
        .add_combatant(NewCombatant::new("Bandit", 11).with_initiative(12, false, None))
        .unwrap();
    let c = enc
        .add_combatant(NewCombatant::new("Cutpurse", 11).with_initiative(5, false, None))
        .unwrap();
    enc.start();
    assert_eq!(enc.active(), Some(a));

    // Jump straight to the last combatant; its turn starts properly.
    enc.set_turn(c);
    assert_eq!(enc.active(), Some(c));
    assert!(enc
        .log()
        .iter()
        .any(|e| matches!(e, Event::TurnStarted { id, .. } if *id == c)));

    // Unknown ids are ignored.
    enc.set_turn(CombatantId(999));
    assert_eq!(enc.active(), Some(c));
    let _ = b;
}

#[test]
fn advantage_marker_expires_at_turn_start() {
    let (mut enc, a, _) = duelists();
    enc.set_condition(a, ConditionKind::Advantage, None);
    enc.start();

    assert!(!enc.combatant(a).unwrap().conditions.has(ConditionKind::Advantage));
    assert!(enc.log().iter().any(|e| matches!(
        e,
        Event::ConditionExpired { id, kind: ConditionKind::Advantage, .. } if *id == a
    )));
}

// =============================================================================
// Damage over time
// =============================================================================

#[test]
fn dot_damages_within_dice_bounds() {
    let (mut enc, a, _) = duelists();
    // 1d6 burn and 1d4 poison: 2..=10 total at the start of Aela's turn.
    enc.add_damage_over_time(a, DotKind::Burn, DicePool::new().with(DieType::D6, 1), 3);
    enc.add_damage_over_time(a, DotKind::Poison, DicePool::new().with(DieType::D4, 1), 3);
    enc.start();

    let total = enc
        .log()
        .iter()
        .find_map(|e| match e {
            Event::DotDamageRolled { id, total, rolls, .. } if *id == a => {
                assert_eq!(rolls.len(), 2);
                Some(*total)
            }
            _ => None,
        })
        .expect("damage over time should roll at turn start");

    assert!((2..=10).contains(&total));
    assert_eq!(enc.combatant(a).unwrap().hp.current, 24 - total);
}

#[test]
fn lethal_dot_removes_combatant_and_retargets() {
    let mut enc = Encounter::with_seed("bleed-out", 13);
    let a = enc
        .add_combatant(NewCombatant::new("Aela", 24).with_initiative(30, false, None))
        .unwrap();
    let b = enc
        .add_combatant(NewCombatant::new("Bandit", 2).with_initiative(20, false, None))
        .unwrap();
    let c = enc
        .add_combatant(NewCombatant::new("Cutpurse", 11).with_initiative(10, false, None))
        .unwrap();

    // 2d4 against 2 hp: the minimum roll already kills.
    enc.add_damage_over_time(b, DotKind::Burn, DicePool::new().with(DieType::D4, 2), 5);
    enc.start();
    assert_eq!(enc.active(), Some(a));

    enc.next_turn();

    // The bandit died during its own turn start; play went on to the
    // cutpurse using the pre-removal order.
    assert!(enc.combatant(b).is_none());
    assert_eq!(enc.active(), Some(c));
    assert!(enc
        .log()
        .iter()
        .any(|e| matches!(e, Event::CombatantDied { id, .. } if *id == b)));
    assert_eq!(enc.display_order(), vec![a, c]);
}

#[test]
fn dot_runs_even_on_skipped_turns() {
    let mut enc = Encounter::with_seed("stunned-burn", 7);
    let a = enc
        .add_combatant(NewCombatant::new("Aela", 24).with_initiative(20, false, None))
        .unwrap();
    let b = enc
        .add_combatant(NewCombatant::new("Zombie", 40).with_initiative(5, false, None))
        .unwrap();

    enc.set_condition(b, ConditionKind::Stunned, Some(1));
    enc.add_damage_over_time(b, DotKind::Necrotic, DicePool::new().with(DieType::D4, 1), 4);
    enc.start();
    enc.next_turn();

    // The zombie's turn was skipped, but the necrotic tick still landed and
    // play wrapped back to Aela.
    assert!(enc
        .log()
        .iter()
        .any(|e| matches!(e, Event::TurnSkipped { id, .. } if *id == b)));
    assert!(enc
        .log()
        .iter()
        .any(|e| matches!(e, Event::DotDamageRolled { id, .. } if *id == b)));
    assert!(enc.combatant(b).unwrap().hp.current < 40);
    assert_eq!(enc.active(), Some(a));
}

// =============================================================================
// Concentration
// =============================================================================

#[test]
fn failed_save_clears_whole_queue() {
    let (mut enc, a, b) = duelists();
    enc.start();

    enc.begin_concentration(b, Some(3));
    enc.bind_overlay(b, OverlayId(71));
    enc.bind_overlay(b, OverlayId(72));

    // Two hits in the same turn: two saves owed at DC 13.
    enc.apply_damage(b, 5);
    enc.apply_damage(b, 3);
    assert_eq!(enc.pending_saves(b), Some((13, 2)));

    enc.resolve_concentration_save(b, false);
    assert_eq!(enc.pending_saves(b), None);
    assert!(!enc.combatant(b).unwrap().is_concentrating());

    let overlays = enc
        .log()
        .iter()
        .find_map(|e| match e {
            Event::ConcentrationLost { id, overlays, .. } if *id == b => Some(overlays.clone()),
            _ => None,
        })
        .expect("losing concentration should release overlays");
    assert_eq!(overlays, vec![OverlayId(71), OverlayId(72)]);

    // Resolving again is a quiet no-op.
    enc.resolve_concentration_save(b, true);
    enc.resolve_concentration_save(b, false);
    let _ = a;
}

#[test]
fn passed_saves_drain_the_queue() {
    let (mut enc, _, b) = duelists();
    enc.start();
    enc.begin_concentration(b, None);

    enc.apply_damage(b, 4);
    enc.apply_damage(b, 4);
    assert_eq!(enc.pending_saves(b), Some((10, 2)));

    enc.resolve_concentration_save(b, true);
    assert_eq!(enc.pending_saves(b), Some((10, 1)));
    enc.resolve_concentration_save(b, true);
    assert_eq!(enc.pending_saves(b), None);

    assert!(enc.combatant(b).unwrap().is_concentrating());
    assert!(enc
        .log()
        .iter()
        .any(|e| matches!(e, Event::ConcentrationMaintained { id, .. } if *id == b)));
}

#[test]
fn pending_saves_are_abandoned_on_turn_advance() {
    let (mut enc, _, b) = duelists();
    enc.start();
    enc.begin_concentration(b, Some(2));
    enc.apply_damage(b, 6);
    assert_eq!(enc.pending_saves(b), Some((12, 1)));

    // The prompt was never answered; advancing the turn drops it but the
    // concentration itself survives.
    enc.next_turn();
    assert_eq!(enc.pending_saves(b), None);
    assert!(enc.combatant(b).unwrap().is_concentrating());
}

#[test]
fn damage_fully_absorbed_by_temp_hp_queues_nothing() {
    let (mut enc, _, b) = duelists();
    enc.start();
    enc.begin_concentration(b, Some(1));
    enc.grant_temporary_hp(b, 10);

    enc.apply_damage(b, 6);
    assert_eq!(enc.pending_saves(b), None);

    // Once the pool is drained, real damage queues a save again.
    enc.apply_damage(b, 6);
    assert_eq!(enc.pending_saves(b), Some((11, 1)));
}

// =============================================================================
// Action economy and speed
// =============================================================================

#[test]
fn banked_extras_land_on_next_reset() {
    let (mut enc, a, _) = duelists();
    enc.start();

    assert!(enc.spend_action(a, ActionSlot::Action));
    assert!(!enc.spend_action(a, ActionSlot::Action));

    enc.grant_extra_action(a, ActionSlot::Action, 1);
    enc.next_turn();
    enc.next_turn(); // back to Aela

    let counter = enc.combatant(a).unwrap().actions.counter(ActionSlot::Action);
    assert_eq!(counter.available, 2);

    // One-shot: the round after that is back to a single action.
    enc.next_turn();
    enc.next_turn();
    let counter = enc.combatant(a).unwrap().actions.counter(ActionSlot::Action);
    assert_eq!(counter.available, 1);
}

#[test]
fn temp_speed_bonus_wears_off() {
    let (mut enc, a, _) = duelists();
    enc.add_speed_bonus(a, 10, 1);
    enc.start();

    assert_eq!(enc.combatant(a).unwrap().movement_total, 40);

    // The bonus counter ticks at Aela's turn end; her next turn is back to
    // the base speed.
    enc.next_turn();
    enc.next_turn();
    assert_eq!(enc.combatant(a).unwrap().movement_total, 30);
}

#[test]
fn immobilizing_condition_zeroes_the_budget() {
    let (mut enc, a, _) = duelists();
    enc.set_condition(a, ConditionKind::Grappled, None);
    enc.start();

    let aela = enc.combatant(a).unwrap();
    assert_eq!(aela.movement_total, 0);
    assert_eq!(aela.movement_remaining, 0);
}

// =============================================================================
// Movement charging
// =============================================================================

#[test]
fn moves_charge_the_budget_or_reject_wholesale() {
    let (mut enc, a, _) = duelists();
    enc.start();
    let grid = BattleGrid::new(12, 12);

    // 4 orthogonal squares: 20 of 30 ft.
    let cost = enc
        .propose_move(a, &grid, GridPos::new(0, 0), GridPos::new(4, 0))
        .unwrap();
    assert_eq!(cost, 20);
    assert_eq!(enc.combatant(a).unwrap().movement_remaining, 10);

    // 25 more feet don't fit in the remaining 10; nothing is charged.
    let err = enc
        .propose_move(a, &grid, GridPos::new(4, 0), GridPos::new(9, 0))
        .unwrap_err();
    assert_eq!(
        err,
        MoveError::InsufficientBudget {
            required: 25,
            available: 10
        }
    );
    assert_eq!(enc.combatant(a).unwrap().movement_remaining, 10);

    // A walled-off destination is a distinct failure.
    let mut walled = BattleGrid::new(12, 12);
    for (col, row) in [(7, 6), (7, 8), (6, 6), (6, 7), (6, 8), (8, 6), (8, 7), (8, 8)] {
        walled.set_obstacle(GridPos::new(col, row));
    }
    let err = enc
        .propose_move(a, &walled, GridPos::new(4, 0), GridPos::new(7, 7))
        .unwrap_err();
    assert_eq!(err, MoveError::NoPath(GridPos::new(7, 7)));

    // Unknown movers are rejected, not silently charged.
    let err = enc
        .propose_move(CombatantId(999), &grid, GridPos::new(0, 0), GridPos::new(1, 0))
        .unwrap_err();
    assert_eq!(err, MoveError::UnknownMover(CombatantId(999)));
}

#[test]
fn swimmer_uses_its_swim_speed_in_water() {
    let mut enc = Encounter::with_seed("river", 21);
    let merrow = enc
        .add_combatant(
            NewCombatant::new("Merrow", 45)
                .with_speed(Speed {
                    walk: 10,
                    swim: 40,
                    fly: 0,
                    burrow: 0,
                    climb: 0,
                })
                .with_initiative(12, false, None),
        )
        .unwrap();
    enc.set_movement_mode(merrow, MovementMode::Swim);
    enc.start();
    assert_eq!(enc.combatant(merrow).unwrap().movement_total, 40);

    let mut grid = BattleGrid::new(8, 1);
    for col in 0..8 {
        grid.set_terrain(GridPos::new(col, 0), encounter_core::Terrain::Water);
    }
    let cost = enc
        .propose_move(merrow, &grid, GridPos::new(0, 0), GridPos::new(6, 0))
        .unwrap();
    assert_eq!(cost, 30);
    assert_eq!(enc.combatant(merrow).unwrap().movement_remaining, 10);
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn template_fields_flow_into_the_roster() {
    use encounter_core::CombatantTemplate;

    let template: CombatantTemplate = serde_json::from_str(
        r#"{
            "name": "Goblin",
            "max_hp": 7,
            "speed": {"walk": 30, "swim": 0, "fly": 0, "burrow": 0, "climb": 0},
            "dexterity": 14,
            "saving_throws": {"strength": -1, "dexterity": 2, "constitution": 0,
                              "intelligence": 0, "wisdom": -1, "charisma": -1}
        }"#,
    )
    .unwrap();

    let mut enc = Encounter::with_seed("warren", 3);
    let goblin = enc.add_from_template(&template, 14, false).unwrap();

    let c = enc.combatant(goblin).unwrap();
    assert_eq!(c.hp.maximum, 7);
    assert_eq!(c.initiative.total, 14);
    assert_eq!(c.initiative.dexterity, Some(14));
    assert_eq!(c.speed.walk, 30);

    // The same template can't collide with itself by name.
    assert!(enc.add_from_template(&template, 11, false).is_err());

    let key: Option<TurnKey> = enc.turn_key();
    assert!(key.is_none());
}
