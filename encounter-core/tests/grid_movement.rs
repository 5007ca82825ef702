//! Integration tests for the movement cost model, exercised through the
//! public grid API the way the map window drives it.

use encounter_core::{BattleGrid, GridPos, MoveError, MovementMode, MoverProfile};
use std::collections::HashMap;

fn walker() -> MoverProfile {
    MoverProfile {
        mode: MovementMode::Ground,
        walk_speed: 30,
        swim_speed: 0,
    }
}

// =============================================================================
// Open-field costs
// =============================================================================

#[test]
fn two_squares_of_budget_from_an_interior_cell() {
    let grid = BattleGrid::new(11, 11);
    let origin = GridPos::new(5, 5);
    let costs = grid.reachable(origin, 10, &walker());

    // Every orthogonal neighbor costs one square.
    for pos in [
        GridPos::new(4, 5),
        GridPos::new(6, 5),
        GridPos::new(5, 4),
        GridPos::new(5, 6),
    ] {
        assert_eq!(costs.get(&pos), Some(&5));
    }
    // Every diagonal neighbor costs one square too (first diagonal).
    for pos in [
        GridPos::new(4, 4),
        GridPos::new(4, 6),
        GridPos::new(6, 4),
        GridPos::new(6, 6),
    ] {
        assert_eq!(costs.get(&pos), Some(&5));
    }
    // A second consecutive diagonal costs two squares, so the double
    // diagonal (15 ft total) is out of this budget.
    assert!(!costs.contains_key(&GridPos::new(7, 7)));
}

#[test]
fn reachable_respects_a_larger_budget() {
    let grid = BattleGrid::new(11, 11);
    let costs = grid.reachable(GridPos::new(5, 5), 30, &walker());

    // Diagonal chains alternate 5/10.
    assert_eq!(costs.get(&GridPos::new(7, 7)), Some(&15));
    assert_eq!(costs.get(&GridPos::new(8, 8)), Some(&20));
    assert_eq!(costs.get(&GridPos::new(9, 9)), Some(&30));

    // Straight lines are linear.
    assert_eq!(costs.get(&GridPos::new(10, 5)), Some(&25));
}

#[test]
fn reported_cost_is_minimum_over_parity_states() {
    let grid = BattleGrid::new(11, 11);
    let costs = grid.reachable(GridPos::new(5, 5), 30, &walker());

    // (7, 6) can be reached diagonal-then-orthogonal or the other way
    // around; both are 10, and only one number is reported.
    assert_eq!(costs.get(&GridPos::new(7, 6)), Some(&10));
}

// =============================================================================
// Walls
// =============================================================================

#[test]
fn an_enclosed_destination_is_unreachable_at_any_budget() {
    let mut grid = BattleGrid::new(9, 9);
    let target = GridPos::new(4, 4);
    for col in 3..=5 {
        for row in 3..=5 {
            let pos = GridPos::new(col, row);
            if pos != target {
                grid.set_obstacle(pos);
            }
        }
    }

    // A straight-line path would fit easily; the walls make it NoPath, not
    // a budget failure.
    assert_eq!(
        grid.cost_between(GridPos::new(0, 4), target, 10_000, &walker()),
        Err(MoveError::NoPath(target))
    );
    assert!(!grid
        .reachable(GridPos::new(0, 4), 10_000, &walker())
        .contains_key(&target));
}

#[test]
fn walls_force_the_long_way_around() {
    let mut grid = BattleGrid::new(9, 3);
    // A vertical wall with a gap at the bottom row.
    grid.set_obstacle(GridPos::new(4, 0));
    grid.set_obstacle(GridPos::new(4, 1));

    let direct = grid
        .cost_between(GridPos::new(3, 0), GridPos::new(5, 0), 100, &walker())
        .unwrap();
    // Around the wall: down, diagonal past the gap, and back up.
    assert!(direct > 10, "direct cost {direct} should detour");
}

// =============================================================================
// Results are pure queries
// =============================================================================

#[test]
fn repeated_queries_are_identical() {
    let mut grid = BattleGrid::new(9, 9);
    grid.set_obstacle(GridPos::new(4, 4));
    grid.set_terrain(GridPos::new(2, 2), encounter_core::Terrain::Rough);

    let first: HashMap<GridPos, u32> = grid.reachable(GridPos::new(0, 0), 30, &walker());
    let second: HashMap<GridPos, u32> = grid.reachable(GridPos::new(0, 0), 30, &walker());
    assert_eq!(first, second);
}
