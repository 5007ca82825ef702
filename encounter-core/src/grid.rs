//! Battle grid and movement cost model.
//!
//! Costs are a weighted shortest-path search over `(column, row, parity)`
//! states, where the parity bit makes consecutive diagonal steps alternate
//! between one and two grid units of cost. The search is a pure query: it
//! never mutates combat state.

use crate::combatant::{CombatantId, MovementMode};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// A grid cell address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPos {
    pub col: i32,
    pub row: i32,
}

impl GridPos {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Terrain of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Terrain {
    #[default]
    Normal,
    /// Costs double to enter on the ground.
    Rough,
    /// Entered at the walk/swim speed ratio on the ground; the only terrain
    /// swimmers may enter; closed to burrowers.
    Water,
}

/// Errors from movement validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("combatant {0} not found")]
    UnknownMover(CombatantId),

    #[error("{0} is outside the grid")]
    OutOfBounds(GridPos),

    #[error("{0} is blocked")]
    Blocked(GridPos),

    #[error("no path to {0}")]
    NoPath(GridPos),

    #[error("move costs {required} ft with only {available} ft remaining")]
    InsufficientBudget { required: u32, available: u32 },
}

/// The movement-relevant slice of a combatant, captured for a query.
#[derive(Debug, Clone, Copy)]
pub struct MoverProfile {
    pub mode: MovementMode,
    pub walk_speed: u32,
    pub swim_speed: u32,
}

const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// A rectangular battle grid with obstacles and terrain. The grid is owned
/// by the map collaborator and handed in per query; it is not part of an
/// encounter snapshot.
#[derive(Debug, Clone)]
pub struct BattleGrid {
    width: i32,
    height: i32,
    feet_per_square: u32,
    obstacles: HashSet<GridPos>,
    terrain: HashMap<GridPos, Terrain>,
}

impl BattleGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
            feet_per_square: 5,
            obstacles: HashSet::new(),
            terrain: HashMap::new(),
        }
    }

    pub fn with_feet_per_square(mut self, feet: u32) -> Self {
        self.feet_per_square = feet.max(1);
        self
    }

    pub fn feet_per_square(&self) -> u32 {
        self.feet_per_square
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        pos.col >= 0 && pos.col < self.width && pos.row >= 0 && pos.row < self.height
    }

    pub fn set_obstacle(&mut self, pos: GridPos) {
        self.obstacles.insert(pos);
    }

    pub fn clear_obstacle(&mut self, pos: GridPos) {
        self.obstacles.remove(&pos);
    }

    pub fn is_obstacle(&self, pos: GridPos) -> bool {
        self.obstacles.contains(&pos)
    }

    pub fn set_terrain(&mut self, pos: GridPos, terrain: Terrain) {
        if terrain == Terrain::Normal {
            self.terrain.remove(&pos);
        } else {
            self.terrain.insert(pos, terrain);
        }
    }

    pub fn terrain(&self, pos: GridPos) -> Terrain {
        self.terrain.get(&pos).copied().unwrap_or_default()
    }

    /// Cost of one step onto `dest`, given the step's base cost (one or two
    /// grid units for diagonals). Returns `None` if the mover's mode cannot
    /// enter the cell at all.
    fn step_cost(&self, base: u32, dest: GridPos, mover: &MoverProfile) -> Option<u32> {
        match mover.mode {
            // Flight ignores terrain entirely.
            MovementMode::Fly => Some(base),
            MovementMode::Swim => (self.terrain(dest) == Terrain::Water).then_some(base),
            MovementMode::Burrow => (self.terrain(dest) != Terrain::Water).then_some(base),
            MovementMode::Ground => match self.terrain(dest) {
                Terrain::Normal => Some(base),
                Terrain::Rough => Some(base * 2),
                Terrain::Water => {
                    if mover.swim_speed == 0 {
                        return None;
                    }
                    if mover.swim_speed < mover.walk_speed {
                        Some((base * mover.walk_speed).div_ceil(mover.swim_speed))
                    } else {
                        Some(base)
                    }
                }
            },
        }
    }

    /// Dijkstra over `(cell, parity)` states, bounded by `budget`.
    fn shortest_costs(
        &self,
        origin: GridPos,
        budget: u32,
        mover: &MoverProfile,
    ) -> HashMap<(GridPos, bool), u32> {
        let mut dist: HashMap<(GridPos, bool), u32> = HashMap::new();
        if !self.contains(origin) || self.is_obstacle(origin) {
            return dist;
        }

        let mut heap: BinaryHeap<Reverse<(u32, i32, i32, bool)>> = BinaryHeap::new();
        dist.insert((origin, false), 0);
        heap.push(Reverse((0, origin.col, origin.row, false)));

        while let Some(Reverse((cost, col, row, parity))) = heap.pop() {
            let pos = GridPos::new(col, row);
            if dist.get(&(pos, parity)).copied() != Some(cost) {
                continue; // stale heap entry
            }

            for (dx, dy) in NEIGHBORS {
                let next = GridPos::new(col + dx, row + dy);
                if !self.contains(next) || self.is_obstacle(next) {
                    continue;
                }

                let diagonal = dx != 0 && dy != 0;
                // No corner-cutting: a diagonal is closed if either
                // orthogonal neighbor forming the corner is an obstacle.
                if diagonal
                    && (self.is_obstacle(GridPos::new(col + dx, row))
                        || self.is_obstacle(GridPos::new(col, row + dy)))
                {
                    continue;
                }

                let base = if diagonal && parity {
                    2 * self.feet_per_square
                } else {
                    self.feet_per_square
                };
                let Some(step) = self.step_cost(base, next, mover) else {
                    continue;
                };

                let next_cost = cost.saturating_add(step);
                if next_cost > budget {
                    continue;
                }

                let next_parity = if diagonal { !parity } else { parity };
                let key = (next, next_parity);
                if next_cost < dist.get(&key).copied().unwrap_or(u32::MAX) {
                    dist.insert(key, next_cost);
                    heap.push(Reverse((next_cost, next.col, next.row, next_parity)));
                }
            }
        }

        dist
    }

    /// Every cell reachable within `budget` feet, mapped to its minimal
    /// cost (the minimum across both diagonal-parity states).
    pub fn reachable(
        &self,
        origin: GridPos,
        budget: u32,
        mover: &MoverProfile,
    ) -> HashMap<GridPos, u32> {
        let mut out: HashMap<GridPos, u32> = HashMap::new();
        for ((pos, _), cost) in self.shortest_costs(origin, budget, mover) {
            let entry = out.entry(pos).or_insert(cost);
            if cost < *entry {
                *entry = cost;
            }
        }
        out
    }

    /// Minimal cost from `origin` to `destination`, distinguishing a
    /// destination with no path at all from one that merely exceeds the
    /// budget. The caller charges nothing on any error.
    pub fn cost_between(
        &self,
        origin: GridPos,
        destination: GridPos,
        budget: u32,
        mover: &MoverProfile,
    ) -> Result<u32, MoveError> {
        if !self.contains(origin) {
            return Err(MoveError::OutOfBounds(origin));
        }
        if !self.contains(destination) {
            return Err(MoveError::OutOfBounds(destination));
        }
        if self.is_obstacle(destination) {
            return Err(MoveError::Blocked(destination));
        }

        // Search without the budget cutoff (the grid itself bounds the
        // search) so "too far" and "walled off" stay distinguishable.
        let costs = self.shortest_costs(origin, u32::MAX, mover);
        let best = [false, true]
            .iter()
            .filter_map(|&parity| costs.get(&(destination, parity)))
            .copied()
            .min();

        match best {
            None => Err(MoveError::NoPath(destination)),
            Some(required) if required > budget => Err(MoveError::InsufficientBudget {
                required,
                available: budget,
            }),
            Some(required) => Ok(required),
        }
    }
}
