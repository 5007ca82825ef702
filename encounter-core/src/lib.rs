//! Turn-based tabletop combat engine.
//!
//! This crate provides:
//! - Initiative ordering with deterministic tie-breaks and round/turn
//!   progression, including a bounded skip-turn resolution loop
//! - Condition lifecycle with finite/indefinite durations and stacking
//!   damage-over-time effects
//! - Concentration save tracking across damage instances
//! - A grid movement-cost model with alternating diagonals, terrain
//!   multipliers, and no corner-cutting
//!
//! # Quick Start
//!
//! ```ignore
//! use encounter_core::{Encounter, NewCombatant};
//!
//! let mut encounter = Encounter::new("Bridge Ambush");
//! let aela = encounter
//!     .add_combatant(NewCombatant::new("Aela", 24).with_initiative(17, false, Some(14)))?;
//! encounter
//!     .add_combatant(NewCombatant::new("Troll", 84).with_initiative(9, false, Some(13)))?;
//!
//! encounter.start();
//! assert_eq!(encounter.active(), Some(aela));
//!
//! encounter.apply_damage(aela, 6);
//! encounter.next_turn();
//! for event in encounter.log() {
//!     println!("{event}");
//! }
//! ```

pub mod combatant;
pub mod conditions;
pub mod dice;
pub mod engine;
pub mod events;
pub mod grid;
pub mod library;
pub mod persist;

// Primary public API
pub use combatant::{
    ActionSlot, Combatant, CombatantId, HitPoints, Initiative, MovementMode, OverlayId, Speed,
    TurnKey,
};
pub use conditions::{ConditionKind, ConditionSet, ConditionStack, DotKind, StackId};
pub use dice::{DiceError, DiceExpression, DicePool, DieType};
pub use engine::{Encounter, EngineError, NewCombatant, TurnState};
pub use events::Event;
pub use grid::{BattleGrid, GridPos, MoveError, MoverProfile, Terrain};
pub use library::{CombatantLibrary, CombatantTemplate};
pub use persist::{PersistError, SavedEncounter};
