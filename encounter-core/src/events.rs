//! Events emitted by the turn engine.
//!
//! The event log is a one-way feed for logging and UI collaborators; the
//! engine never reads it back and no correctness depends on it.

use crate::combatant::{CombatantId, OverlayId};
use crate::conditions::{ConditionKind, DotRoll, StackId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry in the combat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CombatStarted {
        combatants: usize,
    },
    RoundStarted {
        round: u32,
    },
    TurnStarted {
        id: CombatantId,
        name: String,
        round: u32,
        turn: u32,
    },
    TurnEnded {
        id: CombatantId,
        name: String,
    },
    TurnSkipped {
        id: CombatantId,
        name: String,
        kinds: Vec<ConditionKind>,
    },
    CombatantAdded {
        id: CombatantId,
        name: String,
    },
    CombatantRemoved {
        id: CombatantId,
        name: String,
    },
    CombatantDied {
        id: CombatantId,
        name: String,
    },
    DamageApplied {
        id: CombatantId,
        name: String,
        amount: i32,
        hp_remaining: i32,
    },
    HealingApplied {
        id: CombatantId,
        name: String,
        amount: i32,
        hp_remaining: i32,
    },
    ConditionApplied {
        id: CombatantId,
        name: String,
        kind: ConditionKind,
        stack: StackId,
        remaining_turns: Option<u32>,
    },
    ConditionRemoved {
        id: CombatantId,
        name: String,
        kind: ConditionKind,
    },
    ConditionExpired {
        id: CombatantId,
        name: String,
        kind: ConditionKind,
    },
    DotDamageRolled {
        id: CombatantId,
        name: String,
        total: i32,
        rolls: Vec<DotRoll>,
    },
    ConcentrationStarted {
        id: CombatantId,
        name: String,
        spell_level: Option<i32>,
    },
    ConcentrationSaveRequired {
        id: CombatantId,
        name: String,
        dc: i32,
        pending: u32,
    },
    ConcentrationMaintained {
        id: CombatantId,
        name: String,
    },
    ConcentrationLost {
        id: CombatantId,
        name: String,
        overlays: Vec<OverlayId>,
    },
    MovementCharged {
        id: CombatantId,
        name: String,
        cost: u32,
        remaining: u32,
    },
    /// The skip-resolution loop hit its safety bound and halted.
    SkipLoopHalted {
        iterations: usize,
    },
}

fn kind_list(kinds: &[ConditionKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::CombatStarted { combatants } => {
                write!(f, "Combat begins with {combatants} combatants!")
            }
            Event::RoundStarted { round } => write!(f, "Round {round} begins!"),
            Event::TurnStarted { name, round, .. } => {
                write!(f, "{name}'s turn begins (round {round}).")
            }
            Event::TurnEnded { name, .. } => write!(f, "{name}'s turn ends."),
            Event::TurnSkipped { name, kinds, .. } => {
                write!(f, "{name}'s turn is skipped ({}).", kind_list(kinds))
            }
            Event::CombatantAdded { name, .. } => write!(f, "{name} joins the combat."),
            Event::CombatantRemoved { name, .. } => write!(f, "{name} leaves the combat."),
            Event::CombatantDied { name, .. } => write!(f, "{name} falls!"),
            Event::DamageApplied {
                name,
                amount,
                hp_remaining,
                ..
            } => write!(f, "{name} takes {amount} damage ({hp_remaining} hp left)."),
            Event::HealingApplied {
                name,
                amount,
                hp_remaining,
                ..
            } => write!(f, "{name} regains {amount} hp ({hp_remaining} hp)."),
            Event::ConditionApplied {
                name,
                kind,
                remaining_turns,
                ..
            } => match remaining_turns {
                Some(turns) => write!(f, "{name} is {kind} for {turns} turns."),
                None => write!(f, "{name} is {kind}."),
            },
            Event::ConditionRemoved { name, kind, .. } => {
                write!(f, "{name} is no longer {kind}.")
            }
            Event::ConditionExpired { name, kind, .. } => {
                write!(f, "{kind} on {name} has worn off.")
            }
            Event::DotDamageRolled { name, total, rolls, .. } => {
                let parts = rolls
                    .iter()
                    .map(|r| format!("{} {}", r.amount, r.kind))
                    .collect::<Vec<_>>();
                write!(f, "{name} takes {total} ongoing damage ({}).", parts.join(", "))
            }
            Event::ConcentrationStarted {
                name, spell_level, ..
            } => match spell_level {
                Some(level) => write!(f, "{name} concentrates on a level {level} spell."),
                None => write!(f, "{name} starts concentrating."),
            },
            Event::ConcentrationSaveRequired {
                name, dc, pending, ..
            } => write!(
                f,
                "{name} must save to keep concentration (DC {dc}, {pending} pending)."
            ),
            Event::ConcentrationMaintained { name, .. } => {
                write!(f, "{name} maintains concentration.")
            }
            Event::ConcentrationLost { name, .. } => {
                write!(f, "{name} loses concentration.")
            }
            Event::MovementCharged {
                name,
                cost,
                remaining,
                ..
            } => write!(f, "{name} moves {cost} ft ({remaining} ft left)."),
            Event::SkipLoopHalted { iterations } => write!(
                f,
                "Every combatant is skipping; halted after {iterations} attempts."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lines() {
        let event = Event::RoundStarted { round: 3 };
        assert_eq!(event.to_string(), "Round 3 begins!");

        let event = Event::TurnSkipped {
            id: CombatantId(2),
            name: "Ogre".to_string(),
            kinds: vec![ConditionKind::Stunned],
        };
        assert_eq!(event.to_string(), "Ogre's turn is skipped (Stunned).");

        let event = Event::ConditionApplied {
            id: CombatantId(1),
            name: "Mage".to_string(),
            kind: ConditionKind::Prone,
            stack: StackId(0),
            remaining_turns: None,
        };
        assert_eq!(event.to_string(), "Mage is Prone.");
    }
}
