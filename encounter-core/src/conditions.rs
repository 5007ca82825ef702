//! Condition catalog and per-combatant condition stacks.
//!
//! Conditions are non-stacking by kind — applying a kind replaces any
//! existing stack of that kind — with one exception: damage-over-time, where
//! several independent instances (a burn and a poison, say) run side by side.

use crate::dice::DicePool;
use lazy_static::lazy_static;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The fixed set of condition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    /// Time-boxed advantage marker; expires at the start of the bearer's turn.
    Advantage,
    /// Periodic damage; the only stacking kind.
    DamageOverTime,
}

/// Display metadata and turn-engine flags for one condition kind.
pub struct ConditionInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// The bearer's turn ends immediately after one duration decrement.
    pub skips_turn: bool,
    /// The bearer's movement budget is forced to zero.
    pub immobilizes: bool,
}

const fn info(
    name: &'static str,
    description: &'static str,
    skips_turn: bool,
    immobilizes: bool,
) -> ConditionInfo {
    ConditionInfo {
        name,
        description,
        skips_turn,
        immobilizes,
    }
}

lazy_static! {
    /// Static condition catalog: kind to display metadata and flags.
    static ref CATALOG: HashMap<ConditionKind, ConditionInfo> = HashMap::from([
        (ConditionKind::Blinded, info("Blinded",
            "Can't see; attack rolls against the creature have advantage.",
            false, false)),
        (ConditionKind::Charmed, info("Charmed",
            "Can't attack the charmer or target them with harmful effects.",
            false, false)),
        (ConditionKind::Deafened, info("Deafened",
            "Can't hear; automatically fails checks that require hearing.",
            false, false)),
        (ConditionKind::Frightened, info("Frightened",
            "Disadvantage while the source of fear is in sight; can't approach it.",
            false, false)),
        (ConditionKind::Grappled, info("Grappled",
            "Speed becomes 0 and can't benefit from any bonus to speed.",
            false, true)),
        (ConditionKind::Incapacitated, info("Incapacitated",
            "Can't take actions or reactions.",
            true, false)),
        (ConditionKind::Invisible, info("Invisible",
            "Impossible to see without magic; attack rolls against it have disadvantage.",
            false, false)),
        (ConditionKind::Paralyzed, info("Paralyzed",
            "Incapacitated and can't move or speak.",
            true, true)),
        (ConditionKind::Petrified, info("Petrified",
            "Transformed to stone; incapacitated and unaware of its surroundings.",
            true, true)),
        (ConditionKind::Poisoned, info("Poisoned",
            "Disadvantage on attack rolls and ability checks.",
            false, false)),
        (ConditionKind::Prone, info("Prone",
            "Only movement option is to crawl; melee attackers have advantage.",
            false, false)),
        (ConditionKind::Restrained, info("Restrained",
            "Speed becomes 0; attack rolls against the creature have advantage.",
            false, true)),
        (ConditionKind::Stunned, info("Stunned",
            "Incapacitated, can't move, and speaks only falteringly.",
            true, true)),
        (ConditionKind::Unconscious, info("Unconscious",
            "Incapacitated, prone, and unaware of its surroundings.",
            true, true)),
        (ConditionKind::Advantage, info("Advantage",
            "Next attack roll has advantage.",
            false, false)),
        (ConditionKind::DamageOverTime, info("Damage over time",
            "Takes rolled damage at the start of each of its turns.",
            false, false)),
    ]);
}

impl ConditionKind {
    pub fn all() -> [ConditionKind; 16] {
        [
            ConditionKind::Blinded,
            ConditionKind::Charmed,
            ConditionKind::Deafened,
            ConditionKind::Frightened,
            ConditionKind::Grappled,
            ConditionKind::Incapacitated,
            ConditionKind::Invisible,
            ConditionKind::Paralyzed,
            ConditionKind::Petrified,
            ConditionKind::Poisoned,
            ConditionKind::Prone,
            ConditionKind::Restrained,
            ConditionKind::Stunned,
            ConditionKind::Unconscious,
            ConditionKind::Advantage,
            ConditionKind::DamageOverTime,
        ]
    }

    pub fn info(&self) -> &'static ConditionInfo {
        &CATALOG[self]
    }

    pub fn name(&self) -> &'static str {
        self.info().name
    }

    pub fn description(&self) -> &'static str {
        self.info().description
    }

    /// The bearer's turn is skipped while this kind is active.
    pub fn skips_turn(&self) -> bool {
        self.info().skips_turn
    }

    /// The bearer's movement budget is forced to zero.
    pub fn immobilizes(&self) -> bool {
        self.info().immobilizes
    }

    /// Whether multiple simultaneous stacks of this kind may coexist.
    pub fn is_stacking(&self) -> bool {
        matches!(self, ConditionKind::DamageOverTime)
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Damage-over-time sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DotKind {
    Burn,
    Poison,
    Necrotic,
}

impl DotKind {
    pub fn name(&self) -> &'static str {
        match self {
            DotKind::Burn => "burn",
            DotKind::Poison => "poison",
            DotKind::Necrotic => "necrotic",
        }
    }
}

impl fmt::Display for DotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Stable identifier for one condition stack on one combatant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StackId(pub u64);

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Damage-over-time payload on a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotEffect {
    pub kind: DotKind,
    pub dice: DicePool,
}

/// One active condition instance on one combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionStack {
    pub id: StackId,
    pub kind: ConditionKind,
    /// `None` means indefinite: the stack never expires on its own.
    pub remaining_turns: Option<u32>,
    pub dot: Option<DotEffect>,
}

/// The result of decrementing skip-turn stacks at the start of a turn.
#[derive(Debug, Clone, Default)]
pub struct SkipTick {
    /// Skip-turn kinds present this turn (each decremented once if finite).
    pub triggered: Vec<ConditionKind>,
    /// Kinds whose last stack expired during the decrement.
    pub expired: Vec<ConditionKind>,
}

/// One stack's contribution to a damage-over-time tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotRoll {
    pub stack: StackId,
    pub kind: DotKind,
    pub amount: i32,
    pub expired: bool,
}

/// The summed result of a damage-over-time tick.
#[derive(Debug, Clone, Default)]
pub struct DotTick {
    pub total: i32,
    pub rolls: Vec<DotRoll>,
}

/// The ordered list of condition stacks on one combatant.
///
/// Stack ids are allocated monotonically per combatant and never reused, so
/// external collaborators can hold one across turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionSet {
    stacks: Vec<ConditionStack>,
    next_id: u64,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> StackId {
        let id = StackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Apply a condition kind. Non-stacking kinds replace any existing stack
    /// of the same kind; the stacking kind always appends.
    /// `remaining_turns: None` means indefinite.
    pub fn set(&mut self, kind: ConditionKind, remaining_turns: Option<u32>) -> StackId {
        if !kind.is_stacking() {
            self.stacks.retain(|s| s.kind != kind);
        }
        let id = self.alloc_id();
        self.stacks.push(ConditionStack {
            id,
            kind,
            remaining_turns,
            dot: None,
        });
        id
    }

    /// Append a damage-over-time stack. Periodic damage always has a finite
    /// duration; `turns` must be at least 1.
    pub fn add_dot(&mut self, kind: DotKind, dice: DicePool, turns: u32) -> StackId {
        let id = self.alloc_id();
        self.stacks.push(ConditionStack {
            id,
            kind: ConditionKind::DamageOverTime,
            remaining_turns: Some(turns.max(1)),
            dot: Some(DotEffect { kind, dice }),
        });
        id
    }

    /// Remove every stack of a kind. Returns how many were removed.
    pub fn remove_kind(&mut self, kind: ConditionKind) -> usize {
        let before = self.stacks.len();
        self.stacks.retain(|s| s.kind != kind);
        before - self.stacks.len()
    }

    /// Remove one stack by id. Returns the removed stack, if present.
    pub fn remove_stack(&mut self, id: StackId) -> Option<ConditionStack> {
        let pos = self.stacks.iter().position(|s| s.id == id)?;
        Some(self.stacks.remove(pos))
    }

    pub fn has(&self, kind: ConditionKind) -> bool {
        self.stacks.iter().any(|s| s.kind == kind)
    }

    pub fn get(&self, id: StackId) -> Option<&ConditionStack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConditionStack> {
        self.stacks.iter()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// End-of-turn tick: decrement every finite stack whose kind is not in
    /// `excluded`, removing stacks that reach zero. Indefinite stacks are
    /// never touched. Returns the kinds that expired this call.
    pub fn tick_end_of_turn(&mut self, excluded: &[ConditionKind]) -> Vec<ConditionKind> {
        let mut expired = Vec::new();
        self.stacks.retain_mut(|stack| {
            if excluded.contains(&stack.kind) {
                return true;
            }
            match stack.remaining_turns {
                None => true,
                Some(turns) => {
                    let left = turns.saturating_sub(1);
                    if left == 0 {
                        expired.push(stack.kind);
                        false
                    } else {
                        stack.remaining_turns = Some(left);
                        true
                    }
                }
            }
        });
        expired
    }

    /// Start-of-turn tick for skip-turn kinds: decrement each present
    /// skip-turn stack exactly once (indefinite stacks trigger the skip but
    /// keep their duration). The caller passes the triggered kinds to
    /// [`ConditionSet::tick_end_of_turn`] as exclusions to avoid a second
    /// decrement in the same turn.
    pub fn tick_skip_kinds(&mut self) -> SkipTick {
        let mut tick = SkipTick::default();
        self.stacks.retain_mut(|stack| {
            if !stack.kind.skips_turn() {
                return true;
            }
            if !tick.triggered.contains(&stack.kind) {
                tick.triggered.push(stack.kind);
            }
            match stack.remaining_turns {
                None => true,
                Some(turns) => {
                    let left = turns.saturating_sub(1);
                    if left == 0 {
                        tick.expired.push(stack.kind);
                        false
                    } else {
                        stack.remaining_turns = Some(left);
                        true
                    }
                }
            }
        });
        tick
    }

    /// Roll every damage-over-time stack, decrement its duration, and drop
    /// stacks that reached zero. The summed damage is the caller's to apply.
    pub fn roll_dots<R: Rng>(&mut self, rng: &mut R) -> DotTick {
        let mut tick = DotTick::default();
        self.stacks.retain_mut(|stack| {
            let Some(dot) = &stack.dot else { return true };
            let amount = dot.dice.roll_with(rng);
            // DoT durations are always finite; treat a missing one as spent.
            let left = stack.remaining_turns.unwrap_or(1).saturating_sub(1);
            let expired = left == 0;
            tick.total += amount;
            tick.rolls.push(DotRoll {
                stack: stack.id,
                kind: dot.kind,
                amount,
                expired,
            });
            if expired {
                false
            } else {
                stack.remaining_turns = Some(left);
                true
            }
        });
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::DieType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_catalog_flags() {
        assert!(ConditionKind::Stunned.skips_turn());
        assert!(ConditionKind::Stunned.immobilizes());
        assert!(ConditionKind::Incapacitated.skips_turn());
        assert!(!ConditionKind::Incapacitated.immobilizes());
        assert!(ConditionKind::Grappled.immobilizes());
        assert!(!ConditionKind::Grappled.skips_turn());
        assert!(!ConditionKind::Prone.skips_turn());
        assert!(ConditionKind::DamageOverTime.is_stacking());
    }

    #[test]
    fn test_set_replaces_same_kind() {
        let mut set = ConditionSet::new();
        set.set(ConditionKind::Prone, Some(3));
        let second = set.set(ConditionKind::Prone, Some(5));

        assert_eq!(set.len(), 1);
        let stack = set.get(second).unwrap();
        assert_eq!(stack.kind, ConditionKind::Prone);
        assert_eq!(stack.remaining_turns, Some(5));
    }

    #[test]
    fn test_dot_stacks_coexist() {
        let mut set = ConditionSet::new();
        set.add_dot(DotKind::Burn, DicePool::new().with(DieType::D6, 1), 3);
        set.add_dot(DotKind::Poison, DicePool::new().with(DieType::D4, 1), 2);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_tick_expires_after_exact_count() {
        let mut set = ConditionSet::new();
        set.set(ConditionKind::Blinded, Some(3));

        assert!(set.tick_end_of_turn(&[]).is_empty());
        assert!(set.tick_end_of_turn(&[]).is_empty());
        let expired = set.tick_end_of_turn(&[]);
        assert_eq!(expired, vec![ConditionKind::Blinded]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_indefinite_never_expires() {
        let mut set = ConditionSet::new();
        set.set(ConditionKind::Charmed, None);
        for _ in 0..50 {
            assert!(set.tick_end_of_turn(&[]).is_empty());
        }
        assert!(set.has(ConditionKind::Charmed));
    }

    #[test]
    fn test_excluded_kinds_not_ticked() {
        let mut set = ConditionSet::new();
        set.set(ConditionKind::Stunned, Some(1));
        set.set(ConditionKind::Blinded, Some(1));

        let expired = set.tick_end_of_turn(&[ConditionKind::Stunned]);
        assert_eq!(expired, vec![ConditionKind::Blinded]);
        assert!(set.has(ConditionKind::Stunned));
    }

    #[test]
    fn test_skip_tick_decrements_once() {
        let mut set = ConditionSet::new();
        set.set(ConditionKind::Stunned, Some(2));

        let tick = set.tick_skip_kinds();
        assert_eq!(tick.triggered, vec![ConditionKind::Stunned]);
        assert!(tick.expired.is_empty());
        assert_eq!(
            set.iter().next().unwrap().remaining_turns,
            Some(1)
        );

        let tick = set.tick_skip_kinds();
        assert_eq!(tick.expired, vec![ConditionKind::Stunned]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_skip_tick_keeps_indefinite() {
        let mut set = ConditionSet::new();
        set.set(ConditionKind::Paralyzed, None);
        let tick = set.tick_skip_kinds();
        assert_eq!(tick.triggered, vec![ConditionKind::Paralyzed]);
        assert!(tick.expired.is_empty());
        assert!(set.has(ConditionKind::Paralyzed));
    }

    #[test]
    fn test_roll_dots_decrements_and_expires() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut set = ConditionSet::new();
        set.add_dot(DotKind::Burn, DicePool::new().with(DieType::D6, 1), 2);

        let tick = set.roll_dots(&mut rng);
        assert_eq!(tick.rolls.len(), 1);
        assert!(tick.total >= 1 && tick.total <= 6);
        assert!(!tick.rolls[0].expired);
        assert_eq!(set.len(), 1);

        let tick = set.roll_dots(&mut rng);
        assert!(tick.rolls[0].expired);
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_stack_by_id() {
        let mut set = ConditionSet::new();
        let a = set.set(ConditionKind::Poisoned, Some(2));
        let b = set.add_dot(DotKind::Poison, DicePool::new().with(DieType::D4, 1), 2);
        assert!(a < b);

        assert!(set.remove_stack(a).is_some());
        assert!(set.remove_stack(a).is_none());
        assert_eq!(set.len(), 1);
    }
}
