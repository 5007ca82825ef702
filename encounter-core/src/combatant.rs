//! Per-creature combat state: health, speeds, action economy, conditions,
//! exhaustion, and concentration.

use crate::conditions::ConditionSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a combatant, assigned sequentially by the engine
/// and never reused while combat is active.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier for an externally-owned map overlay bound to a concentration
/// effect. The engine never dereferences these; it only reports them for
/// release when concentration ends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OverlayId(pub u64);

/// Identifies one unique turn instance: the round plus the global turn
/// counter, which increases monotonically across the whole combat.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TurnKey {
    pub round: u32,
    pub turn: u32,
}

impl TurnKey {
    pub const ZERO: TurnKey = TurnKey { round: 0, turn: 0 };

    pub fn new(round: u32, turn: u32) -> Self {
        Self { round, turn }
    }
}

impl fmt::Display for TurnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}, turn {}", self.round, self.turn)
    }
}

/// Hit point tracking with a temporary pool absorbed before real damage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }

    /// Apply damage, draining the temporary pool first and clamping current
    /// health at zero.
    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let was_positive = self.current > 0;
        let mut remaining = amount.max(0);

        if self.temporary > 0 && remaining > 0 {
            if self.temporary >= remaining {
                self.temporary -= remaining;
                remaining = 0;
            } else {
                remaining -= self.temporary;
                self.temporary = 0;
            }
        }

        let before = self.current;
        self.current = (self.current - remaining).max(0);

        DamageResult {
            damage_taken: amount.max(0),
            reduced_health: self.current < before,
            dropped_to_zero: was_positive && self.current == 0,
        }
    }

    /// Heal up to the maximum; returns the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount.max(0)).min(self.maximum);
        self.current - old
    }

    pub fn add_temporary(&mut self, amount: i32) {
        // Temporary pools don't stack; keep the larger one.
        self.temporary = self.temporary.max(amount);
    }

    pub fn is_down(&self) -> bool {
        self.current == 0
    }
}

/// Result of applying damage to a [`HitPoints`] pool.
#[derive(Debug, Clone, Copy)]
pub struct DamageResult {
    pub damage_taken: i32,
    /// Current health actually went down (not fully absorbed by the
    /// temporary pool, and not already at zero).
    pub reduced_health: bool,
    /// Health crossed from a positive value to exactly zero.
    pub dropped_to_zero: bool,
}

/// The movement mode a combatant is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MovementMode {
    #[default]
    Ground,
    Swim,
    Burrow,
    Fly,
}

impl MovementMode {
    pub fn name(&self) -> &'static str {
        match self {
            MovementMode::Ground => "ground",
            MovementMode::Swim => "swim",
            MovementMode::Burrow => "burrow",
            MovementMode::Fly => "fly",
        }
    }
}

impl fmt::Display for MovementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Movement speed ratings in feet per turn. A rating of zero means the
/// combatant cannot use that mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speed {
    pub walk: u32,
    pub swim: u32,
    pub fly: u32,
    pub burrow: u32,
    pub climb: u32,
}

impl Speed {
    pub fn new(walk: u32) -> Self {
        Self {
            walk,
            swim: 0,
            fly: 0,
            burrow: 0,
            climb: 0,
        }
    }

    pub fn for_mode(&self, mode: MovementMode) -> u32 {
        match mode {
            MovementMode::Ground => self.walk,
            MovementMode::Swim => self.swim,
            MovementMode::Burrow => self.burrow,
            MovementMode::Fly => self.fly,
        }
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::new(30)
    }
}

/// A transient speed bonus that wears off after a number of turns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TempSpeedBonus {
    pub amount: u32,
    pub turns_remaining: u32,
}

/// Initiative roll data, used only for sort order and never mutated by the
/// turn engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Initiative {
    pub total: i32,
    /// An exceptional (natural maximum) roll breaks ties first.
    pub exceptional: bool,
    /// Raw dexterity score, the second tie-break.
    pub dexterity: Option<i32>,
}

impl Initiative {
    pub fn new(total: i32) -> Self {
        Self {
            total,
            exceptional: false,
            dexterity: None,
        }
    }
}

/// The four per-turn action economy slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionSlot {
    Action,
    BonusAction,
    Reaction,
    SpellCast,
}

impl ActionSlot {
    pub fn name(&self) -> &'static str {
        match self {
            ActionSlot::Action => "action",
            ActionSlot::BonusAction => "bonus action",
            ActionSlot::Reaction => "reaction",
            ActionSlot::SpellCast => "spell cast",
        }
    }
}

/// One action economy counter: uses available this turn plus extras banked
/// for the next reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActionCounter {
    pub available: u32,
    pub banked: u32,
}

impl Default for ActionCounter {
    fn default() -> Self {
        Self {
            available: 1,
            banked: 0,
        }
    }
}

impl ActionCounter {
    /// Start-of-turn reset: one base use plus any banked extras, which are
    /// one-shot and consumed here.
    pub fn reset(&mut self) {
        self.available = 1 + self.banked;
        self.banked = 0;
    }

    pub fn spend(&mut self) -> bool {
        if self.available > 0 {
            self.available -= 1;
            true
        } else {
            false
        }
    }

    pub fn grant_extra(&mut self, count: u32) {
        self.banked += count;
    }
}

/// Per-turn action economy: action, bonus action, reaction, and spell cast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionBudget {
    pub action: ActionCounter,
    pub bonus_action: ActionCounter,
    pub reaction: ActionCounter,
    pub spell_cast: ActionCounter,
}

impl ActionBudget {
    pub fn counter(&self, slot: ActionSlot) -> &ActionCounter {
        match slot {
            ActionSlot::Action => &self.action,
            ActionSlot::BonusAction => &self.bonus_action,
            ActionSlot::Reaction => &self.reaction,
            ActionSlot::SpellCast => &self.spell_cast,
        }
    }

    pub fn counter_mut(&mut self, slot: ActionSlot) -> &mut ActionCounter {
        match slot {
            ActionSlot::Action => &mut self.action,
            ActionSlot::BonusAction => &mut self.bonus_action,
            ActionSlot::Reaction => &mut self.reaction,
            ActionSlot::SpellCast => &mut self.spell_cast,
        }
    }

    pub fn reset_all(&mut self) {
        self.action.reset();
        self.bonus_action.reset();
        self.reaction.reset();
        self.spell_cast.reset();
    }
}

/// Active concentration on a spell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concentration {
    /// Spell level, driving the save difficulty.
    pub spell_level: Option<i32>,
    /// The turn at which concentration began.
    pub since: TurnKey,
    /// Externally-owned overlays released when concentration ends.
    pub overlays: Vec<OverlayId>,
}

impl Concentration {
    /// Save difficulty for this concentration: 10 plus the spell level.
    pub fn save_dc(&self) -> i32 {
        10 + self.spell_level.unwrap_or(0).max(0)
    }
}

/// One creature in combat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub hp: HitPoints,
    pub initiative: Initiative,
    pub speed: Speed,
    pub mode: MovementMode,
    pub temp_speed: Option<TempSpeedBonus>,
    /// Movement budget at the start of this turn.
    pub movement_total: u32,
    /// Movement budget left this turn; never exceeds `movement_total`.
    pub movement_remaining: u32,
    pub actions: ActionBudget,
    pub conditions: ConditionSet,
    exhaustion: u8,
    pub concentration: Option<Concentration>,
}

impl Combatant {
    pub fn new(id: CombatantId, name: impl Into<String>, max_hp: i32) -> Self {
        let speed = Speed::default();
        let walk = speed.walk;
        Self {
            id,
            name: name.into(),
            hp: HitPoints::new(max_hp),
            initiative: Initiative::default(),
            speed,
            mode: MovementMode::Ground,
            temp_speed: None,
            movement_total: walk,
            movement_remaining: walk,
            actions: ActionBudget::default(),
            conditions: ConditionSet::new(),
            exhaustion: 0,
            concentration: None,
        }
    }

    /// Speed usable this turn: the base rating for the current mode plus any
    /// temporary bonus, forced to zero by an immobilizing condition or by
    /// exhaustion level 5+.
    pub fn effective_speed(&self) -> u32 {
        if self.exhaustion >= 5 {
            return 0;
        }
        if self.conditions.iter().any(|s| s.kind.immobilizes()) {
            return 0;
        }
        let bonus = self.temp_speed.map(|b| b.amount).unwrap_or(0);
        self.speed.for_mode(self.mode) + bonus
    }

    /// Reset the movement budget to the effective speed.
    pub fn reset_movement(&mut self) {
        let speed = self.effective_speed();
        self.movement_total = speed;
        self.movement_remaining = speed;
    }

    /// Charge movement against the remaining budget. Fails without partial
    /// charge if the cost exceeds what's left.
    pub fn charge_movement(&mut self, cost: u32) -> bool {
        if cost <= self.movement_remaining {
            self.movement_remaining -= cost;
            true
        } else {
            false
        }
    }

    /// Start-of-turn reset: movement budget and all four action counters.
    pub fn begin_turn(&mut self) {
        self.reset_movement();
        self.actions.reset_all();
    }

    /// Count down the temporary speed bonus, clearing it when spent.
    pub fn tick_temp_speed(&mut self) {
        if let Some(bonus) = &mut self.temp_speed {
            bonus.turns_remaining = bonus.turns_remaining.saturating_sub(1);
            if bonus.turns_remaining == 0 {
                self.temp_speed = None;
            }
        }
    }

    pub fn exhaustion(&self) -> u8 {
        self.exhaustion
    }

    /// Set the exhaustion level, clamped to [0, 6].
    pub fn set_exhaustion(&mut self, level: u8) {
        self.exhaustion = level.min(6);
    }

    pub fn is_concentrating(&self) -> bool {
        self.concentration.is_some()
    }
}
