//! The combat turn engine.
//!
//! Owns the combatant roster, computes the display order, advances the
//! round/turn counters, runs start- and end-of-turn processing (including
//! damage-over-time and the skip-turn resolution loop), and tracks pending
//! concentration saves. Every operation is synchronous and runs to
//! completion before the next is accepted.

use crate::combatant::{
    ActionSlot, Combatant, CombatantId, Concentration, Initiative, MovementMode, Speed,
    TempSpeedBonus, TurnKey,
};
use crate::conditions::{ConditionKind, DotKind, StackId};
use crate::dice::DicePool;
use crate::events::Event;
use crate::grid::{BattleGrid, GridPos, MoveError, MoverProfile};
use crate::library::CombatantTemplate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extra skip-resolution iterations allowed past one full rotation before
/// the loop is forcibly halted.
const SKIP_LOOP_MARGIN: usize = 4;

/// Errors from engine commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("a combatant named \"{0}\" already exists")]
    DuplicateName(String),
}

/// Where the turn pointer stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TurnState {
    #[default]
    NotStarted,
    Active {
        active: CombatantId,
        round: u32,
        /// Global turn counter; increases monotonically across the combat.
        turn: u32,
    },
}

/// Initial data for a combatant joining the encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCombatant {
    pub name: String,
    pub max_hp: i32,
    pub speed: Speed,
    pub initiative: Initiative,
}

impl NewCombatant {
    pub fn new(name: impl Into<String>, max_hp: i32) -> Self {
        Self {
            name: name.into(),
            max_hp,
            speed: Speed::default(),
            initiative: Initiative::default(),
        }
    }

    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_initiative(
        mut self,
        total: i32,
        exceptional: bool,
        dexterity: Option<i32>,
    ) -> Self {
        self.initiative = Initiative {
            total,
            exceptional,
            dexterity,
        };
        self
    }
}

/// Saves still owed by one combatant for one turn key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingSaves {
    key: TurnKey,
    dc: i32,
    remaining: u32,
}

/// How start-of-turn processing for one combatant ended.
enum TurnStart {
    /// The combatant is up; play proceeds.
    Ready,
    /// A skip-turn condition is active; the listed kinds were already
    /// decremented and must be excluded from the end-of-turn tick.
    Skipped(Vec<ConditionKind>),
    /// Damage-over-time dropped the combatant to zero; it has been removed
    /// and the pointer re-targeted.
    Died,
}

/// One running combat encounter.
#[derive(Debug, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub name: String,
    combatants: Vec<Combatant>,
    state: TurnState,
    rotation_start: Option<CombatantId>,
    next_id: u32,
    pending_saves: HashMap<CombatantId, PendingSaves>,
    log: Vec<Event>,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
}

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

impl Encounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rng(name, entropy_rng())
    }

    /// Deterministic construction for tests and replays.
    pub fn with_seed(name: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(name, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, rng: StdRng) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            combatants: Vec::new(),
            state: TurnState::NotStarted,
            rotation_start: None,
            next_id: 1,
            pending_saves: HashMap::new(),
            log: Vec::new(),
            rng,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn active(&self) -> Option<CombatantId> {
        match self.state {
            TurnState::Active { active, .. } => Some(active),
            TurnState::NotStarted => None,
        }
    }

    pub fn round(&self) -> Option<u32> {
        match self.state {
            TurnState::Active { round, .. } => Some(round),
            TurnState::NotStarted => None,
        }
    }

    /// The current turn key, if combat has started.
    pub fn turn_key(&self) -> Option<TurnKey> {
        match self.state {
            TurnState::Active { round, turn, .. } => Some(TurnKey::new(round, turn)),
            TurnState::NotStarted => None,
        }
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    fn combatant_index(&self, id: CombatantId) -> Option<usize> {
        self.combatants.iter().position(|c| c.id == id)
    }

    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// The full combat log, oldest first.
    pub fn log(&self) -> &[Event] {
        &self.log
    }

    /// Pending concentration saves for a combatant: `(dc, remaining)`.
    pub fn pending_saves(&self, id: CombatantId) -> Option<(i32, u32)> {
        self.pending_saves.get(&id).map(|p| (p.dc, p.remaining))
    }

    /// The turn rotation: a stable sort on initiative total (descending),
    /// then the exceptional-roll flag, then raw dexterity, then name — a
    /// total order, so re-sorting an unchanged roster is deterministic.
    /// If a rotation-start marker is set, the order is rotated to begin
    /// there.
    pub fn display_order(&self) -> Vec<CombatantId> {
        let mut sorted: Vec<&Combatant> = self.combatants.iter().collect();
        sorted.sort_by(|a, b| {
            b.initiative
                .total
                .cmp(&a.initiative.total)
                .then_with(|| b.initiative.exceptional.cmp(&a.initiative.exceptional))
                .then_with(|| {
                    b.initiative
                        .dexterity
                        .unwrap_or(i32::MIN)
                        .cmp(&a.initiative.dexterity.unwrap_or(i32::MIN))
                })
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut order: Vec<CombatantId> = sorted.into_iter().map(|c| c.id).collect();
        if let Some(start) = self.rotation_start {
            if let Some(pos) = order.iter().position(|&id| id == start) {
                order.rotate_left(pos);
            }
        }
        order
    }

    // ========================================================================
    // Roster
    // ========================================================================

    pub fn add_combatant(&mut self, init: NewCombatant) -> Result<CombatantId, EngineError> {
        if self.combatants.iter().any(|c| c.name == init.name) {
            return Err(EngineError::DuplicateName(init.name));
        }

        let id = CombatantId(self.next_id);
        self.next_id += 1;

        let mut combatant = Combatant::new(id, init.name, init.max_hp);
        combatant.speed = init.speed;
        combatant.initiative = init.initiative;
        combatant.reset_movement();

        debug!(%id, name = %combatant.name, "combatant added");
        self.push(Event::CombatantAdded {
            id,
            name: combatant.name.clone(),
        });
        self.combatants.push(combatant);
        Ok(id)
    }

    /// Add a combatant from a library template plus a rolled initiative.
    pub fn add_from_template(
        &mut self,
        template: &CombatantTemplate,
        initiative_total: i32,
        exceptional: bool,
    ) -> Result<CombatantId, EngineError> {
        self.add_combatant(
            NewCombatant::new(&template.name, template.max_hp)
                .with_speed(template.speed.clone())
                .with_initiative(initiative_total, exceptional, template.dexterity),
        )
    }

    /// Rename a combatant; the new name must stay unique. Unknown ids are a
    /// no-op.
    pub fn rename(&mut self, id: CombatantId, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        if self
            .combatants
            .iter()
            .any(|c| c.id != id && c.name == name)
        {
            return Err(EngineError::DuplicateName(name));
        }
        if let Some(idx) = self.combatant_index(id) {
            self.combatants[idx].name = name;
        }
        Ok(())
    }

    /// Remove a combatant out-of-band (fled, banished, deleted by the user).
    /// If it was the active combatant, the pointer re-targets to the next
    /// survivor in the pre-removal display order.
    pub fn remove_combatant(&mut self, id: CombatantId) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        let order = self.display_order();
        let name = self.combatants[idx].name.clone();

        self.discard(id);
        self.push(Event::CombatantRemoved { id, name });
        self.retarget_after_removal(id, &order);
    }

    /// Shared removal bookkeeping: drop the record, pending saves, and the
    /// rotation marker if this combatant held it.
    fn discard(&mut self, id: CombatantId) {
        self.combatants.retain(|c| c.id != id);
        self.pending_saves.remove(&id);
        if self.rotation_start == Some(id) {
            self.rotation_start = None;
        }
    }

    fn retarget_after_removal(&mut self, removed: CombatantId, pre_removal_order: &[CombatantId]) {
        let TurnState::Active { active, round, turn } = self.state else {
            return;
        };
        if self.combatants.is_empty() {
            self.state = TurnState::NotStarted;
            return;
        }
        if active != removed {
            return;
        }

        let target = self
            .next_surviving(pre_removal_order, removed)
            .unwrap_or_else(|| {
                // Fall back to the first remaining combatant in order.
                self.display_order()[0]
            });
        self.state = TurnState::Active {
            active: target,
            round,
            turn,
        };
    }

    /// The next combatant after `removed` in `order` that still exists.
    fn next_surviving(&self, order: &[CombatantId], removed: CombatantId) -> Option<CombatantId> {
        let pos = order.iter().position(|&id| id == removed)?;
        (1..order.len())
            .map(|offset| order[(pos + offset) % order.len()])
            .find(|&id| self.combatant_index(id).is_some())
    }

    /// Choose the combatant the rotation starts at, or clear the marker.
    pub fn set_rotation_start(&mut self, id: Option<CombatantId>) {
        self.rotation_start = match id {
            Some(id) if self.combatant_index(id).is_some() => Some(id),
            _ => None,
        };
    }

    // ========================================================================
    // Turn progression
    // ========================================================================

    /// Start (or restart) combat: recompute the rotation, reset the round
    /// and turn counters, and run start-of-turn processing on the first
    /// combatant. A no-op on an empty roster.
    pub fn start(&mut self) {
        let order = self.display_order();
        let Some(&first) = order.first() else {
            return;
        };

        info!(encounter = %self.name, combatants = order.len(), "combat started");
        self.pending_saves.clear();
        self.state = TurnState::Active {
            active: first,
            round: 1,
            turn: 1,
        };
        self.push(Event::CombatStarted {
            combatants: order.len(),
        });
        self.run_turn_start();
    }

    /// End the active combatant's turn and begin the next one, wrapping into
    /// a new round at the end of the rotation. A no-op before combat starts.
    pub fn next_turn(&mut self) {
        let TurnState::Active { active, .. } = self.state else {
            return;
        };
        self.process_turn_end(active, &[]);
        if self.advance_pointer() {
            self.run_turn_start();
        }
    }

    /// Rewind the turn pointer one step, wrapping backwards (the round is
    /// floored at 1). A pure pointer move for correcting a mis-click: no
    /// start-of-turn effects are re-applied and nothing that already
    /// happened is undone, so this is not the inverse of
    /// [`Encounter::next_turn`].
    pub fn prev_turn(&mut self) {
        let TurnState::Active { active, round, turn } = self.state else {
            return;
        };
        let order = self.display_order();
        if order.is_empty() {
            return;
        }

        let pos = order.iter().position(|&id| id == active).unwrap_or(0);
        let (prev_pos, prev_round) = if pos == 0 {
            (order.len() - 1, round.saturating_sub(1).max(1))
        } else {
            (pos - 1, round)
        };

        self.state = TurnState::Active {
            active: order[prev_pos],
            round: prev_round,
            turn,
        };
    }

    /// Jump the turn pointer to a specific combatant and run start-of-turn
    /// processing there. No-op if combat hasn't started or the id is gone.
    pub fn set_turn(&mut self, id: CombatantId) {
        let TurnState::Active { round, turn, .. } = self.state else {
            return;
        };
        if self.combatant_index(id).is_none() {
            return;
        }

        // A fresh turn instance: bump the counter so the key is unique.
        self.state = TurnState::Active {
            active: id,
            round,
            turn: turn + 1,
        };
        self.abandon_stale_saves();
        self.run_turn_start();
    }

    /// Advance the pointer one step in display order, wrapping into a new
    /// round. Returns false when there is nothing to advance to.
    fn advance_pointer(&mut self) -> bool {
        let TurnState::Active { active, round, turn } = self.state else {
            return false;
        };
        let order = self.display_order();
        if order.is_empty() {
            self.state = TurnState::NotStarted;
            return false;
        }

        let pos = order.iter().position(|&id| id == active).unwrap_or(0);
        let next_pos = (pos + 1) % order.len();
        let mut round = round;
        if next_pos == 0 {
            round += 1;
            self.push(Event::RoundStarted { round });
        }

        self.state = TurnState::Active {
            active: order[next_pos],
            round,
            turn: turn + 1,
        };
        self.abandon_stale_saves();
        true
    }

    /// Pending save counters are scoped to one turn key; drop the rest.
    fn abandon_stale_saves(&mut self) {
        let Some(key) = self.turn_key() else {
            self.pending_saves.clear();
            return;
        };
        self.pending_saves.retain(|_, p| p.key == key);
    }

    /// Run start-of-turn processing on the active combatant, resolving
    /// skipped turns by looping to the next combatant. The loop is capped at
    /// one full rotation plus a fixed margin so that a roster of permanently
    /// skip-locked combatants halts instead of spinning forever.
    fn run_turn_start(&mut self) {
        let cap = self.display_order().len() + SKIP_LOOP_MARGIN;
        let mut iterations = 0;

        loop {
            iterations += 1;
            if iterations > cap {
                warn!(iterations = iterations - 1, "skip resolution hit its bound; halting");
                self.push(Event::SkipLoopHalted {
                    iterations: iterations - 1,
                });
                return;
            }

            let TurnState::Active { active, .. } = self.state else {
                return;
            };
            match self.process_turn_start(active) {
                TurnStart::Ready => return,
                TurnStart::Died => {
                    // The pointer was re-targeted during removal; the new
                    // combatant's turn begins on the next pass.
                    if matches!(self.state, TurnState::NotStarted) {
                        return;
                    }
                }
                TurnStart::Skipped(kinds) => {
                    self.process_turn_end(active, &kinds);
                    if !self.advance_pointer() {
                        return;
                    }
                }
            }
        }
    }

    /// Start-of-turn processing for one combatant: reset movement and
    /// action economy, clear stale save prompts, expire the advantage
    /// marker, apply damage-over-time, then check for skip-turn conditions.
    fn process_turn_start(&mut self, id: CombatantId) -> TurnStart {
        let Some(idx) = self.combatant_index(id) else {
            return TurnStart::Ready;
        };
        let key = self.turn_key().unwrap_or(TurnKey::ZERO);

        // Any prompt left over from a previous visit is dead.
        self.pending_saves.remove(&id);

        self.combatants[idx].begin_turn();

        if self.combatants[idx]
            .conditions
            .remove_kind(ConditionKind::Advantage)
            > 0
        {
            let name = self.combatants[idx].name.clone();
            self.push(Event::ConditionExpired {
                id,
                name,
                kind: ConditionKind::Advantage,
            });
        }

        let name = self.combatants[idx].name.clone();
        self.push(Event::TurnStarted {
            id,
            name,
            round: key.round,
            turn: key.turn,
        });

        // Damage-over-time ticks even if the turn is about to be skipped.
        let dot = self.combatants[idx].conditions.roll_dots(&mut self.rng);
        if !dot.rolls.is_empty() {
            let name = self.combatants[idx].name.clone();
            for _ in dot.rolls.iter().filter(|r| r.expired) {
                self.push(Event::ConditionExpired {
                    id,
                    name: name.clone(),
                    kind: ConditionKind::DamageOverTime,
                });
            }
            debug!(%id, total = dot.total, "damage over time rolled");
            self.push(Event::DotDamageRolled {
                id,
                name,
                total: dot.total,
                rolls: dot.rolls.clone(),
            });

            if dot.total > 0 {
                let result = self.combatants[idx].hp.take_damage(dot.total);
                let name = self.combatants[idx].name.clone();
                self.push(Event::DamageApplied {
                    id,
                    name,
                    amount: dot.total,
                    hp_remaining: self.combatants[idx].hp.current,
                });
                if result.dropped_to_zero {
                    self.remove_dead(id);
                    return TurnStart::Died;
                }
                if result.reduced_health && self.combatants[idx].is_concentrating() {
                    self.queue_concentration_save(id, key);
                }
            }
        }

        let tick = self.combatants[idx].conditions.tick_skip_kinds();
        let name = self.combatants[idx].name.clone();
        for kind in &tick.expired {
            self.push(Event::ConditionExpired {
                id,
                name: name.clone(),
                kind: *kind,
            });
        }
        if !tick.triggered.is_empty() {
            self.push(Event::TurnSkipped {
                id,
                name,
                kinds: tick.triggered.clone(),
            });
            return TurnStart::Skipped(tick.triggered);
        }

        TurnStart::Ready
    }

    /// End-of-turn processing: tick condition durations (excluding any
    /// skip-turn kinds already decremented this turn), reset the movement
    /// budget, and count down the temporary speed bonus.
    fn process_turn_end(&mut self, id: CombatantId, excluded: &[ConditionKind]) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };

        let expired = self.combatants[idx].conditions.tick_end_of_turn(excluded);
        let name = self.combatants[idx].name.clone();
        for kind in expired {
            self.push(Event::ConditionExpired {
                id,
                name: name.clone(),
                kind,
            });
        }

        let combatant = &mut self.combatants[idx];
        combatant.reset_movement();
        combatant.tick_temp_speed();
        self.push(Event::TurnEnded { id, name });
    }

    /// Death removal: triggered the instant health crosses to zero. The
    /// pointer re-targets using the pre-removal display order.
    fn remove_dead(&mut self, id: CombatantId) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        let order = self.display_order();
        let name = self.combatants[idx].name.clone();

        info!(%id, %name, "combatant died");
        self.discard(id);
        self.push(Event::CombatantDied { id, name });
        self.retarget_after_removal(id, &order);
    }

    // ========================================================================
    // Damage, healing, conditions
    // ========================================================================

    /// Apply validated damage. Health is clamped at zero; crossing from
    /// positive to zero kills and removes the combatant immediately; damage
    /// that actually reduces health while concentrating queues a save.
    pub fn apply_damage(&mut self, id: CombatantId, amount: i32) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        if amount <= 0 {
            return;
        }
        let key = self.turn_key().unwrap_or(TurnKey::ZERO);

        let result = self.combatants[idx].hp.take_damage(amount);
        let name = self.combatants[idx].name.clone();
        self.push(Event::DamageApplied {
            id,
            name,
            amount,
            hp_remaining: self.combatants[idx].hp.current,
        });

        if result.dropped_to_zero {
            self.remove_dead(id);
            return;
        }
        if result.reduced_health && self.combatants[idx].is_concentrating() {
            self.queue_concentration_save(id, key);
        }
    }

    /// Apply validated healing, capped at the maximum.
    pub fn heal(&mut self, id: CombatantId, amount: i32) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        if amount <= 0 {
            return;
        }
        let healed = self.combatants[idx].hp.heal(amount);
        let name = self.combatants[idx].name.clone();
        self.push(Event::HealingApplied {
            id,
            name,
            amount: healed,
            hp_remaining: self.combatants[idx].hp.current,
        });
    }

    pub fn grant_temporary_hp(&mut self, id: CombatantId, amount: i32) {
        if let Some(idx) = self.combatant_index(id) {
            self.combatants[idx].hp.add_temporary(amount.max(0));
        }
    }

    /// Apply a condition kind with an optional duration in turns (`None`
    /// lasts until removed). Unknown ids are a no-op.
    pub fn set_condition(
        &mut self,
        id: CombatantId,
        kind: ConditionKind,
        remaining_turns: Option<u32>,
    ) -> Option<StackId> {
        let idx = self.combatant_index(id)?;
        let stack = self.combatants[idx].conditions.set(kind, remaining_turns);
        let name = self.combatants[idx].name.clone();
        self.push(Event::ConditionApplied {
            id,
            name,
            kind,
            stack,
            remaining_turns,
        });
        Some(stack)
    }

    /// Attach a damage-over-time stack (burn, poison, ...) rolling `dice`
    /// at the start of each of the combatant's turns for `turns` turns.
    pub fn add_damage_over_time(
        &mut self,
        id: CombatantId,
        kind: DotKind,
        dice: DicePool,
        turns: u32,
    ) -> Option<StackId> {
        let idx = self.combatant_index(id)?;
        let stack = self.combatants[idx].conditions.add_dot(kind, dice, turns);
        let name = self.combatants[idx].name.clone();
        self.push(Event::ConditionApplied {
            id,
            name,
            kind: ConditionKind::DamageOverTime,
            stack,
            remaining_turns: Some(turns.max(1)),
        });
        Some(stack)
    }

    /// Remove every stack of a kind. No-op when absent or unknown.
    pub fn remove_condition(&mut self, id: CombatantId, kind: ConditionKind) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        if self.combatants[idx].conditions.remove_kind(kind) > 0 {
            let name = self.combatants[idx].name.clone();
            self.push(Event::ConditionRemoved { id, name, kind });
        }
    }

    /// Remove one stack by its stable id. No-op when absent or unknown.
    pub fn remove_condition_stack(&mut self, id: CombatantId, stack: StackId) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        if let Some(removed) = self.combatants[idx].conditions.remove_stack(stack) {
            let name = self.combatants[idx].name.clone();
            self.push(Event::ConditionRemoved {
                id,
                name,
                kind: removed.kind,
            });
        }
    }

    pub fn set_exhaustion(&mut self, id: CombatantId, level: u8) {
        if let Some(idx) = self.combatant_index(id) {
            self.combatants[idx].set_exhaustion(level);
        }
    }

    // ========================================================================
    // Action economy and speed
    // ========================================================================

    /// Spend one use of an action economy slot this turn.
    pub fn spend_action(&mut self, id: CombatantId, slot: ActionSlot) -> bool {
        match self.combatant_index(id) {
            Some(idx) => self.combatants[idx].actions.counter_mut(slot).spend(),
            None => false,
        }
    }

    /// Bank extra uses of a slot for the combatant's next turn reset.
    pub fn grant_extra_action(&mut self, id: CombatantId, slot: ActionSlot, count: u32) {
        if let Some(idx) = self.combatant_index(id) {
            self.combatants[idx]
                .actions
                .counter_mut(slot)
                .grant_extra(count);
        }
    }

    /// Grant a temporary speed bonus lasting `turns` of the bearer's turns.
    pub fn add_speed_bonus(&mut self, id: CombatantId, amount: u32, turns: u32) {
        if let Some(idx) = self.combatant_index(id) {
            self.combatants[idx].temp_speed = Some(TempSpeedBonus {
                amount,
                turns_remaining: turns.max(1),
            });
        }
    }

    /// Switch the movement mode. The budget is recomputed at the next turn
    /// start; the remaining budget for the current turn is left untouched.
    pub fn set_movement_mode(&mut self, id: CombatantId, mode: MovementMode) {
        if let Some(idx) = self.combatant_index(id) {
            self.combatants[idx].mode = mode;
        }
    }

    // ========================================================================
    // Concentration
    // ========================================================================

    /// Begin concentrating on a spell, replacing (and releasing) any prior
    /// concentration first.
    pub fn begin_concentration(&mut self, id: CombatantId, spell_level: Option<i32>) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        if self.combatants[idx].is_concentrating() {
            self.end_concentration(id);
        }
        let key = self.turn_key().unwrap_or(TurnKey::ZERO);
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        self.combatants[idx].concentration = Some(Concentration {
            spell_level,
            since: key,
            overlays: Vec::new(),
        });
        let name = self.combatants[idx].name.clone();
        self.push(Event::ConcentrationStarted {
            id,
            name,
            spell_level,
        });
    }

    /// Bind an externally-owned overlay to the combatant's concentration so
    /// it is released when concentration ends.
    pub fn bind_overlay(&mut self, id: CombatantId, overlay: crate::combatant::OverlayId) {
        if let Some(idx) = self.combatant_index(id) {
            if let Some(conc) = &mut self.combatants[idx].concentration {
                conc.overlays.push(overlay);
            }
        }
    }

    /// End concentration, releasing bound overlays. Idempotent: ending an
    /// already-ended concentration is a no-op.
    pub fn end_concentration(&mut self, id: CombatantId) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        if let Some(conc) = self.combatants[idx].concentration.take() {
            let name = self.combatants[idx].name.clone();
            self.push(Event::ConcentrationLost {
                id,
                name,
                overlays: conc.overlays,
            });
        }
        self.pending_saves.remove(&id);
    }

    /// Record that a concentrating combatant took damage "now": each
    /// damaging hit within the same turn key demands one more save. If the
    /// combatant is already at zero health, concentration simply ends.
    fn queue_concentration_save(&mut self, id: CombatantId, key: TurnKey) {
        let Some(idx) = self.combatant_index(id) else {
            return;
        };
        let Some(conc) = &self.combatants[idx].concentration else {
            return;
        };
        if self.combatants[idx].hp.is_down() {
            self.end_concentration(id);
            return;
        }

        let dc = conc.save_dc();
        let entry = self.pending_saves.entry(id).or_insert(PendingSaves {
            key,
            dc,
            remaining: 0,
        });
        if entry.key != key {
            // A stale counter from an earlier key is abandoned, not carried.
            *entry = PendingSaves {
                key,
                dc,
                remaining: 0,
            };
        }
        entry.remaining += 1;
        let pending = entry.remaining;

        let name = self.combatants[idx].name.clone();
        self.push(Event::ConcentrationSaveRequired {
            id,
            name,
            dc,
            pending,
        });
    }

    /// Resolve one pending concentration save. A failure ends concentration
    /// and abandons the whole queue; a success decrements it. With nothing
    /// pending this is a no-op.
    pub fn resolve_concentration_save(&mut self, id: CombatantId, passed: bool) {
        let Some(pending) = self.pending_saves.get_mut(&id) else {
            return;
        };

        if !passed {
            self.pending_saves.remove(&id);
            self.end_concentration(id);
            return;
        }

        pending.remaining = pending.remaining.saturating_sub(1);
        if pending.remaining == 0 {
            self.pending_saves.remove(&id);
            if let Some(idx) = self.combatant_index(id) {
                let name = self.combatants[idx].name.clone();
                self.push(Event::ConcentrationMaintained { id, name });
            }
        }
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// Validate a proposed move on the grid and charge the cost against the
    /// combatant's remaining budget. Rejected moves (no path, insufficient
    /// budget) charge nothing.
    pub fn propose_move(
        &mut self,
        id: CombatantId,
        grid: &BattleGrid,
        origin: GridPos,
        destination: GridPos,
    ) -> Result<u32, MoveError> {
        let Some(idx) = self.combatant_index(id) else {
            return Err(MoveError::UnknownMover(id));
        };
        let combatant = &self.combatants[idx];
        let mover = MoverProfile {
            mode: combatant.mode,
            walk_speed: combatant.speed.walk,
            swim_speed: combatant.speed.swim,
        };

        let cost = grid.cost_between(origin, destination, combatant.movement_remaining, &mover)?;
        let combatant = &mut self.combatants[idx];
        combatant.charge_movement(cost);
        let remaining = combatant.movement_remaining;
        let name = combatant.name.clone();
        self.push(Event::MovementCharged {
            id,
            name,
            cost,
            remaining,
        });
        Ok(cost)
    }

    fn push(&mut self, event: Event) {
        self.log.push(event);
    }
}
