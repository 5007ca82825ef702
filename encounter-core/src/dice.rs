//! Dice notation parsing and rolling.
//!
//! Supports standard notation (`2d6+3`, `1d8+1d4-1`) for user-entered
//! damage and healing amounts, plus [`DicePool`] for the per-tick dice of
//! damage-over-time effects.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Error type for dice parsing and rolling.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Flat modifiers are not allowed here: {0}")]
    ModifierNotAllowed(String),
}

/// Standard die types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            let count_str = &s[..d_pos];
            let sides_str = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };
            if count == 0 {
                return Err(DiceError::InvalidNotation(s.to_string()));
            }
            if sign < 0 {
                // Negative dice ("-1d4") have no sensible meaning for amounts.
                return Err(DiceError::InvalidNotation(s.to_string()));
            }

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            components.push(DiceComponent { count, die_type });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier += sign * value;
        }

        Ok(())
    }

    /// Roll the expression with the supplied RNG.
    pub fn roll_with<R: Rng>(&self, rng: &mut R) -> RollResult {
        let mut rolls = Vec::new();
        let mut total = self.modifier;

        for component in &self.components {
            for _ in 0..component.count {
                let roll = rng.gen_range(1..=component.die_type.sides()) as i32;
                rolls.push(roll);
                total += roll;
            }
        }

        RollResult {
            total,
            rolls,
            modifier: self.modifier,
            original: self.original.clone(),
        }
    }

    /// Roll the expression with the thread-local RNG.
    pub fn roll(&self) -> RollResult {
        self.roll_with(&mut rand::thread_rng())
    }

    /// Minimum possible total.
    pub fn minimum(&self) -> i32 {
        self.components.iter().map(|c| c.count as i32).sum::<i32>() + self.modifier
    }

    /// Maximum possible total.
    pub fn maximum(&self) -> i32 {
        self.components
            .iter()
            .map(|c| (c.count * c.die_type.sides()) as i32)
            .sum::<i32>()
            + self.modifier
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// The outcome of rolling a [`DiceExpression`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub total: i32,
    pub rolls: Vec<i32>,
    pub modifier: i32,
    pub original: String,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rolls = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} = [{}]", self.original, rolls)?;
        if self.modifier != 0 {
            write!(f, " {} {}", if self.modifier > 0 { "+" } else { "-" }, self.modifier.abs())?;
        }
        write!(f, " = {}", self.total)
    }
}

/// A bag of dice keyed by die size, rolled as one batch.
///
/// Damage-over-time stacks carry one of these per tick (e.g. a burn dealing
/// `1d6` and a lingering acid dealing `2d4` are two pools on two stacks).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicePool(BTreeMap<DieType, u32>);

impl DicePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style addition of `count` dice of one size.
    pub fn with(mut self, die: DieType, count: u32) -> Self {
        self.add(die, count);
        self
    }

    pub fn add(&mut self, die: DieType, count: u32) {
        if count > 0 {
            *self.0.entry(die).or_insert(0) += count;
        }
    }

    /// Parse pure-dice notation ("1d6", "2d4+1d8"). Flat modifiers are
    /// rejected: periodic damage is always rolled, never fixed.
    pub fn from_notation(notation: &str) -> Result<Self, DiceError> {
        let expr = DiceExpression::parse(notation)?;
        if expr.modifier != 0 {
            return Err(DiceError::ModifierNotAllowed(expr.original));
        }
        let mut pool = DicePool::new();
        for component in &expr.components {
            pool.add(component.die_type, component.count);
        }
        Ok(pool)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of dice in the pool.
    pub fn dice_count(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn roll_with<R: Rng>(&self, rng: &mut R) -> i32 {
        let mut total = 0;
        for (die, count) in &self.0 {
            for _ in 0..*count {
                total += rng.gen_range(1..=die.sides()) as i32;
            }
        }
        total
    }

    pub fn minimum(&self) -> i32 {
        self.dice_count() as i32
    }

    pub fn maximum(&self) -> i32 {
        self.0
            .iter()
            .map(|(die, count)| (die.sides() * count) as i32)
            .sum()
    }
}

impl fmt::Display for DicePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .0
            .iter()
            .map(|(die, count)| format!("{count}{die}"))
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join("+"))
    }
}
