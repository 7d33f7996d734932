//! Dice rolls.
//!
//! A [`RollBuilder`] is an immutable description of a roll: each method
//! consumes the builder and returns a new one, so a partially configured
//! builder can be cloned and branched. [`RollBuilder::build`] validates it
//! into a [`RollSpec`], which can be rolled any number of times.
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//! use tavern_core::dice::RollBuilder;
//!
//! let base = RollBuilder::new().dice(4, 6);
//! let stats = base.clone().keep_highest(3);
//! let damage = base.plus(2);
//!
//! let mut rng = SmallRng::seed_from_u64(1);
//! if let (Ok(stats), Ok(damage)) = (stats.build(), damage.build()) {
//!     assert_eq!(stats.expression(), "4d6kh3");
//!     assert_eq!(damage.expression(), "4d6+2");
//!     let outcome = stats.roll(&mut rng);
//!     assert_eq!(outcome.kept.len(), 3);
//! }
//! ```

use rand::Rng;
use serde::Serialize;

/// Most dice a single roll may throw.
pub const MAX_DICE: u32 = 100;
/// Most faces a die may have.
pub const MAX_SIDES: u32 = 1000;

/// A roll description that cannot be rolled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    /// Dice count outside `1..=MAX_DICE`.
    #[error("dice count must be between 1 and {MAX_DICE}, got {count}")]
    InvalidCount {
        /// The rejected count.
        count: u32,
    },

    /// Die size outside `2..=MAX_SIDES`.
    #[error("a die must have between 2 and {MAX_SIDES} sides, got {sides}")]
    InvalidSides {
        /// The rejected number of sides.
        sides: u32,
    },

    /// Asked to keep zero dice or more dice than are thrown.
    #[error("cannot keep {keep} of {count} dice")]
    InvalidKeep {
        /// Dice to keep.
        keep: u32,
        /// Dice thrown.
        count: u32,
    },
}

/// Which dice count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Keep {
    /// Every die.
    All,
    /// The `n` highest dice.
    Highest(u32),
    /// The `n` lowest dice.
    Lowest(u32),
}

/// Immutable roll builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollBuilder {
    count: u32,
    sides: u32,
    modifier: i32,
    keep: Keep,
}

impl Default for RollBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RollBuilder {
    /// A single d20 with no modifier.
    pub const fn new() -> Self {
        Self {
            count: 1,
            sides: 20,
            modifier: 0,
            keep: Keep::All,
        }
    }

    /// Throw `count` dice with `sides` faces each.
    #[must_use]
    pub const fn dice(self, count: u32, sides: u32) -> Self {
        Self {
            count,
            sides,
            ..self
        }
    }

    /// Add `modifier` to the total. Repeated calls accumulate.
    #[must_use]
    pub const fn plus(self, modifier: i32) -> Self {
        Self {
            modifier: self.modifier.saturating_add(modifier),
            ..self
        }
    }

    /// Keep only the `n` highest dice.
    #[must_use]
    pub const fn keep_highest(self, n: u32) -> Self {
        Self {
            keep: Keep::Highest(n),
            ..self
        }
    }

    /// Keep only the `n` lowest dice.
    #[must_use]
    pub const fn keep_lowest(self, n: u32) -> Self {
        Self {
            keep: Keep::Lowest(n),
            ..self
        }
    }

    /// Roll 2d20 and keep the higher.
    #[must_use]
    pub const fn advantage(self) -> Self {
        self.dice(2, 20).keep_highest(1)
    }

    /// Roll 2d20 and keep the lower.
    #[must_use]
    pub const fn disadvantage(self) -> Self {
        self.dice(2, 20).keep_lowest(1)
    }

    /// Validate into a rollable spec.
    ///
    /// # Errors
    ///
    /// Returns [`DiceError`] if the count, sides or keep rule is out of
    /// range.
    pub const fn build(self) -> Result<RollSpec, DiceError> {
        if self.count == 0 || self.count > MAX_DICE {
            return Err(DiceError::InvalidCount { count: self.count });
        }
        if self.sides < 2 || self.sides > MAX_SIDES {
            return Err(DiceError::InvalidSides { sides: self.sides });
        }
        if let Keep::Highest(keep) | Keep::Lowest(keep) = self.keep {
            if keep == 0 || keep > self.count {
                return Err(DiceError::InvalidKeep {
                    keep,
                    count: self.count,
                });
            }
        }
        Ok(RollSpec {
            count: self.count,
            sides: self.sides,
            modifier: self.modifier,
            keep: self.keep,
        })
    }
}

/// A validated roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollSpec {
    count: u32,
    sides: u32,
    modifier: i32,
    keep: Keep,
}

/// The result of rolling a [`RollSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollOutcome {
    /// Every face rolled, in order.
    pub rolls: Vec<u32>,
    /// The faces that counted.
    pub kept: Vec<u32>,
    /// Flat modifier applied.
    pub modifier: i32,
    /// Sum of kept faces plus the modifier.
    pub total: i32,
}

impl RollSpec {
    /// Number of dice thrown.
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Faces per die.
    pub const fn sides(&self) -> u32 {
        self.sides
    }

    /// Flat modifier.
    pub const fn modifier(&self) -> i32 {
        self.modifier
    }

    /// Dice notation, e.g. `2d20kh1+5`.
    pub fn expression(&self) -> String {
        let mut expression = format!("{}d{}", self.count, self.sides);
        match self.keep {
            Keep::All => {}
            Keep::Highest(n) => expression.push_str(&format!("kh{n}")),
            Keep::Lowest(n) => expression.push_str(&format!("kl{n}")),
        }
        match self.modifier {
            0 => {}
            m if m > 0 => expression.push_str(&format!("+{m}")),
            m => expression.push_str(&m.to_string()),
        }
        expression
    }

    /// Lowest possible total.
    pub fn min_total(&self) -> i32 {
        let kept = match self.keep {
            Keep::All => self.count,
            Keep::Highest(n) | Keep::Lowest(n) => n,
        };
        i32::try_from(kept)
            .unwrap_or(i32::MAX)
            .saturating_add(self.modifier)
    }

    /// Highest possible total.
    pub fn max_total(&self) -> i32 {
        let kept = match self.keep {
            Keep::All => self.count,
            Keep::Highest(n) | Keep::Lowest(n) => n,
        };
        i32::try_from(kept.saturating_mul(self.sides))
            .unwrap_or(i32::MAX)
            .saturating_add(self.modifier)
    }

    /// Throw the dice.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> RollOutcome {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.random_range(1..=self.sides))
            .collect();

        let mut kept = rolls.clone();
        match self.keep {
            Keep::All => {}
            Keep::Highest(n) => {
                kept.sort_unstable_by(|a, b| b.cmp(a));
                kept.truncate(usize::try_from(n).unwrap_or(usize::MAX));
            }
            Keep::Lowest(n) => {
                kept.sort_unstable();
                kept.truncate(usize::try_from(n).unwrap_or(usize::MAX));
            }
        }

        let sum = kept
            .iter()
            .fold(0_u32, |acc, &face| acc.saturating_add(face));
        let total = i32::try_from(sum)
            .unwrap_or(i32::MAX)
            .saturating_add(self.modifier);

        RollOutcome {
            rolls,
            kept,
            modifier: self.modifier,
            total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn builder_is_immutable_and_branchable() {
        let base = RollBuilder::new().dice(3, 8);
        let with_bonus = base.plus(4);
        assert_eq!(base.build().unwrap().modifier(), 0);
        assert_eq!(with_bonus.build().unwrap().modifier(), 4);
        assert_eq!(with_bonus.plus(-1).build().unwrap().modifier(), 3);
    }

    #[test]
    fn expression_formatting() {
        assert_eq!(RollBuilder::new().build().unwrap().expression(), "1d20");
        let advantage = RollBuilder::new().advantage().plus(5).build().unwrap();
        assert_eq!(advantage.expression(), "2d20kh1+5");
        let disadvantage = RollBuilder::new().disadvantage().plus(-2);
        assert_eq!(disadvantage.build().unwrap().expression(), "2d20kl1-2");
    }

    #[test]
    fn invalid_specs_are_rejected() {
        assert_eq!(
            RollBuilder::new().dice(0, 6).build(),
            Err(DiceError::InvalidCount { count: 0 })
        );
        assert_eq!(
            RollBuilder::new().dice(1, 1).build(),
            Err(DiceError::InvalidSides { sides: 1 })
        );
        assert_eq!(
            RollBuilder::new().dice(2, 6).keep_highest(3).build(),
            Err(DiceError::InvalidKeep { keep: 3, count: 2 })
        );
    }

    #[test]
    fn rolls_stay_in_range() {
        let spec = RollBuilder::new().dice(10, 6).plus(1).build().unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..50 {
            let outcome = spec.roll(&mut rng);
            assert_eq!(outcome.rolls.len(), 10);
            assert!(outcome.rolls.iter().all(|face| (1..=6).contains(face)));
            assert!(outcome.total >= spec.min_total());
            assert!(outcome.total <= spec.max_total());
        }
    }

    #[test]
    fn keep_highest_takes_the_best() {
        let spec = RollBuilder::new()
            .dice(4, 6)
            .keep_highest(3)
            .build()
            .unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let outcome = spec.roll(&mut rng);
        let mut sorted = outcome.rolls.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.truncate(3);
        assert_eq!(outcome.kept, sorted);
        let expected: u32 = sorted.iter().sum();
        assert_eq!(outcome.total, i32::try_from(expected).unwrap());
    }

    #[test]
    fn same_seed_same_outcome() {
        let spec = RollBuilder::new().dice(5, 12).build().unwrap();
        let first = spec.roll(&mut SmallRng::seed_from_u64(3));
        let second = spec.roll(&mut SmallRng::seed_from_u64(3));
        assert_eq!(first, second);
    }
}
