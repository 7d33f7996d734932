//! Structural checks on character data before a mutation is committed.
//!
//! Every rule is evaluated; the caller gets the full list of violations
//! rather than the first one.

use serde::Serialize;

use tavern_types::CharacterData;

/// Lowest allowed character level.
pub const MIN_LEVEL: i32 = 1;
/// Highest allowed character level.
pub const MAX_LEVEL: i32 = 20;
/// Lowest allowed ability score.
pub const MIN_ABILITY_SCORE: i32 = 3;
/// Highest allowed ability score.
pub const MAX_ABILITY_SCORE: i32 = 20;

/// One violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field, e.g. `hit_points.current`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Character data violated one or more rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("character validation failed: {}", summary(.issues))]
pub struct ValidationFailed {
    /// Every violated rule, in check order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationFailed {
    /// The messages of every issue.
    pub fn messages(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.message.as_str()).collect()
    }
}

fn summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check `data` against every rule.
///
/// # Errors
///
/// Returns [`ValidationFailed`] listing all violations if any rule fails.
pub fn validate_character(data: &CharacterData) -> Result<(), ValidationFailed> {
    let mut issues = Vec::new();

    if data.name.trim().is_empty() {
        issues.push(ValidationIssue::new("name", "name is required"));
    }

    if !(MIN_LEVEL..=MAX_LEVEL).contains(&data.level) {
        issues.push(ValidationIssue::new(
            "level",
            format!(
                "level must be between {MIN_LEVEL} and {MAX_LEVEL}, got {}",
                data.level
            ),
        ));
    }

    for (ability, score) in data.ability_scores.iter() {
        if !(MIN_ABILITY_SCORE..=MAX_ABILITY_SCORE).contains(&score) {
            issues.push(ValidationIssue::new(
                format!("ability_scores.{ability}"),
                format!(
                    "{ability} score must be between {MIN_ABILITY_SCORE} and {MAX_ABILITY_SCORE}, got {score}"
                ),
            ));
        }
    }

    let hp = &data.hit_points;
    if hp.max < 1 {
        issues.push(ValidationIssue::new(
            "hit_points.max",
            format!("maximum hit points must be at least 1, got {}", hp.max),
        ));
    }
    if hp.current < 0 {
        issues.push(ValidationIssue::new(
            "hit_points.current",
            format!("current hit points cannot be negative, got {}", hp.current),
        ));
    }
    if hp.temporary < 0 {
        issues.push(ValidationIssue::new(
            "hit_points.temporary",
            format!(
                "temporary hit points cannot be negative, got {}",
                hp.temporary
            ),
        ));
    }

    for (denomination, amount) in data.currency.denominations() {
        if amount < 0 {
            issues.push(ValidationIssue::new(
                format!("currency.{denomination}"),
                format!("{denomination} cannot be negative, got {amount}"),
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailed { issues })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tavern_types::{Ability, AbilityScores, Currency, HitPoints, Race};

    use super::*;

    fn valid() -> CharacterData {
        CharacterData::new("Thorin", Race::Dwarf, 5, HitPoints::full(40))
            .with_ability_scores(AbilityScores::uniform(12))
    }

    #[test]
    fn valid_character_passes() {
        assert!(validate_character(&valid()).is_ok());
    }

    #[test]
    fn boundaries_are_inclusive() {
        let mut data = valid();
        data.level = 20;
        data.ability_scores.set(Ability::Strength, 3);
        data.ability_scores.set(Ability::Charisma, 20);
        data.hit_points = HitPoints {
            max: 1,
            current: 0,
            temporary: 0,
        };
        assert!(validate_character(&data).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let mut data = valid();
        data.name = "   ".to_owned();
        data.level = 0;
        data.ability_scores.set(Ability::Dexterity, 25);
        data.hit_points = HitPoints {
            max: 0,
            current: -1,
            temporary: -2,
        };
        data.currency = Currency {
            gold: -5,
            ..Currency::default()
        };

        let err = validate_character(&data).unwrap_err();
        let fields: Vec<&str> = err.issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "level",
                "ability_scores.dexterity",
                "hit_points.max",
                "hit_points.current",
                "hit_points.temporary",
                "currency.gold",
            ]
        );
        assert!(err.to_string().contains("name is required"));
    }

    #[test]
    fn level_above_cap_fails() {
        let mut data = valid();
        data.level = 21;
        let err = validate_character(&data).err();
        assert_eq!(err.map(|e| e.issues.len()), Some(1));
    }
}
