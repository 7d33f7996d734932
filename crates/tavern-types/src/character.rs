//! The character aggregate: sheet data, the persisted record, and patches.
//!
//! [`CharacterData`] is the editable body of a sheet and doubles as the
//! input to `create`. [`Character`] adds the store-assigned identity and
//! timestamps. [`CharacterPatch`] is a sparse set of replacements applied
//! with [`CharacterData::apply`].
//!
//! Numeric fields are signed on purpose: invalid input such as a negative
//! current hit point total must be representable so the validator can
//! report it instead of the type system silently rejecting it upstream.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Ability, Race, Skill};
use crate::ids::{CampaignId, CharacterId, UserId};

/// Score assumed for an ability that has never been set.
pub const DEFAULT_ABILITY_SCORE: i32 = 10;

/// Compute the modifier for an ability score: `floor((score - 10) / 2)`.
pub const fn ability_modifier(score: i32) -> i32 {
    score.saturating_sub(DEFAULT_ABILITY_SCORE).div_euclid(2)
}

// ---------------------------------------------------------------------------
// Sheet components
// ---------------------------------------------------------------------------

/// Ability scores keyed by ability. Missing abilities read as
/// [`DEFAULT_ABILITY_SCORE`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AbilityScores(pub BTreeMap<Ability, i32>);

impl AbilityScores {
    /// Create an empty score table (every ability reads as the default).
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Create a table with every ability set to `score`.
    pub fn uniform(score: i32) -> Self {
        let scores = Ability::ALL.iter().map(|&ability| (ability, score));
        Self(scores.collect())
    }

    /// Return the explicitly stored score for `ability`, if any.
    pub fn get(&self, ability: Ability) -> Option<i32> {
        self.0.get(&ability).copied()
    }

    /// Return the score for `ability`, falling back to the default.
    pub fn score(&self, ability: Ability) -> i32 {
        self.get(ability).unwrap_or(DEFAULT_ABILITY_SCORE)
    }

    /// Return the modifier derived from the score for `ability`.
    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.score(ability))
    }

    /// Set a single score.
    pub fn set(&mut self, ability: Ability, score: i32) {
        self.0.insert(ability, score);
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, ability: Ability, score: i32) -> Self {
        self.set(ability, score);
        self
    }

    /// Overwrite the scores present in `other`, leaving the rest untouched.
    pub fn merge(&mut self, other: &Self) {
        for (&ability, &score) in &other.0 {
            self.0.insert(ability, score);
        }
    }

    /// Iterate over the explicitly stored scores in sheet order.
    pub fn iter(&self) -> impl Iterator<Item = (Ability, i32)> + '_ {
        self.0.iter().map(|(&ability, &score)| (ability, score))
    }
}

/// Hit point pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HitPoints {
    /// Maximum hit points.
    pub max: i32,
    /// Current hit points.
    pub current: i32,
    /// Temporary hit points, spent before current hit points.
    pub temporary: i32,
}

impl HitPoints {
    /// Create a full pool with no temporary hit points.
    pub const fn full(max: i32) -> Self {
        Self {
            max,
            current: max,
            temporary: 0,
        }
    }
}

/// Coin purse. Denominations are tracked separately, never converted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Currency {
    /// Copper pieces.
    #[serde(default)]
    pub copper: i64,
    /// Silver pieces.
    #[serde(default)]
    pub silver: i64,
    /// Electrum pieces.
    #[serde(default)]
    pub electrum: i64,
    /// Gold pieces.
    #[serde(default)]
    pub gold: i64,
    /// Platinum pieces.
    #[serde(default)]
    pub platinum: i64,
}

impl Currency {
    /// Return each denomination with its name, for validation and display.
    pub const fn denominations(&self) -> [(&'static str, i64); 5] {
        [
            ("copper", self.copper),
            ("silver", self.silver),
            ("electrum", self.electrum),
            ("gold", self.gold),
            ("platinum", self.platinum),
        ]
    }
}

/// Training level in a single skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SkillProficiency {
    /// Whether the proficiency bonus applies.
    pub proficient: bool,
    /// Whether the proficiency bonus is doubled.
    pub expertise: bool,
}

// ---------------------------------------------------------------------------
// Character body and record
// ---------------------------------------------------------------------------

/// The editable body of a character sheet.
///
/// This is the input to `create`, the target of [`CharacterPatch`]es, and
/// the value the validator inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CharacterData {
    /// Display name. Must not be blank.
    pub name: String,
    /// Playable race.
    pub race: Race,
    /// Class name, if chosen.
    #[serde(default)]
    pub character_class: Option<String>,
    /// Character level (1 to 20 when valid).
    pub level: i32,
    /// Campaign the character belongs to, if any.
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    /// Owning user, if known.
    #[serde(default)]
    pub owner_id: Option<UserId>,
    /// Ability scores.
    #[serde(default)]
    pub ability_scores: AbilityScores,
    /// Hit point pool.
    pub hit_points: HitPoints,
    /// Coin purse.
    #[serde(default)]
    pub currency: Currency,
    /// Skill training, keyed by skill. Absent skills are untrained.
    #[serde(default)]
    pub skills: BTreeMap<Skill, SkillProficiency>,
    /// Abilities with saving throw proficiency.
    #[serde(default)]
    pub saving_throws: BTreeSet<Ability>,
}

impl CharacterData {
    /// Create a sheet with default scores, an empty purse and no training.
    pub fn new(name: impl Into<String>, race: Race, level: i32, hit_points: HitPoints) -> Self {
        Self {
            name: name.into(),
            race,
            character_class: None,
            level,
            campaign_id: None,
            owner_id: None,
            ability_scores: AbilityScores::new(),
            hit_points,
            currency: Currency::default(),
            skills: BTreeMap::new(),
            saving_throws: BTreeSet::new(),
        }
    }

    /// Set the campaign.
    #[must_use]
    pub const fn with_campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    /// Set the owning user.
    #[must_use]
    pub const fn with_owner(mut self, owner_id: UserId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set the class name.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.character_class = Some(class.into());
        self
    }

    /// Replace the ability score table.
    #[must_use]
    pub fn with_ability_scores(mut self, scores: AbilityScores) -> Self {
        self.ability_scores = scores;
        self
    }

    /// Replace the coin purse.
    #[must_use]
    pub const fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Return the training for `skill` (untrained when absent).
    pub fn skill(&self, skill: Skill) -> SkillProficiency {
        self.skills.get(&skill).copied().unwrap_or_default()
    }

    /// Produce the prospective sheet that results from applying `patch`.
    ///
    /// Ability scores and skills merge entry by entry; every other present
    /// field replaces the current value outright.
    #[must_use]
    pub fn apply(&self, patch: &CharacterPatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name.clone_from(name);
        }
        if let Some(race) = patch.race {
            next.race = race;
        }
        if let Some(class) = &patch.character_class {
            next.character_class = Some(class.clone());
        }
        if let Some(level) = patch.level {
            next.level = level;
        }
        if let Some(campaign_id) = patch.campaign_id {
            next.campaign_id = Some(campaign_id);
        }
        if let Some(scores) = &patch.ability_scores {
            next.ability_scores.merge(scores);
        }
        if let Some(hit_points) = patch.hit_points {
            next.hit_points = hit_points;
        }
        if let Some(currency) = patch.currency {
            next.currency = currency;
        }
        if let Some(skills) = &patch.skills {
            for (&skill, &training) in skills {
                next.skills.insert(skill, training);
            }
        }
        if let Some(saving_throws) = &patch.saving_throws {
            next.saving_throws.clone_from(saving_throws);
        }
        next
    }
}

/// A persisted character: the sheet plus store-assigned identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Character {
    /// Store-assigned identifier.
    pub id: CharacterId,
    /// The sheet itself.
    #[serde(flatten)]
    pub data: CharacterData,
    /// When the store first saved the character.
    pub created_at: DateTime<Utc>,
    /// When the store last changed the character.
    pub updated_at: DateTime<Utc>,
}

impl Character {
    /// Campaign the character belongs to, if any.
    pub const fn campaign_id(&self) -> Option<CampaignId> {
        self.data.campaign_id
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

/// A sparse update to a [`CharacterData`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CharacterPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New race.
    #[serde(default)]
    pub race: Option<Race>,
    /// New class name.
    #[serde(default)]
    pub character_class: Option<String>,
    /// New level.
    #[serde(default)]
    pub level: Option<i32>,
    /// Move the character into a campaign.
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    /// Scores to overwrite (merged per ability).
    #[serde(default)]
    pub ability_scores: Option<AbilityScores>,
    /// Replacement hit point pool.
    #[serde(default)]
    pub hit_points: Option<HitPoints>,
    /// Replacement coin purse.
    #[serde(default)]
    pub currency: Option<Currency>,
    /// Skill training to overwrite (merged per skill).
    #[serde(default)]
    pub skills: Option<BTreeMap<Skill, SkillProficiency>>,
    /// Replacement set of saving throw proficiencies.
    #[serde(default)]
    pub saving_throws: Option<BTreeSet<Ability>>,
}

impl CharacterPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the level.
    #[must_use]
    pub const fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Set a single ability score.
    #[must_use]
    pub fn ability_score(mut self, ability: Ability, score: i32) -> Self {
        self.ability_scores
            .get_or_insert_with(AbilityScores::new)
            .set(ability, score);
        self
    }

    /// Replace the hit point pool.
    #[must_use]
    pub const fn hit_points(mut self, hit_points: HitPoints) -> Self {
        self.hit_points = Some(hit_points);
        self
    }

    /// Replace the coin purse.
    #[must_use]
    pub const fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Replace the saving throw set.
    #[must_use]
    pub fn saving_throws(mut self, saving_throws: BTreeSet<Ability>) -> Self {
        self.saving_throws = Some(saving_throws);
        self
    }
}
