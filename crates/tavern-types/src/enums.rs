//! Enumeration types for the Tavern character model and its events.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Abilities and skills
// ---------------------------------------------------------------------------

/// One of the six core abilities of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Ability {
    /// Physical power.
    Strength,
    /// Agility and reflexes.
    Dexterity,
    /// Endurance and health.
    Constitution,
    /// Reasoning and memory.
    Intelligence,
    /// Perception and insight.
    Wisdom,
    /// Force of personality.
    Charisma,
}

impl Ability {
    /// Every ability, in sheet order.
    pub const ALL: [Self; 6] = [
        Self::Strength,
        Self::Dexterity,
        Self::Constitution,
        Self::Intelligence,
        Self::Wisdom,
        Self::Charisma,
    ];

    /// Return the lowercase name used in validation messages and scripts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Dexterity => "dexterity",
            Self::Constitution => "constitution",
            Self::Intelligence => "intelligence",
            Self::Wisdom => "wisdom",
            Self::Charisma => "charisma",
        }
    }
}

impl core::fmt::Display for Ability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trained skill. Each skill keys off one [`Ability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Skill {
    /// Strength: climbing, jumping, swimming.
    Athletics,
    /// Dexterity: tumbling and balance.
    Acrobatics,
    /// Dexterity: nimble hands.
    SleightOfHand,
    /// Dexterity: moving unseen.
    Stealth,
    /// Intelligence: magical lore.
    Arcana,
    /// Intelligence: historical lore.
    History,
    /// Intelligence: finding clues.
    Investigation,
    /// Intelligence: natural lore.
    Nature,
    /// Intelligence: religious lore.
    Religion,
    /// Wisdom: calming and reading animals.
    AnimalHandling,
    /// Wisdom: reading intentions.
    Insight,
    /// Wisdom: tending wounds.
    Medicine,
    /// Wisdom: noticing things.
    Perception,
    /// Wisdom: tracking and foraging.
    Survival,
    /// Charisma: misleading others.
    Deception,
    /// Charisma: coercion.
    Intimidation,
    /// Charisma: entertaining.
    Performance,
    /// Charisma: influencing with tact.
    Persuasion,
}

impl Skill {
    /// The ability this skill's checks are based on.
    pub const fn ability(self) -> Ability {
        match self {
            Self::Athletics => Ability::Strength,
            Self::Acrobatics | Self::SleightOfHand | Self::Stealth => Ability::Dexterity,
            Self::Arcana
            | Self::History
            | Self::Investigation
            | Self::Nature
            | Self::Religion => Ability::Intelligence,
            Self::AnimalHandling
            | Self::Insight
            | Self::Medicine
            | Self::Perception
            | Self::Survival => Ability::Wisdom,
            Self::Deception | Self::Intimidation | Self::Performance | Self::Persuasion => {
                Ability::Charisma
            }
        }
    }
}

/// Playable race of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Race {
    /// Human.
    Human,
    /// Elf.
    Elf,
    /// Dwarf.
    Dwarf,
    /// Halfling.
    Halfling,
    /// Gnome.
    Gnome,
    /// Half-elf.
    HalfElf,
    /// Half-orc.
    HalfOrc,
    /// Tiefling.
    Tiefling,
    /// Dragonborn.
    Dragonborn,
}

// ---------------------------------------------------------------------------
// Event classification
// ---------------------------------------------------------------------------

/// The closed set of event kinds the bus can carry.
///
/// The kind of a [`DomainEvent`](crate::DomainEvent) is always derived from
/// its payload variant, so a kind and a payload shape can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// A character was created.
    Created,
    /// A character was updated through a general patch.
    Updated,
    /// A character was deleted.
    Deleted,
    /// A single ability score changed.
    AbilityScoreUpdated,
    /// A saving throw proficiency was granted or removed.
    SavingThrowProficiencyUpdated,
    /// A skill proficiency or expertise changed.
    SkillProficiencyUpdated,
    /// A character took damage.
    DamageApplied,
    /// A character regained hit points.
    HealingReceived,
    /// Dice were rolled on behalf of a character.
    DiceRolled,
    /// A mutation failed validation or the store rejected it.
    ErrorOccurred,
}

impl EventKind {
    /// Return the wire name of the kind (e.g. `"ABILITY_SCORE_UPDATED"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::AbilityScoreUpdated => "ABILITY_SCORE_UPDATED",
            Self::SavingThrowProficiencyUpdated => "SAVING_THROW_PROFICIENCY_UPDATED",
            Self::SkillProficiencyUpdated => "SKILL_PROFICIENCY_UPDATED",
            Self::DamageApplied => "DAMAGE_APPLIED",
            Self::HealingReceived => "HEALING_RECEIVED",
            Self::DiceRolled => "DICE_ROLLED",
            Self::ErrorOccurred => "ERROR_OCCURRED",
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The coarse CRUD category recorded in event metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum OperationType {
    /// The mutation created a character.
    Create,
    /// The mutation changed an existing character.
    Update,
    /// The mutation removed a character.
    Delete,
}

impl OperationType {
    /// Return the lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Marks an event that was re-emitted from history rather than freshly
/// produced by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ReplayDirection {
    /// Re-emitted as the inverse of a history entry.
    Undo,
    /// Re-emitted unchanged after moving the cursor forward.
    Redo,
}
