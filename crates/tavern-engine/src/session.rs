//! YAML session scripts.
//!
//! A session is an ordered list of steps run against a
//! [`CharacterService`]. Characters are referred to by script-local names
//! assigned when they are created (`as: aria`), so scripts never need to
//! know store-generated ids.
//!
//! Service failures (validation, missing characters) are logged and
//! counted; the session keeps going. Only a malformed script aborts it.

use std::collections::BTreeMap;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tavern_core::{BulkUpdate, CharacterService, RollBuilder, ServiceError};
use tavern_types::{Ability, CharacterData, CharacterId, CharacterPatch, Skill};

use crate::error::EngineError;

/// Script run when no session file is given.
pub const DEMO_SESSION: &str = include_str!("../sessions/demo.yaml");

// -----------------------------------------------------------------------
// Script format
// -----------------------------------------------------------------------

/// A parsed session script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionScript {
    /// Seed for dice rolls, so runs are repeatable.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Steps, run in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One bulk update entry inside a script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptedUpdate {
    /// Script-local character name.
    pub character: String,
    /// Changes to apply.
    pub patch: CharacterPatch,
}

/// A single scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Create a character and bind it to a name.
    Create {
        /// Name later steps use to refer to the character.
        #[serde(rename = "as")]
        name: String,
        /// The sheet.
        character: Box<CharacterData>,
    },
    /// Apply a patch.
    Update {
        /// Script-local character name.
        character: String,
        /// Changes to apply.
        patch: Box<CharacterPatch>,
    },
    /// Apply several patches, continuing past failures.
    BulkUpdate {
        /// The batch.
        updates: Vec<ScriptedUpdate>,
    },
    /// Delete a character.
    Delete {
        /// Script-local character name.
        character: String,
    },
    /// Set one ability score.
    AbilityScore {
        /// Script-local character name.
        character: String,
        /// Ability to change.
        ability: Ability,
        /// New score.
        score: i32,
    },
    /// Set skill training.
    Skill {
        /// Script-local character name.
        character: String,
        /// Skill to change.
        skill: Skill,
        /// Proficiency.
        proficient: bool,
        /// Expertise.
        #[serde(default)]
        expertise: bool,
    },
    /// Grant or remove a saving throw.
    SavingThrow {
        /// Script-local character name.
        character: String,
        /// Saving throw to change.
        ability: Ability,
        /// Proficiency.
        proficient: bool,
    },
    /// Deal damage.
    Damage {
        /// Script-local character name.
        character: String,
        /// Damage dealt.
        amount: i32,
    },
    /// Restore hit points.
    Heal {
        /// Script-local character name.
        character: String,
        /// Hit points restored.
        amount: i32,
    },
    /// Roll an ability check.
    AbilityCheck {
        /// Script-local character name.
        character: String,
        /// Ability whose modifier applies.
        ability: Ability,
        /// Roll 2d20 and keep the higher.
        #[serde(default)]
        advantage: bool,
    },
    /// Step history back.
    Undo,
    /// Step history forward.
    Redo,
}

const fn default_seed() -> u64 {
    42
}

impl SessionScript {
    /// Load a script from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Script`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::Script {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&contents)
    }

    /// Parse a script from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Script`] if the YAML does not describe a
    /// session.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        serde_yml::from_str(yaml).map_err(|e| EngineError::Script {
            message: format!("failed to parse session YAML: {e}"),
        })
    }
}

// -----------------------------------------------------------------------
// Runner
// -----------------------------------------------------------------------

/// Tally of a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Steps that took effect.
    pub applied: usize,
    /// Steps the service rejected.
    pub failed: usize,
    /// Undo/redo steps at a history boundary.
    pub skipped: usize,
}

enum StepResult {
    Applied,
    Failed(ServiceError),
    Skipped,
}

impl From<Result<(), ServiceError>> for StepResult {
    fn from(result: Result<(), ServiceError>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Runs scripts against a service, tracking script-local names.
#[derive(Debug)]
pub struct SessionRunner {
    service: CharacterService,
    characters: BTreeMap<String, CharacterId>,
}

impl SessionRunner {
    /// Create a runner over `service`.
    pub const fn new(service: CharacterService) -> Self {
        Self {
            service,
            characters: BTreeMap::new(),
        }
    }

    /// Run every step of `script` in order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownCharacter`] if a step names a
    /// character that was never created in this session.
    pub async fn run(&mut self, script: SessionScript) -> Result<SessionReport, EngineError> {
        let mut rng = SmallRng::seed_from_u64(script.seed);
        let mut report = SessionReport::default();

        for (index, step) in script.steps.into_iter().enumerate() {
            let number = index.saturating_add(1);
            match self.run_step(number, step, &mut rng).await? {
                StepResult::Applied => report.applied = report.applied.saturating_add(1),
                StepResult::Skipped => {
                    info!(step = number, "nothing to replay");
                    report.skipped = report.skipped.saturating_add(1);
                }
                StepResult::Failed(err) => {
                    warn!(step = number, error = %err, "step failed");
                    report.failed = report.failed.saturating_add(1);
                }
            }
        }

        info!(
            applied = report.applied,
            failed = report.failed,
            skipped = report.skipped,
            "session finished"
        );
        Ok(report)
    }

    fn resolve(&self, step: usize, name: &str) -> Result<CharacterId, EngineError> {
        self.characters
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::UnknownCharacter {
                step,
                name: name.to_owned(),
            })
    }

    async fn run_step(
        &mut self,
        number: usize,
        step: Step,
        rng: &mut SmallRng,
    ) -> Result<StepResult, EngineError> {
        let service = &self.service;
        let result = match step {
            Step::Create { name, character } => match service.create(*character).await {
                Ok(created) => {
                    self.characters.insert(name, created.id);
                    StepResult::Applied
                }
                Err(err) => StepResult::Failed(err),
            },
            Step::Update { character, patch } => {
                let id = self.resolve(number, &character)?;
                service.update(id, *patch).await.map(drop).into()
            }
            Step::BulkUpdate { updates } => {
                let mut batch = Vec::with_capacity(updates.len());
                for update in updates {
                    batch.push(BulkUpdate {
                        id: self.resolve(number, &update.character)?,
                        patch: update.patch,
                    });
                }
                service.bulk_update(batch).await;
                StepResult::Applied
            }
            Step::Delete { character } => {
                let id = self.resolve(number, &character)?;
                service.delete(id).await.into()
            }
            Step::AbilityScore {
                character,
                ability,
                score,
            } => {
                let id = self.resolve(number, &character)?;
                service
                    .update_ability_score(id, ability, score)
                    .await
                    .map(drop)
                    .into()
            }
            Step::Skill {
                character,
                skill,
                proficient,
                expertise,
            } => {
                let id = self.resolve(number, &character)?;
                service
                    .update_skill_proficiency(id, skill, proficient, expertise)
                    .await
                    .map(drop)
                    .into()
            }
            Step::SavingThrow {
                character,
                ability,
                proficient,
            } => {
                let id = self.resolve(number, &character)?;
                service
                    .update_saving_throw_proficiency(id, ability, proficient)
                    .await
                    .map(drop)
                    .into()
            }
            Step::Damage { character, amount } => {
                let id = self.resolve(number, &character)?;
                service.apply_damage(id, amount).await.map(drop).into()
            }
            Step::Heal { character, amount } => {
                let id = self.resolve(number, &character)?;
                service.receive_healing(id, amount).await.map(drop).into()
            }
            Step::AbilityCheck {
                character,
                ability,
                advantage,
            } => {
                let id = self.resolve(number, &character)?;
                let builder = if advantage {
                    RollBuilder::new().advantage()
                } else {
                    RollBuilder::new()
                };
                service
                    .ability_check(id, ability, builder, rng)
                    .await
                    .map(drop)
                    .into()
            }
            Step::Undo => service
                .bus()
                .undo()
                .await
                .map_or(StepResult::Skipped, |_| StepResult::Applied),
            Step::Redo => service
                .bus()
                .redo()
                .await
                .map_or(StepResult::Skipped, |_| StepResult::Applied),
        };
        Ok(result)
    }
}
