//! Migration plans and their policy knobs

use lms_common::Category;
use serde::{Deserialize, Serialize};

use super::MigrationError;

/// Training migrated when nothing else is configured
pub const DEFAULT_TRAINING: &str = "Foundation of Service";

/// How progress records identify their training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKey {
    /// Records carry the training name and a flat category label
    #[default]
    Name,
    /// Records reference a per-category training definition
    Definition,
}

/// What to do when the user already holds a target record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave the existing target untouched
    #[default]
    KeepTarget,
    /// Delete the existing target and write the migrated copy
    ReplaceTarget,
}

/// Completion date written on the created target record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletedDatePolicy {
    /// Migration time
    #[default]
    Restamp,
    /// The source record's date, or migration time when it has none
    Preserve,
}

/// What to do when the target category has no definition for the training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTargetPolicy {
    /// Report the training as skipped and touch nothing
    #[default]
    Skip,
    /// Fail the run with `DefinitionNotFound`
    Abort,
}

/// One reclassification: move completed records of `training_name` from
/// `source` to `target`
///
/// Deserializes from a `[[plans]]` entry:
///
/// ```toml
/// [[plans]]
/// training_name = "Foundation of Service"
/// from = "Assigned"
/// to = "Mandatory"
/// match_key = "definition"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub training_name: String,
    #[serde(rename = "from")]
    pub source: Category,
    #[serde(rename = "to")]
    pub target: Category,
    #[serde(default)]
    pub match_key: MatchKey,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
    #[serde(default)]
    pub completed_date: CompletedDatePolicy,
    #[serde(default)]
    pub on_missing_target: MissingTargetPolicy,
}

impl MigrationPlan {
    /// Plan with default policies, matching by name
    pub fn new(training_name: impl Into<String>, source: Category, target: Category) -> Self {
        Self {
            training_name: training_name.into().trim().to_string(),
            source,
            target,
            match_key: MatchKey::default(),
            on_conflict: ConflictPolicy::default(),
            completed_date: CompletedDatePolicy::default(),
            on_missing_target: MissingTargetPolicy::default(),
        }
    }

    /// `Foundation of Service`, Assigned to Mandatory, by name
    pub fn default_plan() -> Self {
        Self::new(DEFAULT_TRAINING, Category::Assigned, Category::Mandatory)
    }

    pub fn match_key(mut self, match_key: MatchKey) -> Self {
        self.match_key = match_key;
        self
    }

    pub fn on_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn completed_date(mut self, policy: CompletedDatePolicy) -> Self {
        self.completed_date = policy;
        self
    }

    pub fn on_missing_target(mut self, policy: MissingTargetPolicy) -> Self {
        self.on_missing_target = policy;
        self
    }

    /// Training name as matched against storage
    pub fn name(&self) -> &str {
        self.training_name.trim()
    }

    /// Reject plans that cannot be run, before any storage access
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.name().is_empty() {
            return Err(MigrationError::InvalidPlan(
                "training_name must not be empty".to_string(),
            ));
        }
        if self.source == self.target {
            return Err(MigrationError::InvalidPlan(format!(
                "source and target are both {}",
                self.source
            )));
        }
        Ok(())
    }
}
