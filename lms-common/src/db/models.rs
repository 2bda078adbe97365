//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Opaque record identifier, assigned at creation and never changed
///
/// New ids are UUID v4 strings. Stored ids are taken as-is: rows imported
/// from other systems may carry any non-empty identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Generate a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim();
        if id.is_empty() {
            return Err(Error::InvalidInput("Record id must not be empty".to_string()));
        }
        Ok(Self(id.to_string()))
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Training category
///
/// A training assignment is either assigned to a user or mandatory for them,
/// never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Category {
    Assigned,
    Mandatory,
}

impl Category {
    /// Stored label
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Assigned => "Assigned",
            Category::Mandatory => "Mandatory",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assigned" => Ok(Category::Assigned),
            "mandatory" => Ok(Category::Mandatory),
            other => Err(Error::InvalidInput(format!("Unknown category: {}", other))),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Completion status of a progress record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ProgressStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Stored label (matches what the LMS front-end writes)
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "Not Started",
            ProgressStatus::InProgress => "In Progress",
            ProgressStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "notstarted" => Ok(ProgressStatus::NotStarted),
            "inprogress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            _ => Err(Error::InvalidInput(format!("Unknown progress status: {}", s))),
        }
    }
}

impl TryFrom<String> for ProgressStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a progress record identifies its training
///
/// Older records carry the training's display name; newer ones reference a
/// [`TrainingDefinition`] by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TrainingKey {
    Name(String),
    Reference(RecordId),
}

impl TrainingKey {
    /// Whether two keys denote the same training
    ///
    /// Names compare ASCII case-insensitively (the same folding SQLite's
    /// NOCASE collation applies); references compare by id. A name and a
    /// reference cannot be compared without the definition store; callers
    /// that need to reconcile them resolve the definition first.
    pub fn same_training(&self, other: &TrainingKey) -> bool {
        match (self, other) {
            (TrainingKey::Name(a), TrainingKey::Name(b)) => a.eq_ignore_ascii_case(b),
            (TrainingKey::Reference(a), TrainingKey::Reference(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for TrainingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingKey::Name(name) => write!(f, "name '{}'", name),
            TrainingKey::Reference(id) => write!(f, "definition {}", id),
        }
    }
}

/// Training program metadata, defined independently per category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDefinition {
    pub id: RecordId,
    pub name: String,
    pub category: Category,
    pub description: Option<String>,
}

impl TrainingDefinition {
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            category,
            description: None,
        }
    }
}

/// One user's progress on one training in one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgressRecord {
    pub id: RecordId,
    pub user_id: String,
    pub training: TrainingKey,
    pub category: Category,
    pub status: ProgressStatus,
    /// Completion percentage (0-100)
    pub progress: f64,
    pub score: Option<f64>,
    pub completed_date: Option<DateTime<Utc>>,
}

impl TrainingProgressRecord {
    /// Create a not-started record with a fresh id
    pub fn new(user_id: impl Into<String>, training: TrainingKey, category: Category) -> Self {
        Self {
            id: RecordId::new(),
            user_id: user_id.into(),
            training,
            category,
            status: ProgressStatus::NotStarted,
            progress: 0.0,
            score: None,
            completed_date: None,
        }
    }

    /// Mark completed with the given score at `at`
    pub fn completed(mut self, score: Option<f64>, at: DateTime<Utc>) -> Self {
        self.status = ProgressStatus::Completed;
        self.progress = 100.0;
        self.score = score;
        self.completed_date = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_case_insensitive() {
        assert_eq!("assigned".parse::<Category>().unwrap(), Category::Assigned);
        assert_eq!(" MANDATORY ".parse::<Category>().unwrap(), Category::Mandatory);
        assert!("optional".parse::<Category>().is_err());
    }

    #[test]
    fn test_status_accepts_label_and_camel_case() {
        assert_eq!("In Progress".parse::<ProgressStatus>().unwrap(), ProgressStatus::InProgress);
        assert_eq!("NotStarted".parse::<ProgressStatus>().unwrap(), ProgressStatus::NotStarted);
        assert_eq!("completed".parse::<ProgressStatus>().unwrap(), ProgressStatus::Completed);
        assert!("done".parse::<ProgressStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_as_stored_label() {
        let json = serde_json::to_string(&ProgressStatus::NotStarted).unwrap();
        assert_eq!(json, "\"Not Started\"");

        let back: ProgressStatus = serde_json::from_str("\"In Progress\"").unwrap();
        assert_eq!(back, ProgressStatus::InProgress);
    }

    #[test]
    fn test_training_key_name_comparison_ignores_case() {
        let a = TrainingKey::Name("Foundation of Service".to_string());
        let b = TrainingKey::Name("foundation of service".to_string());
        assert!(a.same_training(&b));

        let id = RecordId::new();
        assert!(TrainingKey::Reference(id.clone()).same_training(&TrainingKey::Reference(id.clone())));
        assert!(!a.same_training(&TrainingKey::Reference(id)));
    }

    #[test]
    fn test_record_id_is_opaque() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(Uuid::parse_str(id.as_str()).is_ok());

        // Legacy document-store ids are kept verbatim
        let legacy: RecordId = "65f1c2a9e4b0a1b2c3d4e5f6".parse().unwrap();
        assert_eq!(legacy.as_str(), "65f1c2a9e4b0a1b2c3d4e5f6");
        assert_eq!(serde_json::to_string(&legacy).unwrap(), "\"65f1c2a9e4b0a1b2c3d4e5f6\"");

        assert!("   ".parse::<RecordId>().is_err());
    }
}
