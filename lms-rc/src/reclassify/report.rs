//! Per-plan migration outcome

use chrono::{DateTime, Utc};
use lms_common::{Category, RecordId};
use serde::{Deserialize, Serialize};

use super::plan::{MatchKey, MigrationPlan};

/// Step of a record's migration that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    LookupTarget,
    ReplaceTarget,
    CreateTarget,
    DeleteSource,
}

/// A source record that could not be migrated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub record_id: RecordId,
    pub user_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Counts and failures for one plan
///
/// `matched == moved + skipped + failed.len()` once the run has finished
/// without a run-level error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub training_name: String,
    pub source: Category,
    pub target: Category,
    pub match_key: MatchKey,
    pub matched: usize,
    pub moved: usize,
    pub skipped: usize,
    pub failed: Vec<RecordFailure>,
    pub target_definition_missing: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MigrationReport {
    pub(crate) fn start(plan: &MigrationPlan) -> Self {
        Self {
            training_name: plan.name().to_string(),
            source: plan.source,
            target: plan.target,
            match_key: plan.match_key,
            matched: 0,
            moved: 0,
            skipped: 0,
            failed: Vec::new(),
            target_definition_missing: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// No record failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<RecordId> {
        self.failed.iter().map(|f| f.record_id.clone()).collect()
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        if self.target_definition_missing {
            return format!(
                "'{}' {} -> {}: skipped, no {} definition",
                self.training_name, self.source, self.target, self.target
            );
        }
        format!(
            "'{}' {} -> {}: matched {}, moved {}, skipped {}, failed {}",
            self.training_name,
            self.source,
            self.target,
            self.matched,
            self.moved,
            self.skipped,
            self.failed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_counts_and_stage() {
        let mut report = MigrationReport::start(&MigrationPlan::default_plan());
        report.matched = 2;
        report.moved = 1;
        report.failed.push(RecordFailure {
            record_id: RecordId::new(),
            user_id: "u9".to_string(),
            stage: FailureStage::DeleteSource,
            reason: "disk I/O error".to_string(),
        });
        let report = report.finish();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["training_name"], "Foundation of Service");
        assert_eq!(json["source"], "Assigned");
        assert_eq!(json["target"], "Mandatory");
        assert_eq!(json["match_key"], "name");
        assert_eq!(json["moved"], 1);
        assert_eq!(json["failed"][0]["stage"], "delete_source");
        assert!(json["finished_at"].is_string());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_summary_mentions_missing_definition() {
        let mut report = MigrationReport::start(&MigrationPlan::default_plan());
        report.target_definition_missing = true;

        assert!(report.summary().contains("no Mandatory definition"));
    }
}
