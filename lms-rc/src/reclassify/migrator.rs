//! Reclassification of completed progress records between categories

use chrono::Utc;
use lms_common::db::{ProgressFilter, TrainingDefinition, TrainingProgressRecord};
use lms_common::{Category, ProgressStatus, TrainingKey};
use tracing::{debug, error, info, warn};

use super::plan::{
    CompletedDatePolicy, ConflictPolicy, MatchKey, MigrationPlan, MissingTargetPolicy,
};
use super::report::{FailureStage, MigrationReport, RecordFailure};
use super::MigrationError;
use crate::store::{ProgressStore, StoreError};

/// Outcome of one source record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordOutcome {
    /// Target created, source removed
    Moved,
    /// Target already present, source removed
    Skipped,
}

struct StageError {
    stage: FailureStage,
    error: StoreError,
}

fn at(stage: FailureStage) -> impl FnOnce(StoreError) -> StageError {
    move |error| StageError { stage, error }
}

/// Moves completed progress records from one category to another
///
/// Records are processed one at a time in discovery order. Each record's
/// lookup, create and delete are independent of every other record, so an
/// interrupted run leaves some records moved and the rest untouched.
///
/// Each unique index only covers one kind of training key, so the target
/// lookup checks the name and the definition reference together.
pub struct Migrator<S> {
    store: S,
}

impl<S: ProgressStore> Migrator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Run every plan in order, stopping at the first run-level error
    pub async fn migrate_all(
        &self,
        plans: &[MigrationPlan],
    ) -> Result<Vec<MigrationReport>, MigrationError> {
        let mut reports = Vec::with_capacity(plans.len());
        for plan in plans {
            reports.push(self.migrate(plan).await?);
        }
        Ok(reports)
    }

    /// Reclassify the completed records described by `plan`
    ///
    /// A record belongs to the training when it carries the training's name
    /// or references the training's definition in its category, whichever
    /// way the plan matches.
    pub async fn migrate(&self, plan: &MigrationPlan) -> Result<MigrationReport, MigrationError> {
        plan.validate()?;

        let mut report = MigrationReport::start(plan);
        info!(
            "Reclassifying '{}' from {} to {} (by {:?})",
            plan.name(),
            plan.source,
            plan.target,
            plan.match_key
        );

        let source_def = self
            .store
            .find_definition(plan.name(), plan.source)
            .await
            .map_err(|e| storage(e, None))?;
        if source_def.is_none() && plan.match_key == MatchKey::Definition {
            return Err(not_found(plan, plan.source));
        }

        let target_def = self
            .store
            .find_definition(plan.name(), plan.target)
            .await
            .map_err(|e| storage(e, None))?;
        if target_def.is_none() && plan.match_key == MatchKey::Definition {
            match plan.on_missing_target {
                MissingTargetPolicy::Skip => {
                    warn!(
                        "No {} definition for '{}', skipping training",
                        plan.target,
                        plan.name()
                    );
                    report.target_definition_missing = true;
                    return Ok(report.finish());
                }
                MissingTargetPolicy::Abort => return Err(not_found(plan, plan.target)),
            }
        }

        if let (Some(source_def), Some(target_def)) = (&source_def, &target_def) {
            debug!(
                "Resolved definitions for '{}': {} -> {}",
                plan.name(),
                source_def.id,
                target_def.id
            );
        }

        let filter = keys_of(plan, source_def.as_ref())
            .into_iter()
            .fold(ProgressFilter::new(), ProgressFilter::training)
            .category(plan.source)
            .status(ProgressStatus::Completed);
        let sources = self
            .store
            .find_progress(&filter)
            .await
            .map_err(|e| storage(e, Some(&report)))?;

        report.matched = sources.len();
        if sources.is_empty() {
            info!("No completed {} records for '{}'", plan.source, plan.name());
            return Ok(report.finish());
        }

        let target_keys = keys_of(plan, target_def.as_ref());
        for source in &sources {
            let target_training = written_key(plan, source, target_def.as_ref());

            match self
                .migrate_record(plan, source, &target_keys, target_training)
                .await
            {
                Ok(RecordOutcome::Moved) => report.moved += 1,
                Ok(RecordOutcome::Skipped) => report.skipped += 1,
                Err(StageError { stage, error }) => {
                    report.failed.push(RecordFailure {
                        record_id: source.id.clone(),
                        user_id: source.user_id.clone(),
                        stage,
                        reason: error.reason().to_string(),
                    });

                    if error.is_unavailable() {
                        error!(
                            "Storage lost while migrating record {}: {}",
                            source.id, error
                        );
                        return Err(storage(error, Some(&report)));
                    }
                    warn!(
                        "Record {} (user {}) failed at {:?}: {}",
                        source.id, source.user_id, stage, error
                    );
                }
            }
        }

        let report = report.finish();
        info!("{}", report.summary());
        Ok(report)
    }

    async fn migrate_record(
        &self,
        plan: &MigrationPlan,
        source: &TrainingProgressRecord,
        target_keys: &[TrainingKey],
        target_training: TrainingKey,
    ) -> Result<RecordOutcome, StageError> {
        let target_filter = target_keys
            .iter()
            .cloned()
            .fold(ProgressFilter::new(), ProgressFilter::training)
            .user(source.user_id.clone())
            .category(plan.target);

        let outcome = match plan.on_conflict {
            ConflictPolicy::KeepTarget => {
                let existing = self
                    .store
                    .find_one_progress(&target_filter)
                    .await
                    .map_err(at(FailureStage::LookupTarget))?;

                match existing {
                    Some(existing) => {
                        debug!(
                            "User {} already holds {} record {}, keeping it",
                            source.user_id, plan.target, existing.id
                        );
                        RecordOutcome::Skipped
                    }
                    None => self.create_target(plan, source, target_training).await?,
                }
            }
            ConflictPolicy::ReplaceTarget => {
                let existing = self
                    .store
                    .find_progress(&target_filter)
                    .await
                    .map_err(at(FailureStage::LookupTarget))?;

                for existing in &existing {
                    debug!(
                        "Replacing {} record {} for user {}",
                        plan.target, existing.id, source.user_id
                    );
                    self.store
                        .delete_progress(&existing.id)
                        .await
                        .map_err(at(FailureStage::ReplaceTarget))?;
                }
                self.create_target(plan, source, target_training).await?
            }
        };

        self.store
            .delete_progress(&source.id)
            .await
            .map_err(at(FailureStage::DeleteSource))?;

        Ok(outcome)
    }

    async fn create_target(
        &self,
        plan: &MigrationPlan,
        source: &TrainingProgressRecord,
        training: TrainingKey,
    ) -> Result<RecordOutcome, StageError> {
        let copy = self.target_copy(plan, source, training);
        let created = self
            .store
            .insert_progress(&copy)
            .await
            .map_err(at(FailureStage::CreateTarget))?;

        if created {
            debug!(
                "Created {} record {} for user {}",
                plan.target, copy.id, source.user_id
            );
            Ok(RecordOutcome::Moved)
        } else {
            debug!(
                "{} record for user {} appeared concurrently",
                plan.target, source.user_id
            );
            Ok(RecordOutcome::Skipped)
        }
    }

    fn target_copy(
        &self,
        plan: &MigrationPlan,
        source: &TrainingProgressRecord,
        training: TrainingKey,
    ) -> TrainingProgressRecord {
        let now = Utc::now();
        let completed_date = match plan.completed_date {
            CompletedDatePolicy::Restamp => Some(now),
            CompletedDatePolicy::Preserve => source.completed_date.or(Some(now)),
        };

        TrainingProgressRecord {
            id: self.store.next_id(),
            user_id: source.user_id.clone(),
            training,
            category: plan.target,
            status: source.status,
            progress: source.progress,
            score: source.score,
            completed_date,
        }
    }
}

/// Keys a record of the plan's training may carry in one category
fn keys_of(plan: &MigrationPlan, definition: Option<&TrainingDefinition>) -> Vec<TrainingKey> {
    let mut keys = vec![TrainingKey::Name(plan.name().to_string())];
    if let Some(def) = definition {
        keys.push(TrainingKey::Reference(def.id.clone()));
    }
    keys
}

/// Key carried by the target copy of `source`
///
/// Definition matching always writes the target reference. Name matching
/// keeps a name key as is and moves a reference onto the target definition,
/// falling back to the name when the target has no definition.
fn written_key(
    plan: &MigrationPlan,
    source: &TrainingProgressRecord,
    target_def: Option<&TrainingDefinition>,
) -> TrainingKey {
    match (&source.training, target_def) {
        (TrainingKey::Name(_), _) if plan.match_key == MatchKey::Name => source.training.clone(),
        (_, Some(def)) => TrainingKey::Reference(def.id.clone()),
        (TrainingKey::Name(_), None) => source.training.clone(),
        (TrainingKey::Reference(_), None) => TrainingKey::Name(plan.name().to_string()),
    }
}

fn not_found(plan: &MigrationPlan, category: Category) -> MigrationError {
    error!("No {} definition for '{}'", category, plan.name());
    MigrationError::DefinitionNotFound {
        name: plan.name().to_string(),
        category,
    }
}

fn storage(error: StoreError, report: Option<&MigrationReport>) -> MigrationError {
    let partial = report.map(|r| Box::new(r.clone().finish()));
    match error {
        StoreError::Unavailable(reason) => MigrationError::StorageUnavailable { reason, partial },
        StoreError::Operation(reason) => MigrationError::StorageOperation { reason, partial },
    }
}
