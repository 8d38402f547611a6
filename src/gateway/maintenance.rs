//! Bulk cleanup and rule upsert on top of [`GatewayApi`]

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::GatewayApi;
use crate::error::ApiError;
use crate::models::RuleRequest;
use crate::reconcile::naming::NamePatterns;

/// Outcome of a bulk cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Resources whose name matched a pattern
    pub matched: usize,
    /// Resources deleted
    pub deleted: usize,
    /// Deletions that failed
    pub failed: usize,
}

/// What [`create_or_update_rule`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No rule had the name, a new one was created
    Created,
    /// The rule with this id was replaced
    Updated(String),
}

/// Delete every rule whose name matches `patterns`
///
/// Only the initial listing is fatal. A failed deletion is logged, counted
/// and the batch continues. With `dry_run` nothing is deleted.
pub async fn delete_all_old_rules(
    api: &dyn GatewayApi,
    patterns: &NamePatterns,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<CleanupReport, ApiError> {
    let rules = api.get_rules(cancel).await?;
    let mut report = CleanupReport::default();

    for rule in rules.iter().filter(|r| patterns.matches_rule(&r.name)) {
        report.matched += 1;

        if dry_run {
            info!(name = %rule.name, id = %rule.id, "Dry run: would delete rule");
            continue;
        }
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        info!(name = %rule.name, id = %rule.id, "Deleting old rule");
        match api.delete_rule(&rule.id, cancel).await {
            Ok(()) => report.deleted += 1,
            Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
            Err(e) => {
                warn!(name = %rule.name, error = %e, "Failed to delete rule");
                report.failed += 1;
            }
        }
    }

    if report.matched == 0 {
        info!("No old rules found to delete");
    } else {
        info!(
            matched = report.matched,
            deleted = report.deleted,
            failed = report.failed,
            "Old rule cleanup finished"
        );
    }
    Ok(report)
}

/// Delete every list whose name matches `patterns`
///
/// Same failure semantics as [`delete_all_old_rules`].
pub async fn delete_all_old_lists(
    api: &dyn GatewayApi,
    patterns: &NamePatterns,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<CleanupReport, ApiError> {
    let lists = api.get_lists(cancel).await?;
    let mut report = CleanupReport::default();

    for list in lists.iter().filter(|l| patterns.matches_list(&l.name)) {
        report.matched += 1;

        if dry_run {
            info!(name = %list.name, id = %list.id, "Dry run: would delete list");
            continue;
        }
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        info!(name = %list.name, id = %list.id, "Deleting old list");
        match api.delete_list(&list.id, cancel).await {
            Ok(()) => report.deleted += 1,
            Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
            Err(e) => {
                warn!(name = %list.name, error = %e, "Failed to delete list");
                report.failed += 1;
            }
        }
    }

    if report.matched == 0 {
        info!("No old lists found to delete");
    } else {
        info!(
            matched = report.matched,
            deleted = report.deleted,
            failed = report.failed,
            "Old list cleanup finished"
        );
    }
    Ok(report)
}

/// Create `rule`, or replace the existing rule with the same name
///
/// Name equality is the only identity check.
pub async fn create_or_update_rule(
    api: &dyn GatewayApi,
    rule: &RuleRequest,
    cancel: &CancellationToken,
) -> Result<UpsertOutcome, ApiError> {
    let existing = api.get_rules(cancel).await?;

    match existing.into_iter().find(|r| r.name == rule.name) {
        Some(found) => {
            info!(name = %rule.name, id = %found.id, "Updating rule");
            api.update_rule(&found.id, rule, cancel).await?;
            Ok(UpsertOutcome::Updated(found.id))
        }
        None => {
            info!(name = %rule.name, "Creating rule");
            api.create_rule(rule, cancel).await?;
            Ok(UpsertOutcome::Created)
        }
    }
}
