//! Reconciliation run
//!
//! A run is strictly sequential and stops at the first unrecovered error:
//!
//! 1. Delete owned rules, then owned lists
//! 2. Wait for the deletions to settle
//! 3. Create block list chunks, then allow list chunks
//! 4. Upsert the DNS rule over the created lists, and the SNI rule if enabled
//!
//! Nothing is rolled back on failure; the next run starts with cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::chunk::plan_chunks;
use super::expression::{build_traffic_expression, TrafficField};
use super::naming::{
    NamePatterns, ALLOW_LIST_BASE, BLOCK_LIST_BASE, DNS_RULE_NAME, SNI_RULE_NAME,
};
use crate::config::Config;
use crate::error::{ApiError, ReconcileError};
use crate::gateway::{
    create_or_update_rule, delete_all_old_lists, delete_all_old_rules, CleanupReport, GatewayApi,
    UpsertOutcome,
};
use crate::models::{FilterKind, RuleRequest};
use crate::sync::retry::pause;

/// Knobs for a reconciliation run
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSettings {
    /// Entries per list
    pub list_item_size: usize,
    /// Soft limit on total entries
    pub list_item_limit: usize,
    /// Show the block page on matches
    pub block_page_enabled: bool,
    /// Also maintain the SNI rule
    pub block_based_on_sni: bool,
    /// Log instead of mutating
    pub dry_run: bool,
    /// Pause between cleanup and creation
    pub settle_delay: Duration,
}

impl ReconcileSettings {
    /// Settings taken from the application configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            list_item_size: config.cloudflare.effective_list_item_size(),
            list_item_limit: config.cloudflare.list_item_limit,
            block_page_enabled: config.behavior.block_page_enabled,
            block_based_on_sni: config.behavior.block_based_on_sni,
            dry_run: config.behavior.dry_run,
            settle_delay: Duration::from_millis(config.behavior.settle_delay_ms),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A list the run created, or would have created in dry-run mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChunk {
    /// Generated list name
    pub name: String,
    /// Number of entries
    pub items: usize,
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rule cleanup counts
    pub rules_cleanup: CleanupReport,
    /// List cleanup counts
    pub lists_cleanup: CleanupReport,
    /// Chunks in creation order, block lists first
    pub planned_chunks: Vec<PlannedChunk>,
    /// Identifiers of the created lists, in creation order
    pub created_list_ids: Vec<String>,
    /// Rules upserted, by name
    pub upserted_rules: Vec<(String, UpsertOutcome)>,
    /// Whether the run was a dry run
    pub dry_run: bool,
}

/// Drives one reconciliation against a [`GatewayApi`]
pub struct Reconciler {
    api: Arc<dyn GatewayApi>,
    settings: ReconcileSettings,
    patterns: NamePatterns,
}

impl Reconciler {
    /// Create a reconciler with the standard name patterns
    pub fn new(api: Arc<dyn GatewayApi>, settings: ReconcileSettings) -> Self {
        Self {
            api,
            settings,
            patterns: NamePatterns::default(),
        }
    }

    /// Reconcile remote state with the given allow and block entries
    pub async fn run(
        &self,
        allow: &[String],
        block: &[String],
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ReconcileError> {
        let api = self.api.as_ref();
        let dry_run = self.settings.dry_run;
        let mut summary = RunSummary {
            dry_run,
            ..Default::default()
        };

        let total = allow.len() + block.len();
        if total > self.settings.list_item_limit {
            warn!(
                total = total,
                limit = self.settings.list_item_limit,
                "Entry count exceeds the list item limit, the API may reject some lists"
            );
        }
        info!(
            allow = allow.len(),
            block = block.len(),
            dry_run = dry_run,
            "Starting reconciliation"
        );

        summary.rules_cleanup = delete_all_old_rules(api, &self.patterns, dry_run, cancel)
            .await
            .map_err(|e| wrap(e, ReconcileError::CleanupRules))?;
        summary.lists_cleanup = delete_all_old_lists(api, &self.patterns, dry_run, cancel)
            .await
            .map_err(|e| wrap(e, ReconcileError::CleanupLists))?;

        if !dry_run && !self.settings.settle_delay.is_zero() {
            info!(
                delay_ms = self.settings.settle_delay.as_millis() as u64,
                "Waiting for deletions to settle"
            );
            if !pause(self.settings.settle_delay, cancel).await {
                return Err(ReconcileError::Cancelled);
            }
        }

        for (base, entries) in [(BLOCK_LIST_BASE, block), (ALLOW_LIST_BASE, allow)] {
            self.create_lists(base, entries, &mut summary, cancel).await?;
        }

        if summary.created_list_ids.is_empty() {
            if dry_run {
                info!(
                    chunks = summary.planned_chunks.len(),
                    "Dry run complete, no changes made"
                );
            } else {
                info!("No lists created, skipping rule update");
            }
            return Ok(summary);
        }

        let mut rules = vec![(
            DNS_RULE_NAME,
            FilterKind::Dns,
            TrafficField::DnsDomains,
            ReconcileError::DnsRule as fn(ApiError) -> ReconcileError,
        )];
        if self.settings.block_based_on_sni {
            rules.push((
                SNI_RULE_NAME,
                FilterKind::L4,
                TrafficField::SniDomains,
                ReconcileError::SniRule,
            ));
        }

        for (name, kind, field, on_error) in rules {
            let Some(traffic) = build_traffic_expression(&summary.created_list_ids, field) else {
                continue;
            };
            let request =
                RuleRequest::block(name, kind, traffic, self.settings.block_page_enabled);
            let outcome = create_or_update_rule(api, &request, cancel)
                .await
                .map_err(|e| wrap(e, on_error))?;
            summary.upserted_rules.push((name.to_string(), outcome));
        }

        info!(
            lists = summary.created_list_ids.len(),
            rules = summary.upserted_rules.len(),
            "Reconciliation complete"
        );
        Ok(summary)
    }

    /// Create the chunked lists for one entry set, appending their ids
    async fn create_lists(
        &self,
        base: &str,
        entries: &[String],
        summary: &mut RunSummary,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        if entries.is_empty() {
            return Ok(());
        }

        let plan = plan_chunks(base, entries, self.settings.list_item_size);
        info!(base = base, chunks = plan.len(), entries = entries.len(), "Creating lists");

        for chunk in plan {
            summary.planned_chunks.push(PlannedChunk {
                name: chunk.name.clone(),
                items: chunk.entries.len(),
            });

            if self.settings.dry_run {
                info!(
                    name = %chunk.name,
                    items = chunk.entries.len(),
                    "Dry run: would create list"
                );
                continue;
            }
            if cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled);
            }

            let list = self
                .api
                .create_list(&chunk.name, chunk.entries, cancel)
                .await
                .map_err(|source| {
                    wrap(source, |source| ReconcileError::CreateList {
                        name: chunk.name.clone(),
                        source,
                    })
                })?;

            info!(name = %chunk.name, id = %list.id, items = chunk.entries.len(), "Created list");
            summary.created_list_ids.push(list.id);
        }
        Ok(())
    }
}

/// Keep cancellation distinct from step failures
fn wrap(err: ApiError, step: impl FnOnce(ApiError) -> ReconcileError) -> ReconcileError {
    match err {
        ApiError::Cancelled => ReconcileError::Cancelled,
        other => step(other),
    }
}
