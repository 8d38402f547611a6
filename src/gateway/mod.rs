//! Typed access to the Zero Trust gateway API
//!
//! [`GatewayApi`] is the seam between the reconciliation logic and the
//! network. [`GatewayClient`] implements it over [`ApiHttpClient`]; tests use
//! the generated `MockGatewayApi`.
//!
//! [`ApiHttpClient`]: crate::sync::ApiHttpClient

pub mod client;
pub mod maintenance;

pub use client::GatewayClient;
pub use maintenance::{
    create_or_update_rule, delete_all_old_lists, delete_all_old_rules, CleanupReport,
    UpsertOutcome,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::models::{GatewayList, GatewayRule, RuleRequest};

/// CRUD operations on gateway lists and rules
///
/// Every call takes the run's cancellation token so that retries and waits
/// stop promptly on shutdown.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayApi: Send + Sync {
    // =========================================================================
    // Lists
    // =========================================================================

    /// Fetch all lists in the account
    async fn get_lists(&self, cancel: &CancellationToken) -> Result<Vec<GatewayList>, ApiError>;

    /// Create a `DOMAIN` list holding `items` in order
    ///
    /// The returned list always carries the remote identifier.
    async fn create_list(
        &self,
        name: &str,
        items: &[String],
        cancel: &CancellationToken,
    ) -> Result<GatewayList, ApiError>;

    /// Delete a list by identifier
    async fn delete_list(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError>;

    // =========================================================================
    // Rules
    // =========================================================================

    /// Fetch all rules in the account
    async fn get_rules(&self, cancel: &CancellationToken) -> Result<Vec<GatewayRule>, ApiError>;

    /// Create a rule
    async fn create_rule(
        &self,
        rule: &RuleRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError>;

    /// Replace the rule with identifier `id`
    async fn update_rule(
        &self,
        id: &str,
        rule: &RuleRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError>;

    /// Delete a rule by identifier
    async fn delete_rule(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError>;
}
