//! Gateway rule models

use serde::{Deserialize, Serialize};

/// Description attached to every generated rule
pub const RULE_DESCRIPTION: &str =
    "Filter lists created by gateway-sync. Avoid editing this rule. Changing the name of this rule will break the sync.";

/// Block reason shown on the block page
pub const BLOCK_REASON: &str =
    "Blocked by gateway-sync, check your filter lists if this was a mistake.";

/// Traffic class a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// DNS resolver traffic
    Dns,
    /// Network (layer 4) traffic, used for SNI matching
    L4,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::Dns => write!(f, "dns"),
            FilterKind::L4 => write!(f, "l4"),
        }
    }
}

/// Rule action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Block matching traffic
    #[default]
    Block,
}

/// Rule as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRule {
    /// Remote identifier
    pub id: String,

    /// Rule name, the identity key for upserts
    pub name: String,

    /// Matching expression
    #[serde(default)]
    pub traffic: Option<String>,

    /// Filter kinds
    #[serde(default)]
    pub filters: Vec<String>,

    /// Whether the rule is enabled
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Block page settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Show the block page to users
    pub block_page_enabled: bool,

    /// Reason shown on the block page
    pub block_reason: String,
}

/// Body for `POST /rules` and `PUT /rules/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRequest {
    /// Rule name, the identity key for upserts
    pub name: String,

    /// Description shown in the dashboard
    pub description: String,

    /// Whether the rule is enabled
    pub enabled: bool,

    /// Action on match
    pub action: RuleAction,

    /// Block page settings
    pub rule_settings: RuleSettings,

    /// Traffic classes the rule applies to
    pub filters: Vec<FilterKind>,

    /// Matching expression
    pub traffic: String,
}

impl RuleRequest {
    /// Enabled block rule for one filter kind
    pub fn block(
        name: impl Into<String>,
        kind: FilterKind,
        traffic: impl Into<String>,
        block_page_enabled: bool,
    ) -> Self {
        Self {
            name: name.into(),
            description: RULE_DESCRIPTION.to_string(),
            enabled: true,
            action: RuleAction::Block,
            rule_settings: RuleSettings {
                block_page_enabled,
                block_reason: BLOCK_REASON.to_string(),
            },
            filters: vec![kind],
            traffic: traffic.into(),
        }
    }
}
