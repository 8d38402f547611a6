//! Domain models for gateway-sync
//!
//! This module contains the remote resource shapes and request bodies used
//! when talking to the gateway API.

pub mod envelope;
pub mod list;
pub mod rule;

// Re-export commonly used types
pub use envelope::{ApiEnvelope, ApiMessage};
pub use list::{CreateListRequest, GatewayList, ListItem, ListType};
pub use rule::{FilterKind, GatewayRule, RuleAction, RuleRequest, RuleSettings};
