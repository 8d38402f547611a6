//! Outbound HTTP infrastructure
//!
//! # Components
//!
//! - [`retry`]: Retry manager with exponential backoff inside a time budget
//! - [`http_client`]: Authenticated, rate-aware client for the gateway API

pub mod http_client;
pub mod retry;

// Re-export main types for convenience
pub use http_client::ApiHttpClient;
pub use retry::{Cancelled, RetryManager};
