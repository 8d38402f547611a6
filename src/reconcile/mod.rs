//! Reconciliation of remote lists and rules against the local entry sets
//!
//! # Components
//!
//! - [`naming`]: names of owned resources, current and legacy
//! - [`chunk`]: splitting entry sets into list-sized chunks
//! - [`expression`]: traffic expressions over created list ids
//! - [`orchestrator`]: the cleanup, create, compose sequence

pub mod chunk;
pub mod expression;
pub mod naming;
pub mod orchestrator;

pub use chunk::{plan_chunks, ChunkPlan};
pub use expression::{build_traffic_expression, TrafficField};
pub use naming::NamePatterns;
pub use orchestrator::{PlannedChunk, ReconcileSettings, Reconciler, RunSummary};
