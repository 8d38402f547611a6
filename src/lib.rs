//! gateway-sync - Keeps Zero Trust gateway lists and rules in sync with domain blocklists
//!
//! This crate downloads allow and block domain lists, splits them into
//! list-sized chunks, and reconciles the remote gateway lists and the rules
//! referencing them.

pub mod config;
pub mod downloader;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod sync;
