//! Configuration and cycle orchestration for the Mevo map sync.
//!
//! - [`config`] -- `mevo-config.yaml` loading with environment overrides
//! - [`orchestrator`] -- Runs fetch, parse, and reconcile for each feed
//! - [`error`] -- Failures that stop the orchestrator

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::{ConfigError, SyncConfig};
pub use error::SyncError;
pub use orchestrator::{CycleSummary, FeedOutcome, FeedResult, RunSummary, SyncOrchestrator};
