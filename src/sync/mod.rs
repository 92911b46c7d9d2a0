//! Sync orchestration
//!
//! [`SyncOrchestrator::run_sync`] is the single entry point a scheduled job
//! or the CLI calls. Each active project is scanned for burns from its stored
//! cursors, its current pool is re-ranked and its candles refreshed. Projects
//! are isolated from each other and a dry run never writes.

pub mod options;
pub mod orchestrator;
pub mod report;

pub use options::{SyncOptions, MAX_PAGES_CEILING};
pub use orchestrator::SyncOrchestrator;
pub use report::{ProjectSyncStats, SyncReport};
