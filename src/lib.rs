//! migtrack: ingestion and aggregation pipeline behind token migration
//! dashboards.
//!
//! The crate pulls burn history, migration accounts, pool listings and
//! candles from upstream APIs through a shared rate-limited scheduler and
//! writes them into an idempotent record store.

pub mod config;
pub mod errors;
pub mod logger;

pub mod burn_summary;
pub mod decoder;
pub mod discovery;
pub mod holders;
pub mod importer;
pub mod ledger;
pub mod ohlcv;
pub mod scanner;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use errors::{SyncError, SyncResult};
