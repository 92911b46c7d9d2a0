// Persisted record shapes

use crate::decoder::MigrationStatus;
use crate::scanner::BurnSource;
use serde::{Deserialize, Serialize};

/// Result of an insert keyed by a natural unique id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Row already existed; nothing written
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub slug: String,
    pub name: String,
    pub migration_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub migration_id: String,
    pub is_active: bool,
    pub created_at: i64,
}

/// One pool in a project's chain; `order_index` 0 is the oldest token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: i64,
    pub project_id: i64,
    pub pool_address: String,
    pub token_address: String,
    pub token_symbol: String,
    pub token_name: String,
    pub token_decimals: u8,
    pub dex_type: String,
    pub liquidity_usd: f64,
    pub order_index: i64,
    pub image: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub project_id: i64,
    pub from_pool_order: i64,
    pub to_pool_order: i64,
    /// e.g. `OLD -> NEW`
    pub label: String,
    pub migration_timestamp: i64,
    pub start_timestamp: i64,
    pub exchange_rate: f64,
    /// As of import time
    pub status: MigrationStatus,
    /// Old tokens held by the migration vault at import, UI units
    pub total_migrated: f64,
}

/// Everything an import writes. Row ids and `project_id`s inside are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectImport {
    pub project: NewProject,
    /// Oldest first
    pub pools: Vec<PoolRecord>,
    pub migration: MigrationRecord,
    pub burn_source: Option<BurnSourceRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedProject {
    pub project: ProjectRecord,
    pub pools: Vec<PoolRecord>,
    pub migration: MigrationRecord,
    pub burn_source: Option<BurnSourceRecord>,
}

/// Address whose history feeds a project's burn table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnSourceRecord {
    pub id: i64,
    pub project_id: i64,
    pub address: String,
    pub kind: BurnSource,
    /// Burns of other mints are ignored
    pub mint: String,
    pub decimals: u8,
}

/// Holder count of one token at one instant; unique per (project, token, timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderSnapshot {
    pub project_id: i64,
    pub token_address: String,
    pub timestamp: i64,
    pub holder_count: u64,
}
