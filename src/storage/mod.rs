//! Persistence
//!
//! [`SyncStore`] is the record-store seam the pipeline writes through. Every
//! write is keyed by a natural unique id (signature, (project, token,
//! timestamp), (pool, interval, time), source key), so replays are safe.
//! [`SqliteStore`] is the bundled implementation.

pub mod models;
pub mod sqlite;

pub use models::{
    BurnSourceRecord, HolderSnapshot, ImportedProject, InsertOutcome, MigrationRecord, NewProject,
    PoolRecord, ProjectImport, ProjectRecord,
};
pub use sqlite::SqliteStore;

use crate::discovery::DiscoveredPool;
use crate::errors::SyncResult;
use crate::ohlcv::{Interval, OhlcvBar};
use crate::scanner::{BurnEvent, SyncCursor};

pub trait SyncStore: Send + Sync {
    // Projects -----------------------------------------------------------

    /// Duplicate slug or migration id is `PersistenceConflict`
    fn create_project(&self, project: &NewProject) -> SyncResult<ProjectRecord>;
    fn find_project_by_migration_id(&self, migration_id: &str) -> SyncResult<Option<ProjectRecord>>;
    fn list_active_projects(&self) -> SyncResult<Vec<ProjectRecord>>;
    /// Project with its pools, migration and burn source, all or nothing
    fn import_project(&self, import: &ProjectImport) -> SyncResult<ImportedProject>;

    // Pools / migrations -------------------------------------------------

    /// `id` of the argument is ignored; the stored record is returned
    fn insert_pool(&self, pool: &PoolRecord) -> SyncResult<PoolRecord>;
    /// Ordered by `order_index`
    fn list_pools(&self, project_id: i64) -> SyncResult<Vec<PoolRecord>>;
    fn update_pool_market(&self, pool_id: i64, discovered: &DiscoveredPool) -> SyncResult<()>;
    fn insert_migration(&self, migration: &MigrationRecord) -> SyncResult<MigrationRecord>;
    fn list_migrations(&self, project_id: i64) -> SyncResult<Vec<MigrationRecord>>;

    // Burns ----------------------------------------------------------------

    fn add_burn_source(&self, source: &BurnSourceRecord) -> SyncResult<BurnSourceRecord>;
    fn list_burn_sources(&self, project_id: i64) -> SyncResult<Vec<BurnSourceRecord>>;
    /// Existing signature is `Skipped`, never an error
    fn insert_burn_event(&self, event: &BurnEvent) -> SyncResult<InsertOutcome>;
    /// Oldest first
    fn list_burn_events(&self, project_id: i64, since: Option<i64>) -> SyncResult<Vec<BurnEvent>>;

    // Holders --------------------------------------------------------------

    /// Last write wins per (project, token, timestamp)
    fn upsert_holder_snapshot(&self, snapshot: &HolderSnapshot) -> SyncResult<()>;
    /// Oldest first
    fn list_holder_snapshots(
        &self,
        project_id: i64,
        token_address: &str,
        since: Option<i64>,
    ) -> SyncResult<Vec<HolderSnapshot>>;

    // OHLCV ------------------------------------------------------------------

    /// Returns the number of rows written
    fn upsert_ohlcv_bars(&self, pool_address: &str, interval: Interval, bars: &[OhlcvBar]) -> SyncResult<usize>;
    /// Oldest first
    fn list_ohlcv_bars(
        &self,
        pool_address: &str,
        interval: Interval,
        since: Option<i64>,
    ) -> SyncResult<Vec<OhlcvBar>>;

    // Cursors ----------------------------------------------------------------

    fn load_cursor(&self, source_key: &str) -> SyncResult<Option<SyncCursor>>;
    fn save_cursor(&self, cursor: &SyncCursor) -> SyncResult<()>;
    fn list_cursors(&self) -> SyncResult<Vec<SyncCursor>>;
}
