// SQLite implementation of the sync store

use super::models::*;
use super::SyncStore;
use crate::decoder::MigrationStatus;
use crate::discovery::DiscoveredPool;
use crate::errors::{SyncError, SyncResult};
use crate::logger::{self, LogTag};
use crate::ohlcv::{Interval, OhlcvBar};
use crate::scanner::{BurnEvent, BurnSource, SyncCursor, Watermark};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        migration_id TEXT NOT NULL UNIQUE,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pools (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        pool_address TEXT NOT NULL,
        token_address TEXT NOT NULL,
        token_symbol TEXT NOT NULL,
        token_name TEXT NOT NULL,
        token_decimals INTEGER NOT NULL,
        dex_type TEXT NOT NULL,
        liquidity_usd REAL NOT NULL DEFAULT 0.0,
        order_index INTEGER NOT NULL,
        image TEXT,
        website TEXT,
        twitter TEXT,
        telegram TEXT,
        UNIQUE(project_id, order_index)
    );

    CREATE TABLE IF NOT EXISTS migrations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        from_pool_order INTEGER NOT NULL,
        to_pool_order INTEGER NOT NULL,
        label TEXT NOT NULL,
        migration_timestamp INTEGER NOT NULL,
        start_timestamp INTEGER NOT NULL,
        exchange_rate REAL NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        total_migrated REAL NOT NULL DEFAULT 0.0,
        UNIQUE(project_id, from_pool_order, to_pool_order)
    );

    CREATE TABLE IF NOT EXISTS burn_sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id),
        address TEXT NOT NULL,
        kind TEXT NOT NULL,
        mint TEXT NOT NULL,
        decimals INTEGER NOT NULL,
        UNIQUE(project_id, address)
    );

    CREATE TABLE IF NOT EXISTS burn_events (
        signature TEXT PRIMARY KEY,
        project_id INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        amount REAL NOT NULL,
        raw_amount TEXT NOT NULL,
        source_address TEXT NOT NULL,
        slot INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_burns_project_time ON burn_events(project_id, timestamp);

    CREATE TABLE IF NOT EXISTS holder_snapshots (
        project_id INTEGER NOT NULL,
        token_address TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        holder_count INTEGER NOT NULL,
        PRIMARY KEY (project_id, token_address, timestamp)
    );

    CREATE TABLE IF NOT EXISTS ohlcv_bars (
        pool_address TEXT NOT NULL,
        interval TEXT NOT NULL,
        time INTEGER NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        volume REAL NOT NULL,
        PRIMARY KEY (pool_address, interval, time)
    );

    CREATE TABLE IF NOT EXISTS sync_cursors (
        source_key TEXT PRIMARY KEY,
        watermark_signature TEXT,
        watermark_timestamp INTEGER,
        pending_signature TEXT,
        pending_timestamp INTEGER,
        resume_before TEXT,
        updated_at INTEGER NOT NULL
    );
"#;

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its tables
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            SyncError::persistence(format!("Failed to open database {}: {}", path.display(), e))
        })?;
        let store = Self::from_connection(conn)?;
        logger::debug(LogTag::Storage, &format!("Opened database {}", path.display()));
        Ok(store)
    }

    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::persistence(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> SyncResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| SyncError::persistence(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SyncError::persistence(format!("Lock error: {}", e)))
    }
}

// =============================================================================
// ROW MAPPERS
// =============================================================================

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        migration_id: row.get(3)?,
        is_active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
    })
}

const POOL_COLUMNS: &str = "id, project_id, pool_address, token_address, token_symbol, token_name, \
     token_decimals, dex_type, liquidity_usd, order_index, image, website, twitter, telegram";

fn pool_from_row(row: &Row<'_>) -> rusqlite::Result<PoolRecord> {
    Ok(PoolRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        pool_address: row.get(2)?,
        token_address: row.get(3)?,
        token_symbol: row.get(4)?,
        token_name: row.get(5)?,
        token_decimals: row.get::<_, i64>(6)?.clamp(0, u8::MAX as i64) as u8,
        dex_type: row.get(7)?,
        liquidity_usd: row.get(8)?,
        order_index: row.get(9)?,
        image: row.get(10)?,
        website: row.get(11)?,
        twitter: row.get(12)?,
        telegram: row.get(13)?,
    })
}

fn burn_from_row(row: &Row<'_>) -> rusqlite::Result<BurnEvent> {
    let raw: String = row.get(4)?;
    Ok(BurnEvent {
        signature: row.get(0)?,
        project_id: row.get(1)?,
        timestamp: row.get(2)?,
        amount: row.get(3)?,
        raw_amount: raw.parse().unwrap_or_default(),
        source_address: row.get(5)?,
        slot: row.get::<_, i64>(6)?.max(0) as u64,
    })
}

fn bar_from_row(row: &Row<'_>) -> rusqlite::Result<OhlcvBar> {
    Ok(OhlcvBar {
        time: row.get(0)?,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
        volume: row.get(5)?,
    })
}

fn cursor_from_row(row: &Row<'_>) -> rusqlite::Result<SyncCursor> {
    let watermark_signature: Option<String> = row.get(1)?;
    let watermark_timestamp: Option<i64> = row.get(2)?;
    let pending_signature: Option<String> = row.get(3)?;
    let pending_timestamp: Option<i64> = row.get(4)?;
    Ok(SyncCursor {
        source_key: row.get(0)?,
        watermark: watermark_signature.map(|signature| Watermark {
            signature,
            timestamp: watermark_timestamp,
        }),
        pending_newest: pending_signature.map(|signature| Watermark {
            signature,
            timestamp: pending_timestamp,
        }),
        resume_before: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _) if code.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_project_row(conn: &Connection, project: &NewProject, now: i64) -> SyncResult<ProjectRecord> {
    conn.execute(
        "INSERT INTO projects (slug, name, migration_id, is_active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![project.slug, project.name, project.migration_id, now],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            SyncError::PersistenceConflict {
                key: format!("project {} / {}", project.slug, project.migration_id),
            }
        } else {
            SyncError::from(e)
        }
    })?;

    Ok(ProjectRecord {
        id: conn.last_insert_rowid(),
        slug: project.slug.clone(),
        name: project.name.clone(),
        migration_id: project.migration_id.clone(),
        is_active: true,
        created_at: now,
    })
}

fn insert_pool_row(conn: &Connection, pool: &PoolRecord) -> SyncResult<PoolRecord> {
    conn.execute(
        "INSERT INTO pools (project_id, pool_address, token_address, token_symbol, token_name,
            token_decimals, dex_type, liquidity_usd, order_index, image, website, twitter, telegram)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            pool.project_id,
            pool.pool_address,
            pool.token_address,
            pool.token_symbol,
            pool.token_name,
            pool.token_decimals as i64,
            pool.dex_type,
            pool.liquidity_usd,
            pool.order_index,
            pool.image,
            pool.website,
            pool.twitter,
            pool.telegram,
        ],
    )?;
    Ok(PoolRecord {
        id: conn.last_insert_rowid(),
        ..pool.clone()
    })
}

fn insert_migration_row(conn: &Connection, migration: &MigrationRecord) -> SyncResult<MigrationRecord> {
    conn.execute(
        "INSERT INTO migrations (project_id, from_pool_order, to_pool_order, label,
            migration_timestamp, start_timestamp, exchange_rate, status, total_migrated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            migration.project_id,
            migration.from_pool_order,
            migration.to_pool_order,
            migration.label,
            migration.migration_timestamp,
            migration.start_timestamp,
            migration.exchange_rate,
            migration.status.as_str(),
            migration.total_migrated,
        ],
    )?;
    Ok(MigrationRecord {
        id: conn.last_insert_rowid(),
        ..migration.clone()
    })
}

fn insert_burn_source_row(conn: &Connection, source: &BurnSourceRecord) -> SyncResult<BurnSourceRecord> {
    conn.execute(
        "INSERT INTO burn_sources (project_id, address, kind, mint, decimals)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            source.project_id,
            source.address,
            source.kind.as_str(),
            source.mint,
            source.decimals as i64,
        ],
    )?;
    Ok(BurnSourceRecord {
        id: conn.last_insert_rowid(),
        ..source.clone()
    })
}

// =============================================================================
// STORE
// =============================================================================

impl SyncStore for SqliteStore {
    fn create_project(&self, project: &NewProject) -> SyncResult<ProjectRecord> {
        insert_project_row(&*self.lock()?, project, Utc::now().timestamp())
    }

    fn find_project_by_migration_id(&self, migration_id: &str) -> SyncResult<Option<ProjectRecord>> {
        let conn = self.lock()?;
        let project = conn
            .query_row(
                "SELECT id, slug, name, migration_id, is_active, created_at
                 FROM projects WHERE migration_id = ?1",
                params![migration_id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    fn list_active_projects(&self) -> SyncResult<Vec<ProjectRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, slug, name, migration_id, is_active, created_at
             FROM projects WHERE is_active = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn import_project(&self, import: &ProjectImport) -> SyncResult<ImportedProject> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let project = insert_project_row(&tx, &import.project, Utc::now().timestamp())?;
        let pools = import
            .pools
            .iter()
            .map(|pool| {
                insert_pool_row(
                    &tx,
                    &PoolRecord {
                        project_id: project.id,
                        ..pool.clone()
                    },
                )
            })
            .collect::<SyncResult<Vec<_>>>()?;
        let migration = insert_migration_row(
            &tx,
            &MigrationRecord {
                project_id: project.id,
                ..import.migration.clone()
            },
        )?;
        let burn_source = import
            .burn_source
            .as_ref()
            .map(|source| {
                insert_burn_source_row(
                    &tx,
                    &BurnSourceRecord {
                        project_id: project.id,
                        ..source.clone()
                    },
                )
            })
            .transpose()?;

        // Dropping `tx` on any early return above rolls everything back
        tx.commit()?;
        Ok(ImportedProject {
            project,
            pools,
            migration,
            burn_source,
        })
    }

    fn insert_pool(&self, pool: &PoolRecord) -> SyncResult<PoolRecord> {
        insert_pool_row(&*self.lock()?, pool)
    }

    fn list_pools(&self, project_id: i64) -> SyncResult<Vec<PoolRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM pools WHERE project_id = ?1 ORDER BY order_index",
            POOL_COLUMNS
        ))?;
        let rows = stmt.query_map(params![project_id], pool_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_pool_market(&self, pool_id: i64, discovered: &DiscoveredPool) -> SyncResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE pools SET pool_address = ?1, dex_type = ?2, liquidity_usd = ?3 WHERE id = ?4",
            params![
                discovered.pool_address,
                discovered.dex_type.as_str(),
                discovered.liquidity_usd,
                pool_id
            ],
        )?;
        if changed == 0 {
            return Err(SyncError::not_found(format!("pool {}", pool_id)));
        }
        Ok(())
    }

    fn insert_migration(&self, migration: &MigrationRecord) -> SyncResult<MigrationRecord> {
        insert_migration_row(&*self.lock()?, migration)
    }

    fn list_migrations(&self, project_id: i64) -> SyncResult<Vec<MigrationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, project_id, from_pool_order, to_pool_order, label, migration_timestamp,
                start_timestamp, exchange_rate, status, total_migrated
             FROM migrations WHERE project_id = ?1 ORDER BY migration_timestamp",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            let status: String = row.get(8)?;
            Ok((
                MigrationRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    from_pool_order: row.get(2)?,
                    to_pool_order: row.get(3)?,
                    label: row.get(4)?,
                    migration_timestamp: row.get(5)?,
                    start_timestamp: row.get(6)?,
                    exchange_rate: row.get(7)?,
                    status: MigrationStatus::Active,
                    total_migrated: row.get(9)?,
                },
                status,
            ))
        })?;

        let mut migrations = Vec::new();
        for row in rows {
            let (mut migration, status) = row?;
            migration.status = MigrationStatus::parse(&status).ok_or_else(|| {
                SyncError::persistence(format!("unknown migration status '{}' on migration {}", status, migration.id))
            })?;
            migrations.push(migration);
        }
        Ok(migrations)
    }

    fn add_burn_source(&self, source: &BurnSourceRecord) -> SyncResult<BurnSourceRecord> {
        insert_burn_source_row(&*self.lock()?, source)
    }

    fn list_burn_sources(&self, project_id: i64) -> SyncResult<Vec<BurnSourceRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, project_id, address, kind, mint, decimals
             FROM burn_sources WHERE project_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            let kind: String = row.get(3)?;
            Ok((
                BurnSourceRecord {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    address: row.get(2)?,
                    kind: BurnSource::TokenMint,
                    mint: row.get(4)?,
                    decimals: row.get::<_, i64>(5)?.clamp(0, u8::MAX as i64) as u8,
                },
                kind,
            ))
        })?;

        let mut sources = Vec::new();
        for row in rows {
            let (mut source, kind) = row?;
            source.kind = BurnSource::parse(&kind).ok_or_else(|| {
                SyncError::persistence(format!("unknown burn source kind '{}' on source {}", kind, source.id))
            })?;
            sources.push(source);
        }
        Ok(sources)
    }

    fn insert_burn_event(&self, event: &BurnEvent) -> SyncResult<InsertOutcome> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO burn_events (signature, project_id, timestamp, amount, raw_amount, source_address, slot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(signature) DO NOTHING",
            params![
                event.signature,
                event.project_id,
                event.timestamp,
                event.amount,
                event.raw_amount.to_string(),
                event.source_address,
                event.slot as i64,
            ],
        )?;
        Ok(if changed == 0 {
            InsertOutcome::Skipped
        } else {
            InsertOutcome::Inserted
        })
    }

    fn list_burn_events(&self, project_id: i64, since: Option<i64>) -> SyncResult<Vec<BurnEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT signature, project_id, timestamp, amount, raw_amount, source_address, slot
             FROM burn_events WHERE project_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp, signature",
        )?;
        let rows = stmt.query_map(params![project_id, since.unwrap_or(i64::MIN)], burn_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn upsert_holder_snapshot(&self, snapshot: &HolderSnapshot) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO holder_snapshots (project_id, token_address, timestamp, holder_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, token_address, timestamp)
             DO UPDATE SET holder_count = excluded.holder_count",
            params![
                snapshot.project_id,
                snapshot.token_address,
                snapshot.timestamp,
                i64::try_from(snapshot.holder_count).unwrap_or(i64::MAX),
            ],
        )?;
        Ok(())
    }

    fn list_holder_snapshots(
        &self,
        project_id: i64,
        token_address: &str,
        since: Option<i64>,
    ) -> SyncResult<Vec<HolderSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT project_id, token_address, timestamp, holder_count
             FROM holder_snapshots
             WHERE project_id = ?1 AND token_address = ?2 AND timestamp >= ?3
             ORDER BY timestamp",
        )?;
        let rows = stmt.query_map(
            params![project_id, token_address, since.unwrap_or(i64::MIN)],
            |row| {
                Ok(HolderSnapshot {
                    project_id: row.get(0)?,
                    token_address: row.get(1)?,
                    timestamp: row.get(2)?,
                    holder_count: row.get::<_, i64>(3)?.max(0) as u64,
                })
            },
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn upsert_ohlcv_bars(&self, pool_address: &str, interval: Interval, bars: &[OhlcvBar]) -> SyncResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let interval_key = interval.to_string();
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ohlcv_bars (pool_address, interval, time, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(pool_address, interval, time) DO UPDATE SET
                    open = excluded.open, high = excluded.high, low = excluded.low,
                    close = excluded.close, volume = excluded.volume",
            )?;
            for bar in bars {
                written += stmt.execute(params![
                    pool_address,
                    interval_key,
                    bar.time,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn list_ohlcv_bars(
        &self,
        pool_address: &str,
        interval: Interval,
        since: Option<i64>,
    ) -> SyncResult<Vec<OhlcvBar>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT time, open, high, low, close, volume FROM ohlcv_bars
             WHERE pool_address = ?1 AND interval = ?2 AND time >= ?3
             ORDER BY time",
        )?;
        let rows = stmt.query_map(
            params![pool_address, interval.to_string(), since.unwrap_or(i64::MIN)],
            bar_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_cursor(&self, source_key: &str) -> SyncResult<Option<SyncCursor>> {
        let conn = self.lock()?;
        let cursor = conn
            .query_row(
                "SELECT source_key, watermark_signature, watermark_timestamp, pending_signature,
                    pending_timestamp, resume_before, updated_at
                 FROM sync_cursors WHERE source_key = ?1",
                params![source_key],
                cursor_from_row,
            )
            .optional()?;
        Ok(cursor)
    }

    fn save_cursor(&self, cursor: &SyncCursor) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sync_cursors (source_key, watermark_signature, watermark_timestamp,
                pending_signature, pending_timestamp, resume_before, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source_key) DO UPDATE SET
                watermark_signature = excluded.watermark_signature,
                watermark_timestamp = excluded.watermark_timestamp,
                pending_signature = excluded.pending_signature,
                pending_timestamp = excluded.pending_timestamp,
                resume_before = excluded.resume_before,
                updated_at = excluded.updated_at",
            params![
                cursor.source_key,
                cursor.watermark.as_ref().map(|w| w.signature.clone()),
                cursor.watermark.as_ref().and_then(|w| w.timestamp),
                cursor.pending_newest.as_ref().map(|w| w.signature.clone()),
                cursor.pending_newest.as_ref().and_then(|w| w.timestamp),
                cursor.resume_before,
                cursor.updated_at,
            ],
        )?;
        Ok(())
    }

    fn list_cursors(&self) -> SyncResult<Vec<SyncCursor>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source_key, watermark_signature, watermark_timestamp, pending_signature,
                pending_timestamp, resume_before, updated_at
             FROM sync_cursors ORDER BY source_key",
        )?;
        let rows = stmt.query_map([], cursor_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DexType;

    fn burn(signature: &str, timestamp: i64) -> BurnEvent {
        BurnEvent {
            signature: signature.to_string(),
            project_id: 1,
            timestamp,
            amount: 1.5,
            raw_amount: u64::MAX,
            source_address: "AUTH".to_string(),
            slot: 42,
        }
    }

    fn project(store: &SqliteStore, migration_id: &str) -> ProjectRecord {
        store
            .create_project(&NewProject {
                slug: migration_id.to_lowercase(),
                name: "Project".to_string(),
                migration_id: migration_id.to_string(),
            })
            .unwrap()
    }

    #[test]
    fn test_burn_insert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.insert_burn_event(&burn("a", 10)).unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_burn_event(&burn("a", 10)).unwrap(), InsertOutcome::Skipped);
        assert_eq!(store.insert_burn_event(&burn("b", 5)).unwrap(), InsertOutcome::Inserted);

        let events = store.list_burn_events(1, None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].signature, "b");
        assert_eq!(events[1].raw_amount, u64::MAX);
        assert_eq!(store.list_burn_events(1, Some(6)).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_project_is_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = project(&store, "MIG1");
        assert!(created.id > 0);

        let err = store
            .create_project(&NewProject {
                slug: "other".to_string(),
                name: "Other".to_string(),
                migration_id: "MIG1".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::PersistenceConflict { .. }));

        let found = store.find_project_by_migration_id("MIG1").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_project_by_migration_id("nope").unwrap().is_none());
        assert_eq!(store.list_active_projects().unwrap().len(), 1);
    }

    fn pool(order_index: i64, address: &str) -> PoolRecord {
        PoolRecord {
            id: 0,
            project_id: 0,
            pool_address: address.to_string(),
            token_address: address.to_string(),
            token_symbol: "TOK".to_string(),
            token_name: "Token".to_string(),
            token_decimals: 6,
            dex_type: "unknown".to_string(),
            liquidity_usd: 0.0,
            order_index,
            image: None,
            website: None,
            twitter: None,
            telegram: None,
        }
    }

    fn planned_import(pools: Vec<PoolRecord>) -> ProjectImport {
        ProjectImport {
            project: NewProject {
                slug: "new".to_string(),
                name: "New".to_string(),
                migration_id: "MIG9".to_string(),
            },
            pools,
            migration: MigrationRecord {
                id: 0,
                project_id: 0,
                from_pool_order: 0,
                to_pool_order: 1,
                label: "OLD -> NEW".to_string(),
                migration_timestamp: 200,
                start_timestamp: 100,
                exchange_rate: 2.0,
                status: MigrationStatus::Completed,
                total_migrated: 1500.5,
            },
            burn_source: Some(BurnSourceRecord {
                id: 0,
                project_id: 0,
                address: "NEWMINT".to_string(),
                kind: BurnSource::TokenMint,
                mint: "NEWMINT".to_string(),
                decimals: 6,
            }),
        }
    }

    #[test]
    fn test_failed_import_leaves_nothing_and_can_be_retried() {
        let store = SqliteStore::open_in_memory().unwrap();

        // Second pool collides on (project_id, order_index)
        let broken = planned_import(vec![pool(0, "OLD"), pool(0, "NEW")]);
        assert!(store.import_project(&broken).is_err());
        assert!(store.find_project_by_migration_id("MIG9").unwrap().is_none());
        assert!(store.list_active_projects().unwrap().is_empty());

        let imported = store
            .import_project(&planned_import(vec![pool(0, "OLD"), pool(1, "NEW")]))
            .unwrap();
        let id = imported.project.id;
        assert_eq!(imported.pools.iter().map(|p| p.project_id).collect::<Vec<_>>(), vec![id, id]);
        assert_eq!(store.list_pools(id).unwrap().len(), 2);
        assert_eq!(store.list_burn_sources(id).unwrap().len(), 1);

        let migrations = store.list_migrations(id).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].status, MigrationStatus::Completed);
        assert_eq!(migrations[0].total_migrated, 1500.5);
        assert_eq!(migrations[0], imported.migration);
    }

    #[test]
    fn test_holder_upsert_last_write_wins() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut snapshot = HolderSnapshot {
            project_id: 1,
            token_address: "T".to_string(),
            timestamp: 100,
            holder_count: 10,
        };
        store.upsert_holder_snapshot(&snapshot).unwrap();
        snapshot.holder_count = 12;
        store.upsert_holder_snapshot(&snapshot).unwrap();

        let rows = store.list_holder_snapshots(1, "T", None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].holder_count, 12);
    }

    #[test]
    fn test_pools_and_market_update() {
        let store = SqliteStore::open_in_memory().unwrap();
        let p = project(&store, "MIG2");
        let pool = store
            .insert_pool(&PoolRecord {
                project_id: p.id,
                website: Some("https://x".to_string()),
                ..pool(1, "TOKEN")
            })
            .unwrap();

        store
            .update_pool_market(
                pool.id,
                &DiscoveredPool {
                    pool_address: "POOL".to_string(),
                    dex_type: DexType::Raydium,
                    dex_id: "raydium".to_string(),
                    liquidity_usd: 1234.0,
                    volume_24h_usd: 0.0,
                    price_usd: 0.0,
                },
            )
            .unwrap();

        let pools = store.list_pools(p.id).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].pool_address, "POOL");
        assert_eq!(pools[0].dex_type, "raydium");
        assert_eq!(pools[0].token_decimals, 6);
        assert_eq!(pools[0].website.as_deref(), Some("https://x"));
        assert!(store.update_pool_market(999, &DiscoveredPool::pseudo_pool("x")).is_err());
    }

    #[test]
    fn test_cursor_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load_cursor("burn:A").unwrap().is_none());

        let cursor = SyncCursor {
            source_key: "burn:A".to_string(),
            watermark: Some(Watermark {
                signature: "w".to_string(),
                timestamp: Some(5),
            }),
            pending_newest: Some(Watermark {
                signature: "p".to_string(),
                timestamp: None,
            }),
            resume_before: Some("r".to_string()),
            updated_at: 9,
        };
        store.save_cursor(&cursor).unwrap();
        assert_eq!(store.load_cursor("burn:A").unwrap(), Some(cursor.clone()));

        let mut done = cursor;
        done.pending_newest = None;
        done.resume_before = None;
        store.save_cursor(&done).unwrap();
        assert_eq!(store.list_cursors().unwrap(), vec![done]);
    }

    #[test]
    fn test_ohlcv_upsert() {
        let store = SqliteStore::open_in_memory().unwrap();
        let bars = vec![
            OhlcvBar::new(0, 1.0, 2.0, 0.5, 1.5, 1.0),
            OhlcvBar::new(3600, 1.5, 2.0, 1.0, 1.2, 2.0),
        ];
        assert_eq!(store.upsert_ohlcv_bars("P", Interval::Hour1, &bars).unwrap(), 2);
        let updated = vec![OhlcvBar::new(3600, 1.5, 2.5, 1.0, 2.4, 3.0)];
        store.upsert_ohlcv_bars("P", Interval::Hour1, &updated).unwrap();

        let stored = store.list_ohlcv_bars("P", Interval::Hour1, None).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].close, 2.4);
        assert!(store.list_ohlcv_bars("P", Interval::Hour4, None).unwrap().is_empty());
    }
}
