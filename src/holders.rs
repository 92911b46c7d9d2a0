/// Holder snapshots: validation, backfill and summaries
///
/// A snapshot records how many wallets held a project's token at a moment.
/// Timestamps in the future are rejected before the store is touched.
use crate::errors::{SyncError, SyncResult};
use crate::logger::{self, LogTag};
use crate::storage::{HolderSnapshot, SyncStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Reject malformed snapshots; `now` is the ingestion time
pub fn validate_snapshot(snapshot: &HolderSnapshot, now: i64) -> SyncResult<()> {
    if snapshot.token_address.trim().is_empty() {
        return Err(SyncError::validation("token_address", "must not be empty"));
    }
    if snapshot.timestamp <= 0 {
        return Err(SyncError::validation(
            "timestamp",
            format!("{} is not a valid unix timestamp", snapshot.timestamp),
        ));
    }
    if snapshot.timestamp > now {
        return Err(SyncError::validation(
            "timestamp",
            format!("{} is in the future (now {})", snapshot.timestamp, now),
        ));
    }
    Ok(())
}

/// Validate then upsert one snapshot
pub fn record_snapshot(store: &dyn SyncStore, snapshot: &HolderSnapshot) -> SyncResult<()> {
    validate_snapshot(snapshot, Utc::now().timestamp())?;
    store.upsert_holder_snapshot(snapshot)
}

/// Per-item outcome of a backfill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotResult {
    pub project_id: i64,
    pub token_address: String,
    pub timestamp: i64,
    pub success: bool,
    pub error: Option<String>,
}

/// Upsert many snapshots; one bad item never stops the batch
pub fn backfill_snapshots(store: &dyn SyncStore, snapshots: &[HolderSnapshot]) -> Vec<SnapshotResult> {
    let results: Vec<SnapshotResult> = snapshots
        .iter()
        .map(|snapshot| {
            let outcome = record_snapshot(store, snapshot);
            SnapshotResult {
                project_id: snapshot.project_id,
                token_address: snapshot.token_address.clone(),
                timestamp: snapshot.timestamp,
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
            }
        })
        .collect();

    let ok = results.iter().filter(|r| r.success).count();
    logger::info(
        LogTag::Holders,
        &format!("Holder backfill: {}/{} snapshots stored", ok, results.len()),
    );
    results
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderSummary {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub first: u64,
    pub last: u64,
    /// `last - first`
    pub growth: i64,
    /// Relative to `first`; 0 when `first` is 0
    pub growth_pct: f64,
    /// Span between first and last snapshot
    pub days: f64,
}

/// Summary over snapshots in any order; `None` when empty
pub fn summarize_holders(snapshots: &[HolderSnapshot]) -> Option<HolderSummary> {
    let mut sorted: Vec<&HolderSnapshot> = snapshots.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);

    let first = sorted.first()?;
    let last = sorted.last()?;
    let counts = sorted.iter().map(|s| s.holder_count);
    let min = counts.clone().min()?;
    let max = counts.clone().max()?;
    let avg = counts.map(|c| c as f64).sum::<f64>() / sorted.len() as f64;

    let growth = last.holder_count as i64 - first.holder_count as i64;
    let growth_pct = if first.holder_count > 0 {
        growth as f64 / first.holder_count as f64 * 100.0
    } else {
        0.0
    };

    Some(HolderSummary {
        min,
        max,
        avg,
        first: first.holder_count,
        last: last.holder_count,
        growth,
        growth_pct,
        days: (last.timestamp - first.timestamp) as f64 / SECONDS_PER_DAY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    fn snap(timestamp: i64, count: u64) -> HolderSnapshot {
        HolderSnapshot {
            project_id: 1,
            token_address: "T".to_string(),
            timestamp,
            holder_count: count,
        }
    }

    #[test]
    fn test_future_timestamp_rejected_before_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let future = snap(Utc::now().timestamp() + 3_600, 10);

        let err = record_snapshot(&store, &future).unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
        assert!(store.list_holder_snapshots(1, "T", None).unwrap().is_empty());
    }

    #[test]
    fn test_backfill_reports_per_item() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now().timestamp();
        let mut empty_token = snap(now - 10, 3);
        empty_token.token_address = String::new();

        let results = backfill_snapshots(
            &store,
            &[snap(now - 100, 5), snap(now + 100, 6), empty_token, snap(now - 50, 7)],
        );
        let flags: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(flags, vec![true, false, false, true]);
        assert!(results[1].error.as_deref().unwrap_or_default().contains("future"));
        assert_eq!(store.list_holder_snapshots(1, "T", None).unwrap().len(), 2);
    }

    #[test]
    fn test_summary() {
        let day = 86_400;
        let summary = summarize_holders(&[snap(2 * day, 150), snap(0, 100), snap(day, 90)]).unwrap();
        assert_eq!(summary.min, 90);
        assert_eq!(summary.max, 150);
        assert_eq!(summary.first, 100);
        assert_eq!(summary.last, 150);
        assert_eq!(summary.growth, 50);
        assert!((summary.growth_pct - 50.0).abs() < 1e-9);
        assert!((summary.avg - 340.0 / 3.0).abs() < 1e-9);
        assert!((summary.days - 2.0).abs() < 1e-9);

        assert!(summarize_holders(&[]).is_none());
    }
}
