use async_trait::async_trait;
use migtrack::config::Config;
use migtrack::errors::{SyncError, SyncResult};
use migtrack::ledger::{LedgerRpc, ParsedTransaction, SignatureInfo};
use migtrack::scanner::{BurnSource, SyncCursor};
use migtrack::storage::{BurnSourceRecord, NewProject, SqliteStore, SyncStore};
use migtrack::sync::{SyncOptions, SyncOrchestrator};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// Burn history whose head can grow between runs
struct GrowingLedger {
    /// Newest first
    history: Mutex<Vec<String>>,
}

impl GrowingLedger {
    fn with(count: usize) -> Self {
        let history = (0..count).rev().map(|i| format!("burn-{}", i)).collect();
        Self {
            history: Mutex::new(history),
        }
    }

    fn push_newer(&self, count: usize) {
        let mut history = self.history.lock();
        let start = history.len();
        for i in start..start + count {
            history.insert(0, format!("burn-{}", i));
        }
    }
}

fn time_of(signature: &str) -> i64 {
    let n: i64 = signature
        .trim_start_matches("burn-")
        .parse()
        .unwrap_or_default();
    1_700_000_000 + n * 60
}

#[async_trait]
impl LedgerRpc for GrowingLedger {
    async fn get_signatures_for_address(
        &self,
        _address: &str,
        limit: usize,
        before: Option<&str>,
    ) -> SyncResult<Vec<SignatureInfo>> {
        let history = self.history.lock().clone();
        let start = match before {
            Some(b) => history.iter().position(|s| s == b).map_or(history.len(), |i| i + 1),
            None => 0,
        };
        Ok(history
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|signature| SignatureInfo {
                block_time: Some(time_of(&signature)),
                signature,
                slot: 1,
                err: None,
                memo: None,
                confirmation_status: None,
            })
            .collect())
    }

    async fn get_parsed_transaction(&self, signature: &str) -> SyncResult<Option<ParsedTransaction>> {
        let tx = serde_json::from_value(json!({
            "slot": 1,
            "blockTime": time_of(signature),
            "meta": {"err": null, "innerInstructions": []},
            "transaction": {"message": {"instructions": [{
                "program": "spl-token",
                "programId": "Tokenkeg",
                "parsed": {"type": "burnChecked", "info": {
                    "mint": "NEWMINT", "authority": "HOLDER",
                    "tokenAmount": {"amount": "2500000", "decimals": 6}
                }}
            }]}}
        }))
        .map_err(SyncError::from)?;
        Ok(Some(tx))
    }

    async fn get_account_info(&self, _address: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

fn setup(ledger: Arc<GrowingLedger>) -> (Arc<SqliteStore>, SyncOrchestrator, i64) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let project = store
        .create_project(&NewProject {
            slug: "new".to_string(),
            name: "New Token".to_string(),
            migration_id: "mig79".to_string(),
        })
        .unwrap();
    store
        .add_burn_source(&BurnSourceRecord {
            id: 0,
            project_id: project.id,
            address: "NEWMINT".to_string(),
            kind: BurnSource::TokenMint,
            mint: "NEWMINT".to_string(),
            decimals: 6,
        })
        .unwrap();

    let mut config = Config::default();
    config.scanner.page_limit = 4;
    let orchestrator = SyncOrchestrator::new(&config, ledger, store.clone());
    (store, orchestrator, project.id)
}

#[tokio::test]
async fn repeated_runs_only_add_new_burns() {
    let ledger = Arc::new(GrowingLedger::with(10));
    let (store, orchestrator, project_id) = setup(ledger.clone());

    let first = orchestrator.run_sync(SyncOptions::default()).await.unwrap();
    assert_eq!(first.added, 10);
    assert!(first.errors.is_empty());

    let second = orchestrator.run_sync(SyncOptions::default()).await.unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.projects[0].found, 0);

    ledger.push_newer(3);
    let third = orchestrator.run_sync(SyncOptions::default()).await.unwrap();
    assert_eq!(third.added, 3);

    let events = store.list_burn_events(project_id, None).unwrap();
    assert_eq!(events.len(), 13);
    assert!(events.iter().all(|e| (e.amount - 2.5).abs() < 1e-9));
    assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn rescan_from_scratch_skips_stored_signatures() {
    let ledger = Arc::new(GrowingLedger::with(6));
    let (store, orchestrator, _) = setup(ledger);

    orchestrator.run_sync(SyncOptions::default()).await.unwrap();
    store
        .save_cursor(&SyncCursor::new(SyncCursor::source_key_for("token_mint", "NEWMINT")))
        .unwrap();

    let report = orchestrator.run_sync(SyncOptions::default()).await.unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(report.skipped, 6);
    assert_eq!(report.projects[0].found, 6);
}

#[tokio::test]
async fn dry_run_then_real_run() {
    let ledger = Arc::new(GrowingLedger::with(5));
    let (store, orchestrator, project_id) = setup(ledger);

    let dry = orchestrator
        .run_sync(SyncOptions {
            dry_run: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(dry.projects[0].found, 5);
    assert_eq!(dry.added, 0);
    assert!(store.load_cursor("token_mint:NEWMINT").unwrap().is_none());

    let real = orchestrator.run_sync(SyncOptions::default()).await.unwrap();
    assert_eq!(real.added, 5);
    assert_eq!(store.list_burn_events(project_id, None).unwrap().len(), 5);
}
