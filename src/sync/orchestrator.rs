use super::options::SyncOptions;
use super::report::{ProjectSyncStats, SyncReport};
use crate::config::Config;
use crate::discovery::PoolDiscovery;
use crate::errors::SyncResult;
use crate::ledger::LedgerRpc;
use crate::logger::{self, LogTag};
use crate::ohlcv::OhlcvPipeline;
use crate::scanner::{ScanLimits, ScanRequest, StopReason, SyncCursor, TransactionScanner};
use crate::storage::{BurnSourceRecord, InsertOutcome, ProjectRecord, SyncStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Runs burn scans, pool refresh and candle refresh for every active project
pub struct SyncOrchestrator {
    store: Arc<dyn SyncStore>,
    scanner: TransactionScanner,
    discovery: Option<Arc<PoolDiscovery>>,
    ohlcv: Option<OhlcvPipeline>,
    max_run: Duration,
    max_concurrent_projects: usize,
    default_max_pages: u32,
    cancel: Arc<AtomicBool>,
}

struct ProjectOutcome {
    stats: ProjectSyncStats,
    interrupted: bool,
}

impl SyncOrchestrator {
    pub fn new(config: &Config, ledger: Arc<dyn LedgerRpc>, store: Arc<dyn SyncStore>) -> Self {
        Self {
            store,
            scanner: TransactionScanner::new(
                ledger,
                config.scanner.page_limit,
                config.scanner.transaction_concurrency,
            ),
            discovery: None,
            ohlcv: None,
            max_run: Duration::from_secs(config.sync.max_run_seconds),
            max_concurrent_projects: config.sync.max_concurrent_projects.max(1),
            default_max_pages: config.scanner.default_max_pages,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_discovery(mut self, discovery: Arc<PoolDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_ohlcv(mut self, pipeline: OhlcvPipeline) -> Self {
        self.ohlcv = Some(pipeline);
        self
    }

    /// Share an externally owned cancel flag (Ctrl-C handler)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// One full sync pass
    ///
    /// Options are validated before any I/O. Project failures land in the
    /// report; only fatal errors (configuration, persistence) abort the run.
    pub async fn run_sync(&self, options: SyncOptions) -> SyncResult<SyncReport> {
        options.validate(Utc::now().timestamp())?;

        let projects = self.store.list_active_projects()?;
        let deadline = Instant::now() + self.max_run;

        logger::info(
            LogTag::Sync,
            &format!(
                "Starting sync of {} projects (dry_run={}, max_pages={:?}, since={:?})",
                projects.len(),
                options.dry_run,
                options.max_pages,
                options.since_timestamp
            ),
        );

        let outcomes: Vec<SyncResult<ProjectOutcome>> = stream::iter(
            projects
                .iter()
                .map(|project| self.sync_project(project, &options, deadline)),
        )
        .buffer_unordered(self.max_concurrent_projects)
        .collect()
        .await;

        let mut report = SyncReport {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let mut finished = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let outcome = outcome?;
            report.interrupted |= outcome.interrupted;
            finished.push(outcome.stats);
        }
        finished.sort_by(|a, b| a.project.cmp(&b.project));
        for stats in finished {
            report.push(stats);
        }

        logger::info(
            LogTag::Sync,
            &format!(
                "Sync finished: {} added, {} skipped, {} errors{}",
                report.added,
                report.skipped,
                report.errors.len(),
                if report.interrupted { " (interrupted)" } else { "" }
            ),
        );

        Ok(report)
    }

    async fn sync_project(
        &self,
        project: &ProjectRecord,
        options: &SyncOptions,
        deadline: Instant,
    ) -> SyncResult<ProjectOutcome> {
        let mut stats = ProjectSyncStats::new(&project.slug);
        let mut interrupted = false;

        for source in self.store.list_burn_sources(project.id)? {
            match self
                .scan_burn_source(project, &source, options, deadline, &mut stats)
                .await
            {
                Ok(Some(StopReason::Deadline)) | Ok(Some(StopReason::Cancelled)) => {
                    interrupted = true;
                    break;
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    logger::warning(
                        LogTag::Sync,
                        &format!("{}: burn source {} failed: {}", project.slug, source.address, e),
                    );
                    stats
                        .errors
                        .push(format!("burn source {}: {}", source.address, e));
                }
            }
        }

        if !interrupted && !self.cancel.load(Ordering::SeqCst) {
            if let Err(e) = self.refresh_market(project, options, &mut stats).await {
                if e.is_fatal() {
                    return Err(e);
                }
                logger::warning(
                    LogTag::Sync,
                    &format!("{}: market refresh failed: {}", project.slug, e),
                );
                stats.errors.push(format!("market refresh: {}", e));
            }
        }

        logger::debug(
            LogTag::Sync,
            &format!(
                "{}: scanned={} found={} inserted={} skipped={} errors={}",
                stats.project,
                stats.scanned,
                stats.found,
                stats.inserted,
                stats.skipped,
                stats.errors.len()
            ),
        );

        Ok(ProjectOutcome { stats, interrupted })
    }

    /// Walk one burn source from its cursor; returns why the walk stopped
    async fn scan_burn_source(
        &self,
        project: &ProjectRecord,
        source: &BurnSourceRecord,
        options: &SyncOptions,
        deadline: Instant,
        stats: &mut ProjectSyncStats,
    ) -> SyncResult<Option<StopReason>> {
        let key = SyncCursor::source_key_for(source.kind.as_str(), &source.address);
        let cursor = self
            .store
            .load_cursor(&key)?
            .unwrap_or_else(|| SyncCursor::new(key.clone()));

        let request = ScanRequest {
            project_id: project.id,
            address: source.address.clone(),
            source: source.kind,
            mint: source.mint.clone(),
            decimals: source.decimals,
        };
        let limits = ScanLimits {
            max_pages: Some(options.max_pages.unwrap_or(self.default_max_pages)),
            deadline: Some(deadline),
            cancel: Some(Arc::clone(&self.cancel)),
            since_timestamp: options.since_timestamp,
        };

        let mut session = self.scanner.scan_since(request, cursor, limits);
        while let Some(page) = session.next_page().await? {
            stats.scanned += page.scanned;
            for signature in &page.malformed {
                stats.errors.push(format!("malformed transaction {}", signature));
            }

            for burn in page.burns() {
                stats.found += 1;
                if options.dry_run {
                    continue;
                }
                match self.store.insert_burn_event(burn) {
                    Ok(InsertOutcome::Inserted) => stats.inserted += 1,
                    Ok(InsertOutcome::Skipped) => stats.skipped += 1,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => stats.errors.push(format!("burn {}: {}", burn.signature, e)),
                }
            }

            if !options.dry_run {
                self.store.save_cursor(session.cursor())?;
            }
        }

        // Completion without a trailing page still moves the watermark
        if !options.dry_run {
            self.store.save_cursor(session.cursor())?;
        }

        Ok(session.stop_reason())
    }

    /// Re-rank pools for the current token and refresh its candles
    async fn refresh_market(
        &self,
        project: &ProjectRecord,
        options: &SyncOptions,
        stats: &mut ProjectSyncStats,
    ) -> SyncResult<()> {
        let pools = self.store.list_pools(project.id)?;
        let Some(current) = pools.iter().max_by_key(|p| p.order_index) else {
            return Ok(());
        };
        let mut pool_address = current.pool_address.clone();

        if let Some(discovery) = &self.discovery {
            match discovery.discover_best_pool(&current.token_address).await {
                Ok(Some(best)) => {
                    if !options.dry_run {
                        self.store.update_pool_market(current.id, &best)?;
                    }
                    pool_address = best.pool_address;
                }
                Ok(None) => logger::debug(
                    LogTag::Sync,
                    &format!("{}: no pools listed for {}", project.slug, current.token_symbol),
                ),
                Err(e) => stats.errors.push(format!("pool discovery: {}", e)),
            }
        }

        let Some(pipeline) = &self.ohlcv else {
            return Ok(());
        };
        if options.dry_run {
            return Ok(());
        }
        if pool_address == current.token_address {
            logger::debug(
                LogTag::Sync,
                &format!("{}: {} has no pool yet, skipping candles", project.slug, current.token_symbol),
            );
            return Ok(());
        }

        let series = match pipeline.refresh(&pool_address).await {
            Ok(series) => series,
            Err(e) => {
                stats.errors.push(format!("ohlcv {}: {}", pool_address, e));
                return Ok(());
            }
        };

        let mut written = self
            .store
            .upsert_ohlcv_bars(&pool_address, pipeline.source_interval(), &series.source)?;
        for (interval, bars) in &series.aggregated {
            written += self.store.upsert_ohlcv_bars(&pool_address, *interval, bars)?;
        }

        logger::debug(
            LogTag::Sync,
            &format!("{}: stored {} candles for {}", project.slug, written, pool_address),
        );
        Ok(())
    }
}
