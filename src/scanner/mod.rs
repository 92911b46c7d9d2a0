//! Paginated transaction scanner
//!
//! [`TransactionScanner::scan_since`] returns a [`ScanSession`]: a lazy,
//! restartable walk over an address's history. Each `next_page` call fetches
//! one signature page (strictly in cursor order), fetches the parsed
//! transactions of its in-range records and classifies them. The session's
//! [`SyncCursor`] is the checkpoint to persist between pages.

pub mod classify;
pub mod cursor;
pub mod pager;

pub use classify::{
    classify_transaction, to_ui_amount, BurnEvent, BurnSource, ClassifiedEvent, ScanRequest,
    TransferEvent,
};
pub use cursor::{SyncCursor, Watermark};
pub use pager::{ScanBoundary, SignaturePage, SignaturePager};

use crate::errors::{SyncError, SyncResult};
use crate::ledger::{LedgerRpc, SignatureInfo};
use crate::logger::{self, LogTag};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Why a session stopped producing pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Watermark, cutoff or end of history reached
    Completed,
    MaxPages,
    Deadline,
    Cancelled,
}

/// Per-run limits checked before every page request
#[derive(Debug, Clone, Default)]
pub struct ScanLimits {
    pub max_pages: Option<u32>,
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
    pub since_timestamp: Option<i64>,
}

/// One processed page
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub page_number: u32,
    /// In-range signatures on this page
    pub scanned: usize,
    pub failed_skipped: usize,
    /// Transactions that could not be fetched or parsed
    pub malformed: Vec<String>,
    pub events: Vec<ClassifiedEvent>,
}

impl ScanPage {
    pub fn burns(&self) -> impl Iterator<Item = &BurnEvent> {
        self.events.iter().filter_map(|e| match e {
            ClassifiedEvent::Burn(b) => Some(b),
            _ => None,
        })
    }

    pub fn transfers(&self) -> impl Iterator<Item = &TransferEvent> {
        self.events.iter().filter_map(|e| match e {
            ClassifiedEvent::Transfer(t) => Some(t),
            _ => None,
        })
    }
}

pub struct TransactionScanner {
    ledger: Arc<dyn LedgerRpc>,
    page_limit: usize,
    concurrency: usize,
}

impl TransactionScanner {
    pub fn new(ledger: Arc<dyn LedgerRpc>, page_limit: usize, concurrency: usize) -> Self {
        Self {
            ledger,
            page_limit: page_limit.max(1),
            concurrency: concurrency.max(1),
        }
    }

    /// Start (or resume) a walk from the state in `cursor`
    pub fn scan_since(&self, request: ScanRequest, cursor: SyncCursor, limits: ScanLimits) -> ScanSession {
        let boundary = ScanBoundary {
            watermark: cursor.watermark.clone(),
            since_timestamp: limits.since_timestamp,
        };

        if cursor.is_resuming() {
            logger::info(
                LogTag::Scanner,
                &format!(
                    "Resuming {} scan of {} before {}",
                    request.source.as_str(),
                    request.address,
                    cursor.resume_before.as_deref().unwrap_or("-")
                ),
            );
        }

        let pager = SignaturePager::new(
            Arc::clone(&self.ledger),
            request.address.clone(),
            self.page_limit,
            cursor.resume_before.clone(),
            boundary,
        );

        ScanSession {
            ledger: Arc::clone(&self.ledger),
            request,
            pager,
            cursor,
            limits,
            concurrency: self.concurrency,
            stop: None,
        }
    }
}

pub struct ScanSession {
    ledger: Arc<dyn LedgerRpc>,
    request: ScanRequest,
    pager: SignaturePager,
    cursor: SyncCursor,
    limits: ScanLimits,
    concurrency: usize,
    stop: Option<StopReason>,
}

impl ScanSession {
    /// Checkpoint to persist after each page
    pub fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    pub fn into_cursor(self) -> SyncCursor {
        self.cursor
    }

    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pager.pages_fetched()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    fn check_limits(&self) -> Option<StopReason> {
        if let Some(cancel) = &self.limits.cancel {
            if cancel.load(Ordering::SeqCst) {
                return Some(StopReason::Cancelled);
            }
        }
        if let Some(deadline) = self.limits.deadline {
            if Instant::now() >= deadline {
                return Some(StopReason::Deadline);
            }
        }
        if let Some(max) = self.limits.max_pages {
            if self.pager.pages_fetched() >= max {
                return Some(StopReason::MaxPages);
            }
        }
        None
    }

    /// Fetch and classify the next page; `None` when the session has stopped
    pub async fn next_page(&mut self) -> SyncResult<Option<ScanPage>> {
        if self.stop.is_some() {
            return Ok(None);
        }
        if let Some(reason) = self.check_limits() {
            logger::info(
                LogTag::Scanner,
                &format!(
                    "Stopping scan of {} after {} pages: {:?}",
                    self.request.address,
                    self.pager.pages_fetched(),
                    reason
                ),
            );
            self.stop = Some(reason);
            return Ok(None);
        }

        let now = Utc::now().timestamp();
        let page = match self.pager.next_page().await? {
            Some(page) => page,
            None => {
                self.cursor.complete(now);
                self.stop = Some(StopReason::Completed);
                return Ok(None);
            }
        };

        if let Some(head) = &page.head {
            self.cursor.begin_walk(Watermark {
                signature: head.signature.clone(),
                timestamp: head.block_time,
            });
        }

        let mut result = self.process_records(&page.records, now).await?;
        result.page_number = self.pager.pages_fetched();

        if self.pager.is_exhausted() {
            self.cursor.complete(now);
            self.stop = Some(StopReason::Completed);
        } else if let Some(tail) = page.tail_signature {
            self.cursor.advance(tail, now);
        }

        Ok(Some(result))
    }

    async fn process_records(&self, records: &[SignatureInfo], now: i64) -> SyncResult<ScanPage> {
        let mut page = ScanPage {
            scanned: records.len(),
            ..Default::default()
        };

        let eligible: Vec<&SignatureInfo> = records
            .iter()
            .filter(|r| {
                if r.is_failed() {
                    page.failed_skipped += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        let ledger = &self.ledger;
        let fetched: Vec<_> = stream::iter(eligible.iter().map(|record| async move {
            let result = ledger.get_parsed_transaction(&record.signature).await;
            (*record, result)
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        for (record, result) in fetched {
            match result {
                Ok(Some(tx)) => {
                    let fallback = record.block_time.unwrap_or(now);
                    page.events.extend(classify_transaction(
                        &tx,
                        &record.signature,
                        &self.request,
                        fallback,
                    ));
                }
                Ok(None) => {
                    logger::warning(
                        LogTag::Scanner,
                        &format!("Transaction {} not returned by node, skipping", record.signature),
                    );
                    page.malformed.push(record.signature.clone());
                }
                Err(SyncError::Decode(e)) => {
                    logger::warning(
                        LogTag::Scanner,
                        &format!("Skipping malformed transaction {}: {}", record.signature, e),
                    );
                    page.malformed.push(record.signature.clone());
                }
                // JSON-RPC error object for this one transaction, e.g. an unsupported version
                Err(e @ SyncError::Upstream { status: None, .. }) => {
                    logger::warning(
                        LogTag::Scanner,
                        &format!("Node rejected transaction {}: {}", record.signature, e),
                    );
                    page.malformed.push(record.signature.clone());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(page)
    }
}
