//! Backward signature pagination as an explicit state machine

use super::cursor::Watermark;
use crate::errors::SyncResult;
use crate::ledger::{LedgerRpc, SignatureInfo};
use crate::logger::{self, LogTag};
use std::sync::Arc;

/// Where a walk must stop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanBoundary {
    /// Already-ingested head from the previous run
    pub watermark: Option<Watermark>,
    /// Ignore anything older than this unix timestamp
    pub since_timestamp: Option<i64>,
}

impl ScanBoundary {
    /// True when `record` is at or beyond the boundary
    fn reached_by(&self, record: &SignatureInfo) -> bool {
        if let Some(mark) = &self.watermark {
            if record.signature == mark.signature {
                return true;
            }
            if let (Some(ts), Some(mark_ts)) = (record.block_time, mark.timestamp) {
                if ts < mark_ts {
                    return true;
                }
            }
        }
        // Missing block time counts as in range
        if let (Some(since), Some(ts)) = (self.since_timestamp, record.block_time) {
            if ts < since {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct SignaturePage {
    /// In-range records, newest first
    pub records: Vec<SignatureInfo>,
    /// Newest record of the raw page
    pub head: Option<SignatureInfo>,
    /// Oldest signature of the raw page, the next `before` cursor
    pub tail_signature: Option<String>,
    pub raw_len: usize,
    pub reached_boundary: bool,
}

pub struct SignaturePager {
    ledger: Arc<dyn LedgerRpc>,
    address: String,
    page_limit: usize,
    before: Option<String>,
    boundary: ScanBoundary,
    exhausted: bool,
    pages_fetched: u32,
}

impl SignaturePager {
    pub fn new(
        ledger: Arc<dyn LedgerRpc>,
        address: impl Into<String>,
        page_limit: usize,
        before: Option<String>,
        boundary: ScanBoundary,
    ) -> Self {
        Self {
            ledger,
            address: address.into(),
            page_limit: page_limit.max(1),
            before,
            boundary,
            exhausted: false,
            pages_fetched: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    /// Fetch and trim the next page; `None` once the walk is over
    pub async fn next_page(&mut self) -> SyncResult<Option<SignaturePage>> {
        if self.exhausted {
            return Ok(None);
        }

        let raw = self
            .ledger
            .get_signatures_for_address(&self.address, self.page_limit, self.before.as_deref())
            .await?;
        self.pages_fetched += 1;

        if raw.is_empty() {
            logger::debug(
                LogTag::Scanner,
                &format!("{}: empty page, history exhausted", self.address),
            );
            self.exhausted = true;
            return Ok(None);
        }

        let raw_len = raw.len();
        let head = raw.first().cloned();
        let tail_signature = raw.last().map(|r| r.signature.clone());

        let cut = raw.iter().position(|r| self.boundary.reached_by(r));
        let reached_boundary = cut.is_some();
        let mut records = raw;
        if let Some(cut) = cut {
            records.truncate(cut);
        }

        // A short page is the end of history
        if reached_boundary || raw_len < self.page_limit {
            self.exhausted = true;
        }
        self.before = tail_signature.clone();

        logger::debug(
            LogTag::Scanner,
            &format!(
                "{}: page {} has {} signatures, {} in range{}",
                self.address,
                self.pages_fetched,
                raw_len,
                records.len(),
                if reached_boundary { " (boundary reached)" } else { "" }
            ),
        );

        Ok(Some(SignaturePage {
            records,
            head,
            tail_signature,
            raw_len,
            reached_boundary,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, ts: Option<i64>) -> SignatureInfo {
        SignatureInfo {
            signature: name.to_string(),
            slot: 0,
            err: None,
            memo: None,
            block_time: ts,
            confirmation_status: None,
        }
    }

    #[test]
    fn test_boundary_rules() {
        let boundary = ScanBoundary {
            watermark: Some(Watermark {
                signature: "w".to_string(),
                timestamp: Some(100),
            }),
            since_timestamp: Some(50),
        };
        assert!(boundary.reached_by(&sig("w", Some(500))));
        assert!(boundary.reached_by(&sig("x", Some(99))));
        assert!(!boundary.reached_by(&sig("x", Some(100))));
        assert!(!boundary.reached_by(&sig("x", None)));

        let since_only = ScanBoundary {
            watermark: None,
            since_timestamp: Some(50),
        };
        assert!(since_only.reached_by(&sig("x", Some(49))));
        assert!(!since_only.reached_by(&sig("x", Some(50))));
    }
}
