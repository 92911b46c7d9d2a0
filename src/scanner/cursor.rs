//! Persisted scan position per source

use serde::{Deserialize, Serialize};

/// Newest position known to be fully ingested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub signature: String,
    pub timestamp: Option<i64>,
}

/// Scan state for one source address
///
/// A run walks history newest-to-oldest. `pending_newest` remembers the head
/// of an unfinished walk and `resume_before` where it stopped; both collapse
/// into `watermark` once the walk meets the old watermark or runs out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub source_key: String,
    pub watermark: Option<Watermark>,
    pub pending_newest: Option<Watermark>,
    pub resume_before: Option<String>,
    pub updated_at: i64,
}

impl SyncCursor {
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            ..Default::default()
        }
    }

    /// Key convention: `<kind>:<address>`
    pub fn source_key_for(kind: &str, address: &str) -> String {
        format!("{}:{}", kind, address)
    }

    pub fn is_resuming(&self) -> bool {
        self.resume_before.is_some()
    }

    /// Record the newest signature of a fresh walk
    pub(crate) fn begin_walk(&mut self, newest: Watermark) {
        if self.pending_newest.is_none() && self.resume_before.is_none() {
            self.pending_newest = Some(newest);
        }
    }

    pub(crate) fn advance(&mut self, before: String, now: i64) {
        self.resume_before = Some(before);
        self.updated_at = now;
    }

    /// Walk reached the old watermark (or the end of history)
    pub(crate) fn complete(&mut self, now: i64) {
        if let Some(newest) = self.pending_newest.take() {
            self.watermark = Some(newest);
        }
        self.resume_before = None;
        self.updated_at = now;
    }
}
