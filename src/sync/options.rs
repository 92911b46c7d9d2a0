use crate::errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

pub const MAX_PAGES_CEILING: u32 = 10_000;

/// Caller-facing knobs for one sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Scan and count, but never write
    pub dry_run: bool,
    /// Page ceiling per burn source; config default when unset
    pub max_pages: Option<u32>,
    /// Ignore history older than this unix timestamp
    pub since_timestamp: Option<i64>,
}

impl SyncOptions {
    /// Reject out-of-range options; `now` is the current unix time
    pub fn validate(&self, now: i64) -> SyncResult<()> {
        if let Some(pages) = self.max_pages {
            if pages == 0 || pages > MAX_PAGES_CEILING {
                return Err(SyncError::validation(
                    "max_pages",
                    format!("{} is outside 1..={}", pages, MAX_PAGES_CEILING),
                ));
            }
        }
        if let Some(since) = self.since_timestamp {
            if since < 0 {
                return Err(SyncError::validation(
                    "since_timestamp",
                    format!("{} is not a valid unix timestamp", since),
                ));
            }
            if since > now {
                return Err(SyncError::validation(
                    "since_timestamp",
                    format!("{} is in the future (now {})", since, now),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let now = 1_700_000_000;
        assert!(SyncOptions::default().validate(now).is_ok());
        assert!(SyncOptions {
            max_pages: Some(10_000),
            since_timestamp: Some(now),
            ..Default::default()
        }
        .validate(now)
        .is_ok());

        for bad in [
            SyncOptions { max_pages: Some(0), ..Default::default() },
            SyncOptions { max_pages: Some(10_001), ..Default::default() },
            SyncOptions { since_timestamp: Some(now + 1), ..Default::default() },
            SyncOptions { since_timestamp: Some(-5), ..Default::default() },
        ] {
            let err = bad.validate(now).unwrap_err();
            assert!(matches!(err, SyncError::Validation { .. }), "{:?}", bad);
        }
    }
}
