//! OHLCV candles
//!
//! Fine bars come from an [`OhlcvSource`] (GeckoTerminal in production) and
//! are merged into coarser candles by [`aggregate`], a pure function.

pub mod aggregator;
pub mod fetcher;
pub mod types;

pub use aggregator::{aggregate, detect_gaps, normalize_series, validate_bars, BarIssue};
pub use fetcher::{parse_ohlcv_rows, GeckoTerminalClient, OhlcvSource, GECKOTERMINAL_API};
pub use types::{Interval, OhlcvBar, Span};

use crate::config::OhlcvConfig;
use crate::errors::{SyncError, SyncResult};
use crate::logger::{self, LogTag};
use std::sync::Arc;

/// Source bars plus every configured coarser series built from them
#[derive(Debug, Clone, Default)]
pub struct OhlcvSeries {
    pub source: Vec<OhlcvBar>,
    pub aggregated: Vec<(Interval, Vec<OhlcvBar>)>,
}

pub struct OhlcvPipeline {
    source: Arc<dyn OhlcvSource>,
    source_interval: Interval,
    targets: Vec<Interval>,
}

impl OhlcvPipeline {
    pub fn new(source: Arc<dyn OhlcvSource>, config: &OhlcvConfig) -> SyncResult<Self> {
        let source_interval = Interval::parse(&config.source_interval).ok_or_else(|| {
            SyncError::configuration(format!(
                "unknown ohlcv source interval '{}'",
                config.source_interval
            ))
        })?;
        let targets = config
            .target_intervals
            .iter()
            .map(|t| {
                Interval::parse(t).ok_or_else(|| {
                    SyncError::configuration(format!("unknown ohlcv target interval '{}'", t))
                })
            })
            .collect::<SyncResult<Vec<_>>>()?;

        Ok(Self {
            source,
            source_interval,
            targets,
        })
    }

    pub fn source_interval(&self) -> Interval {
        self.source_interval
    }

    /// Fetch the latest source bars for `pool_address` and aggregate them
    ///
    /// Coarse buckets that begin before the first fetched bar are left out.
    pub async fn refresh(&self, pool_address: &str) -> SyncResult<OhlcvSeries> {
        let fetched = self
            .source
            .fetch_bars(pool_address, self.source_interval, None)
            .await?;
        let source = normalize_series(fetched);

        let gaps = detect_gaps(&source, self.source_interval);
        if !gaps.is_empty() {
            logger::debug(
                LogTag::Ohlcv,
                &format!(
                    "{} has {} gaps in {} bars",
                    pool_address,
                    gaps.len(),
                    self.source_interval
                ),
            );
        }

        // A bucket that starts before the window would overwrite a complete stored candle
        let window_start = source.first().map(|b| b.time);
        let aggregated = self
            .targets
            .iter()
            .map(|interval| {
                let mut bars = aggregate(&source, *interval);
                if let Some(start) = window_start {
                    bars.retain(|bar| bar.time >= start);
                }
                (*interval, bars)
            })
            .collect();

        Ok(OhlcvSeries { source, aggregated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::storage::{SqliteStore, SyncStore};
    use parking_lot::Mutex;

    struct FixedSource(Vec<OhlcvBar>);

    /// Hands out one prepared window per call
    struct SlidingSource(Mutex<Vec<Vec<OhlcvBar>>>);

    #[async_trait]
    impl OhlcvSource for SlidingSource {
        async fn fetch_bars(
            &self,
            _pool_address: &str,
            _interval: Interval,
            _before_timestamp: Option<i64>,
        ) -> SyncResult<Vec<OhlcvBar>> {
            let mut windows = self.0.lock();
            Ok(if windows.is_empty() { Vec::new() } else { windows.remove(0) })
        }
    }

    fn hourly(hours: std::ops::Range<i64>) -> Vec<OhlcvBar> {
        hours
            .map(|h| OhlcvBar::new(h * 3600, 1.0, 2.0, 0.5, 1.5, 1.0))
            .collect()
    }

    #[async_trait]
    impl OhlcvSource for FixedSource {
        async fn fetch_bars(
            &self,
            _pool_address: &str,
            _interval: Interval,
            _before_timestamp: Option<i64>,
        ) -> SyncResult<Vec<OhlcvBar>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_refresh_builds_configured_targets() {
        let bars: Vec<OhlcvBar> = (0..48)
            .map(|i| OhlcvBar::new(i * 3600, 1.0, 2.0, 0.5, 1.5, 1.0))
            .collect();
        let pipeline = OhlcvPipeline::new(Arc::new(FixedSource(bars)), &OhlcvConfig::default()).unwrap();

        let series = pipeline.refresh("POOL").await.unwrap();
        assert_eq!(series.source.len(), 48);
        let counts: Vec<(String, usize)> = series
            .aggregated
            .iter()
            .map(|(i, b)| (i.to_string(), b.len()))
            .collect();
        assert_eq!(
            counts,
            vec![("4h".to_string(), 12), ("8h".to_string(), 6), ("1d".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_sliding_window_keeps_stored_day_complete() {
        let source = SlidingSource(Mutex::new(vec![hourly(0..48), hourly(20..68)]));
        let pipeline = OhlcvPipeline::new(Arc::new(source), &OhlcvConfig::default()).unwrap();
        let store = SqliteStore::open_in_memory().unwrap();
        let day = Interval::parse("1d").unwrap();

        for _ in 0..2 {
            let series = pipeline.refresh("POOL").await.unwrap();
            for (interval, bars) in &series.aggregated {
                store.upsert_ohlcv_bars("POOL", *interval, bars).unwrap();
            }
        }

        let days = store.list_ohlcv_bars("POOL", day, None).unwrap();
        assert_eq!(days[0].time, 0);
        assert_eq!(days[0].volume, 24.0);
        assert_eq!(days[1].time, 86_400);
        assert_eq!(days[1].volume, 24.0);
        // Day 2 is still in progress
        assert_eq!(days[2].volume, 20.0);
    }

    #[tokio::test]
    async fn test_partial_leading_bucket_is_dropped() {
        let source = SlidingSource(Mutex::new(vec![hourly(20..68)]));
        let pipeline = OhlcvPipeline::new(Arc::new(source), &OhlcvConfig::default()).unwrap();

        let series = pipeline.refresh("POOL").await.unwrap();
        let (_, days) = series
            .aggregated
            .iter()
            .find(|(i, _)| i.to_string() == "1d")
            .unwrap();
        let starts: Vec<i64> = days.iter().map(|b| b.time).collect();
        assert_eq!(starts, vec![86_400, 172_800]);

        let (_, quarters) = series
            .aggregated
            .iter()
            .find(|(i, _)| i.to_string() == "4h")
            .unwrap();
        assert_eq!(quarters[0].time, 20 * 3600);
        assert_eq!(quarters[0].volume, 4.0);
    }

    #[test]
    fn test_bad_interval_config() {
        let config = OhlcvConfig {
            target_intervals: vec!["soon".to_string()],
            ..Default::default()
        };
        let result = OhlcvPipeline::new(Arc::new(FixedSource(vec![])), &config);
        assert!(matches!(result, Err(SyncError::Configuration { .. })));
    }
}
