// Interval aggregation logic

use super::types::{Interval, OhlcvBar};
use std::collections::BTreeMap;

/// Merge fine bars into `interval` candles
///
/// Bars are bucketed by period start; within a bucket: first open, last
/// close, max high, min low, summed volume. Empty buckets are not emitted.
/// Input order does not matter, and aggregating the output again at the same
/// interval returns it unchanged.
pub fn aggregate(bars: &[OhlcvBar], interval: Interval) -> Vec<OhlcvBar> {
    let mut sorted = bars.to_vec();
    // Stable sort keeps same-time duplicates in input order
    sorted.sort_by_key(|b| b.time);

    let mut buckets: BTreeMap<i64, Vec<OhlcvBar>> = BTreeMap::new();
    for bar in sorted {
        buckets
            .entry(interval.bucket_start(bar.time))
            .or_default()
            .push(bar);
    }

    buckets
        .into_iter()
        .filter_map(|(start, members)| aggregate_bucket(start, &members))
        .collect()
}

/// Combine one bucket's members (already time-ordered) into a candle
fn aggregate_bucket(start: i64, members: &[OhlcvBar]) -> Option<OhlcvBar> {
    let first = members.first()?;
    let last = members.last()?;

    let high = members.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = members.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let volume: f64 = members.iter().map(|b| b.volume).sum();

    Some(OhlcvBar {
        time: start,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}

/// Missing periods as `(first_missing, last_missing)` ranges; reporting only
pub fn detect_gaps(bars: &[OhlcvBar], interval: Interval) -> Vec<(i64, i64)> {
    let step = interval.seconds();
    bars.windows(2)
        .filter_map(|pair| {
            let expected_next = pair[0].time + step;
            if pair[1].time > expected_next {
                Some((expected_next, pair[1].time - step))
            } else {
                None
            }
        })
        .collect()
}

/// Problems with a bar sequence, empty when it is well-formed
#[derive(Debug, Clone, PartialEq)]
pub enum BarIssue {
    InvalidBar { time: i64 },
    Misaligned { time: i64 },
    OutOfOrder { time: i64 },
}

/// Check per-bar invariants, interval alignment and strictly increasing time
pub fn validate_bars(bars: &[OhlcvBar], interval: Interval) -> Vec<BarIssue> {
    let mut issues = Vec::new();
    let mut previous: Option<i64> = None;

    for bar in bars {
        if !bar.is_valid() {
            issues.push(BarIssue::InvalidBar { time: bar.time });
        }
        if interval.bucket_start(bar.time) != bar.time {
            issues.push(BarIssue::Misaligned { time: bar.time });
        }
        if let Some(prev) = previous {
            if bar.time <= prev {
                issues.push(BarIssue::OutOfOrder { time: bar.time });
            }
        }
        previous = Some(bar.time);
    }

    issues
}

/// Drop invalid bars, keep the last bar per time, sort ascending
pub fn normalize_series(bars: Vec<OhlcvBar>) -> Vec<OhlcvBar> {
    let mut by_time: BTreeMap<i64, OhlcvBar> = BTreeMap::new();
    for bar in bars.into_iter().filter(OhlcvBar::is_valid) {
        by_time.insert(bar.time, bar);
    }
    by_time.into_values().collect()
}
