// Core types for the OHLCV pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

const MINUTE: i64 = 60;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

/// Candle width
///
/// Named variants cover the dashboard intervals; anything else parses into
/// `Seconds`. Parsing canonicalizes, so `"60m"` and `"1h"` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Hour1,
    Hour4,
    Hour8,
    Day1,
    Seconds(Span),
}

/// Positive width in seconds; only built by [`Interval::from_seconds`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span(i64);

impl Span {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl Interval {
    pub fn from_seconds(seconds: i64) -> Option<Interval> {
        match seconds {
            s if s <= 0 => None,
            HOUR => Some(Interval::Hour1),
            s if s == 4 * HOUR => Some(Interval::Hour4),
            s if s == 8 * HOUR => Some(Interval::Hour8),
            DAY => Some(Interval::Day1),
            s => Some(Interval::Seconds(Span(s))),
        }
    }

    /// Accepts `<n>s`, `<n>m`, `<n>h`, `<n>d` (case-insensitive)
    pub fn parse(value: &str) -> Option<Interval> {
        let value = value.trim().to_lowercase();
        if value.len() < 2 {
            return None;
        }
        let (count, unit) = value.split_at(value.len() - 1);
        let count: i64 = count.parse().ok()?;
        let unit_seconds = match unit {
            "s" => 1,
            "m" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            _ => return None,
        };
        Interval::from_seconds(count.checked_mul(unit_seconds)?)
    }

    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Hour1 => HOUR,
            Interval::Hour4 => 4 * HOUR,
            Interval::Hour8 => 8 * HOUR,
            Interval::Day1 => DAY,
            Interval::Seconds(span) => span.get(),
        }
    }

    /// Period start containing `time`
    pub fn bucket_start(&self, time: i64) -> i64 {
        time.div_euclid(self.seconds()) * self.seconds()
    }

    /// Whole multiples of an hour, at least one hour
    pub fn can_aggregate_from_hourly(&self) -> bool {
        let s = self.seconds();
        s > HOUR && s % HOUR == 0
    }

    /// Interval to fetch so that `self` can be built from it
    pub fn source_interval_for(&self) -> Interval {
        if self.can_aggregate_from_hourly() {
            Interval::Hour1
        } else {
            *self
        }
    }

    /// GeckoTerminal `(timeframe, aggregate)` path parameters, when supported
    pub fn gecko_params(&self) -> Option<(&'static str, i64)> {
        let s = self.seconds();
        match s {
            s if s == DAY => Some(("day", 1)),
            s if s % HOUR == 0 && matches!(s / HOUR, 1 | 4 | 12) => Some(("hour", s / HOUR)),
            s if s % MINUTE == 0 && matches!(s / MINUTE, 1 | 5 | 15) => Some(("minute", s / MINUTE)),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds();
        if s % DAY == 0 {
            write!(f, "{}d", s / DAY)
        } else if s % HOUR == 0 {
            write!(f, "{}h", s / HOUR)
        } else if s % MINUTE == 0 {
            write!(f, "{}m", s / MINUTE)
        } else {
            write!(f, "{}s", s)
        }
    }
}

/// One candle; `time` is the period start in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `low <= open,close <= high`, non-negative volume, all finite
    pub fn is_valid(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
            && self.volume >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: i64) -> Interval {
        Interval::from_seconds(n).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Interval::parse("1h"), Some(Interval::Hour1));
        assert_eq!(Interval::parse("60m"), Some(Interval::Hour1));
        assert_eq!(Interval::parse("4H"), Some(Interval::Hour4));
        assert_eq!(Interval::parse("8h"), Some(Interval::Hour8));
        assert_eq!(Interval::parse("1d"), Some(Interval::Day1));
        assert_eq!(Interval::parse("90s"), Some(secs(90)));
        assert_eq!(Interval::parse("0h"), None);
        assert_eq!(Interval::parse("h"), None);
        assert_eq!(Interval::parse("3w"), None);

        assert_eq!(Interval::Day1.to_string(), "1d");
        assert_eq!(secs(7200).to_string(), "2h");
        assert_eq!(secs(90).to_string(), "90s");
    }

    #[test]
    fn test_source_interval() {
        assert!(Interval::Hour4.can_aggregate_from_hourly());
        assert!(Interval::Day1.can_aggregate_from_hourly());
        assert!(!Interval::Hour1.can_aggregate_from_hourly());
        assert!(!secs(900).can_aggregate_from_hourly());
        assert_eq!(Interval::Hour8.source_interval_for(), Interval::Hour1);
        assert_eq!(secs(900).source_interval_for(), secs(900));
    }

    #[test]
    fn test_gecko_params() {
        assert_eq!(Interval::Hour1.gecko_params(), Some(("hour", 1)));
        assert_eq!(Interval::Hour4.gecko_params(), Some(("hour", 4)));
        assert_eq!(Interval::Day1.gecko_params(), Some(("day", 1)));
        assert_eq!(secs(300).gecko_params(), Some(("minute", 5)));
        assert_eq!(Interval::Hour8.gecko_params(), None);
    }

    #[test]
    fn test_non_positive_widths_are_rejected() {
        assert_eq!(Interval::from_seconds(0), None);
        assert_eq!(Interval::from_seconds(-3600), None);
        assert_eq!(Interval::parse("-1h"), None);
        assert_eq!(secs(90).bucket_start(185), 180);
        assert_eq!(secs(90).bucket_start(-1), -90);
    }

    #[test]
    fn test_bar_validity() {
        assert!(OhlcvBar::new(0, 1.0, 2.0, 0.5, 1.5, 10.0).is_valid());
        assert!(!OhlcvBar::new(0, 1.0, 0.9, 0.5, 0.7, 1.0).is_valid());
        assert!(!OhlcvBar::new(0, 1.0, 2.0, 0.5, 1.5, -1.0).is_valid());
        assert!(!OhlcvBar::new(0, f64::NAN, 2.0, 0.5, 1.5, 1.0).is_valid());
    }
}
