/// Daily burn rollups over stored burn events (UTC-midnight buckets)
use crate::scanner::BurnEvent;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBurns {
    /// `YYYY-MM-DD`
    pub date: String,
    /// UTC midnight of `date`
    pub timestamp: i64,
    pub burn_amount: f64,
    pub burn_count: usize,
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnsSummary {
    /// Ascending by day; days without burns are absent
    pub daily: Vec<DailyBurns>,
    pub total_burned: f64,
    pub total_transactions: usize,
    /// Over days that had at least one burn
    pub avg_daily_burns: f64,
}

fn day_label(midnight: i64) -> String {
    DateTime::from_timestamp(midnight, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::MIN)
        .format("%Y-%m-%d")
        .to_string()
}

pub fn summarize_daily_burns(events: &[BurnEvent]) -> BurnsSummary {
    let mut days: BTreeMap<i64, DailyBurns> = BTreeMap::new();

    let mut sorted: Vec<&BurnEvent> = events.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.signature.cmp(&b.signature)));

    for event in sorted {
        let midnight = event.timestamp.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
        let day = days.entry(midnight).or_insert_with(|| DailyBurns {
            date: day_label(midnight),
            timestamp: midnight,
            burn_amount: 0.0,
            burn_count: 0,
            signatures: Vec::new(),
        });
        day.burn_amount += event.amount;
        day.burn_count += 1;
        day.signatures.push(event.signature.clone());
    }

    let daily: Vec<DailyBurns> = days.into_values().collect();
    let total_burned: f64 = daily.iter().map(|d| d.burn_amount).sum();
    let total_transactions = daily.iter().map(|d| d.burn_count).sum();
    let avg_daily_burns = if daily.is_empty() {
        0.0
    } else {
        total_burned / daily.len() as f64
    };

    BurnsSummary {
        daily,
        total_burned,
        total_transactions,
        avg_daily_burns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burn(signature: &str, timestamp: i64, amount: f64) -> BurnEvent {
        BurnEvent {
            signature: signature.to_string(),
            project_id: 1,
            timestamp,
            amount,
            raw_amount: 0,
            source_address: String::new(),
            slot: 0,
        }
    }

    #[test]
    fn test_daily_buckets() {
        // 2024-01-01T00:00:00Z
        let day0 = 1_704_067_200;
        let events = vec![
            burn("c", day0 + SECONDS_PER_DAY + 5, 4.0),
            burn("a", day0 + 10, 1.0),
            burn("b", day0 + SECONDS_PER_DAY - 1, 2.0),
        ];

        let summary = summarize_daily_burns(&events);
        assert_eq!(summary.daily.len(), 2);
        assert_eq!(summary.daily[0].date, "2024-01-01");
        assert_eq!(summary.daily[0].timestamp, day0);
        assert_eq!(summary.daily[0].burn_count, 2);
        assert_eq!(summary.daily[0].signatures, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(summary.daily[1].date, "2024-01-02");
        assert_eq!(summary.total_burned, 7.0);
        assert_eq!(summary.total_transactions, 3);
        assert!((summary.avg_daily_burns - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty() {
        assert_eq!(summarize_daily_burns(&[]), BurnsSummary::default());
    }
}
