// GeckoTerminal candle fetcher, routed through the shared scheduler

use super::types::{Interval, OhlcvBar};
use crate::config::OhlcvConfig;
use crate::errors::{is_rate_limit_message, SyncError, SyncResult};
use crate::logger::{self, LogTag};
use crate::scheduler::RequestScheduler;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const GECKOTERMINAL_API: &str = "geckoterminal";

/// GeckoTerminal caps `limit` at this many rows
const MAX_BARS_PER_REQUEST: u32 = 1000;

/// Source of raw candles for a pool
#[async_trait]
pub trait OhlcvSource: Send + Sync {
    /// Bars sorted ascending by time, invalid rows already dropped
    async fn fetch_bars(
        &self,
        pool_address: &str,
        interval: Interval,
        before_timestamp: Option<i64>,
    ) -> SyncResult<Vec<OhlcvBar>>;
}

#[derive(Deserialize, Debug, Default)]
struct GeckoOhlcvResponse {
    #[serde(default)]
    data: Option<GeckoOhlcvData>,
}

#[derive(Deserialize, Debug, Default)]
struct GeckoOhlcvData {
    #[serde(default)]
    attributes: GeckoOhlcvAttributes,
}

#[derive(Deserialize, Debug, Default)]
struct GeckoOhlcvAttributes {
    /// Rows of `[timestamp, open, high, low, close, volume]`
    #[serde(default)]
    ohlcv_list: Vec<Vec<Value>>,
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Convert raw rows, skipping wrong arity and invalid OHLC; sorted ascending
pub fn parse_ohlcv_rows(rows: &[Vec<Value>]) -> (Vec<OhlcvBar>, usize) {
    let mut skipped = 0;
    let mut bars: Vec<OhlcvBar> = rows
        .iter()
        .filter_map(|row| {
            let bar = if row.len() == 6 {
                let values: Option<Vec<f64>> = row.iter().map(number).collect();
                values.map(|v| OhlcvBar::new(v[0] as i64, v[1], v[2], v[3], v[4], v[5]))
            } else {
                None
            };
            match bar {
                Some(bar) if bar.is_valid() => Some(bar),
                _ => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();
    bars.sort_by_key(|b| b.time);
    bars.dedup_by_key(|b| b.time);
    (bars, skipped)
}

pub struct GeckoTerminalClient {
    client: reqwest::Client,
    scheduler: Arc<RequestScheduler>,
    base_url: String,
    network: String,
    limit: u32,
    timeout: Duration,
}

impl GeckoTerminalClient {
    pub fn new(config: &OhlcvConfig, scheduler: Arc<RequestScheduler>) -> Self {
        Self {
            client: reqwest::Client::new(),
            scheduler,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            network: config.network.clone(),
            limit: config.bars_per_fetch.clamp(1, MAX_BARS_PER_REQUEST),
            timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        }
    }
}

#[async_trait]
impl OhlcvSource for GeckoTerminalClient {
    async fn fetch_bars(
        &self,
        pool_address: &str,
        interval: Interval,
        before_timestamp: Option<i64>,
    ) -> SyncResult<Vec<OhlcvBar>> {
        let (timeframe, aggregate) = interval.gecko_params().ok_or_else(|| {
            SyncError::validation(
                "interval",
                format!("{} is not available from GeckoTerminal", interval),
            )
        })?;

        let url = format!(
            "{}/networks/{}/pools/{}/ohlcv/{}",
            self.base_url, self.network, pool_address, timeframe
        );
        let mut query = vec![
            ("aggregate".to_string(), aggregate.to_string()),
            ("limit".to_string(), self.limit.to_string()),
            ("currency".to_string(), "usd".to_string()),
        ];
        if let Some(ts) = before_timestamp {
            query.push(("before_timestamp".to_string(), ts.to_string()));
        }

        let client = self.client.clone();
        let timeout = self.timeout;
        let response: GeckoOhlcvResponse = self
            .scheduler
            .execute(GECKOTERMINAL_API, move || {
                let request = client.get(&url).query(&query).timeout(timeout);
                let url = url.clone();
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    let body = response.text().await?;
                    if status.as_u16() == 429 || (!status.is_success() && is_rate_limit_message(&body)) {
                        return Err(SyncError::Throttled {
                            api: GECKOTERMINAL_API.to_string(),
                            message: format!("HTTP {} from {}", status, url),
                        });
                    }
                    if status.as_u16() == 404 {
                        return Err(SyncError::not_found(format!("ohlcv for {}", url)));
                    }
                    if !status.is_success() {
                        return Err(SyncError::Upstream {
                            api: GECKOTERMINAL_API.to_string(),
                            status: Some(status.as_u16()),
                            message: body.chars().take(200).collect(),
                        });
                    }
                    Ok(serde_json::from_str::<GeckoOhlcvResponse>(&body)?)
                }
            })
            .await?;

        let rows = response
            .data
            .map(|d| d.attributes.ohlcv_list)
            .unwrap_or_default();
        let (bars, skipped) = parse_ohlcv_rows(&rows);

        if skipped > 0 {
            logger::warning(
                LogTag::Ohlcv,
                &format!("Skipped {} malformed {} rows for {}", skipped, interval, pool_address),
            );
        }
        logger::debug(
            LogTag::Ohlcv,
            &format!("Fetched {} {} bars for {}", bars.len(), interval, pool_address),
        );

        Ok(bars)
    }
}
