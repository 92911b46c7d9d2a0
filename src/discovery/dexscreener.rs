/// DexScreener market-data client
///
/// Endpoint used: `/latest/dex/tokens/{tokenAddress}` (all pairs for a token,
/// across chains; filtered to the configured chain here). Requests go through
/// the shared scheduler lane `dexscreener`.
use super::types::{MarketPair, TokenPairsResponse};
use super::MarketDataSource;
use crate::config::DiscoveryConfig;
use crate::errors::{is_rate_limit_message, SyncError, SyncResult};
use crate::logger::{self, LogTag};
use crate::scheduler::RequestScheduler;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const DEXSCREENER_API: &str = "dexscreener";

pub struct DexScreenerClient {
    client: reqwest::Client,
    scheduler: Arc<RequestScheduler>,
    base_url: String,
    chain_id: String,
    timeout: Duration,
}

impl DexScreenerClient {
    pub fn new(config: &DiscoveryConfig, scheduler: Arc<RequestScheduler>) -> SyncResult<Self> {
        if config.request_timeout_secs == 0 {
            return Err(SyncError::configuration(
                "discovery.request_timeout_secs must be greater than zero",
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            scheduler,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chain_id: config.chain_id.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn get_json<T>(&self, endpoint: String) -> SyncResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.client.clone();
        let timeout = self.timeout;

        self.scheduler
            .execute(DEXSCREENER_API, move || {
                let client = client.clone();
                let url = endpoint.clone();
                async move {
                    let response = client.get(&url).timeout(timeout).send().await?;
                    let status = response.status();
                    let body = response.text().await?;

                    if status.as_u16() == 429 || (!status.is_success() && is_rate_limit_message(&body)) {
                        return Err(SyncError::Throttled {
                            api: DEXSCREENER_API.to_string(),
                            message: format!("HTTP {} from {}", status, url),
                        });
                    }
                    if !status.is_success() {
                        return Err(SyncError::Upstream {
                            api: DEXSCREENER_API.to_string(),
                            status: Some(status.as_u16()),
                            message: body.chars().take(200).collect(),
                        });
                    }

                    Ok(serde_json::from_str::<T>(&body)?)
                }
            })
            .await
    }
}

#[async_trait]
impl MarketDataSource for DexScreenerClient {
    async fn get_pairs_for_token(&self, token_address: &str) -> SyncResult<Vec<MarketPair>> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token_address);
        let response: TokenPairsResponse = self.get_json(url).await?;

        let pairs: Vec<MarketPair> = response
            .pairs
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.chain_id.eq_ignore_ascii_case(&self.chain_id))
            .collect();

        logger::debug(
            LogTag::Discovery,
            &format!("DexScreener returned {} {} pairs for {}", pairs.len(), self.chain_id, token_address),
        );

        Ok(pairs)
    }
}
