//! Pool discovery and ranking
//!
//! [`PoolDiscovery`] asks a [`MarketDataSource`] for every pair of a token,
//! normalizes the DEX labels and ranks the result by preference then
//! liquidity. `None` from [`PoolDiscovery::discover_best_pool`] is the
//! degraded case; callers fall back to [`DiscoveredPool::pseudo_pool`].

pub mod dexscreener;
pub mod ranking;
pub mod types;

pub use dexscreener::{DexScreenerClient, DEXSCREENER_API};
pub use ranking::{normalize_dex_type, parse_preferences, pools_from_pairs, select_best_pool};
pub use types::{DexType, DiscoveredPool, MarketPair, PairLiquidity, PairVolume, TokenPairsResponse};

use crate::config::DiscoveryConfig;
use crate::errors::SyncResult;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::sync::Arc;

/// Market-data aggregator seam
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_pairs_for_token(&self, token_address: &str) -> SyncResult<Vec<MarketPair>>;
}

pub struct PoolDiscovery {
    source: Arc<dyn MarketDataSource>,
    preferred: Vec<DexType>,
}

impl PoolDiscovery {
    pub fn new(source: Arc<dyn MarketDataSource>, config: &DiscoveryConfig) -> Self {
        Self {
            source,
            preferred: parse_preferences(&config.preferred_dexes),
        }
    }

    pub fn preferred(&self) -> &[DexType] {
        &self.preferred
    }

    /// All positive-liquidity pools, highest liquidity first
    async fn ranked_pools(&self, token_address: &str) -> SyncResult<Vec<DiscoveredPool>> {
        let pairs = self.source.get_pairs_for_token(token_address).await?;
        Ok(pools_from_pairs(&pairs))
    }

    pub async fn discover_best_pool(&self, token_address: &str) -> SyncResult<Option<DiscoveredPool>> {
        let pools = self.ranked_pools(token_address).await?;
        let best = select_best_pool(&pools, &self.preferred);

        match &best {
            Some(pool) => logger::info(
                LogTag::Discovery,
                &format!(
                    "Best pool for {}: {} on {} (${:.0} liquidity, {} candidates)",
                    token_address,
                    pool.pool_address,
                    pool.dex_type,
                    pool.liquidity_usd,
                    pools.len()
                ),
            ),
            None => logger::warning(
                LogTag::Discovery,
                &format!("No pools with liquidity found for {}", token_address),
            ),
        }

        Ok(best)
    }

    /// Every pool at or above `min_liquidity_usd`, highest liquidity first
    pub async fn discover_all_pools(
        &self,
        token_address: &str,
        min_liquidity_usd: f64,
    ) -> SyncResult<Vec<DiscoveredPool>> {
        let mut pools = self.ranked_pools(token_address).await?;
        pools.retain(|p| p.liquidity_usd >= min_liquidity_usd);

        logger::debug(
            LogTag::Discovery,
            &format!(
                "{} pools above ${:.0} for {}",
                pools.len(),
                min_liquidity_usd,
                token_address
            ),
        );
        Ok(pools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SyncError;

    struct StaticSource(Vec<MarketPair>);

    #[async_trait]
    impl MarketDataSource for StaticSource {
        async fn get_pairs_for_token(&self, _token_address: &str) -> SyncResult<Vec<MarketPair>> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MarketDataSource for FailingSource {
        async fn get_pairs_for_token(&self, _token_address: &str) -> SyncResult<Vec<MarketPair>> {
            Err(SyncError::Upstream {
                api: "dexscreener".to_string(),
                status: Some(500),
                message: "boom".to_string(),
            })
        }
    }

    fn pair(address: &str, dex: &str, liquidity: f64) -> MarketPair {
        MarketPair {
            chain_id: "solana".to_string(),
            dex_id: dex.to_string(),
            pair_address: address.to_string(),
            liquidity: Some(PairLiquidity {
                usd: Some(liquidity),
            }),
            ..Default::default()
        }
    }

    fn discovery(pairs: Vec<MarketPair>) -> PoolDiscovery {
        PoolDiscovery::new(Arc::new(StaticSource(pairs)), &DiscoveryConfig::default())
    }

    #[tokio::test]
    async fn test_discover_best_pool_prefers_listed_dex() {
        let d = discovery(vec![
            pair("r", "raydium", 100.0),
            pair("m", "meteora", 500.0),
            pair("u", "lifinity", 1000.0),
        ]);
        let best = d.discover_best_pool("TOKEN").await.unwrap().unwrap();
        assert_eq!(best.pool_address, "m");
        assert_eq!(best.dex_type, DexType::Meteora);
    }

    #[tokio::test]
    async fn test_discover_best_pool_fallback_and_none() {
        let d = discovery(vec![pair("u", "lifinity", 1000.0)]);
        assert_eq!(d.discover_best_pool("T").await.unwrap().unwrap().pool_address, "u");

        let empty = discovery(vec![]);
        assert!(empty.discover_best_pool("T").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discover_all_pools_threshold() {
        let d = discovery(vec![
            pair("a", "raydium", 5000.0),
            pair("b", "orca", 999.0),
            pair("c", "meteora", 1000.0),
        ]);
        let pools = d.discover_all_pools("T", 1000.0).await.unwrap();
        let addresses: Vec<_> = pools.iter().map(|p| p.pool_address.as_str()).collect();
        assert_eq!(addresses, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_source_errors_propagate() {
        let d = PoolDiscovery::new(Arc::new(FailingSource), &DiscoveryConfig::default());
        let err = d.discover_best_pool("T").await.unwrap_err();
        assert_eq!(err.kind(), "upstream");
    }
}
