use crate::config_struct;

// ============================================================================
// SCANNER
// ============================================================================

config_struct! {
    /// Transaction history scanning
    pub struct ScannerConfig {
        /// Signatures requested per page (RPC maximum is 1000)
        page_limit: usize = 1000,
        /// getTransaction calls queued at once within one page. The rpc lane
        /// still runs them one at a time; this only bounds queue depth.
        transaction_concurrency: usize = 10,
        /// Page ceiling per source when a run does not set one
        default_max_pages: u32 = 100,
    }
}

// ============================================================================
// ACCOUNT DECODING / METADATA
// ============================================================================

config_struct! {
    /// Program ids and limits for migration/metadata decoding
    pub struct MetadataConfig {
        migration_program_id: String = "migK824DsBMp2eZXdhSBAWFS6PbvA6UN8DV15HfmstR".to_string(),
        metadata_program_id: String = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s".to_string(),
        /// Expected first 8 bytes of a migration account; empty disables the check
        migration_discriminator: Vec<u8> = Vec::new(),
        /// Upper bound for any length-prefixed string in an account
        max_string_len: usize = 512,
        offchain_timeout_secs: u64 = 5,
        /// Used when the mint account cannot be read
        default_decimals: u8 = 9,
    }
}

// ============================================================================
// POOL DISCOVERY
// ============================================================================

config_struct! {
    /// Market-data aggregator access and ranking policy
    pub struct DiscoveryConfig {
        base_url: String = "https://api.dexscreener.com".to_string(),
        chain_id: String = "solana".to_string(),
        /// Ordered preference; earlier entries win liquidity ties
        preferred_dexes: Vec<String> = vec![
            "raydium".to_string(),
            "meteora".to_string(),
            "orca".to_string(),
        ],
        /// Floor for multi-pool tracking
        min_liquidity_usd: f64 = 1000.0,
        request_timeout_secs: u64 = 10,
    }
}

// ============================================================================
// OHLCV
// ============================================================================

config_struct! {
    /// Candle source and aggregation targets
    pub struct OhlcvConfig {
        enabled: bool = true,
        base_url: String = "https://api.geckoterminal.com/api/v2".to_string(),
        network: String = "solana".to_string(),
        source_interval: String = "1h".to_string(),
        target_intervals: Vec<String> = vec!["4h".to_string(), "8h".to_string(), "1d".to_string()],
        bars_per_fetch: u32 = 1000,
        request_timeout_secs: u64 = 15,
    }
}

// ============================================================================
// SYNC
// ============================================================================

config_struct! {
    /// Orchestrator limits
    pub struct SyncConfig {
        /// Wall-clock budget for one run
        max_run_seconds: u64 = 300,
        max_concurrent_projects: usize = 4,
    }
}
