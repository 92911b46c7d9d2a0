// Config schema submodule - one file per concern

use crate::config_struct;

mod apis;
mod ingest;
mod storage;

pub use apis::*;
pub use ingest::*;
pub use storage::*;

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        /// Ledger RPC endpoint
        rpc: RpcConfig = RpcConfig::default(),

        /// Per-upstream rate limits
        apis: ApisConfig = ApisConfig::default(),

        /// Transaction history scanning
        scanner: ScannerConfig = ScannerConfig::default(),

        /// On-chain account decoding and off-chain metadata
        metadata: MetadataConfig = MetadataConfig::default(),

        /// Pool discovery via the market-data aggregator
        discovery: DiscoveryConfig = DiscoveryConfig::default(),

        /// Candle fetching and aggregation
        ohlcv: OhlcvConfig = OhlcvConfig::default(),

        /// Orchestrator limits
        sync: SyncConfig = SyncConfig::default(),

        /// Persistence
        database: DatabaseConfig = DatabaseConfig::default(),
    }
}
