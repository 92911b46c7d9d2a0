use serde::{Deserialize, Serialize};

/// Known DEX families; anything unrecognized is `Unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DexType {
    Raydium,
    Meteora,
    Orca,
    PumpFun,
    Unknown,
}

impl DexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DexType::Raydium => "raydium",
            DexType::Meteora => "meteora",
            DexType::Orca => "orca",
            DexType::PumpFun => "pump_fun",
            DexType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DexType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pool as returned by discovery, ranked but not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPool {
    pub pool_address: String,
    pub dex_type: DexType,
    /// Aggregator's raw DEX label, kept for display
    pub dex_id: String,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
    pub price_usd: f64,
}

impl DiscoveredPool {
    /// Degraded stand-in when no pool exists: the token address itself
    pub fn pseudo_pool(token_address: &str) -> Self {
        Self {
            pool_address: token_address.to_string(),
            dex_type: DexType::Unknown,
            dex_id: String::new(),
            liquidity_usd: 0.0,
            volume_24h_usd: 0.0,
            price_usd: 0.0,
        }
    }
}

// =============================================================================
// AGGREGATOR RESPONSE SHAPES
// =============================================================================

/// `GET /latest/dex/tokens/{address}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPairsResponse {
    #[serde(default)]
    pub pairs: Option<Vec<MarketPair>>,
}

/// A trading pair; every field the aggregator may omit has a default
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPair {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: String,
    #[serde(default)]
    pub pair_address: String,
    /// Decimal string upstream
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub liquidity: Option<PairLiquidity>,
    #[serde(default)]
    pub volume: Option<PairVolume>,
    #[serde(default)]
    pub base_token: Option<PairToken>,
    #[serde(default)]
    pub quote_token: Option<PairToken>,
}

impl MarketPair {
    pub fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    pub fn volume_24h_usd(&self) -> f64 {
        self.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0)
    }

    pub fn price_usd(&self) -> f64 {
        self.price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairVolume {
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PairToken {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub symbol: String,
}
