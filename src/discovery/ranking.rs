//! DEX normalization and pool ranking (pure, no I/O)

use super::types::{DexType, DiscoveredPool, MarketPair};
use std::cmp::Ordering;

/// Case-insensitive substring match against the known DEX families
pub fn normalize_dex_type(dex_id: &str) -> DexType {
    let lower = dex_id.to_lowercase();
    if lower.contains("raydium") {
        DexType::Raydium
    } else if lower.contains("meteora") {
        DexType::Meteora
    } else if lower.contains("orca") || lower.contains("whirlpool") {
        DexType::Orca
    } else if lower.contains("pump") {
        DexType::PumpFun
    } else {
        DexType::Unknown
    }
}

/// Preference list from config names; unknown names are dropped
pub fn parse_preferences(names: &[String]) -> Vec<DexType> {
    let mut out = Vec::new();
    for name in names {
        let dex = normalize_dex_type(name);
        if dex != DexType::Unknown && !out.contains(&dex) {
            out.push(dex);
        }
    }
    out
}

fn by_liquidity_desc(a: &DiscoveredPool, b: &DiscoveredPool) -> Ordering {
    b.liquidity_usd
        .partial_cmp(&a.liquidity_usd)
        .unwrap_or(Ordering::Equal)
}

/// Map pairs to pools, drop non-positive liquidity, sort by liquidity desc
pub fn pools_from_pairs(pairs: &[MarketPair]) -> Vec<DiscoveredPool> {
    let mut pools: Vec<DiscoveredPool> = pairs
        .iter()
        .filter(|p| !p.pair_address.is_empty())
        .map(|p| DiscoveredPool {
            pool_address: p.pair_address.clone(),
            dex_type: normalize_dex_type(&p.dex_id),
            dex_id: p.dex_id.clone(),
            liquidity_usd: p.liquidity_usd(),
            volume_24h_usd: p.volume_24h_usd(),
            price_usd: p.price_usd(),
        })
        .filter(|p| p.liquidity_usd.is_finite() && p.liquidity_usd > 0.0)
        .collect();
    pools.sort_by(by_liquidity_desc);
    pools
}

/// Best pool: highest liquidity among preferred DEXes, else highest overall
///
/// Equal liquidity between preferred pools goes to the earlier preference.
pub fn select_best_pool(pools: &[DiscoveredPool], preferred: &[DexType]) -> Option<DiscoveredPool> {
    let rank = |dex: DexType| preferred.iter().position(|p| *p == dex);

    let best_preferred = pools
        .iter()
        .filter(|p| p.liquidity_usd > 0.0)
        .filter_map(|p| rank(p.dex_type).map(|r| (r, p)))
        .max_by(|(ra, a), (rb, b)| {
            a.liquidity_usd
                .partial_cmp(&b.liquidity_usd)
                .unwrap_or(Ordering::Equal)
                .then_with(|| rb.cmp(ra))
        })
        .map(|(_, p)| p.clone());

    if best_preferred.is_some() {
        return best_preferred;
    }

    pools
        .iter()
        .filter(|p| p.liquidity_usd > 0.0)
        .max_by(|a, b| {
            a.liquidity_usd
                .partial_cmp(&b.liquidity_usd)
                .unwrap_or(Ordering::Equal)
        })
        .cloned()
}
