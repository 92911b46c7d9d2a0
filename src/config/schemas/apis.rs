use crate::config_struct;

// ============================================================================
// RPC CONFIGURATION
// ============================================================================

config_struct! {
    /// Ledger JSON-RPC endpoint
    pub struct RpcConfig {
        url: String = "https://api.mainnet-beta.solana.com".to_string(),
        /// Environment variable holding an optional API key, appended as `api-key`
        api_key_env: String = "RPC_API_KEY".to_string(),
        request_timeout_secs: u64 = 30,
    }
}

impl RpcConfig {
    /// Endpoint URL with the API key from the environment applied, when set
    pub fn resolved_url(&self) -> String {
        let key = if self.api_key_env.is_empty() {
            None
        } else {
            std::env::var(&self.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
        };

        match key {
            Some(key) if self.url.contains('?') => format!("{}&api-key={}", self.url, key),
            Some(key) => format!("{}?api-key={}", self.url, key),
            None => self.url.clone(),
        }
    }
}

// ============================================================================
// UPSTREAM RATE LIMITS
// ============================================================================

config_struct! {
    /// Gate parameters for one upstream API
    pub struct ApiLimitConfig {
        max_requests_per_minute: u32 = 60,
        min_request_interval_ms: u64 = 1000,
        max_retries: u32 = 3,
        initial_backoff_ms: u64 = 2000,
    }
}

config_struct! {
    /// Limits keyed by scheduler API name
    pub struct ApisConfig {
        solana_rpc: ApiLimitConfig = ApiLimitConfig {
            max_requests_per_minute: 300,
            min_request_interval_ms: 100,
            max_retries: 5,
            initial_backoff_ms: 1000,
        },
        dexscreener: ApiLimitConfig = ApiLimitConfig::default(),
        geckoterminal: ApiLimitConfig = ApiLimitConfig {
            max_requests_per_minute: 30,
            min_request_interval_ms: 2000,
            max_retries: 3,
            initial_backoff_ms: 2000,
        },
        metadata: ApiLimitConfig = ApiLimitConfig {
            max_requests_per_minute: 120,
            min_request_interval_ms: 250,
            max_retries: 1,
            initial_backoff_ms: 1000,
        },
    }
}

impl ApisConfig {
    /// Limits for a scheduler API name; unknown names get the defaults
    pub fn limits_for(&self, api: &str) -> ApiLimitConfig {
        match api {
            "solana_rpc" => self.solana_rpc.clone(),
            "dexscreener" => self.dexscreener.clone(),
            "geckoterminal" => self.geckoterminal.clone(),
            "metadata" => self.metadata.clone(),
            _ => ApiLimitConfig::default(),
        }
    }

    pub fn named(&self) -> Vec<(&'static str, &ApiLimitConfig)> {
        vec![
            ("solana_rpc", &self.solana_rpc),
            ("dexscreener", &self.dexscreener),
            ("geckoterminal", &self.geckoterminal),
            ("metadata", &self.metadata),
        ]
    }
}
