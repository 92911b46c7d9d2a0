//! Token metadata and mint accounts, plus off-chain JSON enrichment

use super::reader::ByteReader;
use crate::errors::{is_rate_limit_message, DecodeError, SyncError};
use crate::logger::{self, LogTag};
use crate::scheduler::RequestScheduler;
use serde::Deserialize;
use solana_program::program_error::ProgramError;
use solana_program::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use spl_token_2022::extension::StateWithExtensions;
use spl_token_2022::state::Mint;
use std::sync::Arc;
use std::time::Duration;

/// Account key byte of a v1 metadata account
pub const METADATA_V1_KEY: u8 = 4;

/// Base mint state length shared by both token programs
pub const MINT_ACCOUNT_LEN: usize = Mint::LEN;

const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

#[derive(Debug, Clone, PartialEq)]
pub struct OnChainMetadata {
    pub update_authority: Pubkey,
    pub mint: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// key(1) | update authority(32) | mint(32) | name | symbol | uri
pub fn decode_metadata_account(
    data: &[u8],
    max_string_len: usize,
) -> Result<OnChainMetadata, DecodeError> {
    let mut reader = ByteReader::new(data);

    let key = reader.read_u8("key")?;
    if key != METADATA_V1_KEY {
        return Err(DecodeError::InvalidAccount {
            reason: format!("metadata key byte is {}, expected {}", key, METADATA_V1_KEY),
        });
    }

    let update_authority = reader.read_pubkey("update_authority")?;
    let mint = reader.read_pubkey("mint")?;
    let name = reader.read_string("name", max_string_len)?;
    let symbol = reader.read_string("symbol", max_string_len)?;
    let uri = reader.read_string("uri", max_string_len)?;

    Ok(OnChainMetadata {
        update_authority,
        mint,
        name: name.trim().to_string(),
        symbol: symbol.trim().to_string(),
        uri: uri.trim().to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintInfo {
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
}

/// Mint state of either token program; Token-2022 extensions are skipped
pub fn decode_mint_account(data: &[u8]) -> Result<MintInfo, DecodeError> {
    if data.len() < MINT_ACCOUNT_LEN {
        return Err(DecodeError::Truncated {
            field: "mint",
            offset: 0,
            needed: MINT_ACCOUNT_LEN,
            available: data.len(),
        });
    }

    let state = StateWithExtensions::<Mint>::unpack(data).map_err(|e| match e {
        ProgramError::UninitializedAccount => DecodeError::InvalidAccount {
            reason: "mint is not initialized".to_string(),
        },
        other => DecodeError::InvalidAccount {
            reason: format!("mint state did not unpack: {}", other),
        },
    })?;

    Ok(MintInfo {
        supply: state.base.supply,
        decimals: state.base.decimals,
        is_initialized: state.base.is_initialized,
    })
}

// =============================================================================
// OFF-CHAIN JSON
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
struct OffchainExtensions {
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    twitter: Option<String>,
    #[serde(default)]
    telegram: Option<String>,
}

/// Fields we read from the JSON document a metadata URI points at
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct OffchainMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
}

#[derive(Deserialize)]
struct OffchainDocument {
    #[serde(flatten)]
    base: OffchainMetadata,
    #[serde(default)]
    extensions: Option<OffchainExtensions>,
}

/// Parse an off-chain document; `None` when it is not a JSON object we understand
pub fn parse_offchain_metadata(body: &str) -> Option<OffchainMetadata> {
    let doc: OffchainDocument = serde_json::from_str(body).ok()?;
    let mut meta = doc.base;
    if let Some(ext) = doc.extensions {
        meta.website = meta.website.or(ext.website);
        meta.twitter = meta.twitter.or(ext.twitter);
        meta.telegram = meta.telegram.or(ext.telegram);
    }
    Some(meta)
}

/// Resolved token description: on-chain values overridden by off-chain ones
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub supply: u64,
    pub image: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
}

impl TokenInfo {
    pub fn unknown(address: &str, decimals: u8) -> Self {
        Self {
            address: address.to_string(),
            name: "Unknown".to_string(),
            symbol: "UNKNOWN".to_string(),
            decimals,
            supply: 0,
            image: None,
            website: None,
            twitter: None,
            telegram: None,
        }
    }

    pub fn apply_onchain(&mut self, meta: &OnChainMetadata) {
        if !meta.name.is_empty() {
            self.name = meta.name.clone();
        }
        if !meta.symbol.is_empty() {
            self.symbol = meta.symbol.clone();
        }
    }

    /// Non-empty off-chain fields win
    pub fn apply_offchain(&mut self, meta: &OffchainMetadata) {
        fn pick(value: &Option<String>) -> Option<String> {
            value
                .as_ref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        if let Some(name) = pick(&meta.name) {
            self.name = name;
        }
        if let Some(symbol) = pick(&meta.symbol) {
            self.symbol = symbol;
        }
        self.image = pick(&meta.image).or(self.image.take());
        self.website = pick(&meta.website).or(self.website.take());
        self.twitter = pick(&meta.twitter).or(self.twitter.take());
        self.telegram = pick(&meta.telegram).or(self.telegram.take());
    }
}

/// Rewrite `ipfs://` URIs to a gateway and reject anything that is not http(s)
pub fn normalize_metadata_uri(uri: &str) -> Option<String> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }

    let candidate = match uri.strip_prefix("ipfs://") {
        Some(rest) => format!("{}{}", IPFS_GATEWAY, rest.trim_start_matches("ipfs/")),
        None => uri.to_string(),
    };

    let parsed = url::Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" => Some(candidate),
        _ => None,
    }
}

/// Best-effort fetcher for off-chain metadata documents
///
/// Every failure (bad URI, timeout, HTTP error, malformed JSON) is logged and
/// turned into `None`; callers keep their on-chain values.
pub struct MetadataFetcher {
    client: reqwest::Client,
    scheduler: Arc<RequestScheduler>,
    timeout: Duration,
}

impl MetadataFetcher {
    pub fn new(scheduler: Arc<RequestScheduler>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            scheduler,
            timeout,
        }
    }

    pub async fn fetch(&self, uri: &str) -> Option<OffchainMetadata> {
        let url = match normalize_metadata_uri(uri) {
            Some(url) => url,
            None => {
                logger::debug(
                    LogTag::Decoder,
                    &format!("Skipping off-chain metadata with unusable URI '{}'", uri),
                );
                return None;
            }
        };

        let client = self.client.clone();
        let timeout = self.timeout;
        let request_url = url.clone();
        let result = self
            .scheduler
            .execute("metadata", move || {
                let client = client.clone();
                let url = request_url.clone();
                async move {
                    let response = client.get(&url).timeout(timeout).send().await?;
                    let status = response.status();
                    if status.as_u16() == 429 {
                        return Err(SyncError::Throttled {
                            api: "metadata".to_string(),
                            message: format!("HTTP 429 from {}", url),
                        });
                    }
                    if !status.is_success() {
                        return Err(SyncError::Upstream {
                            api: "metadata".to_string(),
                            status: Some(status.as_u16()),
                            message: url,
                        });
                    }
                    let body = response.text().await?;
                    if is_rate_limit_message(&body) && body.len() < 200 {
                        return Err(SyncError::Throttled {
                            api: "metadata".to_string(),
                            message: body,
                        });
                    }
                    Ok(body)
                }
            })
            .await;

        match result {
            Ok(body) => {
                let parsed = parse_offchain_metadata(&body);
                if parsed.is_none() {
                    logger::warning(
                        LogTag::Decoder,
                        &format!("Off-chain metadata at {} is not valid JSON", url),
                    );
                }
                parsed
            }
            Err(e) => {
                logger::warning(
                    LogTag::Decoder,
                    &format!("Failed to fetch off-chain metadata from {}: {}", url, e),
                );
                None
            }
        }
    }
}
