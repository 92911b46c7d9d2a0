//! JSON-RPC over HTTP, every call routed through the request scheduler

use super::types::{ParsedTransaction, SignatureInfo};
use super::LedgerRpc;
use crate::config::RpcConfig;
use crate::errors::{is_rate_limit_message, SyncError, SyncResult};
use crate::logger::{self, LogTag};
use crate::scheduler::RequestScheduler;
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Scheduler lane for ledger calls
pub const LEDGER_API: &str = "solana_rpc";

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<AccountValue>,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct TokenBalanceResult {
    value: Option<TokenAmount>,
}

#[derive(Debug, Deserialize)]
struct TokenAmount {
    /// Raw integer amount as a decimal string
    amount: String,
    decimals: u8,
}

impl TokenAmount {
    fn ui_amount(&self) -> Option<f64> {
        let raw: u64 = self.amount.parse().ok()?;
        Some(raw as f64 / 10f64.powi(self.decimals as i32))
    }
}

pub struct HttpLedgerClient {
    client: reqwest::Client,
    url: String,
    scheduler: Arc<RequestScheduler>,
}

impl HttpLedgerClient {
    pub fn new(config: &RpcConfig, scheduler: Arc<RequestScheduler>) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.resolved_url(),
            scheduler,
        })
    }

    /// One JSON-RPC call; `Ok(None)` when the node returns `null`
    async fn call<T>(&self, method: &'static str, params: Value) -> SyncResult<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.client.clone();
        let url = self.url.clone();

        logger::verbose(LogTag::Rpc, &format!("{} {}", method, params));

        self.scheduler
            .execute(LEDGER_API, move || {
                let client = client.clone();
                let url = url.clone();
                let payload = json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": method,
                    "params": params.clone(),
                });
                async move {
                    let response = client
                        .post(&url)
                        .header("Content-Type", "application/json")
                        .json(&payload)
                        .send()
                        .await?;

                    let status = response.status();
                    if status.as_u16() == 429 {
                        return Err(SyncError::Throttled {
                            api: LEDGER_API.to_string(),
                            message: format!("{} returned HTTP 429", method),
                        });
                    }
                    let body = response.text().await?;
                    if !status.is_success() {
                        let message = format!("{}: {}", method, body.chars().take(200).collect::<String>());
                        if is_rate_limit_message(&body) {
                            return Err(SyncError::Throttled {
                                api: LEDGER_API.to_string(),
                                message,
                            });
                        }
                        return Err(SyncError::Upstream {
                            api: LEDGER_API.to_string(),
                            status: Some(status.as_u16()),
                            message,
                        });
                    }

                    let parsed: RpcResponse<T> = serde_json::from_str(&body)?;
                    if let Some(err) = parsed.error {
                        // -32429 is the conventional JSON-RPC "too many requests"
                        if err.code == -32429 || is_rate_limit_message(&err.message) {
                            return Err(SyncError::Throttled {
                                api: LEDGER_API.to_string(),
                                message: err.message,
                            });
                        }
                        return Err(SyncError::Upstream {
                            api: LEDGER_API.to_string(),
                            status: None,
                            message: format!("{} error {}: {}", method, err.code, err.message),
                        });
                    }
                    Ok(parsed.result)
                }
            })
            .await
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerClient {
    async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
        before: Option<&str>,
    ) -> SyncResult<Vec<SignatureInfo>> {
        let mut options = serde_json::Map::new();
        options.insert("limit".to_string(), json!(limit));
        options.insert("commitment".to_string(), json!("confirmed"));
        if let Some(before) = before {
            options.insert("before".to_string(), json!(before));
        }

        let result: Option<Vec<SignatureInfo>> = self
            .call("getSignaturesForAddress", json!([address, Value::Object(options)]))
            .await?;
        Ok(result.unwrap_or_default())
    }

    async fn get_parsed_transaction(&self, signature: &str) -> SyncResult<Option<ParsedTransaction>> {
        self.call(
            "getTransaction",
            json!([
                signature,
                {
                    "encoding": "jsonParsed",
                    "maxSupportedTransactionVersion": 0,
                    "commitment": "confirmed"
                }
            ]),
        )
        .await
    }

    async fn get_account_info(&self, address: &str) -> SyncResult<Option<Vec<u8>>> {
        let result: Option<AccountInfoResult> = self
            .call(
                "getAccountInfo",
                json!([address, {"encoding": "base64", "commitment": "confirmed"}]),
            )
            .await?;

        let value = match result.and_then(|r| r.value) {
            Some(value) => value,
            None => return Ok(None),
        };

        let (payload, encoding) = value.data;
        if encoding != "base64" {
            return Err(SyncError::Upstream {
                api: LEDGER_API.to_string(),
                status: None,
                message: format!("unexpected account encoding '{}'", encoding),
            });
        }

        base64::engine::general_purpose::STANDARD
            .decode(payload.as_bytes())
            .map(Some)
            .map_err(|e| SyncError::Upstream {
                api: LEDGER_API.to_string(),
                status: None,
                message: format!("account data is not valid base64: {}", e),
            })
    }

    async fn get_token_account_balance(&self, address: &str) -> SyncResult<Option<f64>> {
        let result: Option<TokenBalanceResult> = self
            .call(
                "getTokenAccountBalance",
                json!([address, {"commitment": "confirmed"}]),
            )
            .await?;
        Ok(result.and_then(|r| r.value).and_then(|v| v.ui_amount()))
    }
}
