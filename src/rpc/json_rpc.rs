//! JSON-RPC 2.0 chain client over HTTP
//!
//! Speaks the web3 method set the swap bot has always used:
//! `eth_getTransactionCount(addr, "pending")`, `eth_gasPrice`,
//! `eth_sendRawTransaction(0x..)` and `eth_getTransactionReceipt(id)`.
//! Quantities are hex strings (`0x1a`); a `null` receipt means pending.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, trace};

use super::{ChainClient, ChainStatus, RpcError};
use crate::types::TransactionId;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptObject {
    status: Option<String>,
    block_number: Option<String>,
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// HTTP JSON-RPC chain client
#[derive(Debug)]
pub struct JsonRpcChainClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let url = url.into();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Connect {
                endpoint: url.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            url,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "JSON-RPC request");

        let send = self.http.post(&self.url).json(&body).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| self.timeout_error(method))?
            .map_err(|e| {
                if e.is_timeout() {
                    self.timeout_error(method)
                } else if e.is_connect() {
                    RpcError::Connect {
                        endpoint: self.url.clone(),
                        message: e.to_string(),
                    }
                } else {
                    RpcError::Transport {
                        endpoint: self.url.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status.is_client_error() {
            return Err(RpcError::HttpStatus {
                endpoint: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let envelope: RpcEnvelope<T> = response.json().await.map_err(|e| RpcError::InvalidResponse {
            endpoint: self.url.clone(),
            message: format!("{} returned unparseable body: {}", method, e),
        })?;

        if let Some(err) = envelope.error {
            debug!(method, code = err.code, message = %err.message, "JSON-RPC error");
            return Err(RpcError::RpcResponse {
                endpoint: self.url.clone(),
                message: err.message,
                code: Some(err.code),
            });
        }
        Ok(envelope.result)
    }

    fn timeout_error(&self, method: &str) -> RpcError {
        RpcError::Timeout {
            endpoint: self.url.clone(),
            method: method.to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }

    fn quantity(&self, method: &str, value: Option<String>) -> Result<u64, RpcError> {
        let raw = value.ok_or_else(|| RpcError::InvalidResponse {
            endpoint: self.url.clone(),
            message: format!("{} returned null", method),
        })?;
        parse_quantity(&raw).ok_or_else(|| RpcError::InvalidResponse {
            endpoint: self.url.clone(),
            message: format!("{} returned non-hex quantity {:?}", method, raw),
        })
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn next_nonce(&self, account: &Pubkey) -> Result<u64, RpcError> {
        let method = "eth_getTransactionCount";
        let result = self
            .call::<String>(method, json!([account.to_string(), "pending"]))
            .await?;
        self.quantity(method, result)
    }

    async fn gas_price(&self) -> Result<u64, RpcError> {
        let method = "eth_gasPrice";
        let result = self.call::<String>(method, json!([])).await?;
        self.quantity(method, result)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        let method = "eth_sendRawTransaction";
        let encoded = format!("0x{}", hex::encode(raw));
        self.call::<String>(method, json!([encoded]))
            .await?
            .ok_or_else(|| RpcError::InvalidResponse {
                endpoint: self.url.clone(),
                message: format!("{} returned null", method),
            })
    }

    async fn transaction_status(&self, id: &TransactionId) -> Result<Option<ChainStatus>, RpcError> {
        let method = "eth_getTransactionReceipt";
        let receipt = match self
            .call::<ReceiptObject>(method, json!([id.to_string()]))
            .await?
        {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        // A receipt without a block number has not been mined yet
        let block = match receipt.block_number {
            Some(raw) => self.quantity(method, Some(raw))?,
            None => return Ok(None),
        };
        let success = match receipt.status.as_deref().and_then(parse_quantity) {
            Some(1) => true,
            Some(0) => false,
            other => {
                return Err(RpcError::InvalidResponse {
                    endpoint: self.url.clone(),
                    message: format!("{} returned unknown status {:?}", method, other),
                })
            }
        };
        Ok(Some(ChainStatus { success, block }))
    }
}
