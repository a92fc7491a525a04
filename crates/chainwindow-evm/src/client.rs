//! HTTP JSON-RPC ledger client for EVM chains.
//!
//! Uses `eth_blockNumber`, `eth_getBlockByNumber` (with full transaction
//! objects), and `eth_getCode`. A `null` block result maps to "not produced
//! yet"; everything else that goes wrong is a transient RPC error for the
//! scheduler to retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use chainwindow_core::error::SyncError;
use chainwindow_core::types::{BlockData, RawTransaction};
use chainwindow_core::LedgerClient;

use crate::rpc::{JsonRpcRequest, JsonRpcResponse};

/// Ledger client backed by a single JSON-RPC HTTP endpoint.
pub struct HttpLedgerClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpLedgerClient {
    /// Create a client for `url` with the given request timeout.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SyncError::Rpc(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with the default 30-second request timeout.
    pub fn default_for(url: impl Into<String>) -> Result<Self, SyncError> {
        Self::new(url, Duration::from_secs(30))
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, SyncError> {
        let req = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| SyncError::Rpc(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Rpc(format!("HTTP {status}: {body}")));
        }

        let parsed: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| SyncError::Rpc(e.to_string()))?;
        parsed.into_result().map_err(|e| SyncError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn head_block_number(&self) -> Result<u64, SyncError> {
        let v = self.call("eth_blockNumber", vec![]).await?;
        hex_quantity(&v)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<Option<BlockData>, SyncError> {
        let v = self
            .call(
                "eth_getBlockByNumber",
                vec![json!(format!("0x{number:x}")), json!(true)],
            )
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        block_from_json(&v).map(Some)
    }

    async fn code_at(&self, address: &str) -> Result<String, SyncError> {
        let v = self
            .call("eth_getCode", vec![json!(address), json!("latest")])
            .await?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| SyncError::Rpc("eth_getCode returned a non-string".into()))
    }
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Result<u64, SyncError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| SyncError::Rpc(format!("bad hex quantity {s:?}: {e}")))
}

fn hex_quantity(v: &Value) -> Result<u64, SyncError> {
    let s = v
        .as_str()
        .ok_or_else(|| SyncError::Rpc(format!("expected hex quantity, got {v}")))?;
    parse_hex_u64(s)
}

/// Convert an `eth_getBlockByNumber` JSON result to `BlockData`.
pub fn block_from_json(v: &Value) -> Result<BlockData, SyncError> {
    let number = hex_quantity(&v["number"])?;
    let timestamp = hex_quantity(&v["timestamp"])? as i64;

    let transactions = v["transactions"]
        .as_array()
        .map(|txs| {
            txs.iter()
                .filter_map(|tx| {
                    // A transaction without hash or sender is unusable; the
                    // node never produces one, so drop rather than fail.
                    let hash = tx["hash"].as_str()?;
                    let from = tx["from"].as_str()?;
                    Some(RawTransaction {
                        hash: hash.to_string(),
                        from: from.to_string(),
                        to: tx["to"].as_str().map(str::to_string),
                        value: tx["value"].as_str().unwrap_or("0x0").to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(BlockData {
        number,
        timestamp,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_hex_u64_basic() {
        assert_eq!(parse_hex_u64("0x1").unwrap(), 1);
        assert_eq!(parse_hex_u64("0xff").unwrap(), 255);
        assert_eq!(parse_hex_u64("1234").unwrap(), 0x1234);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn block_from_json_full_transactions() {
        let v = json!({
            "number": "0x12a05f2",
            "timestamp": "0x6553f100",
            "transactions": [
                {
                    "hash": "0xt1",
                    "from": "0xaaa",
                    "to": "0xbbb",
                    "value": "0xde0b6b3a7640000"
                },
                {
                    "hash": "0xt2",
                    "from": "0xccc",
                    "to": null,
                    "value": "0x0"
                }
            ]
        });

        let block = block_from_json(&v).unwrap();
        assert_eq!(block.number, 19_531_250);
        assert_eq!(block.timestamp, 0x6553f100);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].to.as_deref(), Some("0xbbb"));
        assert!(block.transactions[1].to.is_none());
    }

    #[test]
    fn block_from_json_empty_block() {
        let v = json!({
            "number": "0xa",
            "timestamp": "0x64",
            "transactions": []
        });
        let block = block_from_json(&v).unwrap();
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn block_from_json_rejects_missing_number() {
        let v = json!({ "timestamp": "0x64", "transactions": [] });
        assert!(block_from_json(&v).is_err());
    }
}
