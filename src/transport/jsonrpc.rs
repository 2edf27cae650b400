// JSON-RPC transport layer implementation
// This file implements the Ethereum JSON-RPC client used for eth_call reads
// against quoter, router, aggregator and token contracts
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use alloy_primitives::Address;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Read-only contract call capability. Implemented by [`JsonRpc`]; tests
/// supply in-process fakes.
#[async_trait]
pub trait EthCall: Send + Sync {
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, AggrError>;
}

#[derive(Debug)]
pub struct JsonRpc {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpc {
    pub fn new(url: impl Into<String>) -> Result<Self, AggrError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .map_err(|e| AggrError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, AggrError> {
        let _timer = REQ_LATENCY.with_label_values(&["jsonrpc", method]).start_timer();
        let result = self.request_inner(method, params).await;
        if let Err(err) = &result {
            if !matches!(err, AggrError::Reverted(_)) {
                REQ_ERRORS.with_label_values(&["jsonrpc", method]).inc();
            }
        }
        result
    }

    async fn request_inner(&self, method: &str, params: Value) -> Result<Value, AggrError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AggrError::Transport(format!("jsonrpc send: {e}")))?;
        if !resp.status().is_success() {
            return Err(AggrError::Provider(format!("http {}", resp.status())));
        }
        let mut body: Value = resp
            .json()
            .await
            .map_err(|e| AggrError::Transport(format!("json parse: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(classify_rpc_error(err));
        }
        Ok(body["result"].take())
    }

    pub async fn chain_id(&self) -> Result<u64, AggrError> {
        let result = self.request("eth_chainId", json!([])).await?;
        let hex_id = result
            .as_str()
            .ok_or_else(|| AggrError::Decode("eth_chainId result is not a string".into()))?;
        u64::from_str_radix(hex_id.trim_start_matches("0x"), 16)
            .map_err(|e| AggrError::Decode(format!("chain id {hex_id}: {e}")))
    }

    /// Poll `eth_chainId` with exponential backoff until the node answers.
    pub async fn readiness_probe(&self, max_elapsed: Duration) -> Result<u64, AggrError> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(max_elapsed),
            ..ExponentialBackoff::default()
        };
        retry(policy, || async {
            self.chain_id().await.map_err(|err| {
                debug!(error = %err, "node not ready");
                backoff::Error::transient(err)
            })
        })
        .await
        .map_err(|_| AggrError::BackoffExhausted)
    }
}

#[async_trait]
impl EthCall for JsonRpc {
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, AggrError> {
        let params = json!([
            { "to": to.to_string(), "data": format!("0x{}", hex::encode(&data)) },
            "latest"
        ]);
        let result = self.request("eth_call", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| AggrError::Decode("eth_call result is not a string".into()))?;
        hex::decode(raw.trim_start_matches("0x"))
            .map_err(|e| AggrError::Decode(format!("eth_call hex: {e}")))
    }
}

/// Reverts come back as JSON-RPC errors; node implementations disagree on the
/// code, so the message is checked as well.
fn classify_rpc_error(err: &Value) -> AggrError {
    match serde_json::from_value::<RpcErrorObject>(err.clone()) {
        Ok(obj) if obj.code == 3 || obj.message.to_ascii_lowercase().contains("revert") => {
            let detail = obj
                .data
                .map(|d| d.to_string())
                .unwrap_or_else(|| obj.message.clone());
            AggrError::Reverted(detail)
        }
        Ok(obj) => AggrError::Provider(format!("{} ({})", obj.message, obj.code)),
        Err(_) => AggrError::Provider(err.to_string()),
    }
}
