// src/blockchain/rpc.rs

//! Direct JSON-RPC transport to the blockchain provider.
//!
//! Balance and transaction-count lookups always come through here; the
//! higher-level provider middleware is bypassed for those because of a
//! transport defect under some runtimes.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Additional attempts after the first failure.
const MAX_RETRIES: u32 = 2;
/// Attempt N sleeps N times this before retrying.
const BACKOFF_STEP_MS: u64 = 1000;

#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": Uuid::new_v4().to_string(),
        });
        let response = self.http.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("provider returned HTTP {}", response.status()));
        }
        let body: Value = response.json().await?;
        if let Some(err) = body.get("error") {
            if !err.is_null() {
                return Err(anyhow!("RPC error for {}: {}", method, err));
            }
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Call with bounded retry on transient failures (non-2xx responses and
    /// provider-reported RPC errors). The final error surfaces only after
    /// all attempts are exhausted.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let mut attempt = 0u32;
        loop {
            match self.call_once(method, &params).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(
                        "RPC {} failed (attempt {}): {:#} - retrying",
                        method, attempt, e
                    );
                    tokio::time::sleep(Duration::from_millis(u64::from(attempt) * BACKOFF_STEP_MS))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
