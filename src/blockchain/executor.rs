// src/blockchain/executor.rs

//! Allowlisted execution of planned provider calls.
//!
//! `execute` never returns an error to its caller: every failure degrades
//! to `None` with a logged diagnostic, so one failing call cannot abort the
//! rest of a plan.

use crate::agent::schema::{ExtractedData, PlannedCall, QueryPlan};
use crate::blockchain::allowlist::AllowedMethod;
use crate::blockchain::nft::NftClient;
use crate::blockchain::rpc::RpcClient;
use ethers::providers::{Http, Provider};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ApiExecutor {
    rpc: RpcClient,
    provider: Arc<Provider<Http>>,
    nft: NftClient,
}

impl ApiExecutor {
    pub fn new(rpc: RpcClient, provider: Arc<Provider<Http>>, nft: NftClient) -> Self {
        Self { rpc, provider, nft }
    }

    /// Execute one call. A method path outside the allowlist is rejected
    /// before any network attempt.
    pub async fn execute(
        &self,
        method_path: &str,
        params: &Value,
        extracted: &ExtractedData,
    ) -> Option<Value> {
        let method = match AllowedMethod::parse(method_path) {
            Some(method) => method,
            None => {
                warn!("rejected non-allowlisted method: {}", method_path);
                return None;
            }
        };

        let outcome = match method {
            AllowedMethod::GetBalance
            | AllowedMethod::GetTransactionCount
            | AllowedMethod::GetTokenMetadata
            | AllowedMethod::GetAssetTransfers
            | AllowedMethod::GetLogs => {
                let rpc_method = method.rpc_method()?;
                self.rpc.call(rpc_method, params.clone()).await
            }
            AllowedMethod::GetTokenBalances => self.token_balances(params).await,
            AllowedMethod::GetNftsForOwner => {
                let Some(owner) = owner_from_params(params) else {
                    warn!("{} called without an owner param", method_path);
                    return None;
                };
                let page_size = page_size_from_params(params);
                self.nft
                    .nfts_for_owner(&owner, page_size, &extracted.collection_addresses)
                    .await
            }
            AllowedMethod::GetOwnersForContract => {
                let Some(contract) = first_string_param(params) else {
                    warn!("{} called without a contract param", method_path);
                    return None;
                };
                self.nft.owners_for_contract(&contract).await
            }
            AllowedMethod::GetOwnersForNft => {
                let Some((contract, token_id)) = contract_and_token_id(params) else {
                    warn!("{} called without contract/tokenId params", method_path);
                    return None;
                };
                self.nft.owners_for_nft(&contract, &token_id).await
            }
        };

        match outcome {
            Ok(value) => {
                debug!("{} succeeded", method_path);
                Some(value)
            }
            Err(e) => {
                warn!("{} failed: {:#}", method_path, e);
                None
            }
        }
    }

    /// Token balances go through the provider middleware first and fall back
    /// to the raw transport; the two response shapes are normalized
    /// downstream.
    async fn token_balances(&self, params: &Value) -> anyhow::Result<Value> {
        match self
            .provider
            .request::<_, Value>("alchemy_getTokenBalances", params.clone())
            .await
        {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(
                    "provider transport failed for token balances: {} - falling back to raw RPC",
                    e
                );
                self.rpc.call("alchemy_getTokenBalances", params.clone()).await
            }
        }
    }

    /// Run a plan's calls for one address, in plan order. The returned map
    /// is keyed by purpose; a key present with `None` means the call was
    /// attempted and failed, which callers must distinguish from a key that
    /// was never attempted.
    pub async fn execute_plan_for_address(
        &self,
        plan: &QueryPlan,
        address: &str,
    ) -> HashMap<String, Option<Value>> {
        let mut results = HashMap::new();
        for call in &plan.api_calls {
            let params = bind_address(call, address);
            let result = self
                .execute(&call.method, &params, &plan.extracted_data)
                .await;
            results.insert(call.purpose.clone(), result);
        }
        results
    }
}

/// Rebind a planned call's parameters to a concrete wallet address, so a
/// multi-address plan can be re-run per address. Contract-addressed methods
/// keep their parameters untouched.
fn bind_address(call: &PlannedCall, address: &str) -> Value {
    match AllowedMethod::parse(&call.method) {
        Some(AllowedMethod::GetBalance) | Some(AllowedMethod::GetTransactionCount) => {
            json!([address, "latest"])
        }
        Some(AllowedMethod::GetTokenBalances) => json!([address]),
        Some(AllowedMethod::GetNftsForOwner) => {
            let mut options = options_object(&call.params);
            options.insert("owner".to_string(), json!(address));
            Value::Object(options)
        }
        Some(AllowedMethod::GetAssetTransfers) => rebind_transfer_filters(&call.params, address),
        _ => call.params.clone(),
    }
}

/// Accepts `"0x.."`, `["0x.."]`, `{owner: ..}`, or `[{owner: ..}]`.
fn owner_from_params(params: &Value) -> Option<String> {
    match params {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => match items.first()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("owner").and_then(Value::as_str).map(str::to_string),
            _ => None,
        },
        Value::Object(map) => map.get("owner").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn page_size_from_params(params: &Value) -> Option<u64> {
    let object = match params {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }?;
    object.get("pageSize").and_then(Value::as_u64)
}

fn first_string_param(params: &Value) -> Option<String> {
    match params {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
        Value::Object(map) => map
            .get("contractAddress")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn contract_and_token_id(params: &Value) -> Option<(String, String)> {
    let object = match params {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }?;
    let contract = object.get("contractAddress").and_then(Value::as_str)?;
    let token_id = object.get("tokenId").and_then(Value::as_str)?;
    Some((contract.to_string(), token_id.to_string()))
}

fn options_object(params: &Value) -> Map<String, Value> {
    match params {
        Value::Object(map) => map.clone(),
        Value::Array(items) => items
            .iter()
            .find_map(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        _ => Map::new(),
    }
}

/// Asset-transfer filters carry wallet addresses under fromAddress and
/// toAddress; only those are rewritten.
fn rebind_transfer_filters(params: &Value, address: &str) -> Value {
    let mut object = options_object(params);
    for key in ["fromAddress", "toAddress"] {
        if object.contains_key(key) {
            object.insert(key.to_string(), json!(address));
        }
    }
    if object.is_empty() {
        object.insert("fromAddress".to_string(), json!(address));
        object.insert("category".to_string(), json!(["external", "erc20"]));
    }
    json!([Value::Object(object)])
}
