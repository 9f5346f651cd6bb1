// src/aggregate.rs

//! Merges raw per-call results into per-entity answers.
//!
//! All hex quantities go through `U256`; floats only appear at display
//! time. The raw result map is keyed by purpose, and a key that is present
//! with `None` means the fetch was attempted and failed - the matching
//! output field then stays absent rather than rendering as zero.

use crate::agent::schema::ExtractedData;
use crate::blockchain::executor::ApiExecutor;
use crate::blockchain::models::{
    normalize_token_balances, parse_owned_nfts, OwnedNft, TokenBalanceEntry, TokenMetadata,
};
use crate::utils::short_address;
use ethers_core::types::U256;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Metadata enrichment is bounded to the first N significant tokens.
const MAX_ENRICHED_TOKENS: usize = 10;
/// A token must exceed this decimal-adjusted value to be worth showing.
const MEANINGFUL_THRESHOLD: f64 = 0.0001;
/// U256 can hold 10^77 at most; metadata decimals are untrusted input.
const MAX_DECIMALS: u32 = 77;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub symbol: String,
    pub name: String,
    pub balance: String,
    pub contract_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub contract_address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedCollection {
    pub name: String,
    pub address: String,
    pub found: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAddressResult {
    pub address: String,
    pub short_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_holdings: Option<Vec<TokenHolding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfts: Option<Vec<NftItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_collection: Option<RequestedCollection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_count: Option<usize>,
    pub tags: Vec<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAnalysisResult {
    pub symbol: String,
    pub name: String,
    pub contract_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
}

#[derive(Debug, Clone)]
pub enum QueryResults {
    Addresses(Vec<AggregatedAddressResult>),
    Tokens(Vec<TokenAnalysisResult>),
    Empty,
}

impl QueryResults {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryResults::Addresses(list) => list.is_empty(),
            QueryResults::Tokens(list) => list.is_empty(),
            QueryResults::Empty => true,
        }
    }

    pub fn to_json(&self) -> Vec<Value> {
        match self {
            QueryResults::Addresses(list) => list
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
            QueryResults::Tokens(list) => list
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
            QueryResults::Empty => vec![],
        }
    }
}

/// Parse a 0x-prefixed hex quantity. A bare "0x" parses as zero.
pub fn parse_hex_u256(raw: &str) -> Option<U256> {
    let trimmed = raw.trim().trim_start_matches("0x");
    if trimmed.is_empty() {
        return Some(U256::zero());
    }
    U256::from_str_radix(trimmed, 16).ok()
}

/// Exact wei -> ETH rendering with 4 fractional digits. Integer arithmetic
/// throughout; a fetched zero balance renders as "0.0000".
pub fn wei_to_eth(wei: U256) -> String {
    let divisor = U256::exp10(18);
    let whole = wei / divisor;
    let frac = (wei % divisor) / U256::exp10(14);
    format!("{}.{:04}", whole, frac.as_u64())
}

/// Decimal-adjusted value, for ordering and display buckets only. The
/// division into floating point happens last.
pub fn token_numeric_value(raw: U256, decimals: u32) -> f64 {
    let decimals = decimals.min(MAX_DECIMALS);
    let divisor = U256::exp10(decimals as usize);
    let whole = raw / divisor;
    let rem = raw % divisor;
    let whole_f: f64 = whole.to_string().parse().unwrap_or(f64::MAX);
    let rem_f: f64 = rem.to_string().parse().unwrap_or(0.0);
    whole_f + rem_f / 10f64.powi(decimals as i32)
}

pub fn format_token_balance(raw: U256, decimals: u32) -> String {
    if raw.is_zero() {
        return "0".to_string();
    }
    let value = token_numeric_value(raw, decimals);
    if value < 0.0001 {
        "<0.0001".to_string()
    } else if value < 1.0 {
        format!("{:.4}", value)
    } else if value < 1000.0 {
        format!("{:.2}", value)
    } else if value < 1_000_000.0 {
        format!("{:.1}K", value / 1000.0)
    } else {
        format!("{:.1}M", value / 1_000_000.0)
    }
}

/// Significant: strictly positive raw balance. Unparseable balances are
/// dropped here.
pub fn significant_tokens(entries: &[TokenBalanceEntry]) -> Vec<(TokenBalanceEntry, U256)> {
    entries
        .iter()
        .filter_map(|entry| {
            let raw = parse_hex_u256(&entry.token_balance)?;
            if raw.is_zero() {
                return None;
            }
            Some((entry.clone(), raw))
        })
        .collect()
}

/// Case-insensitive contract filter. Finding nothing is a valid outcome,
/// recorded on the returned flag.
pub fn filter_nfts(
    owned: Vec<OwnedNft>,
    requested_name: &str,
    requested_address: &str,
) -> (Vec<OwnedNft>, RequestedCollection) {
    let matched: Vec<OwnedNft> = owned
        .into_iter()
        .filter(|nft| nft.contract_address.eq_ignore_ascii_case(requested_address))
        .collect();
    let requested = RequestedCollection {
        name: requested_name.to_string(),
        address: requested_address.to_string(),
        found: !matched.is_empty(),
        count: matched.len(),
    };
    (matched, requested)
}

/// Behavioral tags derived from fetched fields only; nothing is inferred
/// from fields that were never fetched.
pub fn derive_tags(eth_value: Option<f64>, tx_count: Option<u64>, holdings: usize) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(eth) = eth_value {
        if eth > 100.0 {
            tags.push("whale".to_string());
        }
    }
    if let Some(tx) = tx_count {
        if tx > 100 {
            tags.push("active".to_string());
        }
        if tx > 1000 {
            tags.push("heavy-trader".to_string());
        }
    }
    if holdings > 0 {
        tags.push("token-collector".to_string());
    }
    if holdings > 10 {
        tags.push("diversified".to_string());
    }
    tags
}

/// Keep the meaningful holdings, sorted descending by decimal-adjusted
/// value. Sorting is stable; ties keep input order.
fn rank_holdings(enriched: Vec<(TokenBalanceEntry, U256, TokenMetadata)>) -> Vec<TokenHolding> {
    let mut valued: Vec<(TokenBalanceEntry, U256, TokenMetadata, f64)> = enriched
        .into_iter()
        .map(|(entry, raw, metadata)| {
            let decimals = metadata.decimals.unwrap_or(18);
            let value = token_numeric_value(raw, decimals);
            (entry, raw, metadata, value)
        })
        .filter(|(_, _, _, value)| *value > MEANINGFUL_THRESHOLD)
        .collect();
    valued.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));
    valued
        .into_iter()
        .map(|(entry, raw, metadata, _)| {
            let decimals = metadata.decimals.unwrap_or(18);
            TokenHolding {
                symbol: metadata.symbol.unwrap_or_else(|| "???".to_string()),
                name: metadata.name.unwrap_or_else(|| "Unknown Token".to_string()),
                balance: format_token_balance(raw, decimals),
                contract_address: entry.contract_address,
            }
        })
        .collect()
}

/// Fetch metadata for the first significant tokens concurrently; arrival
/// order does not matter because the ranking re-sorts deterministically.
async fn enrich_holdings(
    executor: &ApiExecutor,
    significant: Vec<(TokenBalanceEntry, U256)>,
) -> Vec<TokenHolding> {
    let no_context = ExtractedData::default();
    let lookups = significant
        .into_iter()
        .take(MAX_ENRICHED_TOKENS)
        .map(|(entry, raw)| {
            let no_context = &no_context;
            async move {
                let metadata = executor
                    .execute(
                        "core.getTokenMetadata",
                        &json!([entry.contract_address]),
                        no_context,
                    )
                    .await
                    .and_then(|value| serde_json::from_value::<TokenMetadata>(value).ok())
                    .unwrap_or_default();
                (entry, raw, metadata)
            }
        });
    rank_holdings(join_all(lookups).await)
}

fn to_nft_item(nft: OwnedNft) -> NftItem {
    NftItem {
        name: nft.name,
        token_id: nft.token_id,
        contract_address: nft.contract_address,
    }
}

/// Merge one address's raw per-purpose results into the aggregated answer.
pub async fn build_address_result(
    executor: &ApiExecutor,
    address: &str,
    raw: &HashMap<String, Option<Value>>,
    extracted: &ExtractedData,
    eth_usd: Option<f64>,
) -> AggregatedAddressResult {
    let mut out = AggregatedAddressResult {
        address: address.to_string(),
        short_address: short_address(address),
        balance: None,
        balance_usd: None,
        transactions: None,
        token_holdings: None,
        nfts: None,
        requested_collection: None,
        transfers: None,
        transfer_count: None,
        tags: vec![],
        status: "unknown".to_string(),
    };

    let mut eth_value: Option<f64> = None;
    if let Some(Some(balance_raw)) = raw.get("balance") {
        if let Some(wei) = balance_raw.as_str().and_then(parse_hex_u256) {
            out.balance = Some(format!("{} ETH", wei_to_eth(wei)));
            let numeric = token_numeric_value(wei, 18);
            eth_value = Some(numeric);
            if let Some(price) = eth_usd {
                out.balance_usd = Some((numeric * price * 100.0).round() / 100.0);
            }
        }
    }

    if let Some(Some(tx_raw)) = raw.get("transactionCount") {
        let parsed = tx_raw
            .as_str()
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok());
        if let Some(count) = parsed {
            out.transactions = Some(count);
            out.status = if count > 0 { "active" } else { "inactive" }.to_string();
        }
    }

    if let Some(Some(balances_raw)) = raw.get("tokenBalances") {
        let entries = normalize_token_balances(balances_raw);
        let significant = significant_tokens(&entries);
        out.token_holdings = Some(enrich_holdings(executor, significant).await);
    }

    if let Some(Some(nft_raw)) = raw.get("nfts") {
        let owned = parse_owned_nfts(nft_raw);
        match (
            extracted.collections.first(),
            extracted.collection_addresses.first(),
        ) {
            (Some(name), Some(collection_address)) => {
                let (matched, requested) = filter_nfts(owned, name, collection_address);
                out.nfts = Some(matched.into_iter().map(to_nft_item).collect());
                out.requested_collection = Some(requested);
            }
            _ => {
                out.nfts = Some(owned.into_iter().map(to_nft_item).collect());
            }
        }
    }

    if let Some(Some(transfers_raw)) = raw.get("transfers") {
        let list = transfers_raw
            .get("transfers")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        out.transfer_count = Some(list.len());
        out.transfers = Some(list.into_iter().take(10).collect());
    }

    out.tags = derive_tags(
        eth_value,
        out.transactions,
        out.token_holdings.as_ref().map_or(0, Vec::len),
    );
    out
}
