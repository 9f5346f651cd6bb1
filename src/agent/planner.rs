// src/agent/planner.rs

//! Query planning: a model-driven primary path and a deterministic
//! fallback.
//!
//! The fallback is total. The primary path depends on a third-party service
//! with no uptime guarantee, so planning as a whole must always terminate
//! with a usable plan.

use crate::agent::completion::CompletionClient;
use crate::agent::schema::{ExtractedData, Intent, PlannedCall, QueryPlan};
use crate::blockchain::allowlist;
use crate::resolver::Resolver;
use crate::utils::{validate_address, ADDRESS_RE};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

lazy_static! {
    /// `$SYM` style token tickers.
    static ref TICKER_RE: Regex = Regex::new(r"\$([A-Za-z]{2,10})\b").unwrap();
}

const PLANNER_SYSTEM_PROMPT: &str = "You are The Hunter, an expert blockchain analyst. \
You translate questions about Ethereum mainnet into a JSON query plan. \
Respond with a single JSON object and nothing else.";

pub struct QueryPlanner {
    completion: CompletionClient,
    resolver: Arc<Resolver>,
}

impl QueryPlanner {
    pub fn new(completion: CompletionClient, resolver: Arc<Resolver>) -> Self {
        Self {
            completion,
            resolver,
        }
    }

    /// Always produces a plan. A low-confidence plan is a valid outcome;
    /// only primary-path failures trigger the fallback.
    pub async fn plan(&self, query: &str) -> QueryPlan {
        let local = self.extract_entities(query).await;
        match self.plan_with_model(query, &local).await {
            Ok(mut plan) => {
                plan.extracted_data = merge_extracted(&local, &plan.extracted_data);
                plan.enforce_threshold();
                plan
            }
            Err(e) => {
                warn!("planning degraded to fallback: {:#}", e);
                fallback_plan(query, &local)
            }
        }
    }

    async fn plan_with_model(
        &self,
        query: &str,
        local: &ExtractedData,
    ) -> anyhow::Result<QueryPlan> {
        let prompt = build_prompt(query, local);
        let raw = self
            .completion
            .complete_json(PLANNER_SYSTEM_PROMPT, &prompt)
            .await?;
        let mut plan: QueryPlan = serde_json::from_value(raw)?;
        plan.validate()?;
        plan.extracted_data
            .addresses
            .retain(|address| validate_address(address));
        Ok(plan)
    }

    /// Local extraction runs regardless of what the model returns; the
    /// model may under- or over-extract, so these entities are
    /// authoritative.
    async fn extract_entities(&self, query: &str) -> ExtractedData {
        let mut data = ExtractedData::default();
        for candidate in ADDRESS_RE.find_iter(query) {
            let address = candidate.as_str().to_string();
            if validate_address(&address) && !contains_ci(&data.addresses, &address) {
                data.addresses.push(address);
            }
        }
        for capture in TICKER_RE.captures_iter(query) {
            let symbol = capture[1].to_uppercase();
            if !data.tokens.contains(&symbol) {
                data.tokens.push(symbol);
            }
        }
        for symbol in self.resolver.detect_symbols(query) {
            if !data.tokens.contains(&symbol) {
                data.tokens.push(symbol);
            }
        }
        let resolved = self.resolver.resolve_tokens(&data.tokens).await;
        let mut contracts: Vec<&crate::resolver::TokenInfo> = resolved.values().collect();
        contracts.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        for info in contracts {
            if !contains_ci(&data.contract_addresses, &info.address) {
                data.contract_addresses.push(info.address.clone());
            }
        }
        for collection in self.resolver.detect_collections(query) {
            if !contains_ci(&data.collection_addresses, &collection.address) {
                data.collections.push(collection.name.clone());
                data.collection_addresses.push(collection.address.clone());
            }
        }
        data
    }
}

fn build_prompt(query: &str, local: &ExtractedData) -> String {
    format!(
        r#"Analyze this query: "{query}"

Allowed provider methods:
{methods}

Purpose keys the execution layer understands: balance, transactionCount, tokenBalances, tokenMetadata, transfers, nfts, logs.

Planning rules:
- address_analysis (query contains a wallet address): plan core.getBalance, core.getTransactionCount, core.getTokenBalances, in that order; add nft.getNftsForOwner when the query mentions NFTs or a collection.
- token_analysis (query names a token by symbol): plan core.getTokenMetadata for the resolved contract; price data is fetched separately.
- Order calls cheapest first. Use params [address, "latest"] for balance and transaction count, [address] for token balances.
- Set intent to unknown with confidence 0 when the query fits nothing above.

Entities already extracted locally (authoritative):
{entities}

Respond with one JSON object shaped like:
{{"intent": "address_analysis|token_analysis|unknown", "confidence": 0.0, "extractedData": {{"addresses": [], "tokens": [], "contractAddresses": [], "collections": [], "collectionAddresses": [], "amounts": [], "timeframes": []}}, "apiCalls": [{{"method": "core.getBalance", "params": [], "purpose": "balance"}}], "reasoning": ""}}"#,
        query = query,
        methods = allowlist::formatted_method_list(),
        entities = serde_json::to_string(local).unwrap_or_else(|_| "{}".to_string()),
    )
}

/// Union of local and model extraction, local entries first.
fn merge_extracted(local: &ExtractedData, model: &ExtractedData) -> ExtractedData {
    let mut merged = local.clone();
    for address in &model.addresses {
        if !contains_ci(&merged.addresses, address) {
            merged.addresses.push(address.clone());
        }
    }
    for token in &model.tokens {
        let upper = token.to_uppercase();
        if !merged.tokens.contains(&upper) {
            merged.tokens.push(upper);
        }
    }
    for contract in &model.contract_addresses {
        if !contains_ci(&merged.contract_addresses, contract) {
            merged.contract_addresses.push(contract.clone());
        }
    }
    for amount in &model.amounts {
        if !merged.amounts.contains(amount) {
            merged.amounts.push(amount.clone());
        }
    }
    for timeframe in &model.timeframes {
        if !merged.timeframes.contains(timeframe) {
            merged.timeframes.push(timeframe.clone());
        }
    }
    // collections come from the static table; the model's guesses are not
    // trusted with contract addresses
    merged
}

fn contains_ci(list: &[String], candidate: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(candidate))
}

/// Deterministic planner used when the model path is unavailable.
pub fn fallback_plan(query: &str, local: &ExtractedData) -> QueryPlan {
    let address = local.addresses.first().cloned().or_else(|| {
        ADDRESS_RE
            .find(query)
            .map(|m| m.as_str().to_string())
            .filter(|address| validate_address(address))
    });
    if let Some(address) = address {
        let mut extracted = local.clone();
        if !contains_ci(&extracted.addresses, &address) {
            extracted.addresses.insert(0, address.clone());
        }
        return QueryPlan {
            intent: Intent::AddressAnalysis,
            confidence: 0.7,
            extracted_data: extracted,
            api_calls: vec![
                PlannedCall {
                    method: "core.getBalance".to_string(),
                    params: json!([address, "latest"]),
                    purpose: "balance".to_string(),
                },
                PlannedCall {
                    method: "core.getTransactionCount".to_string(),
                    params: json!([address, "latest"]),
                    purpose: "transactionCount".to_string(),
                },
                PlannedCall {
                    method: "core.getTokenBalances".to_string(),
                    params: json!([address]),
                    purpose: "tokenBalances".to_string(),
                },
            ],
            reasoning: "Fallback address detection".to_string(),
        };
    }

    let token = local
        .tokens
        .first()
        .cloned()
        .or_else(|| TICKER_RE.captures(query).map(|c| c[1].to_uppercase()));
    if let Some(token) = token {
        let mut extracted = local.clone();
        if !extracted.tokens.contains(&token) {
            extracted.tokens.insert(0, token);
        }
        return QueryPlan {
            intent: Intent::TokenAnalysis,
            confidence: 0.6,
            extracted_data: extracted,
            api_calls: vec![],
            reasoning: "Fallback token detection".to_string(),
        };
    }

    QueryPlan {
        intent: Intent::Unknown,
        confidence: 0.0,
        extracted_data: local.clone(),
        api_calls: vec![],
        reasoning: "No fallback pattern matched".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";

    #[test]
    fn fallback_address_plan_has_three_calls() {
        let query = format!("what does {} hold?", ADDRESS);
        let plan = fallback_plan(&query, &ExtractedData::default());
        assert_eq!(plan.intent, Intent::AddressAnalysis);
        assert_eq!(plan.confidence, 0.7);
        assert_eq!(plan.api_calls.len(), 3);
        assert_eq!(plan.api_calls[0].purpose, "balance");
        assert_eq!(plan.api_calls[1].purpose, "transactionCount");
        assert_eq!(plan.api_calls[2].purpose, "tokenBalances");
        for call in &plan.api_calls {
            assert!(call.params.to_string().contains(ADDRESS));
        }
        assert_eq!(plan.extracted_data.addresses, vec![ADDRESS.to_string()]);
    }

    #[test]
    fn fallback_token_plan_is_empty_calls() {
        let plan = fallback_plan("what is $FLOKI doing", &ExtractedData::default());
        assert_eq!(plan.intent, Intent::TokenAnalysis);
        assert_eq!(plan.confidence, 0.6);
        assert!(plan.api_calls.is_empty());
        assert_eq!(plan.extracted_data.tokens, vec!["FLOKI".to_string()]);
    }

    #[test]
    fn fallback_on_noise_is_unknown_with_zero_confidence() {
        let plan = fallback_plan("???", &ExtractedData::default());
        assert_eq!(plan.intent, Intent::Unknown);
        assert_eq!(plan.confidence, 0.0);
        assert!(plan.api_calls.is_empty());
    }

    #[test]
    fn fallback_prefers_locally_extracted_entities() {
        let local = ExtractedData {
            tokens: vec!["PEPE".to_string()],
            ..Default::default()
        };
        let plan = fallback_plan("price of pepe", &local);
        assert_eq!(plan.intent, Intent::TokenAnalysis);
        assert_eq!(plan.extracted_data.tokens, vec!["PEPE".to_string()]);
    }

    #[test]
    fn merge_keeps_local_entries_first_and_dedupes() {
        let local = ExtractedData {
            addresses: vec![ADDRESS.to_string()],
            tokens: vec!["PEPE".to_string()],
            ..Default::default()
        };
        let model = ExtractedData {
            addresses: vec![ADDRESS.to_lowercase(), "0x0000000000000000000000000000000000000001".to_string()],
            tokens: vec!["pepe".to_string(), "USDC".to_string()],
            ..Default::default()
        };
        let merged = merge_extracted(&local, &model);
        assert_eq!(merged.addresses.len(), 2);
        assert_eq!(merged.addresses[0], ADDRESS);
        assert_eq!(merged.tokens, vec!["PEPE".to_string(), "USDC".to_string()]);
    }
}
