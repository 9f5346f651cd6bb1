// src/resolver/mod.rs

//! Symbol and collection resolution with a layered fallback.
//!
//! Token fallback order, first match wins:
//! 1. Static config table (no network)
//! 2. In-memory cache (24h TTL, lazy expiry)
//! 3. CoinGecko search (result cached)
//!
//! Collections resolve from the static table only. A miss anywhere means
//! "skip enrichment", never a hard error.

pub mod cache;
pub mod coingecko;

use anyhow::{Context, Result};
use cache::SymbolCache;
use coingecko::CoinGeckoClient;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Deserialize)]
struct TokenConfigFile {
    tokens: HashMap<String, TokenConfigEntry>,
}

#[derive(Deserialize)]
struct TokenConfigEntry {
    symbol: String,
    name: String,
    address: String,
    decimals: u32,
}

#[derive(Deserialize)]
struct CollectionConfigFile {
    collections: HashMap<String, CollectionConfigEntry>,
}

#[derive(Deserialize)]
struct CollectionConfigEntry {
    name: String,
    address: String,
    symbol: Option<String>,
}

pub struct Resolver {
    tokens: HashMap<String, TokenInfo>,
    collections: Vec<(String, CollectionInfo)>,
    cache: SymbolCache,
    gecko: CoinGeckoClient,
}

impl Resolver {
    pub fn new(gecko: CoinGeckoClient) -> Result<Self> {
        let token_file: TokenConfigFile =
            serde_json::from_str(include_str!("../../config/tokens.json"))
                .context("invalid tokens.json")?;
        let tokens = token_file
            .tokens
            .into_iter()
            .map(|(key, entry)| {
                (
                    key.to_uppercase(),
                    TokenInfo {
                        symbol: entry.symbol,
                        name: entry.name,
                        address: entry.address,
                        decimals: Some(entry.decimals),
                    },
                )
            })
            .collect();

        let collection_file: CollectionConfigFile =
            serde_json::from_str(include_str!("../../config/nft-collections.json"))
                .context("invalid nft-collections.json")?;
        let mut collections: Vec<(String, CollectionInfo)> = collection_file
            .collections
            .into_iter()
            .map(|(key, entry)| {
                (
                    key,
                    CollectionInfo {
                        name: entry.name,
                        address: entry.address,
                        symbol: entry.symbol,
                    },
                )
            })
            .collect();
        collections.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            tokens,
            collections,
            cache: SymbolCache::new(CACHE_TTL),
            gecko,
        })
    }

    /// Resolve a token symbol to its contract. Static table, then cache,
    /// then the external lookup; external hits are cached for the TTL.
    pub async fn resolve_token(&self, symbol: &str) -> Option<TokenInfo> {
        let normalized = symbol.trim().to_uppercase();
        if normalized.is_empty() {
            return None;
        }
        if let Some(known) = self.tokens.get(&normalized) {
            return Some(known.clone());
        }
        if let Some(cached) = self.cache.get(&normalized, Instant::now()) {
            return Some(cached);
        }
        match self.gecko.search_token(&normalized).await {
            Ok(Some(found)) => match found.contract_address {
                Some(address) => {
                    let info = TokenInfo {
                        symbol: found.symbol,
                        name: found.name,
                        address,
                        decimals: None,
                    };
                    self.cache.insert(&normalized, info.clone(), Instant::now());
                    Some(info)
                }
                None => None,
            },
            Ok(None) => None,
            Err(e) => {
                warn!("CoinGecko lookup failed for {}: {:#}", normalized, e);
                None
            }
        }
    }

    /// Concurrent fan-out; symbols that fail to resolve are omitted.
    pub async fn resolve_tokens(&self, symbols: &[String]) -> HashMap<String, TokenInfo> {
        let lookups = symbols.iter().map(|symbol| async move {
            (symbol.trim().to_uppercase(), self.resolve_token(symbol).await)
        });
        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(symbol, info)| info.map(|info| (symbol, info)))
            .collect()
    }

    /// Static table only: exact key match first, then case-insensitive
    /// match against key, display name, or symbol.
    pub fn resolve_collection(&self, name: &str) -> Option<CollectionInfo> {
        let trimmed = name.trim();
        for (key, info) in &self.collections {
            if key == trimmed {
                return Some(info.clone());
            }
        }
        let lower = trimmed.to_lowercase();
        for (key, info) in &self.collections {
            let matched = key.to_lowercase() == lower
                || info.name.to_lowercase() == lower
                || info
                    .symbol
                    .as_deref()
                    .map_or(false, |s| s.to_lowercase() == lower);
            if matched {
                return Some(info.clone());
            }
        }
        None
    }

    /// Known symbols appearing as standalone words in the query.
    pub fn detect_symbols(&self, query: &str) -> Vec<String> {
        let mut found = Vec::new();
        for word in query.split(|c: char| !c.is_ascii_alphanumeric()) {
            let upper = word.to_uppercase();
            if self.tokens.contains_key(&upper) && !found.contains(&upper) {
                found.push(upper);
            }
        }
        found
    }

    /// Known collections mentioned anywhere in the query, by key, display
    /// name, or symbol.
    pub fn detect_collections(&self, query: &str) -> Vec<CollectionInfo> {
        let lower = query.to_lowercase();
        let mut found: Vec<CollectionInfo> = Vec::new();
        for (key, info) in &self.collections {
            let hit = lower.contains(&key.to_lowercase())
                || lower.contains(&info.name.to_lowercase())
                || info
                    .symbol
                    .as_deref()
                    .map_or(false, |s| lower.contains(&s.to_lowercase()));
            if hit
                && !found
                    .iter()
                    .any(|c| c.address.eq_ignore_ascii_case(&info.address))
            {
                found.push(info.clone());
            }
        }
        found
    }

    pub fn gecko(&self) -> &CoinGeckoClient {
        &self.gecko
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};

    fn resolver(prefix: &str) -> Resolver {
        let gecko = CoinGeckoClient::new(
            reqwest::Client::new(),
            format!("{}{}", mockito::server_url(), prefix),
            "test-key".to_string(),
        );
        Resolver::new(gecko).unwrap()
    }

    #[tokio::test]
    async fn static_table_wins_without_network() {
        // no mocks registered: a network attempt would resolve to None
        let resolver = resolver("/resolver-static");
        let info = resolver.resolve_token("usdc").await.unwrap();
        assert_eq!(info.symbol, "USDC");
        assert_eq!(info.decimals, Some(6));
        assert!(info.address.starts_with("0xA0b8"));
    }

    #[tokio::test]
    async fn external_lookup_is_cached_within_ttl() {
        let search = mock(
            "GET",
            Matcher::Regex(r"^/resolver-ext/search.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"coins":[{"id":"floki","symbol":"FLOKI","name":"FLOKI"}]}"#)
        .expect(1)
        .create();
        let details = mock(
            "GET",
            Matcher::Regex(r"^/resolver-ext/coins/floki.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"floki","symbol":"floki","name":"FLOKI","platforms":{"ethereum":"0xcf0C122c6b73ff809C693DB761e7BaeBe62b6a2E"},"market_data":{"current_price":{"usd":0.0001}}}"#,
        )
        .expect(1)
        .create();

        let resolver = resolver("/resolver-ext");
        let first = resolver.resolve_token("FLOKI").await.unwrap();
        let second = resolver.resolve_token("floki").await.unwrap();
        assert_eq!(first.address, second.address);

        // one search and one details call in total: the second resolution
        // came from the cache
        search.assert();
        details.assert();
    }

    #[tokio::test]
    async fn unresolvable_symbol_is_a_miss_not_an_error() {
        let m = mock(
            "GET",
            Matcher::Regex(r"^/resolver-miss/search.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"coins":[]}"#)
        .create();

        let resolver = resolver("/resolver-miss");
        assert!(resolver.resolve_token("NOPE").await.is_none());
        drop(m);
    }

    #[test]
    fn collection_matches_key_name_and_symbol() {
        let resolver = resolver("/resolver-coll");
        let by_key = resolver.resolve_collection("BAYC").unwrap();
        let by_name = resolver.resolve_collection("bored ape yacht club").unwrap();
        let by_symbol = resolver.resolve_collection("bayc").unwrap();
        assert_eq!(by_key.address, by_name.address);
        assert_eq!(by_key.address, by_symbol.address);
        assert!(resolver.resolve_collection("Unknown Apes").is_none());
    }

    #[test]
    fn detects_symbols_and_collections_in_text() {
        let resolver = resolver("/resolver-detect");
        assert_eq!(
            resolver.detect_symbols("what is the price of pepe today"),
            vec!["PEPE".to_string()]
        );
        let collections =
            resolver.detect_collections("does vitalik own any Bored Ape Yacht Club?");
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].name, "Bored Ape Yacht Club");
    }
}
