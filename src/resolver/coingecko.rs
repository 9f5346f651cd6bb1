// src/resolver/coingecko.rs

//! CoinGecko REST client for token lookup and spot prices.
//!
//! A 404 or an empty body is a valid "not listed" outcome, never an error.

use anyhow::{bail, Result};
use serde_json::Value;

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Search hit enriched with the Ethereum contract address.
#[derive(Debug, Clone)]
pub struct GeckoToken {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub contract_address: Option<String>,
    pub current_price: Option<f64>,
}

impl CoinGeckoClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    async fn get(&self, path_and_query: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path_and_query);
        let response = self
            .http
            .get(&url)
            .header("Content-Type", "application/json")
            .header("x-cg-demo-api-key", &self.api_key)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("CoinGecko returned HTTP {}", response.status());
        }
        Ok(Some(response.json().await?))
    }

    /// Search by symbol, then fetch coin details to obtain the Ethereum
    /// contract address. Only exact (case-insensitive) symbol matches count.
    pub async fn search_token(&self, query: &str) -> Result<Option<GeckoToken>> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let body = match self.get(&format!("/search?query={}", encoded)).await? {
            Some(body) => body,
            None => return Ok(None),
        };
        let coins = body.get("coins").and_then(Value::as_array).cloned().unwrap_or_default();
        let wanted = query.to_lowercase();
        let hit = coins.iter().find(|coin| {
            coin.get("symbol")
                .and_then(Value::as_str)
                .map_or(false, |s| s.to_lowercase() == wanted)
        });
        let hit = match hit {
            Some(hit) => hit,
            None => return Ok(None),
        };
        let id = hit.get("id").and_then(Value::as_str).unwrap_or_default();
        if id.is_empty() {
            return Ok(None);
        }

        let details = match self.coin_details(id).await? {
            Some(details) => details,
            None => return Ok(None),
        };
        Ok(Some(GeckoToken {
            id: id.to_string(),
            symbol: hit
                .get("symbol")
                .and_then(Value::as_str)
                .unwrap_or(query)
                .to_uppercase(),
            name: hit
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(query)
                .to_string(),
            contract_address: details
                .pointer("/platforms/ethereum")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            current_price: details
                .pointer("/market_data/current_price/usd")
                .and_then(Value::as_f64),
        }))
    }

    async fn coin_details(&self, coin_id: &str) -> Result<Option<Value>> {
        self.get(&format!(
            "/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false&sparkline=false",
            coin_id
        ))
        .await
    }

    /// USD spot price by ERC-20 contract address.
    pub async fn token_price_by_address(&self, contract_address: &str) -> Result<Option<f64>> {
        let body = match self
            .get(&format!(
                "/simple/token_price/ethereum?contract_addresses={}&vs_currencies=usd",
                contract_address
            ))
            .await?
        {
            Some(body) => body,
            None => return Ok(None),
        };
        Ok(body
            .get(contract_address.to_lowercase().as_str())
            .and_then(|entry| entry.get("usd"))
            .and_then(Value::as_f64))
    }

    /// ETH spot price in USD.
    pub async fn eth_price(&self) -> Result<Option<f64>> {
        let body = match self.get("/simple/price?ids=ethereum&vs_currencies=usd").await? {
            Some(body) => body,
            None => return Ok(None),
        };
        Ok(body.pointer("/ethereum/usd").and_then(Value::as_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};

    fn client(prefix: &str) -> CoinGeckoClient {
        CoinGeckoClient::new(
            reqwest::Client::new(),
            format!("{}{}", mockito::server_url(), prefix),
            "test-key".to_string(),
        )
    }

    #[tokio::test]
    async fn not_found_is_a_valid_miss() {
        let m = mock(
            "GET",
            Matcher::Regex(r"^/gecko-404/simple/token_price/ethereum.*".to_string()),
        )
        .with_status(404)
        .expect(1)
        .create();

        let price = client("/gecko-404")
            .token_price_by_address("0x6982508145454Ce325dDbE47a25d4ec3d2311933")
            .await
            .unwrap();
        assert!(price.is_none());
        m.assert();
    }

    #[tokio::test]
    async fn search_requires_exact_symbol_match() {
        let m = mock(
            "GET",
            Matcher::Regex(r"^/gecko-search/search.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"coins":[{"id":"not-floki","symbol":"FLOKI2","name":"Not Floki"}]}"#,
        )
        .expect(1)
        .create();

        let hit = client("/gecko-search").search_token("FLOKI").await.unwrap();
        assert!(hit.is_none());
        m.assert();
    }

    #[tokio::test]
    async fn price_lookup_reads_lowercased_contract_key() {
        let m = mock(
            "GET",
            Matcher::Regex(r"^/gecko-price/simple/token_price/ethereum.*".to_string()),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"0x6982508145454ce325ddbe47a25d4ec3d2311933":{"usd":0.0000012}}"#)
        .expect(1)
        .create();

        let price = client("/gecko-price")
            .token_price_by_address("0x6982508145454Ce325dDbE47a25d4ec3d2311933")
            .await
            .unwrap();
        assert_eq!(price, Some(0.0000012));
        m.assert();
    }
}
