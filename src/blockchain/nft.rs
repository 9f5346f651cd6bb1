// src/blockchain/nft.rs

//! NFT API client (REST) for ownership and holder queries.

use anyhow::{anyhow, Result};
use serde_json::Value;

#[derive(Clone)]
pub struct NftClient {
    http: reqwest::Client,
    base_url: String,
}

impl NftClient {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        let response = self.http.get(&url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "NFT API returned HTTP {} for {}",
                response.status(),
                endpoint
            ));
        }
        Ok(response.json().await?)
    }

    /// Owned NFTs for an address. When the query targets specific
    /// collections the filter is applied server-side, so pagination cannot
    /// hide matches.
    pub async fn nfts_for_owner(
        &self,
        owner: &str,
        page_size: Option<u64>,
        contract_filter: &[String],
    ) -> Result<Value> {
        let mut query = vec![
            ("owner".to_string(), owner.to_string()),
            ("withMetadata".to_string(), "true".to_string()),
            (
                "pageSize".to_string(),
                page_size.unwrap_or(100).to_string(),
            ),
        ];
        for contract in contract_filter {
            query.push(("contractAddresses[]".to_string(), contract.clone()));
        }
        self.get("getNFTsForOwner", &query).await
    }

    pub async fn owners_for_contract(&self, contract: &str) -> Result<Value> {
        self.get(
            "getOwnersForContract",
            &[("contractAddress".to_string(), contract.to_string())],
        )
        .await
    }

    pub async fn owners_for_nft(&self, contract: &str, token_id: &str) -> Result<Value> {
        self.get(
            "getOwnersForNFT",
            &[
                ("contractAddress".to_string(), contract.to_string()),
                ("tokenId".to_string(), token_id.to_string()),
            ],
        )
        .await
    }
}
