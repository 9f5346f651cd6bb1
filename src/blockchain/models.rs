// src/blockchain/models.rs

//! Normalized shapes for the heterogeneous provider responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a token-balances response, post-normalization. The balance
/// stays a hex string here; parsing happens in the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceEntry {
    pub contract_address: String,
    pub token_balance: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u32>,
    pub logo: Option<String>,
}

/// Owned NFT trimmed to the fields the aggregator needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedNft {
    pub contract_address: String,
    pub name: Option<String>,
    pub token_id: Option<String>,
}

/// Normalize a token-balances response from either transport. Entries with
/// a provider-reported per-token error or a missing balance are dropped.
pub fn normalize_token_balances(raw: &Value) -> Vec<TokenBalanceEntry> {
    raw.get("tokenBalances")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    if entry.get("error").map_or(false, |e| !e.is_null()) {
                        return None;
                    }
                    let contract_address = entry.get("contractAddress")?.as_str()?.to_string();
                    let token_balance = entry.get("tokenBalance")?.as_str()?.to_string();
                    Some(TokenBalanceEntry {
                        contract_address,
                        token_balance,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extract owned NFTs from a getNFTsForOwner response. Tolerates both the
/// v2 (`id.tokenId`) and v3 (`tokenId`) response shapes.
pub fn parse_owned_nfts(raw: &Value) -> Vec<OwnedNft> {
    raw.get("ownedNfts")
        .and_then(Value::as_array)
        .map(|nfts| {
            nfts.iter()
                .filter_map(|nft| {
                    let contract_address =
                        nft.pointer("/contract/address")?.as_str()?.to_string();
                    let name = nft
                        .get("name")
                        .and_then(Value::as_str)
                        .or_else(|| nft.pointer("/contract/name").and_then(Value::as_str))
                        .map(str::to_string);
                    let token_id = nft
                        .get("tokenId")
                        .and_then(Value::as_str)
                        .or_else(|| nft.pointer("/id/tokenId").and_then(Value::as_str))
                        .map(str::to_string);
                    Some(OwnedNft {
                        contract_address,
                        name,
                        token_id,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
