//! Allowlist of safe, read-only provider methods.
//!
//! Format: `{namespace}.{method}` (e.g. `core.getBalance`). Plans are
//! produced by an untrusted model, so every call is checked against this
//! enum before any network attempt. The enum is the single source of truth
//! for which methods exist; there is no dynamic registration.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllowedMethod {
    GetBalance,
    GetTransactionCount,
    GetTokenBalances,
    GetTokenMetadata,
    GetAssetTransfers,
    GetLogs,
    GetNftsForOwner,
    GetOwnersForContract,
    GetOwnersForNft,
}

impl AllowedMethod {
    pub const ALL: [AllowedMethod; 9] = [
        AllowedMethod::GetBalance,
        AllowedMethod::GetTransactionCount,
        AllowedMethod::GetTokenBalances,
        AllowedMethod::GetTokenMetadata,
        AllowedMethod::GetAssetTransfers,
        AllowedMethod::GetLogs,
        AllowedMethod::GetNftsForOwner,
        AllowedMethod::GetOwnersForContract,
        AllowedMethod::GetOwnersForNft,
    ];

    pub fn parse(path: &str) -> Option<Self> {
        match path {
            "core.getBalance" => Some(AllowedMethod::GetBalance),
            "core.getTransactionCount" => Some(AllowedMethod::GetTransactionCount),
            "core.getTokenBalances" => Some(AllowedMethod::GetTokenBalances),
            "core.getTokenMetadata" => Some(AllowedMethod::GetTokenMetadata),
            "core.getAssetTransfers" => Some(AllowedMethod::GetAssetTransfers),
            "core.getLogs" => Some(AllowedMethod::GetLogs),
            "nft.getNftsForOwner" => Some(AllowedMethod::GetNftsForOwner),
            "nft.getOwnersForContract" => Some(AllowedMethod::GetOwnersForContract),
            "nft.getOwnersForNft" => Some(AllowedMethod::GetOwnersForNft),
            _ => None,
        }
    }

    pub fn as_path(&self) -> &'static str {
        match self {
            AllowedMethod::GetBalance => "core.getBalance",
            AllowedMethod::GetTransactionCount => "core.getTransactionCount",
            AllowedMethod::GetTokenBalances => "core.getTokenBalances",
            AllowedMethod::GetTokenMetadata => "core.getTokenMetadata",
            AllowedMethod::GetAssetTransfers => "core.getAssetTransfers",
            AllowedMethod::GetLogs => "core.getLogs",
            AllowedMethod::GetNftsForOwner => "nft.getNftsForOwner",
            AllowedMethod::GetOwnersForContract => "nft.getOwnersForContract",
            AllowedMethod::GetOwnersForNft => "nft.getOwnersForNft",
        }
    }

    /// Wire-level JSON-RPC method name for `core` namespace variants.
    pub fn rpc_method(&self) -> Option<&'static str> {
        match self {
            AllowedMethod::GetBalance => Some("eth_getBalance"),
            AllowedMethod::GetTransactionCount => Some("eth_getTransactionCount"),
            AllowedMethod::GetTokenBalances => Some("alchemy_getTokenBalances"),
            AllowedMethod::GetTokenMetadata => Some("alchemy_getTokenMetadata"),
            AllowedMethod::GetAssetTransfers => Some("alchemy_getAssetTransfers"),
            AllowedMethod::GetLogs => Some("eth_getLogs"),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AllowedMethod::GetBalance => "Get ETH balance for address",
            AllowedMethod::GetTransactionCount => "Get transaction count for address",
            AllowedMethod::GetTokenBalances => "Get all ERC-20 token balances for address",
            AllowedMethod::GetTokenMetadata => {
                "Get token name/symbol/decimals by contract address (use for token price queries - price fetched separately)"
            }
            AllowedMethod::GetAssetTransfers => {
                "Get transfer history (ERC-20, ERC-721, ERC-1155) with filters (fromAddress, toAddress, contractAddresses, category, fromBlock, toBlock)"
            }
            AllowedMethod::GetLogs => "Get contract event logs",
            AllowedMethod::GetNftsForOwner => {
                "Get NFTs owned by address (use when query mentions NFTs/collections)"
            }
            AllowedMethod::GetOwnersForContract => {
                "Get all owners of an NFT collection (use for 'how many holders' or 'top holders' queries)"
            }
            AllowedMethod::GetOwnersForNft => "Get owners of a specific NFT token ID",
        }
    }
}

impl fmt::Display for AllowedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

pub fn is_method_allowed(path: &str) -> bool {
    AllowedMethod::parse(path).is_some()
}

/// Method list embedded into the planner prompt.
pub fn formatted_method_list() -> String {
    AllowedMethod::ALL
        .iter()
        .map(|method| format!("- {} -> {}", method.as_path(), method.describe()))
        .collect::<Vec<_>>()
        .join("\n")
}
