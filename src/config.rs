// src/config.rs

use anyhow::{Context, Result};
use std::env;

/// All configuration, loaded once at startup from the environment (and an
/// optional .env file). Required keys fail here, not at first use.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // Blockchain provider
    pub alchemy_api_key: String,
    pub rpc_url: String,
    pub nft_api_url: String,

    // Completion service
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub openai_model: String,

    // Price / metadata service
    pub coingecko_api_key: String,
    pub coingecko_api_url: String,

    // External call timeouts
    pub rpc_timeout_secs: u64,
    pub completion_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let alchemy_api_key =
            env::var("ALCHEMY_API_KEY").context("ALCHEMY_API_KEY must be set")?;
        let openai_api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
        let coingecko_api_key =
            env::var("COINGECKO_API_KEY").context("COINGECKO_API_KEY must be set")?;

        let rpc_url = env::var("ALCHEMY_RPC_URL").unwrap_or_else(|_| {
            format!("https://eth-mainnet.g.alchemy.com/v2/{}", alchemy_api_key)
        });
        let nft_api_url = env::var("ALCHEMY_NFT_API_URL").unwrap_or_else(|_| {
            format!("https://eth-mainnet.g.alchemy.com/nft/v3/{}", alchemy_api_key)
        });
        url::Url::parse(&rpc_url).context("ALCHEMY_RPC_URL is not a valid URL")?;
        url::Url::parse(&nft_api_url).context("ALCHEMY_NFT_API_URL is not a valid URL")?;

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            alchemy_api_key,
            rpc_url,
            nft_api_url,

            openai_api_key,
            openai_api_url: env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),

            coingecko_api_key,
            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),

            rpc_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .context("RPC_TIMEOUT_SECS must be a valid number")?,
            completion_timeout_secs: env::var("COMPLETION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .context("COMPLETION_TIMEOUT_SECS must be a valid number")?,
        })
    }
}
