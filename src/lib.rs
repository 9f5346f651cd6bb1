// src/lib.rs

pub mod agent;
pub mod aggregate;
pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod resolver;
pub mod utils;

use crate::agent::{completion::CompletionClient, narrator::Narrator, planner::QueryPlanner};
use crate::blockchain::{executor::ApiExecutor, nft::NftClient, rpc::RpcClient};
use crate::resolver::{coingecko::CoinGeckoClient, Resolver};
use anyhow::{Context, Result};
use ethers::providers::{Http, Provider};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Executes allowlisted provider calls
    pub executor: ApiExecutor,
    /// Symbol/collection resolution with the process-wide cache
    pub resolver: Arc<Resolver>,
    /// Turns queries into plans
    pub planner: Arc<QueryPlanner>,
    /// Turns results into prose
    pub narrator: Arc<Narrator>,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc_timeout_secs))
            .build()
            .context("building http client")?;

        let rpc = RpcClient::new(http.clone(), config.rpc_url.clone());
        let provider = Arc::new(
            Provider::<Http>::try_from(config.rpc_url.as_str())
                .context("creating blockchain provider")?,
        );
        let nft = NftClient::new(http.clone(), config.nft_api_url.clone());
        let executor = ApiExecutor::new(rpc, provider, nft);

        let gecko = CoinGeckoClient::new(
            http,
            config.coingecko_api_url.clone(),
            config.coingecko_api_key.clone(),
        );
        let resolver =
            Arc::new(Resolver::new(gecko).context("loading static symbol tables")?);

        let completion = CompletionClient::new(
            config.openai_api_url.clone(),
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            Duration::from_secs(config.completion_timeout_secs),
        )?;
        let planner = Arc::new(QueryPlanner::new(completion.clone(), resolver.clone()));
        let narrator = Arc::new(Narrator::new(completion));

        Ok(Self {
            config,
            executor,
            resolver,
            planner,
            narrator,
        })
    }
}
