// src/api/search.rs

use crate::agent::schema::{Intent, QueryPlan, CONFIDENCE_THRESHOLD};
use crate::aggregate::{self, QueryResults, TokenAnalysisResult};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(custom = "validate_query_text")]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub data: SearchData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchData {
    #[serde(rename = "type")]
    pub kind: String,
    pub query: String,
    pub response: String,
    pub results: Vec<Value>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn validate_query_text(query: &str) -> Result<(), ValidationError> {
    if let Err(query_error) = crate::utils::validate_query(query) {
        let mut err = ValidationError::new("query");
        err.message = Some(query_error.to_string().into());
        return Err(err);
    }
    Ok(())
}

fn first_validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|list| list.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid query.".to_string())
}

/// POST /api/search. Validation failures are the only 400s; every
/// downstream failure degrades inside a 200 payload.
pub async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        let message = first_validation_message(&errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response();
    }

    let query = request.query.trim().to_string();
    let data = match run_search(&state, &query).await {
        Ok(data) => data,
        Err(e) => {
            error!("search pipeline error: {:#}", e);
            cold_trail(&query)
        }
    };
    (
        StatusCode::OK,
        Json(SearchResponse {
            success: true,
            data,
        }),
    )
        .into_response()
}

async fn run_search(state: &AppState, query: &str) -> anyhow::Result<SearchData> {
    let plan = state.planner.plan(query).await;
    info!(
        intent = plan.intent.as_str(),
        confidence = plan.confidence,
        calls = plan.api_calls.len(),
        "query planned"
    );

    if plan.confidence < CONFIDENCE_THRESHOLD {
        return Ok(low_confidence(query, &plan));
    }

    let results = match plan.intent {
        Intent::AddressAnalysis => analyze_addresses(state, &plan).await,
        Intent::TokenAnalysis => analyze_tokens(state, &plan).await,
        Intent::Unknown => {
            if plan.extracted_data.addresses.is_empty() {
                QueryResults::Empty
            } else {
                analyze_addresses(state, &plan).await
            }
        }
    };

    let response = state.narrator.summarize(query, plan.intent, &results).await;
    Ok(SearchData {
        kind: plan.intent.as_str().to_string(),
        query: query.to_string(),
        response,
        results: results.to_json(),
        confidence: plan.confidence,
        reasoning: Some(plan.reasoning),
        error: None,
        message: None,
        timestamp: Utc::now(),
    })
}

/// Independent per-address executions fan out concurrently; calls within
/// one address run in plan order.
async fn analyze_addresses(state: &AppState, plan: &QueryPlan) -> QueryResults {
    let eth_usd = match state.resolver.gecko().eth_price().await {
        Ok(price) => price,
        Err(e) => {
            warn!("ETH price lookup failed: {:#}", e);
            None
        }
    };
    let lookups = plan.extracted_data.addresses.iter().map(|address| async move {
        let raw = state.executor.execute_plan_for_address(plan, address).await;
        aggregate::build_address_result(
            &state.executor,
            address,
            &raw,
            &plan.extracted_data,
            eth_usd,
        )
        .await
    });
    QueryResults::Addresses(join_all(lookups).await)
}

async fn analyze_tokens(state: &AppState, plan: &QueryPlan) -> QueryResults {
    let resolved = state
        .resolver
        .resolve_tokens(&plan.extracted_data.tokens)
        .await;
    let mut entries: Vec<_> = resolved.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut results = Vec::new();
    for (symbol, info) in entries {
        let price = match state
            .resolver
            .gecko()
            .token_price_by_address(&info.address)
            .await
        {
            Ok(price) => price,
            Err(e) => {
                warn!("price lookup failed for {}: {:#}", symbol, e);
                None
            }
        };
        results.push(TokenAnalysisResult {
            symbol: info.symbol,
            name: info.name,
            contract_address: info.address,
            decimals: info.decimals,
            price_usd: price,
        });
    }
    if results.is_empty() {
        QueryResults::Empty
    } else {
        QueryResults::Tokens(results)
    }
}

fn low_confidence(query: &str, plan: &QueryPlan) -> SearchData {
    SearchData {
        kind: plan.intent.as_str().to_string(),
        query: query.to_string(),
        response: "The Hunter cannot decipher this request. Try being more specific.".to_string(),
        results: vec![],
        confidence: plan.confidence,
        reasoning: Some(plan.reasoning.clone()),
        error: Some("LOW_CONFIDENCE".to_string()),
        message: Some("Try being more specific.".to_string()),
        timestamp: Utc::now(),
    }
}

/// Last-resort payload: the client always receives something renderable.
fn cold_trail(query: &str) -> SearchData {
    SearchData {
        kind: "unknown".to_string(),
        query: query.to_string(),
        response: "The trail grows cold. The Hunter could not complete this search.".to_string(),
        results: vec![],
        confidence: 0.0,
        reasoning: None,
        error: Some("INTERNAL".to_string()),
        message: None,
        timestamp: Utc::now(),
    }
}
