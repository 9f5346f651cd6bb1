//! End-to-end tests for the search endpoint, with upstream services either
//! stubbed or unreachable.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    routing::{get, post},
    Router,
};
use mockito::{mock, Matcher};
use serde_json::{json, Value};
use tower::ServiceExt;

use eth_hunter_server::{
    api::{health::health_handler, search::search_handler},
    config::Config,
    AppState,
};

const ADDRESS: &str = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
/// Connection-refused sink for services a test wants unavailable.
const DEAD_END: &str = "http://127.0.0.1:9";

fn test_config(rpc_path: &str, nft_path: &str, llm_url: &str, gecko_url: &str) -> Config {
    let base = mockito::server_url();
    Config {
        port: 0,
        alchemy_api_key: "test-alchemy-key".to_string(),
        rpc_url: format!("{}{}", base, rpc_path),
        nft_api_url: format!("{}{}", base, nft_path),
        openai_api_key: "test-openai-key".to_string(),
        openai_api_url: llm_url.to_string(),
        openai_model: "test-model".to_string(),
        coingecko_api_key: "test-gecko-key".to_string(),
        coingecko_api_url: gecko_url.to_string(),
        rpc_timeout_secs: 2,
        completion_timeout_secs: 2,
    }
}

fn test_app(config: Config) -> Router {
    let state = AppState::new(config).unwrap();
    let api_router = Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler));
    Router::new().nest("/api", api_router).with_state(state)
}

async fn post_search(app: Router, query: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/search")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({ "query": query })).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app(test_config("/t-health", "/t-health-nft", DEAD_END, DEAD_END));
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn too_short_query_is_rejected() {
    let app = test_app(test_config("/t-short", "/t-short-nft", DEAD_END, DEAD_END));
    let (status, body) = post_search(app, "ab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("at least 3 characters"));
}

#[tokio::test]
async fn malformed_address_is_rejected_before_planning() {
    // bad EIP-55 checksum: one letter lowercased
    let app = test_app(test_config("/t-badaddr", "/t-badaddr-nft", DEAD_END, DEAD_END));
    let (status, body) = post_search(
        app,
        "balance of 0xd8da6BF26964aF9D7eEd9e03E53415D37aA96045",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid address format"));
}

#[tokio::test]
async fn nonsense_query_is_a_low_confidence_success() {
    // completion service unreachable: planning falls back, finds nothing
    let app = test_app(test_config("/t-noise", "/t-noise-nft", DEAD_END, DEAD_END));
    let (status, body) = post_search(app, "???").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["type"], json!("unknown"));
    assert_eq!(body["data"]["confidence"], json!(0.0));
    assert_eq!(body["data"]["results"], json!([]));
    assert_eq!(body["data"]["error"], json!("LOW_CONFIDENCE"));
}

#[tokio::test]
async fn balance_query_survives_completion_outage() {
    // 1.5 ETH
    let balance = mock("POST", "/t-bal")
        .match_body(Matcher::PartialJson(json!({ "method": "eth_getBalance" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x14d1120d7b160000"}"#)
        .create();
    let tx_count = mock("POST", "/t-bal")
        .match_body(Matcher::PartialJson(
            json!({ "method": "eth_getTransactionCount" }),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#)
        .create();
    let token_balances = mock("POST", "/t-bal")
        .match_body(Matcher::PartialJson(
            json!({ "method": "alchemy_getTokenBalances" }),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"jsonrpc":"2.0","id":1,"result":{"address":"0xd8da6bf26964af9d7eed9e03e53415d37aa96045","tokenBalances":[]}}"#,
        )
        .create();

    let app = test_app(test_config("/t-bal", "/t-bal-nft", DEAD_END, DEAD_END));
    let (status, body) = post_search(app, &format!("what does {} hold?", ADDRESS)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["type"], json!("address_analysis"));
    assert_eq!(body["data"]["confidence"], json!(0.7));

    let result = &body["data"]["results"][0];
    assert_eq!(result["address"], json!(ADDRESS));
    assert_eq!(result["shortAddress"], json!("0xd8dA...6045"));
    assert_eq!(result["balance"], json!("1.5000 ETH"));
    assert_eq!(result["transactions"], json!(42));
    assert_eq!(result["tokenHoldings"], json!([]));

    // narration also degraded to its fixed sentence
    assert_eq!(
        body["data"]["response"],
        json!("The hunt is complete. The findings are laid out below.")
    );

    balance.assert();
    tx_count.assert();
    token_balances.assert();
}

#[tokio::test]
async fn partial_call_failure_keeps_sibling_fields() {
    let _balance = mock("POST", "/t-part")
        .match_body(Matcher::PartialJson(json!({ "method": "eth_getBalance" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x0"}"#)
        .create();
    let _tx_count = mock("POST", "/t-part")
        .match_body(Matcher::PartialJson(
            json!({ "method": "eth_getTransactionCount" }),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jsonrpc":"2.0","id":1,"result":"0x0"}"#)
        .create();
    // token balances fail on both transports
    let _token_balances = mock("POST", "/t-part")
        .match_body(Matcher::PartialJson(
            json!({ "method": "alchemy_getTokenBalances" }),
        ))
        .with_status(500)
        .create();

    let app = test_app(test_config("/t-part", "/t-part-nft", DEAD_END, DEAD_END));
    let (status, body) = post_search(app, &format!("analyze {}", ADDRESS)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let result = &body["data"]["results"][0];
    // fetched-and-zero fields render as zero
    assert_eq!(result["balance"], json!("0.0000 ETH"));
    assert_eq!(result["transactions"], json!(0));
    assert_eq!(result["status"], json!("inactive"));
    // the failed call's field is simply absent, not zeroed
    assert!(result.get("tokenHoldings").is_none());
}

#[tokio::test]
async fn nft_collection_miss_gets_deterministic_answer() {
    // planner primary path served by a stubbed completion service
    let plan = json!({
        "intent": "address_analysis",
        "confidence": 0.9,
        "extractedData": { "addresses": [ADDRESS] },
        "apiCalls": [
            { "method": "nft.getNftsForOwner", "params": { "owner": ADDRESS }, "purpose": "nfts" }
        ],
        "reasoning": "collection ownership question"
    });
    let llm = mock("POST", "/t-nft-llm/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "choices": [{ "message": { "content": plan.to_string() } }] }).to_string(),
        )
        .expect(1)
        .create();
    let nfts = mock(
        "GET",
        Matcher::Regex(r"^/t-nft/getNFTsForOwner\?.*contractAddresses".to_string()),
    )
    .with_status(200)
    .with_header("content-type", "application/json")
    .with_body(r#"{"ownedNfts":[],"totalCount":0}"#)
    .expect(1)
    .create();

    let llm_url = format!("{}/t-nft-llm", mockito::server_url());
    let app = test_app(test_config("/t-nft-rpc", "/t-nft", &llm_url, DEAD_END));
    let (status, body) = post_search(
        app,
        &format!("does {} own any Bored Ape Yacht Club?", ADDRESS),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["response"],
        json!("The den is empty. 0xd8dA...6045 holds nothing from Bored Ape Yacht Club.")
    );
    let result = &body["data"]["results"][0];
    assert_eq!(result["requestedCollection"]["found"], json!(false));
    assert_eq!(result["requestedCollection"]["count"], json!(0));

    llm.assert();
    nfts.assert();
}
