use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub async fn health_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "eth-hunter-server" })),
    )
}
