//! Health endpoint.

use crate::server::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sync = match &state.syncer {
        Some(syncer) => serde_json::to_value(syncer.status().await).unwrap_or_default(),
        None => serde_json::Value::Null,
    };
    Json(json!({ "status": "ok", "sync": sync }))
}
