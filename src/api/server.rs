use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::state::AppState;

/// GET /api/health - 健康检查
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let engine = state.detector.state().await;
    Json(json!({
        "status": "ok",
        "message": "fulltext-strict is running",
        "version": env!("CARGO_PKG_VERSION"),
        "effective": engine.effective,
    }))
}
