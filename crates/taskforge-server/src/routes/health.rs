use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "specialists": state.orchestrator.engine().registry().len(),
        "sync": state.orchestrator.sync_client().is_ok(),
    }))
}
