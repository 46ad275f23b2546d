use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{body, to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/specialists", get(list_specialists))
        .route("/api/suggest", post(suggest))
        .route("/api/analyze", post(analyze))
}

#[derive(Debug, Deserialize)]
pub struct TaskBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

async fn list_specialists(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.orchestrator.engine().registry().profiles()))
}

async fn suggest(
    State(state): State<AppState>,
    payload: Result<Json<TaskBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let input = body(payload)?;
    state
        .orchestrator
        .suggest(&input.title, &input.description)
        .map(|m| Json(json!(m)))
        .map_err(to_error)
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<TaskBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let input = body(payload)?;
    state
        .orchestrator
        .analyze(&input.title, &input.description)
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}
