pub mod health;
pub mod plans;
pub mod specialists;
pub mod tasks;

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use taskforge_core::TaskforgeError;
use taskforge_service::Orchestrator;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AuthConfig};

pub struct InnerAppState {
    pub orchestrator: Orchestrator,
    pub auth: Option<Arc<AuthConfig>>,
}

pub type AppState = Arc<InnerAppState>;

pub type ApiError = (StatusCode, Json<Value>);

pub fn build_router(orchestrator: Orchestrator, auth: Option<Arc<AuthConfig>>) -> Router {
    let state: AppState = Arc::new(InnerAppState { orchestrator, auth });

    let public = Router::new().merge(health::routes());

    let protected = Router::new()
        .merge(specialists::routes())
        .merge(plans::routes())
        .merge(tasks::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn status_for(e: &TaskforgeError) -> StatusCode {
    match e {
        TaskforgeError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        TaskforgeError::NotFound(_) => StatusCode::NOT_FOUND,
        TaskforgeError::Cancelled(_) => StatusCode::CONFLICT,
        TaskforgeError::ValidationRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TaskforgeError::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        TaskforgeError::TransientFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn to_error(e: TaskforgeError) -> ApiError {
    (
        status_for(&e),
        Json(json!({ "error": e.to_string(), "kind": e.kind() })),
    )
}

/// Malformed or mistyped bodies are caller errors, reported as 400 rather
/// than axum's default 415/422.
pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| to_error(TaskforgeError::InvalidArgument(rejection.body_text())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (TaskforgeError::InvalidArgument("x".into()), 400),
            (TaskforgeError::NotFound("x".into()), 404),
            (TaskforgeError::Cancelled("x".into()), 409),
            (TaskforgeError::ValidationRejected("x".into()), 422),
            (TaskforgeError::ConfigurationMissing("x".into()), 500),
            (
                TaskforgeError::TransientFailure {
                    attempts: 4,
                    message: "x".into(),
                },
                503,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err).as_u16(), status, "{err}");
        }
    }

    #[test]
    fn test_error_body_carries_kind() {
        let (status, Json(body)) = to_error(TaskforgeError::NotFound("task t9".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
        assert_eq!(body["error"], "not found: task t9");
    }
}
