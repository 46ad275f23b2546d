use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use taskforge_core::remote::ColumnState;
use taskforge_service::CancelToken;

use super::{body, to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/{id}/column", put(move_task))
        .route("/api/tasks/{id}/comments", post(add_comment))
}

#[derive(Debug, Deserialize)]
pub struct MoveBody {
    pub column: ColumnState,
    #[serde(default)]
    pub revert: bool,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub text: String,
}

async fn move_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<MoveBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let req = body(payload)?;
    state
        .orchestrator
        .move_task(&id, req.column, req.revert, CancelToken::never())
        .await
        .map(|r| Json(json!(r)))
        .map_err(to_error)
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CommentBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let req = body(payload)?;
    state
        .orchestrator
        .add_comment(&id, &req.text, CancelToken::never())
        .await
        .map(|_| StatusCode::CREATED)
        .map_err(to_error)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use taskforge_service::{BackendOp, RemoteTask};
    use tower::ServiceExt;

    use crate::test_helpers::test_router;

    fn seeded(column: &str) -> (axum::Router, std::sync::Arc<taskforge_service::MemoryBackend>) {
        let (app, backend) = test_router();
        backend.seed_task(
            "proj-1",
            RemoteTask {
                id: "t1".into(),
                title: "Seeded".into(),
                description: String::new(),
                column_id: column.into(),
                owner: Some("owner-backend".into()),
            },
        );
        (app, backend)
    }

    async fn send(app: axum::Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn move_forward() {
        let (app, backend) = seeded("col-active");
        let (status, v) = send(
            app,
            Method::PUT,
            "/api/tasks/t1/column",
            &json!({ "column": "done" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["column_state"], "done");
        assert_eq!(v["owner_specialist_id"], "backend");
        assert_eq!(backend.task("t1").unwrap().column_id, "col-done");
    }

    #[tokio::test]
    async fn done_to_backlog_is_unprocessable() {
        let (app, backend) = seeded("col-done");
        let (status, v) = send(
            app,
            Method::PUT,
            "/api/tasks/t1/column",
            &json!({ "column": "backlog" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(v["kind"], "validation_rejected");
        assert!(backend.calls_of(BackendOp::MoveColumn).is_empty());
    }

    #[tokio::test]
    async fn move_unknown_task_is_not_found() {
        let (app, _) = test_router();
        let (status, _) = send(
            app,
            Method::PUT,
            "/api/tasks/nope/column",
            &json!({ "column": "active" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, _) = seeded("col-active");
        let (status, v) = send(app, Method::PUT, "/api/tasks/t1/column", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["kind"], "invalid_argument");
    }

    #[tokio::test]
    async fn comment_created() {
        let (app, backend) = seeded("col-active");
        let (status, _) = send(
            app,
            Method::POST,
            "/api/tasks/t1/comments",
            &json!({ "text": "looks good" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(backend.comments_for("t1"), vec!["looks good".to_string()]);
    }

    #[tokio::test]
    async fn empty_comment_is_bad_request() {
        let (app, backend) = seeded("col-active");
        let (status, _) = send(
            app,
            Method::POST,
            "/api/tasks/t1/comments",
            &json!({ "text": "   " }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(backend.calls_of(BackendOp::AddComment).is_empty());
    }
}
