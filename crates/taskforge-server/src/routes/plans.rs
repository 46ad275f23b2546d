use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use taskforge_core::specialist::SpecialistId;
use taskforge_engine::PlanOptions;
use taskforge_service::{CancelHandle, CancelToken};
use tracing::{error, warn};

use super::{body, to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/plan", post(plan))
}

#[derive(Debug, Deserialize)]
pub struct PlanBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub specialist: Option<SpecialistId>,
    #[serde(default)]
    pub skip_decomposition: bool,
    #[serde(default)]
    pub sync: bool,
}

/// Cancels the paired sync session when the request goes away.
struct CancelOnDrop(CancelHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Without `sync` the response is the bare plan. With `sync` it is
/// `{ plan, sync }`, where a persistence failure is reported inside `sync`
/// and does not fail the request: the plan itself is still valid.
async fn plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let req = body(payload)?;
    let options = PlanOptions {
        specialist_override: req.specialist,
        skip_decomposition: req.skip_decomposition,
    };

    if !req.sync {
        return state
            .orchestrator
            .plan(&req.title, &req.description, &options)
            .map(|p| (StatusCode::OK, Json(json!(p))))
            .map_err(to_error);
    }

    // The sync outlives a dropped request: the guard only cancels the
    // token, and the session marks what it created as abandoned.
    let (handle, cancel) = CancelToken::pair();
    let _cancel_on_drop = CancelOnDrop(handle);
    let orchestrator = state.orchestrator.clone();
    let sync = tokio::spawn(async move {
        orchestrator
            .plan_and_sync(&req.title, &req.description, &options, cancel)
            .await
    });
    let outcome = sync
        .await
        .map_err(|e| {
            error!(error = %e, "plan sync task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "plan sync task failed", "kind": "internal" })),
            )
        })?
        .map_err(to_error)?;

    match &outcome.sync {
        Ok(report) => Ok((
            StatusCode::CREATED,
            Json(json!({ "plan": outcome.plan, "sync": { "ok": true, "report": report } })),
        )),
        Err(e) => {
            warn!(error = %e, "plan returned without persistence");
            Ok((
                StatusCode::OK,
                Json(json!({
                    "plan": outcome.plan,
                    "sync": { "ok": false, "kind": e.kind(), "error": e.to_string() },
                })),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use taskforge_engine::Engine;
    use taskforge_service::sync::ABANDONED_COMMENT;
    use taskforge_service::{
        BackendError, BackendOp, MemoryBackend, NewRemoteTask, Orchestrator, RemoteComment,
        RemoteTask, RetryPolicy, SyncClient, TaskBackend,
    };
    use tokio::sync::Notify;
    use tower::ServiceExt;

    use crate::test_helpers::{sync_config, test_router};

    const MARKETPLACE: &str =
        "Build a marketplace with payments, inventory, and analytics, targeting production in 6 months";

    async fn post_plan(app: axum::Router, body: Value) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/plan")
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
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn plan_without_sync_touches_no_backend() {
        let (app, backend) = test_router();
        let (status, v) = post_plan(
            app,
            json!({ "title": "Marketplace", "description": MARKETPLACE }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["assessment"]["tier"], "EPIC");
        assert_eq!(v["mode"]["kind"], "decomposed");
        assert_eq!(v["subtasks"][0]["depends_on"], Value::Null);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn plan_with_sync_persists_graph() {
        let (app, backend) = test_router();
        let (status, v) = post_plan(
            app,
            json!({ "title": "Marketplace", "description": MARKETPLACE, "sync": true }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(v["sync"]["ok"], true);
        let subtasks = v["plan"]["subtasks"].as_array().unwrap().len();
        assert_eq!(
            v["sync"]["report"]["subtasks"].as_array().unwrap().len(),
            subtasks
        );
        assert_eq!(backend.tasks().len(), subtasks + 1);
        assert_eq!(backend.calls_of(BackendOp::CreateTask).len(), subtasks + 1);
    }

    #[tokio::test]
    async fn sync_failure_is_reported_beside_plan() {
        let (app, backend) = test_router();
        backend.fail_next(
            BackendOp::CreateTask,
            vec![taskforge_service::BackendError::Rejected {
                status: 400,
                message: "unknown project".into(),
            }],
        );
        let (status, v) = post_plan(
            app,
            json!({ "title": "Update the README typo", "sync": true }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["sync"]["ok"], false);
        assert_eq!(v["sync"]["kind"], "validation_rejected");
        assert_eq!(v["plan"]["mode"]["kind"], "direct");
    }

    #[tokio::test]
    async fn unknown_specialist_is_bad_request() {
        let (app, _) = test_router();
        let (status, v) = post_plan(
            app,
            json!({ "title": "Anything", "specialist": "wizard" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["kind"], "invalid_argument");
    }

    #[tokio::test]
    async fn blank_title_is_bad_request() {
        let (app, _) = test_router();
        let (status, v) = post_plan(app, json!({ "title": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(v["error"], "invalid argument: title must not be empty");
    }

    /// Memory backend that holds every owner update until released.
    struct HeldOwnerBackend {
        inner: Arc<MemoryBackend>,
        reached: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl TaskBackend for HeldOwnerBackend {
        async fn create_task(
            &self,
            project_id: &str,
            task: &NewRemoteTask,
            idempotency_key: &str,
        ) -> Result<RemoteTask, BackendError> {
            self.inner.create_task(project_id, task, idempotency_key).await
        }

        async fn get_task(&self, id: &str) -> Result<RemoteTask, BackendError> {
            self.inner.get_task(id).await
        }

        async fn update_owner(&self, id: &str, owner: &str) -> Result<RemoteTask, BackendError> {
            self.reached.notify_one();
            self.release.notified().await;
            self.inner.update_owner(id, owner).await
        }

        async fn move_column(&self, id: &str, column_id: &str) -> Result<RemoteTask, BackendError> {
            self.inner.move_column(id, column_id).await
        }

        async fn add_comment(&self, id: &str, body: &str) -> Result<RemoteComment, BackendError> {
            self.inner.add_comment(id, body).await
        }

        async fn list_tasks(&self, project_id: &str) -> Result<Vec<RemoteTask>, BackendError> {
            self.inner.list_tasks(project_id).await
        }
    }

    #[tokio::test]
    async fn dropped_request_marks_created_task_abandoned() {
        let inner = Arc::new(MemoryBackend::new());
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let backend = HeldOwnerBackend {
            inner: inner.clone(),
            reached: reached.clone(),
            release: release.clone(),
        };
        let client = SyncClient::new(
            Arc::new(backend),
            Arc::new(sync_config()),
            RetryPolicy::immediate(3),
        );
        let orchestrator = Orchestrator::new(Arc::new(Engine::builtin()), client).unwrap();
        let app = crate::build_router(orchestrator, None);

        let request = post_plan(
            app,
            json!({ "title": "Marketplace", "description": MARKETPLACE, "sync": true }),
        );
        // The parent exists once the owner update is reached; drop the
        // request right there.
        tokio::select! {
            _ = request => panic!("request finished while the backend was held"),
            _ = reached.notified() => {}
        }
        release.notify_one();

        let parent = inner.tasks()[0].id.clone();
        for _ in 0..200 {
            if !inner.comments_for(&parent).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            inner.comments_for(&parent),
            vec![ABANDONED_COMMENT.to_string()]
        );
        assert_eq!(inner.tasks().len(), 1);
        assert_eq!(inner.calls_of(BackendOp::CreateTask).len(), 1);
    }
}
