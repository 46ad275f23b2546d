use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use taskforge_core::remote::ColumnState;
use taskforge_core::specialist::SpecialistId;
use taskforge_engine::Engine;
use taskforge_service::{MemoryBackend, Orchestrator, RetryPolicy, SyncClient, SyncConfig};
use tokio::net::TcpListener;

use crate::auth::{self, AuthConfig};

/// Column ids `col-backlog`, `col-active`, `col-done`; owner markers
/// `owner-{id}` for every built-in specialist.
pub fn sync_config() -> SyncConfig {
    SyncConfig {
        project_id: "proj-1".into(),
        columns: BTreeMap::from([
            (ColumnState::Backlog, "col-backlog".to_string()),
            (ColumnState::Active, "col-active".to_string()),
            (ColumnState::Done, "col-done".to_string()),
        ]),
        owners: SpecialistId::ALL
            .iter()
            .map(|id| (*id, format!("owner-{id}")))
            .collect(),
    }
}

/// Built-in engine synced to an in-memory backend with immediate retries.
pub fn memory_orchestrator() -> (Orchestrator, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let client = SyncClient::new(
        backend.clone(),
        Arc::new(sync_config()),
        RetryPolicy::immediate(3),
    );
    let orchestrator = Orchestrator::new(Arc::new(Engine::builtin()), client)
        .expect("test sync config covers the built-in roster");
    (orchestrator, backend)
}

/// Router over an in-memory backend, no auth.
pub fn test_router() -> (Router, Arc<MemoryBackend>) {
    let (orchestrator, backend) = memory_orchestrator();
    (crate::build_router(orchestrator, None), backend)
}

/// Router with auth enabled, returning (router, api_key).
pub fn test_router_with_auth() -> (Router, String) {
    let (orchestrator, _) = memory_orchestrator();
    let api_key = auth::generate_api_key();
    let auth = AuthConfig::from_key(Some(&api_key)).map(Arc::new);
    (crate::build_router(orchestrator, auth), api_key)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub backend: Arc<MemoryBackend>,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn the API on a random port over an in-memory backend.
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let (app, backend) = test_router();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        backend,
        _handle: handle,
    }
}
