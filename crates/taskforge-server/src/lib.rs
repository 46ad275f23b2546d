pub mod auth;
pub mod config;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use taskforge_service::Orchestrator;
use tokio::net::TcpListener;

use auth::AuthConfig;

pub use routes::{build_router, status_for};

pub async fn serve(
    listener: TcpListener,
    orchestrator: Orchestrator,
    auth: Option<Arc<AuthConfig>>,
) -> Result<()> {
    let app = routes::build_router(orchestrator, auth);
    axum::serve(listener, app).await?;
    Ok(())
}
