use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use taskforge_server::auth::{self, AuthConfig};
use taskforge_server::config::{ServerCommand, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    if let Some(ServerCommand::Keygen) = config.command {
        // Print the raw key to stdout so it can be captured
        println!("{}", auth::generate_api_key());
        eprintln!("Set it as TASKFORGE_SERVER_KEY; only its hash is kept in memory.");
        return Ok(());
    }

    let orchestrator = config.orchestrator()?;
    let auth = AuthConfig::from_key(config.server_key.as_deref()).map(Arc::new);
    if auth.is_some() {
        info!("authentication enabled");
    } else {
        info!("authentication disabled (no TASKFORGE_SERVER_KEY)");
    }

    let addr = config.addr();
    let listener = TcpListener::bind(addr).await?;
    info!(
        "taskforge-server listening on http://{addr} ({} specialists)",
        orchestrator.engine().registry().len()
    );

    taskforge_server::serve(listener, orchestrator, auth).await?;
    Ok(())
}
