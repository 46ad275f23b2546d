use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use taskforge_core::TaskforgeError;
use taskforge_engine::{Engine, EngineSettings, Registry};
use taskforge_service::{HttpBackend, Orchestrator, RetryPolicy, SyncClient, SyncConfig};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "taskforge-server", about = "JSON API over the taskforge planning engine")]
pub struct ServerConfig {
    #[arg(long, env = "TASKFORGE_BIND", default_value = "127.0.0.1")]
    pub bind: IpAddr,

    #[arg(long, env = "TASKFORGE_PORT", default_value = "3720")]
    pub port: u16,

    /// Key clients must present as a bearer token; open access when unset
    #[arg(long, env = "TASKFORGE_SERVER_KEY", hide_env_values = true)]
    pub server_key: Option<String>,

    #[arg(long, env = "TASKFORGE_BACKEND_URL")]
    pub backend_url: Option<String>,

    #[arg(long, env = "TASKFORGE_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, env = "TASKFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "TASKFORGE_ROSTER")]
    pub roster: Option<PathBuf>,

    /// Per-call backend timeout (seconds)
    #[arg(long, env = "TASKFORGE_CALL_TIMEOUT", default_value = "30")]
    pub call_timeout: u64,

    #[arg(long, env = "TASKFORGE_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    #[command(subcommand)]
    pub command: Option<ServerCommand>,
}

#[derive(Debug, Subcommand)]
pub enum ServerCommand {
    /// Print a new random API key
    Keygen,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Sync is enabled only when both the backend URL and the sync config
    /// are given; one without the other is a startup error.
    pub fn orchestrator(&self) -> Result<Orchestrator, TaskforgeError> {
        let registry = match &self.roster {
            Some(path) => Registry::from_json_file(path)?,
            None => Registry::builtin(),
        };
        let engine = Arc::new(Engine::new(registry, EngineSettings::default()));

        match (&self.backend_url, &self.config) {
            (None, None) => {
                warn!("no task backend configured, sync endpoints disabled");
                Ok(Orchestrator::offline(engine))
            }
            (Some(url), Some(path)) => {
                let backend = HttpBackend::new(url, self.api_token.clone())?;
                let sync_config = SyncConfig::load(path)?;
                let policy = RetryPolicy {
                    max_retries: self.max_retries,
                    call_timeout: Duration::from_secs(self.call_timeout),
                    ..RetryPolicy::default()
                };
                let client = SyncClient::new(Arc::new(backend), Arc::new(sync_config), policy);
                Orchestrator::new(engine, client)
            }
            (Some(_), None) => Err(TaskforgeError::ConfigurationMissing(
                "backend URL given without a sync config (--config or TASKFORGE_CONFIG)".into(),
            )),
            (None, Some(_)) => Err(TaskforgeError::ConfigurationMissing(
                "sync config given without a backend URL (--backend-url or TASKFORGE_BACKEND_URL)"
                    .into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["taskforge-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_addr() {
        let config = parse(&["--bind", "0.0.0.0", "--port", "8080"]);
        assert_eq!(config.addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_half_configured_backend_rejected() {
        let config = parse(&["--backend-url", "http://127.0.0.1:9", "--config", "/nonexistent"]);
        let mut half = parse(&["--backend-url", "http://127.0.0.1:9"]);
        half.config = None;
        let err = half.orchestrator().err().unwrap();
        assert!(matches!(err, TaskforgeError::ConfigurationMissing(_)));

        // Both given but the file is missing.
        let err = config.orchestrator().err().unwrap();
        assert!(matches!(err, TaskforgeError::ConfigurationMissing(_)));
    }

    #[test]
    fn test_keygen_subcommand() {
        let config = parse(&["keygen"]);
        assert!(matches!(config.command, Some(ServerCommand::Keygen)));
    }
}
