use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use taskforge_core::remote::ColumnState;
use taskforge_core::specialist::SpecialistId;
use taskforge_core::TaskforgeError;
use taskforge_engine::{Engine, EngineSettings, Registry};
use taskforge_service::{HttpBackend, Orchestrator, RetryPolicy, SyncClient, SyncConfig};

#[derive(Debug, Parser)]
#[command(name = "taskforge", about = "Route, size and decompose tasks, then sync them to a task backend")]
pub struct CliConfig {
    /// Task backend URL
    #[arg(long, env = "TASKFORGE_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Bearer token for the task backend
    #[arg(long, env = "TASKFORGE_API_TOKEN", global = true, hide_env_values = true)]
    pub api_token: Option<String>,

    /// JSON file mapping columns and specialists to backend identifiers
    #[arg(long, env = "TASKFORGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// JSON file replacing the built-in specialist roster
    #[arg(long, env = "TASKFORGE_ROSTER", global = true)]
    pub roster: Option<PathBuf>,

    /// Per-call backend timeout (seconds)
    #[arg(long, env = "TASKFORGE_CALL_TIMEOUT", default_value = "30", global = true)]
    pub call_timeout: u64,

    /// Retries after the first attempt of a backend call
    #[arg(long, env = "TASKFORGE_MAX_RETRIES", default_value = "3", global = true)]
    pub max_retries: u32,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rank specialists for a task
    Suggest {
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Estimate complexity, priority and risk
    Analyze {
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
    },
    /// Build a workflow plan, optionally persisting it to the backend
    Plan {
        title: String,
        #[arg(long, short, default_value = "")]
        description: String,
        /// Assign this specialist directly
        #[arg(long, value_parser = parse_specialist)]
        specialist: Option<SpecialistId>,
        /// Never expand into subtasks
        #[arg(long)]
        skip_decomposition: bool,
        /// Create the plan's tasks in the backend
        #[arg(long)]
        sync: bool,
    },
    /// Move a backend task to another column
    Move {
        external_id: String,
        #[arg(value_parser = parse_column)]
        column: ColumnState,
        /// Allow Active -> Backlog
        #[arg(long)]
        revert: bool,
    },
    /// Comment on a backend task
    Comment { external_id: String, text: String },
    /// List the loaded specialist profiles
    Roster,
}

fn parse_specialist(s: &str) -> Result<SpecialistId, String> {
    SpecialistId::parse_str(&s.to_lowercase()).ok_or_else(|| {
        let known: Vec<&str> = SpecialistId::ALL.iter().map(|id| id.as_str()).collect();
        format!("unknown specialist '{s}' (expected one of: {})", known.join(", "))
    })
}

fn parse_column(s: &str) -> Result<ColumnState, String> {
    ColumnState::parse_str(&s.to_lowercase())
        .ok_or_else(|| format!("unknown column '{s}' (expected backlog, active or done)"))
}

impl CliConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            call_timeout: Duration::from_secs(self.call_timeout),
            ..RetryPolicy::default()
        }
    }

    pub fn registry(&self) -> Result<Registry, TaskforgeError> {
        match &self.roster {
            Some(path) => Registry::from_json_file(path),
            None => Ok(Registry::builtin()),
        }
    }

    pub fn engine(&self) -> Result<Arc<Engine>, TaskforgeError> {
        Ok(Arc::new(Engine::new(self.registry()?, EngineSettings::default())))
    }

    /// Offline unless the command needs the backend, in which case both the
    /// URL and the sync config are required.
    pub fn orchestrator(&self, needs_backend: bool) -> Result<Orchestrator, TaskforgeError> {
        let engine = self.engine()?;
        if !needs_backend {
            return Ok(Orchestrator::offline(engine));
        }
        let url = self.backend_url.as_deref().ok_or_else(|| {
            TaskforgeError::ConfigurationMissing(
                "backend URL not set (--backend-url or TASKFORGE_BACKEND_URL)".into(),
            )
        })?;
        let path = self.config.as_deref().ok_or_else(|| {
            TaskforgeError::ConfigurationMissing(
                "sync config not set (--config or TASKFORGE_CONFIG)".into(),
            )
        })?;
        let backend = HttpBackend::new(url, self.api_token.clone())?;
        let sync_config = SyncConfig::load(path)?;
        let client = SyncClient::new(Arc::new(backend), Arc::new(sync_config), self.retry_policy());
        Orchestrator::new(engine, client)
    }
}

impl Command {
    pub fn needs_backend(&self) -> bool {
        match self {
            Command::Plan { sync, .. } => *sync,
            Command::Move { .. } | Command::Comment { .. } => true,
            Command::Suggest { .. } | Command::Analyze { .. } | Command::Roster => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_flags() {
        let config = CliConfig::try_parse_from([
            "taskforge",
            "plan",
            "Build marketplace",
            "-d",
            "with payments",
            "--specialist",
            "Payments",
            "--sync",
        ])
        .unwrap();
        match &config.command {
            Command::Plan {
                title,
                description,
                specialist,
                skip_decomposition,
                sync,
            } => {
                assert_eq!(title, "Build marketplace");
                assert_eq!(description, "with payments");
                assert_eq!(*specialist, Some(SpecialistId::Payments));
                assert!(!skip_decomposition);
                assert!(sync);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(config.command.needs_backend());
    }

    #[test]
    fn test_unknown_specialist_rejected() {
        let err = CliConfig::try_parse_from(["taskforge", "plan", "x", "--specialist", "wizard"])
            .unwrap_err();
        assert!(err.to_string().contains("unknown specialist"));
    }

    #[test]
    fn test_move_parses_column() {
        let config =
            CliConfig::try_parse_from(["taskforge", "move", "t-1", "Backlog", "--revert"]).unwrap();
        match config.command {
            Command::Move {
                column, revert, ..
            } => {
                assert_eq!(column, ColumnState::Backlog);
                assert!(revert);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_retry_policy_from_flags() {
        let config = CliConfig::try_parse_from([
            "taskforge",
            "--max-retries",
            "5",
            "--call-timeout",
            "10",
            "roster",
        ])
        .unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.call_timeout, Duration::from_secs(10));
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_backend_commands_need_url() {
        let config = CliConfig::try_parse_from(["taskforge", "comment", "t-1", "hi"]).unwrap();
        if config.backend_url.is_none() {
            let err = config.orchestrator(true).err().unwrap();
            assert!(matches!(err, TaskforgeError::ConfigurationMissing(_)));
        }
    }
}
