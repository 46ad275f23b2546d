use anyhow::{Context, Result};
use serde_json::json;
use taskforge_core::TaskforgeError;
use taskforge_engine::PlanOptions;
use taskforge_service::CancelToken;
use tracing::{info, warn};

use crate::config::{CliConfig, Command};
use crate::output;

/// What a command prints, plus the failure that should set the exit code
/// when the command still produced useful output (a plan whose sync failed).
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub error: Option<TaskforgeError>,
}

impl CommandOutput {
    fn ok(text: String) -> Self {
        Self { text, error: None }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize output")
}

pub async fn run(config: &CliConfig, cancel: CancelToken) -> Result<CommandOutput> {
    let orchestrator = config.orchestrator(config.command.needs_backend())?;

    match &config.command {
        Command::Suggest { title, description } => {
            let results = orchestrator.suggest(title, description)?;
            let text = if config.json {
                to_json(&results)?
            } else {
                output::suggestions(&results)
            };
            Ok(CommandOutput::ok(text))
        }
        Command::Analyze { title, description } => {
            let assessment = orchestrator.analyze(title, description)?;
            let text = if config.json {
                to_json(&assessment)?
            } else {
                assessment.summary()
            };
            Ok(CommandOutput::ok(text))
        }
        Command::Plan {
            title,
            description,
            specialist,
            skip_decomposition,
            sync,
        } => {
            let options = PlanOptions {
                specialist_override: *specialist,
                skip_decomposition: *skip_decomposition,
            };
            if !*sync {
                let plan = orchestrator.plan(title, description, &options)?;
                let text = if config.json {
                    to_json(&plan)?
                } else {
                    output::plan(&plan)
                };
                return Ok(CommandOutput::ok(text));
            }

            let outcome = orchestrator
                .plan_and_sync(title, description, &options, cancel)
                .await?;
            let text = if config.json {
                let sync = match &outcome.sync {
                    Ok(report) => json!({ "ok": true, "report": report }),
                    Err(e) => json!({ "ok": false, "kind": e.kind(), "error": e.to_string() }),
                };
                to_json(&json!({ "plan": outcome.plan, "sync": sync }))?
            } else {
                match &outcome.sync {
                    Ok(report) => format!(
                        "{}\n{}",
                        output::plan(&outcome.plan),
                        output::report(report)
                    ),
                    Err(_) => format!("{}\nNot synced", output::plan(&outcome.plan)),
                }
            };
            match outcome.sync {
                Ok(report) => {
                    info!(parent = %report.parent.external_id, "plan synced");
                    Ok(CommandOutput::ok(text))
                }
                Err(e) => {
                    warn!(error = %e, "plan printed but not synced");
                    Ok(CommandOutput {
                        text,
                        error: Some(e),
                    })
                }
            }
        }
        Command::Move {
            external_id,
            column,
            revert,
        } => {
            let moved = orchestrator
                .move_task(external_id, *column, *revert, cancel)
                .await?;
            let text = if config.json {
                to_json(&moved)?
            } else {
                output::remote_ref(&moved)
            };
            Ok(CommandOutput::ok(text))
        }
        Command::Comment { external_id, text } => {
            orchestrator.add_comment(external_id, text, cancel).await?;
            let text = if config.json {
                to_json(&json!({ "task_id": external_id.trim(), "commented": true }))?
            } else {
                format!("commented on {}", external_id.trim())
            };
            Ok(CommandOutput::ok(text))
        }
        Command::Roster => {
            let profiles = orchestrator.engine().registry().profiles();
            let text = if config.json {
                to_json(&profiles)?
            } else {
                output::roster(profiles)
            };
            Ok(CommandOutput::ok(text))
        }
    }
}

/// Exit code for an error that aborted a command: the taskforge error's own
/// code when there is one, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<TaskforgeError>()
        .map(TaskforgeError::exit_code)
        .unwrap_or(1)
}
