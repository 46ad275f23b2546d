pub mod commands;
pub mod config;
pub mod output;

pub use commands::{exit_code, run, CommandOutput};
pub use config::{CliConfig, Command};
