use std::process::ExitCode;

use clap::Parser;
use taskforge_cli::{exit_code, run, CliConfig};
use taskforge_service::CancelToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = CliConfig::parse();
    let cancel = if config.command.needs_backend() {
        interrupt_token()
    } else {
        CancelToken::never()
    };

    match run(&config, cancel).await {
        Ok(out) => {
            println!("{}", out.text);
            match out.error {
                Some(e) => {
                    eprintln!("error: {e}");
                    ExitCode::from(e.exit_code() as u8)
                }
                None => ExitCode::SUCCESS,
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// The first Ctrl-C cancels backend work before its next attempt or during
/// a backoff; the second exits at once.
fn interrupt_token() -> CancelToken {
    let (handle, cancel) = CancelToken::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("interrupt received, cancelling (Ctrl-C again to quit)");
        handle.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt, exiting");
            std::process::exit(130);
        }
    });
    cancel
}
