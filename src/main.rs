//! Relay CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use relay::cli::{Cli, CommandDispatcher};
use relay::log::new_logger;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
///
/// Diagnostics go to stderr so they never mix with the run log.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("relay=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relay=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug.unwrap_or(false));

    tracing::debug!("Relay starting with args: {:?}", cli);

    let project_root = cli
        .project
        .as_ref()
        .cloned()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut logger = new_logger(&cli.logger_opts().for_cli());
    let dispatcher = CommandDispatcher::new(project_root);

    match dispatcher.dispatch(&cli, logger.as_mut()) {
        Ok(result) => ExitCode::from(result.exit_code.clamp(0, 255) as u8),
        Err(e) => {
            logger.error(&e.to_string());
            logger.report_flush();
            ExitCode::from(1)
        }
    }
}
