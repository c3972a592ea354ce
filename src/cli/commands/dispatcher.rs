//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::error::Result;
use crate::log::{Logger, LoggerOpts};

/// A CLI subcommand.
pub trait Command {
    /// Run the command, writing user-facing output through `logger`.
    fn execute(&self, logger: &mut dyn Logger) -> Result<CommandResult>;
}

/// Outcome of a command, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self::from_exit_code(0)
    }

    /// A failed command; `exit_code` should be non-zero.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    pub fn from_exit_code(exit_code: i32) -> Self {
        Self {
            success: exit_code == 0,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    ///
    /// Without a subcommand, `run` is dispatched with no workflow, which
    /// prints the available workflows and fails.
    pub fn dispatch(&self, cli: &Cli, logger: &mut dyn Logger) -> Result<CommandResult> {
        let opts: LoggerOpts = cli.logger_opts();
        match &cli.command {
            Some(Commands::Run(args)) => {
                let cmd = super::run::RunCommand::new(&self.project_root, cli, args.clone(), opts);
                cmd.execute(logger)
            }
            Some(Commands::Workflows(args)) => {
                let cmd =
                    super::workflows::WorkflowsCommand::new(&self.project_root, cli, args.clone());
                cmd.execute(logger)
            }
            Some(Commands::Version(args)) => {
                let cmd = super::version::VersionCommand::new(args.clone());
                cmd.execute(logger)
            }
            None => {
                let cmd =
                    super::run::RunCommand::new(&self.project_root, cli, RunArgs::default(), opts);
                cmd.execute(logger)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::log::{new_logger, LoggerType, SharedBuffer};
    use clap::Parser;

    fn dispatch(root: &Path, argv: &[&str]) -> (Result<CommandResult>, String) {
        let cli = Cli::parse_from(argv);
        let buffer = SharedBuffer::new();
        let mut logger = new_logger(&LoggerOpts::new(LoggerType::Console, buffer.sink()));
        let result = CommandDispatcher::new(root.to_path_buf()).dispatch(&cli, logger.as_mut());
        (result, buffer.contents())
    }

    #[test]
    fn exit_code_maps_to_success() {
        assert_eq!(CommandResult::from_exit_code(0), CommandResult::success());
        assert_eq!(CommandResult::from_exit_code(3), CommandResult::failure(3));
        assert!(!CommandResult::failure(1).success);
    }

    #[test]
    fn routes_version() {
        let temp = tempfile::TempDir::new().unwrap();
        let (result, out) = dispatch(temp.path(), &["relay", "version"]);
        assert!(result.unwrap().success);
        assert_eq!(out.trim(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn no_subcommand_runs_without_workflow() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("relay.yml"),
            "workflows:\n  primary:\n    steps: []\n",
        )
        .unwrap();
        let (result, out) = dispatch(temp.path(), &["relay"]);
        assert!(matches!(result, Err(RelayError::WorkflowNotSpecified)));
        assert!(out.contains(" * primary"));
    }
}
