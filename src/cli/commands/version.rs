//! Version command implementation.

use crate::cli::args::VersionArgs;
use crate::config::CURRENT_FORMAT_VERSION;
use crate::error::Result;
use crate::log::Logger;
use crate::plan::LOG_FORMAT_VERSION;

use super::dispatcher::{Command, CommandResult};

/// The version command implementation.
pub struct VersionCommand {
    args: VersionArgs,
}

impl VersionCommand {
    pub fn new(args: VersionArgs) -> Self {
        Self { args }
    }

    /// Lines printed by the command.
    pub fn lines(&self) -> Vec<String> {
        let version = env!("CARGO_PKG_VERSION");
        if !self.args.full {
            return vec![version.to_string()];
        }
        vec![
            format!("version: {}", version),
            format!("format version: {}", CURRENT_FORMAT_VERSION),
            format!("log format version: {}", LOG_FORMAT_VERSION),
            format!(
                "os: {} ({})",
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        ]
    }
}

impl Command for VersionCommand {
    fn execute(&self, logger: &mut dyn Logger) -> Result<CommandResult> {
        for line in self.lines() {
            logger.print(&line);
        }
        Ok(CommandResult::success())
    }
}
