//! Workflows command implementation.
//!
//! The `relay workflows` command lists the workflows in the config.

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, WorkflowsArgs};
use crate::config::{load_config_file, ConfigPaths, RelayConfig};
use crate::error::Result;
use crate::log::Logger;

use super::dispatcher::{Command, CommandResult};

/// The workflows command implementation.
pub struct WorkflowsCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    args: WorkflowsArgs,
}

impl WorkflowsCommand {
    /// Create a new workflows command.
    pub fn new(project_root: &Path, cli: &Cli, args: WorkflowsArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: cli.config.clone(),
            args,
        }
    }
}

impl Command for WorkflowsCommand {
    fn execute(&self, logger: &mut dyn Logger) -> Result<CommandResult> {
        let paths = ConfigPaths::discover(&self.project_root, self.config.as_deref(), None);
        let config = load_config_file(&paths.config)?;

        if self.args.id_only {
            let (runnable, _) = config.workflow_ids();
            for id in runnable {
                logger.print(id);
            }
        } else {
            print_available_workflows(&config, logger);
        }
        Ok(CommandResult::success())
    }
}

/// Print runnable workflows, then utility workflows with a note about them.
pub fn print_available_workflows(config: &RelayConfig, logger: &mut dyn Logger) {
    let (runnable, utility) = config.workflow_ids();

    if runnable.is_empty() {
        logger.print("No workflows are available!");
    } else {
        logger.print("The following workflows are available:");
        for id in runnable {
            logger.print(&format!(" * {}", id));
        }
        logger.print("");
        logger.print("You can run a selected workflow with:");
        logger.print("$ relay run WORKFLOW-ID");
        logger.print("");
    }

    if !utility.is_empty() {
        logger.print("");
        logger.print("The following utility workflows are defined:");
        for id in utility {
            logger.print(&format!(" * {}", id));
        }
        logger.print("");
        print_utility_workflows_note(logger);
        logger.print("");
    }
}

/// Explain why `_`-prefixed workflows can't be run directly.
pub fn print_utility_workflows_note(logger: &mut dyn Logger) {
    logger.print("Note about utility workflows:");
    logger.print(" Utility workflow names start with '_' (example: _my_utility_workflow).");
    logger.print(" These workflows can't be triggered directly, but can be used by other workflows");
    logger.print(" in the before_run and after_run lists.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::log::{new_logger, LoggerOpts, LoggerType, SharedBuffer};

    fn listing(yaml: &str) -> String {
        let config = parse_config(yaml, Path::new("relay.yml")).unwrap();
        let buffer = SharedBuffer::new();
        let mut logger = new_logger(&LoggerOpts::new(LoggerType::Console, buffer.sink()));
        print_available_workflows(&config, logger.as_mut());
        buffer.contents()
    }

    #[test]
    fn lists_plain_before_utility_sorted() {
        let out = listing(
            r#"
workflows:
  zeta: {}
  alpha: {}
  _util: {}
"#,
        );
        let alpha = out.find(" * alpha").unwrap();
        let zeta = out.find(" * zeta").unwrap();
        let util = out.find(" * _util").unwrap();
        assert!(alpha < zeta && zeta < util);
        assert!(out.contains("$ relay run WORKFLOW-ID"));
        assert!(out.contains("Note about utility workflows:"));
    }

    #[test]
    fn reports_no_workflows() {
        let out = listing("workflows: {}\n");
        assert!(out.contains("No workflows are available!"));
        assert!(!out.contains("utility"));
    }
}
