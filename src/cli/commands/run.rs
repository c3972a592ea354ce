//! Run command implementation.
//!
//! The `relay run` command executes a workflow with its before_run and
//! after_run workflows.

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, RunArgs};
use crate::config::{
    is_utility_workflow, load_config_file, load_inventory_file, ConfigPaths, RelayConfig,
};
use crate::error::{RelayError, Result};
use crate::log::{Logger, LoggerOpts};
use crate::modes::{EnvLookup, ModeFlags, RunModes};
use crate::runner::{PluginHook, RunConfig, WorkflowRunner};
use crate::steps::ShellStepExecutor;

use super::dispatcher::{Command, CommandResult};
use super::workflows::{print_available_workflows, print_utility_workflows_note};

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    config: Option<PathBuf>,
    inventory: Option<PathBuf>,
    flags: ModeFlags,
    args: RunArgs,
    logger_opts: LoggerOpts,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, cli: &Cli, args: RunArgs, logger_opts: LoggerOpts) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config: cli.config.clone(),
            inventory: cli.inventory.clone(),
            flags: cli.mode_flags(args.secret_filtering),
            args,
            logger_opts,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Reject a missing or utility target, printing what could be run.
    fn check_target(&self, config: &RelayConfig, logger: &mut dyn Logger) -> Result<()> {
        let workflow = self.args.workflow_id();
        if workflow.is_empty() {
            print_available_workflows(config, logger);
            return Err(RelayError::WorkflowNotSpecified);
        }
        if is_utility_workflow(workflow) {
            print_utility_workflows_note(logger);
            return Err(RelayError::UtilityWorkflow {
                workflow: workflow.to_string(),
            });
        }
        Ok(())
    }
}

impl Command for RunCommand {
    fn execute(&self, logger: &mut dyn Logger) -> Result<CommandResult> {
        let paths = ConfigPaths::discover(
            &self.project_root,
            self.config.as_deref(),
            self.inventory.as_deref(),
        );
        let config = load_config_file(&paths.config)?;
        let secrets = match &paths.inventory {
            Some(path) => load_inventory_file(path)?,
            None => Vec::new(),
        };

        self.check_target(&config, logger)?;

        let modes = RunModes::resolve(&self.flags, &EnvLookup::from_process(&secrets))?;
        let hooks = PluginHook::from_configs(&config.plugins);

        let run_config = RunConfig {
            modes,
            config,
            secrets,
            workflow: self.args.workflow_id().to_string(),
            cwd: Some(self.project_root.clone()),
        };
        let opts = self.logger_opts.clone().with_debug(modes.debug_mode);
        let mut runner = hooks.into_iter().fold(
            WorkflowRunner::new(run_config, Box::new(ShellStepExecutor), opts),
            WorkflowRunner::with_event_handler,
        );

        match runner.run_workflows_with_setup() {
            Ok(_) => Ok(CommandResult::success()),
            Err(RelayError::RunFailed { exit_code }) => Ok(CommandResult::failure(exit_code)),
            Err(err) => Err(err),
        }
    }
}
