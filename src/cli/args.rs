//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::log::{stdout_sink, LoggerOpts, LoggerType};
use crate::modes::ModeFlags;

/// Relay - run workflows of shell steps locally or in CI.
#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides default relay.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the secrets inventory (overrides default .relay.secrets.yml)
    #[arg(short, long, global = true)]
    pub inventory: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Run in CI mode
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub ci: Option<bool>,

    /// Run in pull request mode
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub pr: Option<bool>,

    /// Enable debug logging
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub debug: Option<bool>,

    /// Log format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "console",
        env = "RELAY_OUTPUT_FORMAT"
    )]
    pub output_format: OutputFormat,

    /// Prefix console log lines with a timestamp
    #[arg(long, global = true)]
    pub timestamps: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Logger options for this invocation, writing to stdout.
    pub fn logger_opts(&self) -> LoggerOpts {
        LoggerOpts::new(self.output_format.into(), stdout_sink())
            .with_timestamps(self.timestamps)
            .with_debug(self.debug.unwrap_or(false))
    }

    /// Run-mode flags given on the command line.
    pub fn mode_flags(&self, secret_filtering: Option<bool>) -> ModeFlags {
        ModeFlags {
            ci: self.ci,
            pr: self.pr,
            debug: self.debug,
            secret_filtering,
        }
    }
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

impl From<OutputFormat> for LoggerType {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Console => LoggerType::Console,
            OutputFormat::Json => LoggerType::Json,
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a workflow
    #[command(alias = "r")]
    Run(RunArgs),

    /// List the workflows defined in the config
    Workflows(WorkflowsArgs),

    /// Print version information
    Version(VersionArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Workflow to run
    #[arg(value_name = "WORKFLOW")]
    pub target: Option<String>,

    /// Workflow to run (alternative to the positional argument)
    #[arg(short, long, conflicts_with = "target")]
    pub workflow: Option<String>,

    /// Hide secret values from the log
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub secret_filtering: Option<bool>,
}

impl RunArgs {
    /// The requested workflow ID, empty when none was given.
    pub fn workflow_id(&self) -> &str {
        self.target
            .as_deref()
            .or(self.workflow.as_deref())
            .unwrap_or("")
    }
}

/// Arguments for the `workflows` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct WorkflowsArgs {
    /// Print only the runnable workflow IDs, one per line
    #[arg(long)]
    pub id_only: bool,
}

/// Arguments for the `version` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct VersionArgs {
    /// Include build details
    #[arg(long)]
    pub full: bool,
}
