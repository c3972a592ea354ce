//! Relay - a workflow runner for CI and local automation.
//!
//! Relay reads workflows from a YAML config, expands `before_run` and
//! `after_run` references into an execution plan, and runs each step as a
//! shell script. Step output is streamed through secret redaction and
//! error collection before it reaches the console or JSON log.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`log`] - Console and JSON loggers
//! - [`modes`] - Run mode resolution from flags and environment
//! - [`output`] - Step output pipeline
//! - [`plan`] - Execution plan construction
//! - [`runner`] - Workflow execution and run results
//! - [`shell`] - Shell command execution
//! - [`steps`] - Step resolution and execution
//!
//! # Example
//!
//! ```
//! use relay::config::parse_config;
//! use relay::modes::RunModes;
//! use relay::plan::build_plan;
//! use std::path::Path;
//!
//! let yaml = r#"
//! workflows:
//!   primary:
//!     before_run: [_setup]
//!     steps:
//!       - test:
//!           script: cargo test
//!   _setup:
//!     steps:
//!       - fetch:
//!           script: cargo fetch
//! "#;
//! let config = parse_config(yaml, Path::new("relay.yml")).unwrap();
//! let mut next = 0;
//! let mut ids = move || {
//!     next += 1;
//!     format!("id-{}", next)
//! };
//! let plan = build_plan(&RunModes::default(), "primary", &config.workflows, &mut ids).unwrap();
//! assert_eq!(plan.workflow_ids(), vec!["_setup", "primary"]);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod modes;
pub mod output;
pub mod plan;
pub mod runner;
pub mod shell;
pub mod steps;

pub use error::{RelayError, Result};
