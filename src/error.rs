//! Error types for relay operations.
//!
//! This module defines [`RelayError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `RelayError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `RelayError::Other`) for unexpected errors
//! - Step failures are not errors: they are recorded in the build results

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// No workflow was given on the command line.
    #[error("No workflow specified")]
    WorkflowNotSpecified,

    /// A utility workflow (`_` prefixed) was targeted directly.
    #[error("Utility workflows can't be triggered directly: {workflow}")]
    UtilityWorkflow { workflow: String },

    /// The targeted workflow does not exist.
    #[error("Specified workflow ({workflow}) does not exist")]
    WorkflowNotFound { workflow: String },

    /// before_run / after_run references form a cycle.
    #[error("Workflow cycle detected: {cycle}")]
    WorkflowCycle { cycle: String },

    /// The execution plan came out empty.
    #[error("Execution plan doesn't have any workflow to run")]
    NothingToRun,

    /// A run mode value from the environment could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidRunMode { key: String, value: String },

    /// Step execution failed before the step process could report a status.
    #[error("Step '{step}' failed: {message}")]
    StepExecutionError { step: String, message: String },

    /// Shell command failed.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// The run finished with at least one failed step.
    #[error("Workflow run failed (exit code: {exit_code})")]
    RunFailed { exit_code: i32 },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RelayError {
    /// Whether this error is an argument problem that should be preceded by
    /// the list of available workflows.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            RelayError::WorkflowNotSpecified | RelayError::UtilityWorkflow { .. }
        )
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_displays_path() {
        let err = RelayError::ConfigNotFound {
            path: PathBuf::from("/foo/relay.yml"),
        };
        assert!(err.to_string().contains("/foo/relay.yml"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = RelayError::ConfigParseError {
            path: PathBuf::from("/relay.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/relay.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn workflow_cycle_displays_cycle() {
        let err = RelayError::WorkflowCycle {
            cycle: "a -> b -> a".into(),
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn workflow_not_found_displays_id() {
        let err = RelayError::WorkflowNotFound {
            workflow: "deploy".into(),
        };
        assert_eq!(err.to_string(), "Specified workflow (deploy) does not exist");
    }

    #[test]
    fn invalid_run_mode_displays_key_and_value() {
        let err = RelayError::InvalidRunMode {
            key: "CI".into(),
            value: "maybe".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("CI"));
        assert!(msg.contains("maybe"));
    }

    #[test]
    fn run_failed_displays_exit_code() {
        let err = RelayError::RunFailed { exit_code: 1 };
        assert!(err.to_string().contains("exit code: 1"));
    }

    #[test]
    fn argument_errors_are_classified() {
        assert!(RelayError::WorkflowNotSpecified.is_argument_error());
        assert!(RelayError::UtilityWorkflow {
            workflow: "_setup".into()
        }
        .is_argument_error());
        assert!(!RelayError::NothingToRun.is_argument_error());
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(RelayError::ConfigValidationError {
                message: "test".into(),
            })
        }
        assert!(returns_error().is_err());
    }
}
