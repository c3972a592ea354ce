//! Step resolution and execution.
//!
//! - [`ResolvedStep`] - a library definition merged with a step reference
//! - [`StepExecutor`] - the seam the workflow runner executes steps through
//! - [`ShellStepExecutor`] - the built-in executor running `sh -c <script>`
//!
//! # Example
//!
//! ```no_run
//! use relay::config::{StepOverride, StepReference};
//! use relay::log::{stdout_sink, LoggerOpts, LoggerType};
//! use relay::output::{PipelineSpec, StepOutputWriter};
//! use relay::steps::{ResolvedStep, ShellStepExecutor, StepEnv, StepExecutor};
//! use std::collections::HashMap;
//!
//! let reference = StepReference::with_overrides(
//!     "hello",
//!     StepOverride {
//!         script: Some("echo hello".to_string()),
//!         ..Default::default()
//!     },
//! );
//! let step = ResolvedStep::resolve(&reference, &HashMap::new()).unwrap();
//!
//! let opts = LoggerOpts::new(LoggerType::Console, stdout_sink());
//! let mut output = StepOutputWriter::new(&PipelineSpec::default(), &opts);
//! let outcome = ShellStepExecutor
//!     .execute(&step, &StepEnv::default(), &mut output)
//!     .unwrap();
//! output.close().unwrap();
//! assert!(outcome.success);
//! ```

pub mod executor;
pub mod resolved;

pub use executor::{ShellStepExecutor, StepEnv, StepExecutor, StepOutcome};
pub use resolved::ResolvedStep;
