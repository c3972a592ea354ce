//! Workflow execution: the runner, its results, lifecycle events and
//! telemetry.

pub mod events;
pub mod results;
pub mod telemetry;
pub mod workflow;

pub use events::{EventBus, EventHandler, PluginHook, RunEvent, RunEventKind};
pub use results::{BuildRunResults, StepRunResult, StepRunStatus, WorkflowRunResult};
pub use telemetry::{TelemetryEvent, TelemetrySink, Tracker};
pub use workflow::{RunConfig, WorkflowRunner};
