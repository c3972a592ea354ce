//! Shell command execution.

pub mod command;

pub use command::{
    execute, execute_streaming, CommandOptions, CommandResult, OutputChunk, TimeoutKind,
};
