//! pipeshell: an interactive command shell whose command lines run on a
//! stack-based, three-phase pipeline engine.
//!
//! - [`engine`] interprets a resolved list of stages.
//! - [`registry`] turns a text line into those stages.
//! - [`addons`] bundle the commands a shell registers.
//! - [`cli`] hosts the script and interactive loops.

// Export modules for library usage
pub mod addons;
pub mod args;
pub mod cli;
pub mod config;
pub mod engine;
pub mod env;
pub mod errors;
pub mod registry;

// Re-export commonly used types
pub use crate::args::{ArgBinder, ArgFeeder, ArgSpec, Args};
pub use crate::config::{EngineConfig, ShellConfig};
pub use crate::engine::{
    CmdRange, CommandPath, Engine, ExecutionSnapshot, Phase, PhaseOutput, PipelineStage,
    SubCommand, DEFAULT_EXECUTION_LIMIT,
};
pub use crate::env::Environment;
pub use crate::errors::{EngineError, ErrorKind, ShellError};
pub use crate::registry::Registry;
