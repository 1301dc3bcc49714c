//! Error types for the execution engine and the shell around it.
//!
//! The engine reports five kinds of failure (see [`ErrorKind`]): malformed
//! construction input, out-of-range offsets and depths, inconsistent stack
//! manipulation, the per-subcommand execution limit, and errors raised by
//! phase handlers. None of them are retried by the engine; the shell's
//! top-level loop decides what to do with them.
//!
//! # Example
//!
//! ```rust
//! use pipeshell::errors::{EngineError, ErrorKind};
//!
//! let err = EngineError::bounds("get_data", "offset 4 is out of range for 2 items");
//! assert_eq!(err.kind(), ErrorKind::Bounds);
//! assert!(err.to_string().contains("get_data"));
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::engine::{CommandPath, Phase};

/// Coarse classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed stage list, empty stage, invalid engine configuration.
    Construction,
    /// Offsets, ranges or stack depths outside their valid bounds.
    Bounds,
    /// Stack manipulation that would break the frame invariants.
    Consistency,
    /// A subcommand phase ran more often than the execution limit allows.
    ExecutionLimit,
    /// A phase handler returned an error.
    Handler,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction => write!(f, "construction"),
            Self::Bounds => write!(f, "bounds"),
            Self::Consistency => write!(f, "consistency"),
            Self::ExecutionLimit => write!(f, "execution_limit"),
            Self::Handler => write!(f, "handler"),
        }
    }
}

/// Where the engine was when a run failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureContext {
    /// Index of the stage (depth) the failing subcommand belongs to.
    pub stage_index: usize,
    /// Index of the subcommand inside its stage.
    pub subcommand_index: usize,
    /// Registered name of the subcommand.
    pub subcommand: String,
    /// Full command path of the failing frame.
    pub path: CommandPath,
    /// Phase that was being dispatched.
    pub phase: Phase,
    /// The data item the phase was invoked with.
    pub item: Option<Value>,
}

impl fmt::Display for FailureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subcommand '{}' (stage {}, index {}, path {}, phase {})",
            self.subcommand, self.stage_index, self.subcommand_index, self.path, self.phase
        )?;
        if let Some(item) = &self.item {
            write!(f, " on item {}", item)?;
        }
        Ok(())
    }
}

/// Errors produced by [`crate::engine::Engine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The stage list or one of its stages is not usable.
    #[error("invalid engine construction: {0}")]
    Construction(String),

    /// An API call needed a frame but the stack is drained.
    #[error("{operation}: no frame on the execution stack")]
    EmptyStack { operation: &'static str },

    /// An offset, range or depth is out of bounds.
    #[error("{operation}: {message}")]
    Bounds {
        operation: &'static str,
        message: String,
    },

    /// A mutation would break stack or stage invariants.
    #[error("{operation}: {message}")]
    Consistency {
        operation: &'static str,
        message: String,
    },

    /// A subcommand phase exceeded the execution limit.
    #[error("execution limit of {limit} reached by {context}")]
    ExecutionLimit {
        limit: u32,
        context: Box<FailureContext>,
    },

    /// A phase handler failed.
    #[error("{context} failed: {source}")]
    Handler {
        context: Box<FailureContext>,
        #[source]
        source: anyhow::Error,
    },

    /// `execute` was called from inside a running phase handler.
    #[error("execute: the engine is already running")]
    Reentrant,

    /// The engine aborted an earlier run and cannot be reused.
    #[error("execute: the engine failed during a previous run and must be rebuilt")]
    Poisoned,
}

impl EngineError {
    /// Create a bounds error.
    pub fn bounds(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Bounds {
            operation,
            message: message.into(),
        }
    }

    /// Create a consistency error.
    pub fn consistency(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Consistency {
            operation,
            message: message.into(),
        }
    }

    /// Create a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Construction(_) => ErrorKind::Construction,
            Self::EmptyStack { .. } | Self::Bounds { .. } => ErrorKind::Bounds,
            Self::Consistency { .. } | Self::Reentrant | Self::Poisoned => {
                ErrorKind::Consistency
            }
            Self::ExecutionLimit { .. } => ErrorKind::ExecutionLimit,
            Self::Handler { .. } => ErrorKind::Handler,
        }
    }

    /// Execution context attached to limit and handler failures.
    pub fn context(&self) -> Option<&FailureContext> {
        match self {
            Self::ExecutionLimit { context, .. } | Self::Handler { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The engine error a handler propagated, if the handler failed on one.
    ///
    /// Handlers that call back into the engine API usually forward its
    /// errors with `?`; this digs them back out of the handler wrapper.
    pub fn inner_engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Handler { source, .. } => source.downcast_ref::<EngineError>(),
            _ => None,
        }
    }
}

/// Errors raised while binding arguments for a phase handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgError {
    /// A mandatory argument received no values.
    #[error("missing value for argument '{0}'")]
    Missing(String),

    /// An argument received some values, but fewer than its minimum.
    #[error("argument '{name}' needs at least {minimum} value(s), got {got}")]
    NotEnough {
        name: String,
        minimum: usize,
        got: usize,
    },

    /// The binder itself is malformed.
    #[error("invalid argument specification: {0}")]
    Specification(String),
}

/// Errors surfaced by the shell layer (resolution, configuration, I/O).
#[derive(Debug, Error)]
pub enum ShellError {
    /// No registered command matches the segment.
    #[error("unknown command: '{0}'")]
    UnknownCommand(String),

    /// A pipeline segment contains no tokens.
    #[error("empty command in pipeline '{0}'")]
    EmptyCommand(String),

    /// A command path was registered twice.
    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),

    /// A configured addon is not known.
    #[error("unknown addon: '{0}'")]
    UnknownAddon(String),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error{}: {message}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Argument binding failed.
    #[error(transparent)]
    Args(#[from] ArgError),

    /// The engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// I/O errors (script files, stdin).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ShellError {
    /// Create a configuration error without a file path.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error tied to a file.
    pub fn config_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

/// Result alias for shell-level operations.
pub type Result<T> = std::result::Result<T, ShellError>;
