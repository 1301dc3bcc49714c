//! Stack-based pipeline execution engine.
//!
//! A resolved command line is an ordered list of [`PipelineStage`]s, one per
//! depth of the command tree. The [`Engine`] drives every data item through
//! the three [`Phase`]s of the subcommands it reaches:
//!
//! - PRE runs top-down, descending one stage per call and fanning each item
//!   out to every sibling subcommand allowed by the bunch's [`CmdRange`];
//! - PROCESS runs once per item at the deepest stage;
//! - POST runs bottom-up, bubbling results back to the root stage, where
//!   they become terminal outputs.
//!
//! The whole state of a run is an [`ExecutionStack`] of
//! [`ExecutionFrame`]s. Phase handlers receive the engine itself and may
//! reshape the frame they run for (split, merge, restrict, inject) through
//! the navigation and mutation methods on [`Engine`].
//!
//! # Example
//!
//! ```rust
//! use pipeshell::engine::{Engine, PhaseOutput, PipelineStage, SubCommand};
//! use serde_json::Value;
//!
//! let cmd = SubCommand::new("shout")
//!     .with_pre(|_, _| Ok(PhaseOutput::multi(["a", "b"])))
//!     .with_process(|_, args| Ok(format!("{}!", args.first_str().unwrap_or("")).into()))
//!     .with_post(|_, args| Ok(args.first_str().unwrap_or("").to_uppercase().into()));
//!
//! let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
//! let outputs = engine.execute().unwrap();
//! assert_eq!(outputs, vec![Value::from("A!"), Value::from("B!")]);
//! ```

mod bunch;
mod frame;
mod interpreter;
mod mutation;
mod navigation;
mod phase;
mod snapshot;
mod stage;
mod subcommand;

pub use bunch::{CmdRange, DataBunch};
pub use frame::{CommandPath, ExecutionFrame, ExecutionStack};
pub use phase::Phase;
pub use snapshot::ExecutionSnapshot;
pub use stage::PipelineStage;
pub use subcommand::{PhaseCounters, PhaseFn, PhaseOutput, SubCommand};

use serde_json::Value;

use crate::config::EngineConfig;
use crate::env::Environment;
use crate::errors::EngineError;

/// Default cap on how often one subcommand phase may run during a run.
pub const DEFAULT_EXECUTION_LIMIT: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Ready,
    Running,
    Finished,
    Failed,
}

/// Interpreter over a resolved list of pipeline stages.
///
/// An engine runs one command line. After a failed run it refuses to run
/// again; build a new one for the next line.
#[derive(Debug)]
pub struct Engine {
    stages: Vec<PipelineStage>,
    stack: ExecutionStack,
    env: Environment,
    config: EngineConfig,
    state: RunState,
}

impl Engine {
    /// Build an engine with the default configuration.
    pub fn new(stages: Vec<PipelineStage>, env: Option<Environment>) -> Result<Self, EngineError> {
        Self::with_config(stages, env, EngineConfig::default())
    }

    /// Build an engine. Every stage is reset (injected subcommands dropped,
    /// counters zeroed) and the stack is seeded with a single `Null` item
    /// at the root stage, PRE phase.
    pub fn with_config(
        mut stages: Vec<PipelineStage>,
        env: Option<Environment>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::construction)?;
        if stages.is_empty() {
            return Err(EngineError::construction("the stage list is empty"));
        }
        for (index, stage) in stages.iter_mut().enumerate() {
            stage.reset();
            if stage.is_empty() {
                return Err(EngineError::construction(format!(
                    "stage {} ('{}') has no subcommands",
                    index,
                    stage.name()
                )));
            }
        }

        let mut stack = ExecutionStack::new();
        stack.push(ExecutionFrame::new(
            DataBunch::seed(),
            CommandPath::root(),
            Phase::Pre,
        ));

        Ok(Self {
            stages,
            stack,
            env: env.unwrap_or_default(),
            config,
            state: RunState::Ready,
        })
    }

    /// Replace the initial `[Null]` bunch before the run starts.
    pub fn seed(&mut self, values: Vec<Value>) -> Result<(), EngineError> {
        if self.state != RunState::Ready {
            return Err(EngineError::consistency(
                "seed",
                "the engine has already started running",
            ));
        }
        self.stack.clear();
        self.stack.push(ExecutionFrame::new(
            DataBunch::new(values),
            CommandPath::root(),
            Phase::Pre,
        ));
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Consume the engine, keeping the environment handlers left behind.
    pub fn into_env(self) -> Environment {
        self.env
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&PipelineStage> {
        self.stages.get(index)
    }

    pub fn stack(&self) -> &ExecutionStack {
        &self.stack
    }

    /// Counters of the subcommand at `index` of stage `stage`.
    pub fn counters(&self, stage: usize, index: usize) -> Option<PhaseCounters> {
        self.stages
            .get(stage)
            .and_then(|s| s.get(index))
            .map(SubCommand::counters)
    }

    /// Whether the last run aborted with an error.
    pub fn has_failed(&self) -> bool {
        self.state == RunState::Failed
    }
}
