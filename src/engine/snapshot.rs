use serde::Serialize;
use serde_json::Value;

use super::{CommandPath, Engine, Phase};

/// Where the engine currently stands, for diagnostics and error reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionSnapshot {
    pub stage_index: usize,
    pub subcommand_index: usize,
    /// `None` when the path points at no registered subcommand.
    pub subcommand: Option<String>,
    /// The item the next phase call receives.
    pub item: Option<Value>,
    pub phase: Phase,
    pub path: CommandPath,
    pub stack_depth: usize,
}

impl Engine {
    /// Describe the top frame, or `None` once the stack is drained.
    pub fn snapshot(&self) -> Option<ExecutionSnapshot> {
        let frame = self.stack.top()?;
        let stage_index = frame.path.stage_index();
        let subcommand_index = frame.path.current();
        let subcommand = self
            .stages
            .get(stage_index)
            .and_then(|stage| stage.get(subcommand_index))
            .map(|cmd| cmd.name().to_string());

        Some(ExecutionSnapshot {
            stage_index,
            subcommand_index,
            subcommand,
            item: frame.data.first().cloned(),
            phase: frame.phase,
            path: frame.path.clone(),
            stack_depth: self.stack.len(),
        })
    }
}
