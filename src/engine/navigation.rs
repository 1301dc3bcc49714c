//! Access to the top bunch and introspection of the running frame.
//!
//! Every operation here works on the frame on top of the stack, which is
//! the frame whose phase is being dispatched while a handler runs.

use serde_json::Value;

use super::{CommandPath, Engine, ExecutionFrame, Phase, PipelineStage, SubCommand};
use crate::errors::EngineError;

impl Engine {
    pub(crate) fn top_frame(&self, operation: &'static str) -> Result<&ExecutionFrame, EngineError> {
        self.stack.top().ok_or(EngineError::EmptyStack { operation })
    }

    pub(crate) fn top_frame_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut ExecutionFrame, EngineError> {
        self.stack.top_mut().ok_or(EngineError::EmptyStack { operation })
    }

    /// Item at `offset` of the top bunch.
    pub fn get_data(&self, offset: usize) -> Result<&Value, EngineError> {
        let frame = self.top_frame("get_data")?;
        frame
            .data
            .get(offset)
            .ok_or_else(|| out_of_range("get_data", offset, frame.data.len()))
    }

    /// Replace the item at `offset` of the top bunch.
    pub fn set_data(&mut self, offset: usize, value: Value) -> Result<(), EngineError> {
        let frame = self.top_frame_mut("set_data")?;
        let len = frame.data.len();
        let slot = frame
            .data
            .get_mut(offset)
            .ok_or_else(|| out_of_range("set_data", offset, len))?;
        *slot = value;
        Ok(())
    }

    /// Insert `value` before `offset` in the top bunch.
    ///
    /// Offset 0 would slip the new value in front of the item currently
    /// being processed and is refused unless the engine was configured
    /// with `allow_front_insert`.
    pub fn add_data(&mut self, offset: usize, value: Value) -> Result<(), EngineError> {
        let allow_front = self.config.allow_front_insert;
        let frame = self.top_frame_mut("add_data")?;
        if offset == 0 && !allow_front && !frame.data.is_empty() {
            return Err(EngineError::consistency(
                "add_data",
                "inserting before the active item is disabled (allow_front_insert = false)",
            ));
        }
        if offset > frame.data.len() {
            return Err(EngineError::bounds(
                "add_data",
                format!(
                    "offset {} is past the end of a bunch of {} item(s)",
                    offset,
                    frame.data.len()
                ),
            ));
        }
        frame.data.insert(offset, value);
        Ok(())
    }

    /// Remove and return the item at `offset` of the top bunch.
    pub fn remove_data(&mut self, offset: usize) -> Result<Value, EngineError> {
        let frame = self.top_frame_mut("remove_data")?;
        let len = frame.data.len();
        frame
            .data
            .remove(offset)
            .ok_or_else(|| out_of_range("remove_data", offset, len))
    }

    /// Drop every item of the top bunch; the frame is popped unprocessed.
    pub fn flush_data(&mut self) -> Result<(), EngineError> {
        self.top_frame_mut("flush_data")?.data.clear();
        Ok(())
    }

    pub fn has_next_data(&self) -> Result<bool, EngineError> {
        Ok(self.remaining_data_count()? > 0)
    }

    /// Items queued behind the active one.
    pub fn remaining_data_count(&self) -> Result<usize, EngineError> {
        Ok(self
            .top_frame("remaining_data_count")?
            .data
            .len()
            .saturating_sub(1))
    }

    pub fn current_phase(&self) -> Result<Phase, EngineError> {
        Ok(self.top_frame("current_phase")?.phase)
    }

    pub fn current_path(&self) -> Result<&CommandPath, EngineError> {
        Ok(&self.top_frame("current_path")?.path)
    }

    /// Copy of the top bunch.
    pub fn current_data(&self) -> Result<Vec<Value>, EngineError> {
        Ok(self.top_frame("current_data")?.data.to_vec())
    }

    /// Effective `(start, stop)` bounds of the top bunch, both inclusive.
    pub fn current_cmd_range(&self) -> Result<(usize, usize), EngineError> {
        let frame = self.top_frame("current_cmd_range")?;
        let stage = self.stage_for(frame, "current_cmd_range")?;
        let range = frame.data.effective_range();
        Ok((range.start, range.effective_stop(stage.len())))
    }

    pub fn current_stage(&self) -> Result<&PipelineStage, EngineError> {
        let frame = self.top_frame("current_stage")?;
        self.stage_for(frame, "current_stage")
    }

    pub fn current_subcommand(&self) -> Result<&SubCommand, EngineError> {
        let frame = self.top_frame("current_subcommand")?;
        let index = frame.path.current();
        self.stage_for(frame, "current_subcommand")?
            .get(index)
            .ok_or_else(|| {
                EngineError::bounds(
                    "current_subcommand",
                    format!("no subcommand at path {}", frame.path),
                )
            })
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty_stack(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn is_last_stack_item(&self) -> bool {
        self.stack.len() == 1
    }

    pub(crate) fn stage_for(
        &self,
        frame: &ExecutionFrame,
        operation: &'static str,
    ) -> Result<&PipelineStage, EngineError> {
        let index = frame.path.stage_index();
        self.stages.get(index).ok_or_else(|| {
            EngineError::bounds(
                operation,
                format!("path {} points past the last stage", frame.path),
            )
        })
    }
}

fn out_of_range(operation: &'static str, offset: usize, len: usize) -> EngineError {
    EngineError::bounds(
        operation,
        format!("offset {} is out of range for {} item(s)", offset, len),
    )
}
