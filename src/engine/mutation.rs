//! Operations that reshape the stack or the stages during a run.
//!
//! They are meant to be called from phase handlers. Each one validates its
//! input completely before touching anything, so a rejected call leaves
//! the stack as it was.

use tracing::debug;

use super::{CmdRange, Engine, ExecutionFrame, Phase, PipelineStage, SubCommand};
use crate::errors::EngineError;

impl Engine {
    /// Restrict the bunch of the frame `depth` positions below the top to
    /// the subcommands `[start, stop]` of its stage (`stop = None` reaches
    /// the last entry, including ones injected later).
    ///
    /// Only PRE frames carry meaningful bounds. A waiting frame whose index
    /// still sits on its old range start is moved to the new start.
    pub fn set_cmd_range(
        &mut self,
        start: usize,
        stop: Option<usize>,
        depth: usize,
    ) -> Result<(), EngineError> {
        const OP: &str = "set_cmd_range";

        if self.stack.is_empty() {
            return Err(EngineError::EmptyStack { operation: OP });
        }
        let frame = self.stack.peek(depth).ok_or_else(|| {
            EngineError::bounds(
                OP,
                format!("depth {} is beyond a stack of {} frame(s)", depth, self.stack.len()),
            )
        })?;
        let (range, current) = self.checked_range(frame, start, stop, depth > 0, OP)?;

        if let Some(frame) = self.stack.peek_mut(depth) {
            frame.data.set_range(Some(range));
            frame.path.set_current(current);
        }
        Ok(())
    }

    /// Isolate items `[start_data, start_data + data_len)` of the top bunch
    /// (to the end when `data_len` is `None`) into their own frame and
    /// restrict it to the `cmd_len` subcommands starting at `first_cmd`.
    pub fn set_data_cmd_range(
        &mut self,
        start_data: usize,
        data_len: Option<usize>,
        first_cmd: usize,
        cmd_len: Option<usize>,
    ) -> Result<(), EngineError> {
        const OP: &str = "set_data_cmd_range";

        let frame = self.top_frame(OP)?;
        let len = frame.data.len();
        if start_data >= len {
            return Err(EngineError::bounds(
                OP,
                format!("start offset {} is out of range for {} item(s)", start_data, len),
            ));
        }
        let end = match data_len {
            Some(0) => {
                return Err(EngineError::bounds(OP, "the data length must be at least 1"));
            }
            Some(n) => match start_data.checked_add(n) {
                Some(end) if end <= len => end,
                _ => {
                    return Err(EngineError::bounds(
                        OP,
                        format!(
                            "{} item(s) from offset {} exceed a bunch of {}",
                            n, start_data, len
                        ),
                    ));
                }
            },
            None => len,
        };
        let stop = match cmd_len {
            Some(0) => {
                return Err(EngineError::bounds(OP, "the command length must be at least 1"));
            }
            Some(n) => Some(first_cmd.checked_add(n - 1).ok_or_else(|| {
                EngineError::bounds(
                    OP,
                    format!("{} command(s) from index {} overflow", n, first_cmd),
                )
            })?),
            None => None,
        };
        // The isolated frame ends up one below the top whenever a front
        // part is split away, and those waiting frames are repositioned.
        let depth = usize::from(start_data > 0);
        if depth == 0 {
            self.checked_range(frame, first_cmd, stop, false, OP)?;
        } else {
            self.checked_bounds(frame, first_cmd, stop, OP)?;
        }

        if end < len {
            self.split_data(end)?;
        }
        if start_data > 0 {
            self.split_data(start_data)?;
        }
        self.set_cmd_range(first_cmd, stop, depth)
    }

    /// Split the top bunch at `at`.
    ///
    /// `data[at..]` is pushed first and restarts at the range start, then
    /// `data[..at]` goes on top with the original path. Both parts keep the
    /// bounds. Splitting at 0, or a bunch of one item, changes nothing.
    pub fn split_data(&mut self, at: usize) -> Result<(), EngineError> {
        const OP: &str = "split_data";

        let frame = self.top_frame(OP)?;
        if frame.phase != Phase::Pre {
            return Err(EngineError::consistency(
                OP,
                format!("cannot split a {} frame, only PRE frames fan out", frame.phase),
            ));
        }
        let len = frame.data.len();
        if at >= len {
            return Err(EngineError::bounds(
                OP,
                format!("split offset {} is out of range for {} item(s)", at, len),
            ));
        }
        if at == 0 || len < 2 {
            return Ok(());
        }

        let mut front = self
            .stack
            .pop()
            .ok_or(EngineError::EmptyStack { operation: OP })?;
        let back_data = front.data.split_off(at);
        let mut back_path = front.path.clone();
        back_path.set_current(back_data.effective_range().start);

        debug!(path = %front.path, at, back = back_data.len(), "split bunch");
        self.stack
            .push(ExecutionFrame::new(back_data, back_path, front.phase));
        self.stack.push(front);
        Ok(())
    }

    /// Pop the `count` top frames and concatenate their bunches, top first.
    ///
    /// All frames must share bounds, phase and path prefix; for PRE, every
    /// frame below the top must still sit on the range start, for the
    /// other phases on the same index as the top.
    pub fn merge_data_on_stack(&mut self, count: usize) -> Result<(), EngineError> {
        const OP: &str = "merge_data_on_stack";

        if count < 2 {
            return Ok(());
        }
        if self.stack.len() < count {
            return Err(EngineError::bounds(
                OP,
                format!(
                    "cannot merge {} frames from a stack of {}",
                    count,
                    self.stack.len()
                ),
            ));
        }

        let top = self.top_frame(OP)?;
        let range = top.data.effective_range();
        for depth in 1..count {
            let Some(frame) = self.stack.peek(depth) else {
                return Err(EngineError::bounds(OP, format!("no frame at depth {}", depth)));
            };
            if frame.data.effective_range() != range {
                return Err(EngineError::consistency(
                    OP,
                    format!("frame {} has different command bounds than the top", depth),
                ));
            }
            if frame.phase != top.phase {
                return Err(EngineError::consistency(
                    OP,
                    format!(
                        "frame {} is in phase {}, the top in phase {}",
                        depth, frame.phase, top.phase
                    ),
                ));
            }
            if frame.path.depth() != top.path.depth() || frame.path.prefix() != top.path.prefix() {
                return Err(EngineError::consistency(
                    OP,
                    format!(
                        "frame {} has path {}, incompatible with {}",
                        depth, frame.path, top.path
                    ),
                ));
            }
            let expected = match top.phase {
                Phase::Pre => range.start,
                Phase::Process | Phase::Post => top.path.current(),
            };
            if frame.path.current() != expected {
                return Err(EngineError::consistency(
                    OP,
                    format!(
                        "frame {} is at index {}, expected {}",
                        depth,
                        frame.path.current(),
                        expected
                    ),
                ));
            }
        }

        let mut merged = self
            .stack
            .pop()
            .ok_or(EngineError::EmptyStack { operation: OP })?;
        for _ in 1..count {
            if let Some(frame) = self.stack.pop() {
                merged.data.append(frame.data);
            }
        }
        debug!(path = %merged.path, count, items = merged.data.len(), "merged frames");
        self.stack.push(merged);
        Ok(())
    }

    /// Append `command` to the stage the top frame points into.
    ///
    /// The new index must fall inside the top bunch's bounds. With
    /// `only_once`, a command already injected under the same name is not
    /// added again and `Ok(false)` is returned. The command keeps its
    /// counters, so re-injecting a clone of the running command counts
    /// against the same execution limit.
    pub fn add_sub_command(
        &mut self,
        command: SubCommand,
        only_once: bool,
        use_args: bool,
    ) -> Result<bool, EngineError> {
        const OP: &str = "add_sub_command";

        let frame = self.top_frame(OP)?;
        let stage_index = frame.path.stage_index();
        let range = frame.data.effective_range();
        let new_index = self.stage_for(frame, OP)?.len();
        if new_index < range.start || range.stop.is_some_and(|stop| stop < new_index) {
            return Err(EngineError::consistency(
                OP,
                format!(
                    "index {} is outside the bounds [{}, {}] of the active bunch",
                    new_index,
                    range.start,
                    range.stop.map_or_else(|| "end".to_string(), |s| s.to_string())
                ),
            ));
        }

        let name = command.name().to_string();
        let added = self
            .stages
            .get_mut(stage_index)
            .map(|stage| stage.add_dynamic(command, only_once, use_args))
            .unwrap_or(false);
        debug!(stage = stage_index, subcommand = %name, added, "injected subcommand");
        Ok(added)
    }

    /// Append a new deepest stage.
    pub fn add_command(&mut self, mut stage: PipelineStage) -> Result<(), EngineError> {
        if stage.is_empty() {
            return Err(EngineError::construction(format!(
                "stage '{}' has no subcommands",
                stage.name()
            )));
        }
        stage.reset();
        self.stages.push(stage);
        Ok(())
    }

    /// Skip the next `count` siblings for the item being pre-processed.
    pub fn skip_next_command(&mut self, count: usize) -> Result<(), EngineError> {
        const OP: &str = "skip_next_command";

        let frame = self.top_frame_mut(OP)?;
        if frame.phase != Phase::Pre {
            return Err(EngineError::consistency(
                OP,
                "siblings can only be skipped while pre-processing",
            ));
        }
        let next = frame.path.current().saturating_add(count);
        frame.path.set_current(next);
        Ok(())
    }

    /// Clear the static arguments of every subcommand of `stage`, or of the
    /// stage the top frame points into.
    pub fn flush_args(&mut self, stage: Option<usize>) -> Result<(), EngineError> {
        const OP: &str = "flush_args";

        let index = match stage {
            Some(index) => index,
            None => self.top_frame(OP)?.path.stage_index(),
        };
        let count = self.stages.len();
        self.stages
            .get_mut(index)
            .ok_or_else(|| {
                EngineError::bounds(OP, format!("stage {} does not exist ({} stages)", index, count))
            })?
            .flush_args();
        Ok(())
    }

    /// Validate a `[start, stop]` restriction for `frame`. Returns the range
    /// and the index the frame should sit on once it is applied.
    fn checked_range(
        &self,
        frame: &ExecutionFrame,
        start: usize,
        stop: Option<usize>,
        waiting: bool,
        operation: &'static str,
    ) -> Result<(CmdRange, usize), EngineError> {
        let (range, stage_len) = self.checked_bounds(frame, start, stop, operation)?;
        let current = frame.path.current();
        if range.encloses(current, stage_len) {
            return Ok((range, current));
        }
        if waiting && current == frame.data.effective_range().start {
            return Ok((range, start));
        }
        Err(EngineError::bounds(
            operation,
            format!(
                "[{}, {}] does not enclose the current index {}",
                start,
                range.effective_stop(stage_len),
                current
            ),
        ))
    }

    /// Phase and stage-bound checks for a range, without enclosure.
    fn checked_bounds(
        &self,
        frame: &ExecutionFrame,
        start: usize,
        stop: Option<usize>,
        operation: &'static str,
    ) -> Result<(CmdRange, usize), EngineError> {
        if frame.phase != Phase::Pre {
            return Err(EngineError::consistency(
                operation,
                format!("a {} frame runs a single subcommand and takes no range", frame.phase),
            ));
        }
        let stage_len = self.stage_for(frame, operation)?.len();
        if start >= stage_len {
            return Err(EngineError::bounds(
                operation,
                format!("start {} is outside a stage of {} subcommand(s)", start, stage_len),
            ));
        }
        if let Some(stop) = stop {
            if stop < start || stop >= stage_len {
                return Err(EngineError::bounds(
                    operation,
                    format!(
                        "stop {} is outside [{}, {}]",
                        stop,
                        start,
                        stage_len.saturating_sub(1)
                    ),
                ));
            }
        }

        Ok((CmdRange::new(start, stop), stage_len))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use super::*;
    use crate::engine::{CommandPath, DataBunch, PhaseOutput};
    use crate::errors::ErrorKind;

    fn stage_of(names: &[&str]) -> PipelineStage {
        names
            .iter()
            .fold(PipelineStage::new("alts"), |stage, name| {
                stage.with_command(SubCommand::new(*name))
            })
    }

    fn engine(names: &[&str], items: Vec<Value>) -> Engine {
        let mut engine = Engine::new(vec![stage_of(names)], None).unwrap();
        engine.seed(items).unwrap();
        engine
    }

    fn items(n: i64) -> Vec<Value> {
        (0..n).map(Value::from).collect()
    }

    #[test]
    fn test_split_pushes_back_part_first() {
        let mut engine = engine(&["a", "b"], items(4));
        engine.split_data(1).unwrap();

        assert_eq!(engine.stack_size(), 2);
        assert_eq!(engine.current_data().unwrap(), vec![json!(0)]);
        let below = engine.stack().peek(1).unwrap();
        assert_eq!(below.data.to_vec(), vec![json!(1), json!(2), json!(3)]);
        assert_eq!(below.path, CommandPath::root());
    }

    #[test]
    fn test_split_noops_and_bounds() {
        let mut single = engine(&["a"], items(1));
        single.split_data(0).unwrap();
        assert_eq!(single.stack_size(), 1);

        let mut engine = engine(&["a"], items(3));
        engine.split_data(0).unwrap();
        assert_eq!(engine.stack_size(), 1);
        assert_eq!(engine.split_data(3).unwrap_err().kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_split_then_merge_restores_bunch() {
        let mut engine = engine(&["a", "b", "c"], items(5));
        engine.set_cmd_range(0, Some(1), 0).unwrap();
        engine.split_data(2).unwrap();
        engine.merge_data_on_stack(2).unwrap();

        assert_eq!(engine.stack_size(), 1);
        assert_eq!(engine.current_data().unwrap(), items(5));
        assert_eq!(engine.current_cmd_range().unwrap(), (0, 1));
    }

    #[test]
    fn test_merge_rejects_different_bounds() {
        let mut engine = engine(&["a", "b"], items(3));
        engine.split_data(1).unwrap();
        engine.set_cmd_range(0, Some(0), 0).unwrap();
        let err = engine.merge_data_on_stack(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(engine.stack_size(), 2);
    }

    #[test]
    fn test_merge_rejects_different_phases() {
        let mut engine = engine(&["a", "b"], items(3));
        engine.split_data(1).unwrap();
        if let Some(top) = engine.stack.top_mut() {
            top.phase = Phase::Process;
        }
        let err = engine.merge_data_on_stack(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(engine.stack_size(), 2);
    }

    #[test]
    fn test_merge_rejects_different_path_depth() {
        let mut engine = engine(&["a", "b"], items(3));
        engine.split_data(1).unwrap();
        if let Some(top) = engine.stack.top_mut() {
            top.path = top.path.descend();
        }
        let err = engine.merge_data_on_stack(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(engine.stack_size(), 2);
    }

    #[test]
    fn test_merge_rejects_different_path_prefix() {
        let stages = vec![stage_of(&["a", "b"]), stage_of(&["leaf"])];
        let mut engine = Engine::new(stages, None).unwrap();
        let mut second = CommandPath::root();
        second.set_current(1);
        for parent in [CommandPath::root(), second] {
            engine.stack.push(ExecutionFrame::new(
                DataBunch::new(items(1)),
                parent.descend(),
                Phase::Pre,
            ));
        }
        let err = engine.merge_data_on_stack(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(engine.stack_size(), 3);
    }

    #[test]
    fn test_merge_rejects_waiting_pre_frame_off_range_start() {
        let mut engine = engine(&["a", "b"], items(3));
        engine.split_data(1).unwrap();
        if let Some(below) = engine.stack.peek_mut(1) {
            below.path.set_current(1);
        }
        let err = engine.merge_data_on_stack(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
        assert_eq!(engine.stack_size(), 2);
    }

    #[test]
    fn test_merge_below_one_pair_is_noop() {
        let mut engine = engine(&["a"], items(2));
        engine.merge_data_on_stack(1).unwrap();
        engine.merge_data_on_stack(0).unwrap();
        assert_eq!(engine.stack_size(), 1);
        assert_eq!(engine.merge_data_on_stack(2).unwrap_err().kind(), ErrorKind::Bounds);
    }

    #[test]
    fn test_set_cmd_range_validation() {
        let mut engine = engine(&["a", "b", "c"], items(1));
        assert_eq!(engine.set_cmd_range(3, None, 0).unwrap_err().kind(), ErrorKind::Bounds);
        assert_eq!(engine.set_cmd_range(1, Some(0), 0).unwrap_err().kind(), ErrorKind::Bounds);
        assert_eq!(engine.set_cmd_range(0, Some(3), 0).unwrap_err().kind(), ErrorKind::Bounds);
        assert_eq!(engine.set_cmd_range(0, None, 1).unwrap_err().kind(), ErrorKind::Bounds);
        // The top frame sits on index 0.
        assert_eq!(engine.set_cmd_range(1, None, 0).unwrap_err().kind(), ErrorKind::Bounds);

        engine.set_cmd_range(0, Some(1), 0).unwrap();
        assert_eq!(engine.current_cmd_range().unwrap(), (0, 1));
    }

    #[test]
    fn test_set_cmd_range_repositions_waiting_frame() {
        let mut engine = engine(&["a", "b", "c"], items(2));
        engine.split_data(1).unwrap();
        engine.set_cmd_range(2, None, 1).unwrap();

        let below = engine.stack().peek(1).unwrap();
        assert_eq!(below.path.current(), 2);
        assert_eq!(below.data.range(), Some(CmdRange::new(2, None)));
    }

    #[test]
    fn test_set_data_cmd_range_isolates_middle() {
        let mut engine = engine(&["a", "b", "c"], items(5));
        engine.set_data_cmd_range(1, Some(2), 1, Some(2)).unwrap();

        let frames: Vec<_> = engine.stack().iter().map(|f| f.data.to_vec()).collect();
        assert_eq!(frames, vec![items(5)[3..].to_vec(), vec![json!(1), json!(2)], vec![json!(0)]]);
        let middle = engine.stack().peek(1).unwrap();
        assert_eq!(middle.data.range(), Some(CmdRange::new(1, Some(2))));
        assert_eq!(middle.path.current(), 1);
    }

    #[test]
    fn test_set_data_cmd_range_rejects_before_splitting() {
        let mut engine = engine(&["a", "b"], items(3));
        let err = engine.set_data_cmd_range(1, Some(1), 0, Some(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        assert_eq!(engine.stack_size(), 1);
        assert_eq!(
            engine.set_data_cmd_range(0, Some(4), 0, None).unwrap_err().kind(),
            ErrorKind::Bounds
        );
    }

    #[test]
    fn test_set_data_cmd_range_overflowing_lengths_are_bounds_errors() {
        let mut engine = engine(&["a", "b"], items(3));
        let err = engine
            .set_data_cmd_range(1, Some(usize::MAX), 0, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);

        let err = engine
            .set_data_cmd_range(0, None, 1, Some(usize::MAX))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bounds);
        assert_eq!(engine.stack_size(), 1);
    }

    #[test]
    fn test_set_cmd_range_rejected_outside_pre() {
        let cmd = SubCommand::new("p").with_process(|engine, _| {
            engine.set_cmd_range(0, None, 0)?;
            Ok(PhaseOutput::Single(Value::Null))
        });
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        let err = engine.execute().unwrap_err();
        assert_eq!(
            err.inner_engine_error().map(EngineError::kind),
            Some(ErrorKind::Consistency)
        );
    }

    #[test]
    fn test_injected_clone_shares_counters() {
        let mut engine = engine(&["a"], items(1));
        let running = engine.current_subcommand().unwrap().clone();
        running.bump(Phase::Pre);
        engine.add_sub_command(running, false, true).unwrap();
        assert_eq!(engine.counters(0, 0).unwrap().pre, 1);
        assert_eq!(engine.counters(0, 1).unwrap().pre, 1);
    }

    #[test]
    fn test_split_rejected_outside_pre() {
        let cmd = SubCommand::new("p").with_process(|engine, _| {
            engine.split_data(0)?;
            Ok(PhaseOutput::Single(Value::Null))
        });
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        let err = engine.execute().unwrap_err();
        assert_eq!(
            err.inner_engine_error().map(EngineError::kind),
            Some(ErrorKind::Consistency)
        );
    }

    #[test]
    fn test_add_sub_command_only_once() {
        let mut engine = engine(&["a"], items(1));
        assert!(engine.add_sub_command(SubCommand::new("x"), true, true).unwrap());
        assert!(!engine.add_sub_command(SubCommand::new("x"), true, true).unwrap());
        assert!(engine.add_sub_command(SubCommand::new("x"), false, true).unwrap());
        assert_eq!(engine.stage(0).unwrap().len(), 3);
    }

    #[test]
    fn test_add_sub_command_outside_bounds() {
        let mut engine = engine(&["a", "b"], items(1));
        engine.set_cmd_range(0, Some(1), 0).unwrap();
        let err = engine
            .add_sub_command(SubCommand::new("x"), false, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Consistency);
    }

    #[test]
    fn test_add_command_rejects_empty_stage() {
        let mut engine = engine(&["a"], items(1));
        let err = engine.add_command(PipelineStage::new("void")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
        engine.add_command(stage_of(&["deep"])).unwrap();
        assert_eq!(engine.stages().len(), 2);
    }

    #[test]
    fn test_skip_next_command() {
        let mut engine = engine(&["a", "b", "c"], items(1));
        engine.skip_next_command(2).unwrap();
        assert_eq!(engine.current_path().unwrap().current(), 2);
    }

    #[test]
    fn test_flush_args() {
        let mut stage = stage_of(&["a", "b"]);
        stage.set_args(vec![json!("x")]);
        let mut engine = Engine::new(vec![stage], None).unwrap();
        engine.flush_args(None).unwrap();
        assert!(engine.stage(0).unwrap().subcommands().all(|c| c.args().is_empty()));
        assert_eq!(engine.flush_args(Some(4)).unwrap_err().kind(), ErrorKind::Bounds);
    }
}
