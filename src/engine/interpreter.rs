//! The interpreter loop.

use serde_json::Value;
use tracing::{debug, info_span, trace, warn};

use super::{CommandPath, DataBunch, Engine, ExecutionFrame, Phase, PhaseOutput, RunState};
use crate::args::{positional_values, Args};
use crate::errors::{EngineError, FailureContext};

impl Engine {
    /// Run until the stack is drained and collect the terminal outputs.
    pub fn execute(&mut self) -> Result<Vec<Value>, EngineError> {
        let mut outputs = Vec::new();
        self.execute_streaming(|value| outputs.push(value))?;
        Ok(outputs)
    }

    /// Run until the stack is drained, handing each terminal output to
    /// `on_output` as soon as the root stage's POST phase produces it.
    pub fn execute_streaming<F>(&mut self, mut on_output: F) -> Result<(), EngineError>
    where
        F: FnMut(Value),
    {
        match self.state {
            RunState::Running => return Err(EngineError::Reentrant),
            RunState::Failed => return Err(EngineError::Poisoned),
            RunState::Ready | RunState::Finished => {}
        }

        let span = info_span!("execute", stages = self.stages.len());
        let _guard = span.enter();

        self.state = RunState::Running;
        let result = self.run(&mut on_output);
        self.state = match result {
            Ok(()) => RunState::Finished,
            Err(ref err) => {
                warn!(error = %err, stack = self.stack.len(), "pipeline run aborted");
                RunState::Failed
            }
        };
        result
    }

    fn run(&mut self, on_output: &mut dyn FnMut(Value)) -> Result<(), EngineError> {
        while let Some(top) = self.stack.top() {
            if top.data.is_empty() {
                trace!(path = %top.path, phase = %top.phase, "dropping drained frame");
                self.stack.pop();
                continue;
            }

            let phase = top.phase;
            let path = top.path.clone();
            let item = top.data.first().cloned().unwrap_or(Value::Null);

            let output = self.dispatch(&path, phase, &item)?;

            // The handler may have reshaped the top frame; continue from
            // whatever is there now.
            let frame = self.stack.pop().ok_or_else(|| {
                EngineError::consistency("execute", "the active frame vanished during a phase call")
            })?;
            self.schedule_continuation(frame);
            self.push_result(path, phase, output, on_output);
        }
        Ok(())
    }

    /// Invoke one phase of the subcommand `path` points at and apply the
    /// execution-count guard.
    fn dispatch(
        &mut self,
        path: &CommandPath,
        phase: Phase,
        item: &Value,
    ) -> Result<PhaseOutput, EngineError> {
        let stage_index = path.stage_index();
        let index = path.current();

        let (handler, binder, values, name) = {
            let entry = self
                .stages
                .get(stage_index)
                .and_then(|stage| stage.entry(index))
                .ok_or_else(|| {
                    EngineError::bounds("execute", format!("no subcommand at path {}", path))
                })?;
            let command = &entry.command;
            (
                command.handler(phase),
                command.binder(phase),
                positional_values(command.args(), entry.use_args, item),
                command.name().to_string(),
            )
        };

        debug!(
            phase = %phase,
            stage = stage_index,
            subcommand = %name,
            index,
            "dispatching phase"
        );

        let context = |name: String| FailureContext {
            stage_index,
            subcommand_index: index,
            subcommand: name,
            path: path.clone(),
            phase,
            item: Some(item.clone()),
        };

        let args = match binder {
            Some(binder) => match binder.bind(values) {
                Ok(named) => Args::Named(named),
                Err(err) => {
                    return Err(EngineError::Handler {
                        context: Box::new(context(name)),
                        source: anyhow::anyhow!("{} (usage: {})", err, binder.usage()),
                    })
                }
            },
            None => Args::Positional(values),
        };

        let output = match handler {
            Some(handler) => handler(self, args).map_err(|source| EngineError::Handler {
                context: Box::new(context(name.clone())),
                source,
            })?,
            None => PhaseOutput::Single(item.clone()),
        };

        let count = self
            .stages
            .get_mut(stage_index)
            .and_then(|stage| stage.entry_mut(index))
            .map(|entry| entry.command.bump(phase))
            .unwrap_or(0);
        if count > self.config.execution_limit {
            return Err(EngineError::ExecutionLimit {
                limit: self.config.execution_limit,
                context: Box::new(context(name)),
            });
        }

        Ok(output)
    }

    /// Re-push the frame that just ran if it still has work: the next item
    /// for PROCESS/POST, the next sibling (or next item) for PRE.
    fn schedule_continuation(&mut self, mut frame: ExecutionFrame) {
        match frame.phase {
            Phase::Process | Phase::Post => {
                if frame.data.len() > 1 {
                    frame.data.drop_first();
                    trace!(path = %frame.path, remaining = frame.data.len(), "next item");
                    self.stack.push(frame);
                }
            }
            Phase::Pre => {
                let stage_len = self
                    .stages
                    .get(frame.path.stage_index())
                    .map_or(0, |stage| stage.len());
                let range = frame.data.effective_range();
                let current = frame.path.current();

                if current < range.effective_stop(stage_len) {
                    if !frame.data.is_empty() {
                        frame.path.set_current(current + 1);
                        trace!(path = %frame.path, "next sibling");
                        self.stack.push(frame);
                    }
                } else if frame.data.len() > 1 {
                    frame.data.drop_first();
                    frame.path.set_current(range.start);
                    trace!(path = %frame.path, remaining = frame.data.len(), "next item");
                    self.stack.push(frame);
                }
            }
        }
    }

    /// Push the frame produced by a phase call, or emit terminal outputs.
    fn push_result(
        &mut self,
        path: CommandPath,
        phase: Phase,
        output: PhaseOutput,
        on_output: &mut dyn FnMut(Value),
    ) {
        let data = DataBunch::new(output.into_values());
        let next = match phase {
            Phase::Pre if path.depth() >= self.stages.len() => {
                ExecutionFrame::new(data, path, Phase::Process)
            }
            Phase::Pre => ExecutionFrame::new(data, path.descend(), Phase::Pre),
            Phase::Process => ExecutionFrame::new(data, path, Phase::Post),
            Phase::Post => match path.ascend() {
                Some(parent) => ExecutionFrame::new(data, parent, Phase::Post),
                None => {
                    for value in data.iter() {
                        on_output(value.clone());
                    }
                    return;
                }
            },
        };
        self.stack.push(next);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::engine::{PipelineStage, SubCommand};
    use crate::errors::ErrorKind;

    type Log = Arc<Mutex<Vec<String>>>;

    fn traced(name: &str, log: &Log) -> SubCommand {
        let mut cmd = SubCommand::new(name);
        for phase in Phase::ALL {
            let log = Arc::clone(log);
            let label = format!("{}:{}", name, phase);
            cmd = cmd.with_handler(phase, move |_, args| {
                log.lock().unwrap().push(label.clone());
                Ok(args.first().cloned().unwrap_or(Value::Null).into())
            });
        }
        cmd
    }

    #[test]
    fn test_phase_order_across_three_stages() {
        let log: Log = Arc::default();
        let stages = vec![
            PipelineStage::single(traced("a", &log)),
            PipelineStage::single(traced("b", &log)),
            PipelineStage::single(traced("c", &log)),
        ];
        let mut engine = Engine::new(stages, None).unwrap();
        engine.execute().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:pre", "b:pre", "c:pre", "c:process", "c:post", "b:post", "a:post"
            ]
        );
    }

    #[test]
    fn test_missing_handlers_pass_items_through() {
        let cmd = SubCommand::new("noop");
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        engine.seed(vec![json!(1), json!("two")]).unwrap();
        assert_eq!(engine.execute().unwrap(), vec![json!(1), json!("two")]);
    }

    #[test]
    fn test_empty_multi_output_ends_the_branch() {
        let cmd = SubCommand::new("drop").with_pre(|_, _| Ok(PhaseOutput::Multi(Vec::new())));
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        assert!(engine.execute().unwrap().is_empty());
        assert_eq!(engine.counters(0, 0).unwrap().process, 0);
    }

    #[test]
    fn test_streaming_emits_in_order() {
        let cmd = SubCommand::new("gen").with_pre(|_, _| Ok(PhaseOutput::multi([1, 2, 3])));
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        let mut seen = Vec::new();
        engine.execute_streaming(|v| seen.push(v)).unwrap();
        assert_eq!(seen, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_handler_error_is_annotated_and_poisons_engine() {
        let cmd = SubCommand::new("fail").with_process(|_, _| anyhow::bail!("refused"));
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        let err = engine.execute().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Handler);
        let context = err.context().unwrap();
        assert_eq!(context.subcommand, "fail");
        assert_eq!(context.phase, Phase::Process);
        assert_eq!(context.item, Some(Value::Null));
        assert!(!engine.stack().is_empty());

        assert!(engine.has_failed());
        assert!(matches!(engine.execute(), Err(EngineError::Poisoned)));
    }

    #[test]
    fn test_reentrant_execute_is_rejected() {
        let cmd = SubCommand::new("nested").with_pre(|engine, _| {
            engine.execute()?;
            Ok(PhaseOutput::Single(Value::Null))
        });
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        let err = engine.execute().unwrap_err();
        assert!(matches!(
            err.inner_engine_error(),
            Some(EngineError::Reentrant)
        ));
    }

    #[test]
    fn test_binder_failure_is_a_handler_error() {
        use crate::args::{ArgFeeder, ArgSpec};

        let feeder = ArgFeeder::new().arg("count", ArgSpec::single()).unwrap();
        let cmd = SubCommand::new("needs")
            .with_pre(|_, _| Ok(PhaseOutput::Single(Value::Null)))
            .with_binder(Phase::Pre, feeder);
        let mut engine = Engine::new(vec![PipelineStage::single(cmd)], None).unwrap();
        let err = engine.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Handler);
        let message = err.to_string();
        assert!(message.contains("missing value for argument 'count'"));
        assert!(message.contains("(usage: count)"), "{}", message);
    }

    #[test]
    fn test_static_args_reach_handlers_that_use_them() {
        let echo = SubCommand::new("echo")
            .with_pre(|_, args| Ok(PhaseOutput::Multi(args.into_values())))
            .with_args(vec![json!("x"), json!("y")]);
        let mut engine = Engine::new(vec![PipelineStage::single(echo)], None).unwrap();
        assert_eq!(engine.execute().unwrap(), vec![json!("x"), json!("y")]);
    }
}
