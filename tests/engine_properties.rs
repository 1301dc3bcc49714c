//! Property-based tests for the pipeline engine
//!
//! These tests verify invariants that should hold for all inputs:
//! - Splitting a bunch and merging it back restores it
//! - Every item a PRE emits reaches the deepest PROCESS, in order
//! - Pass-through pipelines return their seed unchanged

use std::sync::{Arc, Mutex};

use pipeshell::engine::{CmdRange, Engine, PhaseOutput, PipelineStage, SubCommand};
use proptest::prelude::*;
use serde_json::Value;

fn alternatives(count: usize) -> PipelineStage {
    (0..count).fold(PipelineStage::new("alts"), |stage, i| {
        stage.with_command(SubCommand::new(format!("alt{}", i)))
    })
}

fn values(items: &[i64]) -> Vec<Value> {
    items.iter().copied().map(Value::from).collect()
}

proptest! {
    /// Property: split_data followed by merge_data_on_stack is the identity
    /// on the bunch and its bounds, for any split position inside it
    #[test]
    fn prop_split_then_merge_restores_bunch(
        items in prop::collection::vec(any::<i64>(), 2..24),
        split_seed in any::<usize>(),
        stop in prop::option::of(0usize..4),
    ) {
        let at = 1 + split_seed % (items.len() - 1);
        let mut engine = Engine::new(vec![alternatives(4)], None).unwrap();
        engine.seed(values(&items)).unwrap();
        engine.set_cmd_range(0, stop, 0).unwrap();

        engine.split_data(at).unwrap();
        prop_assert_eq!(engine.stack_size(), 2);
        prop_assert_eq!(engine.current_data().unwrap().len(), at);

        engine.merge_data_on_stack(2).unwrap();
        prop_assert_eq!(engine.stack_size(), 1);
        prop_assert_eq!(engine.current_data().unwrap(), values(&items));
        let top = engine.stack().top().unwrap();
        prop_assert_eq!(top.data.range(), Some(CmdRange::new(0, stop)));
    }

    /// Property: a PRE emitting N items yields exactly N deepest-stage
    /// PROCESS calls, in item order
    #[test]
    fn prop_pre_items_reach_process_in_order(
        items in prop::collection::vec(any::<i64>(), 0..40),
        depth in 1usize..4,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let emitted = values(&items);
        let producer = SubCommand::new("gen")
            .with_pre(move |_, _| Ok(PhaseOutput::Multi(emitted.clone())));

        let mut stages = vec![PipelineStage::single(producer)];
        for _ in 1..depth {
            stages.push(PipelineStage::single(SubCommand::new("pass")));
        }
        let sink = {
            let seen = Arc::clone(&seen);
            SubCommand::new("sink").with_process(move |_, args| {
                let item = args.first().cloned().unwrap_or(Value::Null);
                seen.lock().unwrap().push(item.clone());
                Ok(PhaseOutput::Single(item))
            })
        };
        stages.push(PipelineStage::single(sink));

        let mut engine = Engine::new(stages, None).unwrap();
        let outputs = engine.execute().unwrap();

        prop_assert_eq!(seen.lock().unwrap().clone(), values(&items));
        prop_assert_eq!(outputs, values(&items));
        prop_assert_eq!(engine.counters(depth, 0).unwrap().process as usize, items.len());
    }

    /// Property: without handlers every stage passes items through, so the
    /// outputs equal the seed repeated once per sibling combination
    #[test]
    fn prop_pass_through_multiplies_by_fan_out(
        items in prop::collection::vec(any::<i64>(), 1..6),
        widths in prop::collection::vec(1usize..4, 1..4),
    ) {
        let stages: Vec<_> = widths.iter().map(|w| alternatives(*w)).collect();
        let mut engine = Engine::new(stages, None).unwrap();
        engine.seed(values(&items)).unwrap();
        let outputs = engine.execute().unwrap();

        let fan_out: usize = widths.iter().product();
        let expected: Vec<Value> = values(&items)
            .into_iter()
            .flat_map(|v| std::iter::repeat(v).take(fan_out))
            .collect();
        prop_assert_eq!(outputs, expected);
    }
}
