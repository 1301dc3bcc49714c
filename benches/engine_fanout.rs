//! Benchmarks for sibling and data fan-out in the pipeline engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pipeshell::engine::{Engine, PhaseOutput, PipelineStage, SubCommand};
use serde_json::Value;

fn alternatives(width: usize) -> PipelineStage {
    (0..width).fold(PipelineStage::new("alts"), |stage, i| {
        stage.with_command(SubCommand::new(format!("alt{}", i)))
    })
}

fn bench_data_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_fan_out");
    for items in [10usize, 100, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(items), &items, |b, &items| {
            b.iter(|| {
                let producer = SubCommand::new("gen").with_pre(move |_, _| {
                    Ok(PhaseOutput::multi((0..items).map(|i| i as u64)))
                });
                let sink = SubCommand::new("sink")
                    .with_process(|_, args| Ok(args.first().cloned().unwrap_or(Value::Null).into()));
                let stages = vec![PipelineStage::single(producer), PipelineStage::single(sink)];
                let mut engine = Engine::new(stages, None).unwrap();
                black_box(engine.execute().unwrap())
            });
        });
    }
    group.finish();
}

fn bench_sibling_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("sibling_fan_out");
    for width in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| {
                let stages = vec![alternatives(width), alternatives(width), alternatives(2)];
                let mut engine = Engine::new(stages, None).unwrap();
                engine.seed((0..2).map(Value::from).collect()).unwrap();
                black_box(engine.execute().unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_data_fan_out, bench_sibling_fan_out);
criterion_main!(benches);
