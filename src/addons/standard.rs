use anyhow::Context;
use serde_json::Value;

use super::Addon;
use crate::args::{ArgFeeder, ArgSpec, Args};
use crate::engine::{Phase, PhaseOutput, PipelineStage, SubCommand};
use crate::errors::Result;
use crate::registry::Registry;

/// Small set of general-purpose commands: `echo`, `upper`, `repeat` and
/// `prefix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAddon;

impl Addon for StandardAddon {
    fn name(&self) -> &'static str {
        "std"
    }

    fn register(&self, registry: &mut Registry) -> Result<()> {
        registry.register("echo", PipelineStage::single(echo()))?;

        let mut upper_stage = PipelineStage::new("upper");
        upper_stage.push(upper(), false);
        registry.register("upper", upper_stage)?;

        registry.register("repeat", PipelineStage::single(repeat()?))?;
        registry.register("prefix", PipelineStage::single(prefix()?))?;
        Ok(())
    }
}

/// Emit the arguments, then the incoming item, one output each.
fn echo() -> SubCommand {
    SubCommand::new("echo").with_pre(|_, args| Ok(PhaseOutput::Multi(args.into_values())))
}

fn upper() -> SubCommand {
    SubCommand::new("upper").with_process(|_, args| {
        Ok(PhaseOutput::Multi(
            args.into_values().into_iter().map(uppercase).collect(),
        ))
    })
}

/// `repeat COUNT [VALUE]`: emit the value (or the incoming item) COUNT times.
fn repeat() -> Result<SubCommand> {
    let binder = ArgFeeder::new()
        .arg("count", ArgSpec::single())?
        .arg("value", ArgSpec::single().with_default(Value::Null))?;
    Ok(SubCommand::new("repeat")
        .with_pre(|_, args| {
            let count = parse_count(&args)?;
            let value = args.get("value").cloned().unwrap_or(Value::Null);
            Ok(PhaseOutput::Multi(vec![value; count]))
        })
        .with_binder(Phase::Pre, binder))
}

/// `prefix TEXT`: prepend TEXT to every result bubbling back up.
fn prefix() -> Result<SubCommand> {
    let binder = ArgFeeder::new()
        .arg("text", ArgSpec::single())?
        .arg("value", ArgSpec::single().with_default(Value::Null))?;
    Ok(SubCommand::new("prefix")
        .with_post(|_, args| {
            let text = args.get_str("text").unwrap_or_default();
            let rendered = match args.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Ok(format!("{}{}", text, rendered).into())
        })
        .with_binder(Phase::Post, binder))
}

fn parse_count(args: &Args) -> anyhow::Result<usize> {
    match args.get("count") {
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .with_context(|| format!("count must be a non-negative integer, got {}", n)),
        Some(Value::String(s)) => s
            .parse::<usize>()
            .with_context(|| format!("count must be a non-negative integer, got '{}'", s)),
        other => anyhow::bail!("count must be a non-negative integer, got {:?}", other),
    }
}

fn uppercase(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other,
    }
}
