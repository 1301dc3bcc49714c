use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{Engine, Phase};
use crate::args::{ArgBinder, Args};

/// A phase handler.
///
/// Handlers get the running engine so they can inspect and reshape the
/// frame they were invoked for (split, merge, range, data navigation) or
/// inject further subcommands.
pub type PhaseFn = Arc<dyn Fn(&mut Engine, Args) -> anyhow::Result<PhaseOutput> + Send + Sync>;

/// Invocation counters shared by a subcommand and its clones, indexed by
/// phase slot.
type SharedCounters = Arc<[AtomicU32; 3]>;

/// What a phase handler returns: one value, or a multi-output whose items
/// each continue through the pipeline separately.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutput {
    Single(Value),
    Multi(Vec<Value>),
}

impl PhaseOutput {
    /// Build a multi-output from anything convertible to values.
    pub fn multi<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Multi(values.into_iter().map(Into::into).collect())
    }

    /// The items of the next data bunch.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Single(value) => vec![value],
            Self::Multi(values) => values,
        }
    }
}

impl From<Value> for PhaseOutput {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<String> for PhaseOutput {
    fn from(value: String) -> Self {
        Self::Single(Value::String(value))
    }
}

impl From<&str> for PhaseOutput {
    fn from(value: &str) -> Self {
        Self::Single(Value::from(value))
    }
}

/// Per-phase invocation counters of one subcommand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounters {
    pub pre: u32,
    pub process: u32,
    pub post: u32,
}

impl PhaseCounters {
    pub fn get(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Pre => self.pre,
            Phase::Process => self.process,
            Phase::Post => self.post,
        }
    }

    /// Highest of the three counters.
    pub fn max(&self) -> u32 {
        self.pre.max(self.process).max(self.post)
    }

    fn load(shared: &SharedCounters) -> Self {
        Self {
            pre: shared[Phase::Pre.slot()].load(Ordering::Relaxed),
            process: shared[Phase::Process.slot()].load(Ordering::Relaxed),
            post: shared[Phase::Post.slot()].load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Default)]
struct PhaseSlot {
    handler: Option<PhaseFn>,
    binder: Option<Arc<dyn ArgBinder>>,
}

/// A unit of work with three phase handlers.
///
/// A missing handler passes its input item through unchanged. Clones share
/// their invocation counters, so a command injecting copies of itself is
/// still caught by the execution limit; [`SubCommand::reset`] detaches a
/// command onto fresh counters.
#[derive(Clone)]
pub struct SubCommand {
    name: String,
    phases: [PhaseSlot; 3],
    args: Vec<Value>,
    counters: SharedCounters,
}

impl SubCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: Default::default(),
            args: Vec::new(),
            counters: SharedCounters::default(),
        }
    }

    pub fn with_handler<F>(mut self, phase: Phase, handler: F) -> Self
    where
        F: Fn(&mut Engine, Args) -> anyhow::Result<PhaseOutput> + Send + Sync + 'static,
    {
        self.phases[phase.slot()].handler = Some(Arc::new(handler));
        self
    }

    pub fn with_pre<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Engine, Args) -> anyhow::Result<PhaseOutput> + Send + Sync + 'static,
    {
        self.with_handler(Phase::Pre, handler)
    }

    pub fn with_process<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Engine, Args) -> anyhow::Result<PhaseOutput> + Send + Sync + 'static,
    {
        self.with_handler(Phase::Process, handler)
    }

    pub fn with_post<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Engine, Args) -> anyhow::Result<PhaseOutput> + Send + Sync + 'static,
    {
        self.with_handler(Phase::Post, handler)
    }

    /// Bind this phase's positional values to names before calling it.
    pub fn with_binder(mut self, phase: Phase, binder: impl ArgBinder + 'static) -> Self {
        self.phases[phase.slot()].binder = Some(Arc::new(binder));
        self
    }

    /// Static arguments prepended to every call made with `use_args`.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn set_args(&mut self, args: Vec<Value>) {
        self.args = args;
    }

    pub fn flush_args(&mut self) {
        self.args.clear();
    }

    pub fn counters(&self) -> PhaseCounters {
        PhaseCounters::load(&self.counters)
    }

    pub fn has_handler(&self, phase: Phase) -> bool {
        self.phases[phase.slot()].handler.is_some()
    }

    pub(crate) fn handler(&self, phase: Phase) -> Option<PhaseFn> {
        self.phases[phase.slot()].handler.clone()
    }

    pub(crate) fn binder(&self, phase: Phase) -> Option<Arc<dyn ArgBinder>> {
        self.phases[phase.slot()].binder.clone()
    }

    /// Count one more call of `phase` and return the new count.
    pub(crate) fn bump(&self, phase: Phase) -> u32 {
        let counter = &self.counters[phase.slot()];
        let previous = counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or_else(|n| n);
        previous.saturating_add(1)
    }

    pub(crate) fn reset(&mut self) {
        self.counters = SharedCounters::default();
    }
}

impl fmt::Debug for SubCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<Phase> = Phase::ALL
            .into_iter()
            .filter(|p| self.has_handler(*p))
            .collect();
        f.debug_struct("SubCommand")
            .field("name", &self.name)
            .field("handlers", &handlers)
            .field("args", &self.args)
            .field("counters", &self.counters())
            .finish()
    }
}
