use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

/// Inclusive range of subcommand indices allowed to consume a bunch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CmdRange {
    pub start: usize,
    /// `None` extends to the last entry of the stage, including entries
    /// injected while the run is in progress.
    pub stop: Option<usize>,
}

impl CmdRange {
    pub fn new(start: usize, stop: Option<usize>) -> Self {
        Self { start, stop }
    }

    /// Last index allowed for a stage of `stage_len` entries.
    pub fn effective_stop(&self, stage_len: usize) -> usize {
        self.stop.unwrap_or_else(|| stage_len.saturating_sub(1))
    }

    pub fn encloses(&self, index: usize, stage_len: usize) -> bool {
        index >= self.start && index <= self.effective_stop(stage_len)
    }
}

/// Pending values flowing between phases, with optional index bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataBunch {
    items: VecDeque<Value>,
    range: Option<CmdRange>,
}

impl DataBunch {
    pub fn new(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
            range: None,
        }
    }

    /// The bunch a run starts from: a single `Null` item.
    pub fn seed() -> Self {
        Self::new([Value::Null])
    }

    pub fn with_range(mut self, range: CmdRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn range(&self) -> Option<CmdRange> {
        self.range
    }

    /// The bounds in effect, unrestricted when none were set.
    pub fn effective_range(&self) -> CmdRange {
        self.range.unwrap_or_default()
    }

    pub fn set_range(&mut self, range: Option<CmdRange>) {
        self.range = range;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item the next phase call consumes.
    pub fn first(&self) -> Option<&Value> {
        self.items.front()
    }

    pub fn get(&self, offset: usize) -> Option<&Value> {
        self.items.get(offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.iter().cloned().collect()
    }

    pub(crate) fn get_mut(&mut self, offset: usize) -> Option<&mut Value> {
        self.items.get_mut(offset)
    }

    pub(crate) fn insert(&mut self, offset: usize, value: Value) {
        self.items.insert(offset, value);
    }

    pub(crate) fn remove(&mut self, offset: usize) -> Option<Value> {
        self.items.remove(offset)
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn drop_first(&mut self) -> Option<Value> {
        self.items.pop_front()
    }

    /// Split at `at`, keeping `[0, at)` here. Both halves keep the bounds.
    pub(crate) fn split_off(&mut self, at: usize) -> DataBunch {
        DataBunch {
            items: self.items.split_off(at),
            range: self.range,
        }
    }

    pub(crate) fn append(&mut self, other: DataBunch) {
        self.items.extend(other.items);
    }
}

impl From<Vec<Value>> for DataBunch {
    fn from(items: Vec<Value>) -> Self {
        Self::new(items)
    }
}
