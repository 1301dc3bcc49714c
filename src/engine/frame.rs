use std::fmt;

use serde::Serialize;

use super::{DataBunch, Phase};

/// Chosen subcommand index per depth reached so far.
///
/// `path[i]` selects the entry of stage `i`; the length is the current
/// depth into the command tree and never drops below one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CommandPath(Vec<usize>);

impl CommandPath {
    /// Path of the very first frame: stage 0, entry 0.
    pub fn root() -> Self {
        Self(vec![0])
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Stage the path currently points into.
    pub fn stage_index(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    /// Selected entry in the current stage.
    pub fn current(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    pub fn set_current(&mut self, index: usize) {
        if let Some(last) = self.0.last_mut() {
            *last = index;
        }
    }

    /// One level deeper, starting at entry 0.
    pub fn descend(&self) -> Self {
        let mut next = self.0.clone();
        next.push(0);
        Self(next)
    }

    /// One level up; `None` at the root stage.
    pub fn ascend(&self) -> Option<Self> {
        if self.0.len() > 1 {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    /// Indices chosen in the stages above the current one.
    pub fn prefix(&self) -> &[usize] {
        &self.0[..self.stage_index()]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for CommandPath {
    fn from(path: Vec<usize>) -> Self {
        Self(path)
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// One unit of pending work: a bunch, where it is in the tree, and which
/// phase consumes it next.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionFrame {
    pub data: DataBunch,
    pub path: CommandPath,
    pub phase: Phase,
}

impl ExecutionFrame {
    pub fn new(data: DataBunch, path: CommandPath, phase: Phase) -> Self {
        Self { data, path, phase }
    }
}

/// LIFO of frames; the whole mutable state of a run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStack {
    frames: Vec<ExecutionFrame>,
}

impl ExecutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: ExecutionFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<ExecutionFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&ExecutionFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut ExecutionFrame> {
        self.frames.last_mut()
    }

    /// Frame `depth` positions below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> Option<&ExecutionFrame> {
        let index = self.frames.len().checked_sub(depth + 1)?;
        self.frames.get(index)
    }

    pub fn peek_mut(&mut self, depth: usize) -> Option<&mut ExecutionFrame> {
        let index = self.frames.len().checked_sub(depth + 1)?;
        self.frames.get_mut(index)
    }

    /// Frames from the bottom to the top.
    pub fn iter(&self) -> impl Iterator<Item = &ExecutionFrame> {
        self.frames.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_navigation() {
        let root = CommandPath::root();
        assert_eq!(root.depth(), 1);
        assert!(root.ascend().is_none());

        let mut deeper = root.descend();
        deeper.set_current(2);
        assert_eq!(deeper.as_slice(), &[0, 2]);
        assert_eq!(deeper.stage_index(), 1);
        assert_eq!(deeper.prefix(), &[0]);
        assert_eq!(deeper.ascend(), Some(CommandPath::root()));
        assert_eq!(deeper.to_string(), "[0, 2]");
    }

    #[test]
    fn test_peek_counts_from_top() {
        let mut stack = ExecutionStack::new();
        stack.push(ExecutionFrame::new(
            DataBunch::new([json!(1)]),
            CommandPath::root(),
            Phase::Pre,
        ));
        stack.push(ExecutionFrame::new(
            DataBunch::new([json!(2)]),
            CommandPath::root(),
            Phase::Process,
        ));
        assert_eq!(stack.peek(0).map(|f| f.phase), Some(Phase::Process));
        assert_eq!(stack.peek(1).map(|f| f.phase), Some(Phase::Pre));
        assert!(stack.peek(2).is_none());
    }
}
