use serde_json::Value;

use super::SubCommand;

#[derive(Debug, Clone)]
pub(crate) struct StageEntry {
    pub(crate) command: SubCommand,
    pub(crate) use_args: bool,
    /// Injected while running; removed again on reset.
    pub(crate) dynamic: bool,
}

/// The alternative subcommands available at one depth of the command tree.
///
/// Entries are addressed by index. The length only changes at run time by
/// appending through [`crate::engine::Engine::add_sub_command`].
#[derive(Debug, Clone)]
pub struct PipelineStage {
    name: String,
    entries: Vec<StageEntry>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// A stage holding exactly one subcommand, named after it.
    pub fn single(command: SubCommand) -> Self {
        Self::new(command.name().to_string()).with_command(command)
    }

    /// Append a subcommand that receives the static arguments.
    pub fn with_command(mut self, command: SubCommand) -> Self {
        self.push(command, true);
        self
    }

    pub fn push(&mut self, command: SubCommand, use_args: bool) {
        self.entries.push(StageEntry {
            command,
            use_args,
            dynamic: false,
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SubCommand> {
        self.entries.get(index).map(|e| &e.command)
    }

    pub fn subcommands(&self) -> impl Iterator<Item = &SubCommand> {
        self.entries.iter().map(|e| &e.command)
    }

    /// Give every subcommand of the stage the same static arguments.
    pub fn set_args(&mut self, args: Vec<Value>) {
        for entry in &mut self.entries {
            entry.command.set_args(args.clone());
        }
    }

    pub fn flush_args(&mut self) {
        for entry in &mut self.entries {
            entry.command.flush_args();
        }
    }

    /// Drop injected subcommands and zero every counter.
    pub fn reset(&mut self) {
        self.entries.retain(|e| !e.dynamic);
        for entry in &mut self.entries {
            entry.command.reset();
        }
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&StageEntry> {
        self.entries.get(index)
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> Option<&mut StageEntry> {
        self.entries.get_mut(index)
    }

    /// Append an injected subcommand. Returns `false` when `only_once` is
    /// set and a subcommand with the same name was already injected.
    pub(crate) fn add_dynamic(&mut self, command: SubCommand, only_once: bool, use_args: bool) -> bool {
        if only_once
            && self
                .entries
                .iter()
                .any(|e| e.dynamic && e.command.name() == command.name())
        {
            return false;
        }
        self.entries.push(StageEntry {
            command,
            use_args,
            dynamic: true,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Phase;
    use serde_json::json;

    #[test]
    fn test_reset_drops_dynamic_entries_and_counters() {
        let mut stage = PipelineStage::single(SubCommand::new("a"));
        assert!(stage.add_dynamic(SubCommand::new("b"), true, true));
        assert!(!stage.add_dynamic(SubCommand::new("b"), true, true));
        assert!(stage.add_dynamic(SubCommand::new("b"), false, true));
        assert_eq!(stage.len(), 3);

        stage.entry_mut(0).unwrap().command.bump(Phase::Pre);
        stage.reset();
        assert_eq!(stage.len(), 1);
        assert_eq!(stage.get(0).unwrap().counters().pre, 0);
    }

    #[test]
    fn test_set_args_reaches_every_entry() {
        let mut stage = PipelineStage::new("alts")
            .with_command(SubCommand::new("x"))
            .with_command(SubCommand::new("y"));
        stage.set_args(vec![json!("1")]);
        assert!(stage.subcommands().all(|c| c.args() == [json!("1")]));
        stage.flush_args();
        assert!(stage.subcommands().all(|c| c.args().is_empty()));
    }
}
