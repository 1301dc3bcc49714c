//! Command registration and command-line resolution.
//!
//! Commands are registered under a path of one or more tokens (`"echo"`,
//! `"env get"`). A line is split on `|` into segments; each segment picks
//! the longest registered path that prefixes its tokens, and the tokens
//! left over become the static arguments of that stage.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::{Engine, PipelineStage};
use crate::env::Environment;
use crate::errors::{Result, ShellError};

/// Owned table of registered commands. Passed explicitly; there is no
/// global registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: BTreeMap<Vec<String>, PipelineStage>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `stage` under the whitespace-separated `path`.
    pub fn register(&mut self, path: &str, stage: PipelineStage) -> Result<()> {
        let key = tokenize(path);
        if key.is_empty() {
            return Err(ShellError::EmptyCommand(path.to_string()));
        }
        if self.commands.contains_key(&key) {
            return Err(ShellError::DuplicateCommand(key.join(" ")));
        }
        debug!(command = %key.join(" "), "registered command");
        self.commands.insert(key, stage);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&PipelineStage> {
        self.commands.get(&tokenize(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Resolve one segment to a copy of its stage with the leftover tokens
    /// bound as static arguments.
    pub fn resolve_segment(&self, segment: &str) -> Result<PipelineStage> {
        let tokens = tokenize(segment);
        if tokens.is_empty() {
            return Err(ShellError::EmptyCommand(segment.trim().to_string()));
        }

        let (matched, stage) = (1..=tokens.len())
            .rev()
            .find_map(|n| self.commands.get(&tokens[..n]).map(|stage| (n, stage)))
            .ok_or_else(|| ShellError::UnknownCommand(tokens.join(" ")))?;

        let mut stage = stage.clone();
        stage.set_args(tokens[matched..].iter().cloned().map(Value::String).collect());
        Ok(stage)
    }

    /// Resolve a full pipeline line into its stages.
    pub fn resolve_line(&self, line: &str) -> Result<Vec<PipelineStage>> {
        line.split('|')
            .map(|segment| {
                self.resolve_segment(segment).map_err(|e| match e {
                    ShellError::EmptyCommand(_) => ShellError::EmptyCommand(line.trim().to_string()),
                    other => other,
                })
            })
            .collect()
    }

    /// Resolve `line` and build a ready-to-run engine for it.
    pub fn engine_for(
        &self,
        line: &str,
        env: Option<Environment>,
        config: EngineConfig,
    ) -> Result<Engine> {
        let stages = self.resolve_line(line)?;
        Ok(Engine::with_config(stages, env, config)?)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
