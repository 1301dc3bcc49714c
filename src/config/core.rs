use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_EXECUTION_LIMIT;

/// Root configuration structure for pipeshell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShellConfig {
    /// Engine limits and policies
    pub engine: EngineConfig,

    /// Interactive shell settings
    pub shell: ShellSettings,
}

impl ShellConfig {
    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        if let Err(e) = self.engine.validate() {
            problems.push(format!("engine: {}", e));
        }
        if let Err(e) = self.shell.validate() {
            problems.push(format!("shell: {}", e));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// Settings handed to every [`crate::engine::Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often a single subcommand phase may run before the run aborts
    pub execution_limit: u32,

    /// Whether `add_data` may insert before the item being processed
    pub allow_front_insert: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_limit: DEFAULT_EXECUTION_LIMIT,
            allow_front_insert: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.execution_limit == 0 {
            return Err("execution_limit must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    /// Prompt printed before each interactive line
    pub prompt: String,

    /// Addons loaded at startup, in order
    pub addons: Vec<String>,

    /// Print every output as JSON, strings included
    pub print_json: bool,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            prompt: "pipeshell:> ".to_string(),
            addons: vec!["std".to_string()],
            print_json: false,
        }
    }
}

impl ShellSettings {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(blank) = self.addons.iter().find(|name| name.trim().is_empty()) {
            return Err(format!("addon names must not be blank (got {:?})", blank));
        }
        Ok(())
    }
}
