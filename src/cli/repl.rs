//! Line-oriented shell around the engine.
//!
//! Each line is resolved against the registry, run on a fresh engine and its
//! outputs printed. A failing line prints its error and the loop goes on.

use std::io::{self, BufRead, Write};

use colored::Colorize;
use serde_json::Value;
use tracing::{debug, info};

use crate::addons;
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::errors::Result;
use crate::registry::Registry;

/// Script line that keeps the shell open once the script is done
pub const NO_EXIT_DIRECTIVE: &str = "noexit";

pub struct Shell {
    registry: Registry,
    config: ShellConfig,
    env: Environment,
}

impl Shell {
    /// Build a shell and load the configured addons.
    pub fn new(config: ShellConfig) -> Result<Self> {
        let mut registry = Registry::new();
        addons::load(&config.shell.addons, &mut registry)?;
        Ok(Self::with_registry(registry, config))
    }

    pub fn with_registry(registry: Registry, config: ShellConfig) -> Self {
        Self {
            registry,
            config,
            env: Environment::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Environment shared by every line of the session.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Run one line and return its outputs. Blank lines and `#` comments
    /// produce nothing.
    pub fn run_line(&mut self, line: &str) -> Result<Vec<Value>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Vec::new());
        }

        let mut engine =
            self.registry
                .engine_for(line, Some(self.env.clone()), self.config.engine.clone())?;
        let result = engine.execute();
        self.env = engine.into_env();
        let outputs = result?;
        debug!(line, outputs = outputs.len(), "line finished");
        Ok(outputs)
    }

    /// Text printed for one output value.
    pub fn render(&self, value: &Value) -> String {
        match value {
            Value::String(s) if !self.config.shell.print_json => s.clone(),
            other => other.to_string(),
        }
    }

    /// Run a line, print its outputs to `out` and any error to `err`.
    /// Returns whether the line succeeded.
    pub fn execute_and_print<W: Write, E: Write>(
        &mut self,
        line: &str,
        out: &mut W,
        err: &mut E,
    ) -> io::Result<bool> {
        match self.run_line(line) {
            Ok(outputs) => {
                for value in &outputs {
                    writeln!(out, "{}", self.render(value))?;
                }
                Ok(true)
            }
            Err(e) => {
                writeln!(err, "{}", format!("error: {}", e).red())?;
                Ok(false)
            }
        }
    }

    /// Execute a script line by line. Returns `true` when the script asked
    /// to keep the shell open with a `noexit` line.
    pub fn run_script<R: BufRead, W: Write, E: Write>(
        &mut self,
        reader: R,
        out: &mut W,
        err: &mut E,
    ) -> io::Result<bool> {
        let mut keep_open = false;
        for line in reader.lines() {
            let line = line?;
            if line.trim() == NO_EXIT_DIRECTIVE {
                keep_open = true;
                continue;
            }
            self.execute_and_print(&line, out, err)?;
        }
        info!(keep_open, "script finished");
        Ok(keep_open)
    }

    /// Prompt, read and execute lines until the input ends.
    pub fn run_interactive<R: BufRead, W: Write, E: Write>(
        &mut self,
        mut reader: R,
        out: &mut W,
        err: &mut E,
    ) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(out, "{}", self.config.shell.prompt)?;
            out.flush()?;

            line.clear();
            if reader.read_line(&mut line)? == 0 {
                writeln!(err, "\n{}", "end of stream".yellow())?;
                return Ok(());
            }
            self.execute_and_print(&line, out, err)?;
        }
    }
}
