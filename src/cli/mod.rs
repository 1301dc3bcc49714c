//! CLI module for pipeshell
//!
//! This module provides the command-line interface, including:
//! - Argument parsing (`Cli`)
//! - Runtime setup (`setup`)
//! - The script and interactive loops (`repl`)

pub mod repl;
pub mod setup;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

pub use repl::{Shell, NO_EXIT_DIRECTIVE};
pub use setup::{apply_overrides, build_filter, default_directive, init_logging, LOG_ENV};

use crate::config::load_config;

#[derive(Parser, Debug)]
#[command(name = "pipeshell")]
#[command(about = "Interactive shell running commands as multi-phase pipelines", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (skips the .pipeshell.toml search)
    #[arg(short, long, visible_alias = "parameter")]
    pub config: Option<PathBuf>,

    /// Script to execute line by line before (or instead of) the prompt
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Keep the shell open after the script
    #[arg(short = 'n', long = "no-exit")]
    pub no_exit: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Override how often one subcommand phase may run per line
    #[arg(long = "execution-limit", env = "PIPESHELL_EXECUTION_LIMIT")]
    pub execution_limit: Option<u32>,
}

/// Parse CLI arguments using Clap
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Run the shell as described by the command line.
pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbosity);

    let config = load_config(cli.config.as_deref())?;
    let config = apply_overrides(config, cli.execution_limit)?;
    let mut shell = Shell::new(config)?;
    info!(commands = shell.registry().len(), "shell ready");

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();

    let mut interactive = true;
    if let Some(script) = &cli.script {
        let file = File::open(script)
            .with_context(|| format!("cannot open script {}", script.display()))?;
        let keep_open = shell.run_script(BufReader::new(file), &mut out, &mut err)?;
        interactive = keep_open || cli.no_exit;
    }

    if interactive {
        let stdin = io::stdin();
        shell.run_interactive(stdin.lock(), &mut out, &mut err)?;
    }
    Ok(())
}
