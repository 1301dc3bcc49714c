use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::ShellConfig;
use crate::errors::{Result, ShellError};

/// File name searched for in the working directory and its ancestors
pub const CONFIG_FILE_NAME: &str = ".pipeshell.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Pure function to read config file contents
pub(crate) fn read_config_file(path: &Path) -> std::result::Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Pure function to parse and validate config from a TOML string
pub fn parse_and_validate_config(contents: &str) -> std::result::Result<ShellConfig, String> {
    let config = toml::from_str::<ShellConfig>(contents)
        .map_err(|e| format!("failed to parse {}: {}", CONFIG_FILE_NAME, e))?;
    config.validate()?;
    Ok(config)
}

/// Try a discovered config file; unreadable or invalid files are skipped
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<ShellConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            handle_read_error(config_path, &e);
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            log::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("{} ({}). Using defaults.", e, config_path.display());
            None
        }
    }
}

/// Only log actual errors, not "file not found"
pub(crate) fn handle_read_error(config_path: &Path, error: &std::io::Error) {
    if error.kind() != std::io::ErrorKind::NotFound {
        log::warn!(
            "Failed to read config file {}: {}",
            config_path.display(),
            error
        );
    }
}

/// Pure function to generate directory ancestors up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Per-user config file, `<config dir>/pipeshell/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pipeshell").join("config.toml"))
}

/// Load configuration from an explicit file. Any failure is an error.
pub fn load_config_file(path: &Path) -> Result<ShellConfig> {
    let contents = read_config_file(path)
        .map_err(|e| ShellError::config_at(format!("cannot read config: {}", e), path))?;
    let config =
        parse_and_validate_config(&contents).map_err(|e| ShellError::config_at(e, path))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Search `start` and its ancestors, then `user_file`, falling back to
/// defaults.
pub fn discover_config(start: PathBuf, user_file: Option<PathBuf>) -> ShellConfig {
    directory_ancestors(start, MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .chain(user_file)
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            ShellConfig::default()
        })
}

/// Load the configuration for a shell session.
///
/// An explicit path must load cleanly. Without one, the working directory
/// and its ancestors are searched for `.pipeshell.toml`, then the per-user
/// config file is tried, then defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<ShellConfig> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    let current = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            log::warn!(
                "Failed to get current directory: {}. Using default config.",
                e
            );
            return Ok(ShellConfig::default());
        }
    };
    Ok(discover_config(current, user_config_path()))
}
