//! Configuration for the engine and the interactive shell.
//!
//! Settings are read from TOML. Every field has a default, so a config
//! file only needs to name what it changes:
//!
//! ```toml
//! [engine]
//! execution_limit = 64
//!
//! [shell]
//! prompt = "> "
//! addons = ["std"]
//! ```
//!
//! See [`load_config`] for the lookup order.

mod core;
mod loader;

pub use core::{EngineConfig, ShellConfig, ShellSettings};
pub use loader::{
    directory_ancestors, discover_config, load_config, load_config_file,
    parse_and_validate_config, user_config_path, CONFIG_FILE_NAME,
};
