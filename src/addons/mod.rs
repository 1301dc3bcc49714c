//! Addons bundle commands and register them into a [`Registry`].
//!
//! The shell loads the addons listed in its configuration, in order. An
//! addon only adds commands; it cannot replace one registered earlier.

mod standard;

pub use standard::StandardAddon;

use tracing::info;

use crate::errors::{Result, ShellError};
use crate::registry::Registry;

pub trait Addon {
    /// Name used in the `shell.addons` configuration list.
    fn name(&self) -> &'static str;

    fn register(&self, registry: &mut Registry) -> Result<()>;
}

/// Look up a bundled addon by name.
pub fn builtin(name: &str) -> Option<Box<dyn Addon>> {
    match name {
        "std" => Some(Box::new(StandardAddon)),
        _ => None,
    }
}

/// Register every addon in `names` into `registry`.
pub fn load<S: AsRef<str>>(names: &[S], registry: &mut Registry) -> Result<()> {
    for name in names {
        let name = name.as_ref();
        let addon = builtin(name).ok_or_else(|| ShellError::UnknownAddon(name.to_string()))?;
        addon.register(registry)?;
        info!(addon = addon.name(), commands = registry.len(), "loaded addon");
    }
    Ok(())
}
