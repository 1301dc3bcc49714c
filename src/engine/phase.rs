use std::fmt;

use serde::{Deserialize, Serialize};

/// The three ordered phases every subcommand invocation goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Pre-validation, run top-down while the command tree is descended.
    Pre,
    /// Execution, run only at the deepest stage.
    Process,
    /// Post-formatting, run bottom-up while results bubble back.
    Post,
}

impl Phase {
    /// All phases in dispatch order.
    pub const ALL: [Phase; 3] = [Phase::Pre, Phase::Process, Phase::Post];

    pub(crate) fn slot(self) -> usize {
        match self {
            Self::Pre => 0,
            Self::Process => 1,
            Self::Post => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Process => write!(f, "process"),
            Self::Post => write!(f, "post"),
        }
    }
}
