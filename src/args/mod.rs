//! Argument binding for phase handlers.
//!
//! The engine assembles the positional values for a phase call (the
//! subcommand's static arguments followed by the current data item) and,
//! when the phase has an [`ArgBinder`], turns them into a name→value map.
//! Type checking and coercion are left to the binder implementation; the
//! engine only cares that a handler receives [`Args`].

mod feeder;

pub use feeder::{ArgFeeder, ArgSpec};

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::errors::ArgError;

/// Arguments handed to a phase handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Args {
    /// Raw positional values, static arguments first.
    Positional(Vec<Value>),
    /// Values bound to names by an [`ArgBinder`].
    Named(BTreeMap<String, Value>),
}

impl Args {
    /// Positional values, empty for named arguments.
    pub fn positional(&self) -> &[Value] {
        match self {
            Self::Positional(values) => values,
            Self::Named(_) => &[],
        }
    }

    /// First positional value.
    pub fn first(&self) -> Option<&Value> {
        self.positional().first()
    }

    /// First positional value as a string slice.
    pub fn first_str(&self) -> Option<&str> {
        self.first().and_then(Value::as_str)
    }

    /// Named value lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Named(map) => map.get(name),
            Self::Positional(_) => None,
        }
    }

    /// Named value lookup as a string slice.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume into plain values; named arguments come out in name order.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Positional(values) => values,
            Self::Named(map) => map.into_values().collect(),
        }
    }
}

/// Turns positional values into named arguments.
pub trait ArgBinder: Send + Sync + fmt::Debug {
    /// Bind `values` to names. Surplus values may be ignored.
    fn bind(&self, values: Vec<Value>) -> Result<BTreeMap<String, Value>, ArgError>;

    /// One-line usage string for help output.
    fn usage(&self) -> String {
        String::new()
    }
}

/// Build the positional values for one phase call.
///
/// Static arguments come first when `use_args` is set. A `Null` item adds
/// nothing, an array item is spread, any other item is appended as is.
pub(crate) fn positional_values(
    static_args: &[Value],
    use_args: bool,
    item: &Value,
) -> Vec<Value> {
    let mut values = if use_args {
        static_args.to_vec()
    } else {
        Vec::new()
    };
    match item {
        Value::Null => {}
        Value::Array(items) => values.extend(items.iter().cloned()),
        other => values.push(other.clone()),
    }
    values
}
