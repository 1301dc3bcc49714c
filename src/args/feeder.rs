use std::collections::BTreeMap;

use serde_json::Value;

use super::ArgBinder;
use crate::errors::ArgError;

/// Arity and default of one named argument slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub minimum: usize,
    /// `None` consumes every remaining value.
    pub maximum: Option<usize>,
    pub default: Option<Value>,
}

impl ArgSpec {
    /// Exactly one value.
    pub fn single() -> Self {
        Self {
            minimum: 1,
            maximum: Some(1),
            default: None,
        }
    }

    /// Between `minimum` and `maximum` values, bound as an array.
    pub fn list(minimum: usize, maximum: Option<usize>) -> Self {
        Self {
            minimum,
            maximum,
            default: None,
        }
    }

    /// Every remaining value, possibly none.
    pub fn rest() -> Self {
        Self::list(0, None)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn is_single(&self) -> bool {
        self.minimum == 1 && self.maximum == Some(1)
    }

    fn empty_value(&self) -> Option<Value> {
        match (&self.default, self.minimum) {
            (Some(default), _) => Some(default.clone()),
            (None, 0) => Some(Value::Array(Vec::new())),
            (None, _) => None,
        }
    }
}

/// Binds positional values to an ordered list of named slots.
///
/// Slots consume values left to right. A slot that finds no values left
/// (and would need some) ends binding; it and every later slot then fall
/// back to their defaults. Surplus values are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgFeeder {
    slots: Vec<(String, ArgSpec)>,
}

impl ArgFeeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot.
    ///
    /// Fails when the previous slot is unbounded (it would starve this one)
    /// or when the name is already taken.
    pub fn arg(mut self, name: impl Into<String>, spec: ArgSpec) -> Result<Self, ArgError> {
        let name = name.into();
        if let Some(max) = spec.maximum {
            if max < spec.minimum || max == 0 {
                return Err(ArgError::Specification(format!(
                    "argument '{}' has maximum {} below minimum {}",
                    name, max, spec.minimum
                )));
            }
        }
        if self.slots.iter().any(|(existing, _)| *existing == name) {
            return Err(ArgError::Specification(format!(
                "argument '{}' is declared twice",
                name
            )));
        }
        if let Some((previous, prev_spec)) = self.slots.last() {
            if prev_spec.maximum.is_none() {
                return Err(ArgError::Specification(format!(
                    "argument '{}' follows '{}', which consumes every remaining value",
                    name, previous
                )));
            }
        }
        self.slots.push((name, spec));
        Ok(self)
    }
}

impl ArgBinder for ArgFeeder {
    fn bind(&self, values: Vec<Value>) -> Result<BTreeMap<String, Value>, ArgError> {
        let mut bound = BTreeMap::new();
        let mut offset = 0;
        let mut consumed_slots = 0;

        for (name, spec) in &self.slots {
            let remaining = &values[offset.min(values.len())..];

            if remaining.is_empty() && (spec.minimum > 0 || spec.default.is_some()) {
                break;
            }
            if remaining.len() < spec.minimum {
                return Err(ArgError::NotEnough {
                    name: name.clone(),
                    minimum: spec.minimum,
                    got: remaining.len(),
                });
            }

            let value = match spec.maximum {
                None => {
                    offset = values.len();
                    Value::Array(remaining.to_vec())
                }
                Some(_) if spec.is_single() => {
                    offset += 1;
                    remaining[0].clone()
                }
                Some(max) => {
                    let take = max.min(remaining.len());
                    offset += take;
                    Value::Array(remaining[..take].to_vec())
                }
            };
            bound.insert(name.clone(), value);
            consumed_slots += 1;
        }

        for (name, spec) in &self.slots[consumed_slots..] {
            let value = spec
                .empty_value()
                .ok_or_else(|| ArgError::Missing(name.clone()))?;
            bound.insert(name.clone(), value);
        }

        Ok(bound)
    }

    fn usage(&self) -> String {
        if self.slots.is_empty() {
            return "no args needed".to_string();
        }
        let mut parts = Vec::with_capacity(self.slots.len());
        let mut optional_open = false;
        for (name, spec) in &self.slots {
            if spec.default.is_some() && !optional_open {
                parts.push(format!("[{}", name));
                optional_open = true;
            } else if spec.maximum.is_none() {
                parts.push(format!("{}...", name));
            } else {
                parts.push(name.clone());
            }
        }
        let mut usage = parts.join(" ");
        if optional_open {
            usage.push(']');
        }
        usage
    }
}
