//! Per-operation argument extraction.
//!
//! A configuration maps operation names to an [`OperationSpec`]. Extraction
//! turns that entry into the positional and keyword arguments of one call, or
//! reports that the operation must not be invoked at all.

use std::collections::BTreeMap;
use std::fmt;

use crate::value::{Key, Map, Value};

/// Browser operations a configuration can parameterize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Launch,
    Goto,
    EmulateMedia,
    WaitForNavigation,
    WaitFor,
    Pdf,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Launch,
        Operation::Goto,
        Operation::EmulateMedia,
        Operation::WaitForNavigation,
        Operation::WaitFor,
        Operation::Pdf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Launch => "launch",
            Operation::Goto => "goto",
            Operation::EmulateMedia => "emulateMedia",
            Operation::WaitForNavigation => "waitForNavigation",
            Operation::WaitFor => "waitFor",
            Operation::Pdf => "pdf",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of one operation call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationArgs {
    pub positional: Vec<Value>,
    pub keywords: BTreeMap<String, Value>,
}

impl OperationArgs {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Sets a keyword unless the caller already provided it.
    pub fn set_default_keyword(&mut self, name: &str, value: impl Into<Value>) {
        self.keywords
            .entry(name.to_string())
            .or_insert_with(|| value.into());
    }

    pub fn positional_json(&self) -> Vec<serde_json::Value> {
        self.positional.iter().map(Value::to_json).collect()
    }

    pub fn keywords_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.keywords
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// How a configuration entry wants an operation to be called.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationSpec {
    /// `null` at the operation level: do not call.
    Suppressed,
    /// A bare sequence or scalar: positional arguments only.
    Positional(Vec<Value>),
    /// A mapping: positional arguments under `()`, the rest as keywords.
    Call(OperationArgs),
}

impl OperationSpec {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => OperationSpec::Suppressed,
            Value::Map(map) => OperationSpec::Call(split_mapping(map)),
            other => OperationSpec::Positional(into_positional(other)),
        }
    }

    pub fn into_args(self) -> Option<OperationArgs> {
        match self {
            OperationSpec::Suppressed => None,
            OperationSpec::Positional(positional) => Some(OperationArgs {
                positional,
                keywords: BTreeMap::new(),
            }),
            OperationSpec::Call(args) => Some(args),
        }
    }
}

fn split_mapping(map: &Map) -> OperationArgs {
    let positional = map
        .get(&Key::Positional)
        .map(into_positional)
        .unwrap_or_default();
    let keywords = map
        .iter()
        .filter_map(|(key, value)| key.as_name().map(|name| (name.to_string(), value.clone())))
        .collect();
    OperationArgs {
        positional,
        keywords,
    }
}

/// A string is one argument, never a sequence of characters.
fn into_positional(value: &Value) -> Vec<Value> {
    match value {
        Value::Seq(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Resolves the arguments for `op` from `config`.
///
/// A missing key falls back to `default` (treated as `null` when absent).
/// Returns `None` when the resolved entry is `null`, which means the operation
/// must not be invoked; a default of `{}` or `[]` yields empty arguments.
/// The configuration is only read.
pub fn extract(op: &str, config: &Map, default: Option<&Value>) -> Option<OperationArgs> {
    let resolved = config
        .get(&Key::name(op))
        .or(default)
        .unwrap_or(&Value::Null);
    OperationSpec::from_value(resolved).into_args()
}
