//! Loosely-typed option tree produced by the literal parser.
//!
//! Options for every browser operation live in one nested structure. Leaves
//! are scalars, inner nodes are sequences or mappings, and a mapping may carry
//! the reserved [`Key::Positional`] entry holding positional arguments.

use std::collections::BTreeMap;
use std::fmt;

/// Mapping key: either the positional marker `()` or a keyword name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Positional,
    Name(String),
}

impl Key {
    pub fn name(name: impl Into<String>) -> Self {
        Key::Name(name.into())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Positional => None,
            Key::Name(name) => Some(name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Positional => f.write_str("()"),
            Key::Name(name) if is_identifier(name) => f.write_str(name),
            Key::Name(name) => write_quoted(f, name),
        }
    }
}

pub type Map = BTreeMap<Key, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Map(Map),
}

impl Value {
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
        }
    }

    /// Converts into the JSON shape handed to the browser driver.
    ///
    /// A nested positional marker has no JSON spelling and is emitted under the `"()"` key.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Seq(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(map_to_json(map)),
        }
    }
}

pub fn map_to_json(map: &Map) -> serde_json::Map<String, serde_json::Value> {
    map.iter()
        .map(|(key, value)| {
            let key = match key {
                Key::Positional => "()".to_string(),
                Key::Name(name) => name.clone(),
            };
            (key, value.to_json())
        })
        .collect()
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

/// Renders the relaxed literal notation accepted by [`crate::literal::parse`].
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write_quoted(f, s),
            Value::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match key {
                        Key::Name(name) if is_identifier(name) => write!(f, "{name}={value}")?,
                        _ => write!(f, "{key}: {value}")?,
                    }
                }
                f.write_str("}")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("'")?;
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '\'' => f.write_str("\\'")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("'")
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        let mut margin = Map::new();
        margin.insert(Key::name("top"), Value::from("1in"));
        let mut pdf = Map::new();
        pdf.insert(Key::name("printBackground"), Value::Bool(true));
        pdf.insert(Key::name("margin"), Value::Map(margin));
        pdf.insert(Key::Positional, Value::Seq(vec![Value::Int(1)]));
        Value::Map(pdf)
    }

    #[test]
    fn display_uses_relaxed_notation() {
        let rendered = sample().to_string();
        assert_eq!(
            rendered,
            "{(): [1], margin={top='1in'}, printBackground=True}"
        );
    }

    #[test]
    fn display_quotes_non_identifier_keys() {
        let mut map = Map::new();
        map.insert(Key::name("data-x"), Value::Null);
        assert_eq!(Value::Map(map).to_string(), "{'data-x': None}");
    }

    #[test]
    fn display_escapes_quotes() {
        assert_eq!(Value::from("it's").to_string(), r"'it\'s'");
    }

    #[test]
    fn to_json_maps_scalars_and_nesting() {
        let json = sample().to_json();
        assert_eq!(json["printBackground"], serde_json::Value::Bool(true));
        assert_eq!(json["margin"]["top"], "1in");
        assert_eq!(json["()"][0], 1);
    }

    #[test]
    fn non_finite_float_becomes_json_null() {
        assert!(Value::Float(f64::NAN).to_json().is_null());
    }

    #[test]
    fn identifier_detection() {
        assert!(is_identifier("waitUntil"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
