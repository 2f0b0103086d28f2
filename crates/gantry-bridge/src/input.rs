//! Engine-side input values
//!
//! The engine consumes a self-contained tree of plain data, independent of
//! any managed heap: what remains of the managed input map after the
//! bounded conversion in [`crate::convert`].

use std::fmt;

/// A value in the engine's input tree.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Null / absent value
    Null,

    /// Boolean value
    Bool(bool),

    /// Signed integer
    I64(i64),

    /// Floating point number
    F64(f64),

    /// String (deep copy, possibly truncated by the conversion budget)
    Str(String),

    /// Sequence of values
    Array(Vec<InputValue>),

    /// Ordered map with string keys (the engine's address space)
    Map(Vec<(String, InputValue)>),
}

impl InputValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, InputValue::Null)
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            InputValue::Null => "null",
            InputValue::Bool(_) => "boolean",
            InputValue::I64(_) => "integer",
            InputValue::F64(_) => "float",
            InputValue::Str(_) => "string",
            InputValue::Array(_) => "array",
            InputValue::Map(_) => "map",
        }
    }

    /// Look up a top-level map key, if this value is a map.
    pub fn get(&self, key: &str) -> Option<&InputValue> {
        match self {
            InputValue::Map(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputValue::Null => write!(f, "null"),
            InputValue::Bool(b) => write!(f, "{}", b),
            InputValue::I64(i) => write!(f, "{}", i),
            InputValue::F64(fl) => write!(f, "{}", fl),
            InputValue::Str(s) => write!(f, "\"{}\"", s),
            InputValue::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            InputValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_get() {
        let map = InputValue::Map(vec![
            ("server.request.query".to_string(), InputValue::Str("a=1".to_string())),
            ("server.request.body".to_string(), InputValue::Null),
        ]);

        assert_eq!(
            map.get("server.request.query"),
            Some(&InputValue::Str("a=1".to_string()))
        );
        assert_eq!(map.get("missing"), None);
        assert_eq!(InputValue::Null.get("x"), None);
    }

    #[test]
    fn test_display() {
        let value = InputValue::Map(vec![(
            "k".to_string(),
            InputValue::Array(vec![InputValue::I64(1), InputValue::Bool(true)]),
        )]);
        assert_eq!(value.to_string(), "{k: [1, true]}");
    }
}
