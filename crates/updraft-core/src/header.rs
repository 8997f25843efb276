use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Scalar carried by a structured response header.
///
/// Server-defined headers and manifest filters are echoed back on later
/// requests, so only values that re-serialize unambiguously are kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
}

impl HeaderValue {
    /// Value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Compare against a JSON value using string semantics.
    ///
    /// Manifest metadata is free-form JSON, filters are header scalars; both
    /// sides are compared in their textual form.
    pub fn matches_json(&self, value: &serde_json::Value) -> bool {
        let other = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return false,
        };
        self.to_string() == other
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Ordered key to scalar map parsed from a structured header dictionary.
pub type HeaderDictionary = BTreeMap<String, HeaderValue>;
