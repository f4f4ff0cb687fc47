//! SIRI value nodes
//!
//! SIRI-Lite serializes most scalars either as a bare string or wrapped in an
//! object carrying a `value` field (`{"value": "bordeaux:Line:A:LOC"}`).
//! [`SiriNode`] classifies a node once at the parse boundary so callers only
//! ever see a plain string.

use serde_json::Value;

/// Shape of a JSON node that may carry a SIRI scalar
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SiriNode<'a> {
    /// Missing key or explicit `null`
    Absent,
    /// A bare string, number or boolean
    Scalar(&'a Value),
    /// An object; holds its `value` field if present
    Wrapped(Option<&'a Value>),
    /// Anything else (arrays)
    Unsupported,
}

impl<'a> SiriNode<'a> {
    /// Classify an optional JSON node
    #[must_use]
    pub fn classify(node: Option<&'a Value>) -> Self {
        match node {
            None | Some(Value::Null) => Self::Absent,
            Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => Self::Scalar(v),
            Some(Value::Object(map)) => Self::Wrapped(map.get("value")),
            Some(Value::Array(_)) => Self::Unsupported,
        }
    }

    /// The string carried by this node, empty when there is none
    #[must_use]
    pub fn text(self) -> String {
        match self {
            Self::Scalar(v) | Self::Wrapped(Some(v)) => scalar_text(v),
            Self::Absent | Self::Wrapped(None) | Self::Unsupported => String::new(),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Extract the scalar carried by a SIRI node as a string
///
/// Never fails: absence of any kind is the empty string.
#[must_use]
pub fn extract_value(node: Option<&Value>) -> String {
    SiriNode::classify(node).text()
}

/// Extract the first element of a node that SIRI sends as a sequence
///
/// `DestinationName`, `DirectionName` and `StopPointName` arrive as arrays of
/// value nodes. Only the first element is consulted; a non-array node is
/// treated as a one-element sequence.
#[must_use]
pub fn extract_first(node: Option<&Value>) -> String {
    match node {
        Some(Value::Array(items)) => extract_value(items.first()),
        other => extract_value(other),
    }
}
