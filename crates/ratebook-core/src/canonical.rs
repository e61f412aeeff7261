//! # Canonical Serialization
//!
//! `CanonicalBytes` is the only input a rule checksum is ever computed
//! over. Construction serializes the value to a JSON tree, refuses any
//! non-integer number, then writes the tree per RFC 8785 (JCS): keys sorted
//! by UTF-16 code unit, compact separators, integers in shortest form.
//!
//! Prices, percentages and amounts travel as decimal strings, so a binary
//! float anywhere in a rule tree is an authoring error. The error names the
//! JSON pointer of the first offending number.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
///
/// The field is private; [`CanonicalBytes::new`] and [`canonicalize`] are
/// the only constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `FloatRejected` for a non-integer number, `SerializationFailed` if
    /// serde cannot represent the value as JSON.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let tree = serde_json::to_value(obj)?;
        if let Some((path, value)) = first_float(&tree, String::new()) {
            return Err(CanonicalizationError::FloatRejected { path, value });
        }
        Ok(Self(serde_jcs::to_vec(&tree)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bytes as text. JCS output is always UTF-8.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

/// Canonicalize structured rule data into a deterministic byte string.
pub fn canonicalize(obj: &impl Serialize) -> Result<CanonicalBytes, CanonicalizationError> {
    CanonicalBytes::new(obj)
}

/// Depth-first search for a non-integer number, returning its JSON pointer.
fn first_float(node: &Value, at: String) -> Option<(String, f64)> {
    match node {
        Value::Number(n) if n.is_f64() => n.as_f64().map(|f| (pointer_or_root(at), f)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, item)| first_float(item, format!("{at}/{i}"))),
        Value::Object(map) => map
            .iter()
            .find_map(|(key, item)| first_float(item, format!("{at}/{}", escape_pointer(key)))),
        _ => None,
    }
}

fn pointer_or_root(at: String) -> String {
    if at.is_empty() {
        "/".to_string()
    } else {
        at
    }
}

/// RFC 6901 token escaping.
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
