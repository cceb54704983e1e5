//! Versioned preference bundles.
//!
//! Wire shape: a one-element JSON array wrapping a flat object whose values
//! are all strings, e.g.
//!
//! ```json
//! [ { "upload_interval": "3600", "preferences_version": "5" } ]
//! ```
//!
//! A bare object is accepted too. Numbers and booleans are stringified.

use super::{PreferenceError, PREFERENCES_VERSION};
use serde_json::Value;

/// A parsed bundle. Entries keep the keys exactly as they appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceBundle {
    entries: Vec<(String, String)>,
    version: i32,
}

impl PreferenceBundle {
    /// Parse a bundle document.
    pub fn parse(json: &str) -> Result<Self, PreferenceError> {
        let doc: Value =
            serde_json::from_str(json).map_err(|e| PreferenceError::Parse(e.to_string()))?;

        let object = match doc {
            Value::Array(items) => match items.into_iter().next() {
                Some(Value::Object(map)) => map,
                Some(other) => {
                    return Err(PreferenceError::Parse(format!(
                        "expected an object inside the bundle array, found {}",
                        json_type(&other)
                    )))
                }
                None => return Err(PreferenceError::Parse("empty bundle array".to_string())),
            },
            Value::Object(map) => map,
            other => {
                return Err(PreferenceError::Parse(format!(
                    "expected an array or object, found {}",
                    json_type(&other)
                )))
            }
        };

        let mut entries = Vec::with_capacity(object.len());
        let mut version = None;
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(PreferenceError::Parse(format!(
                        "value for '{key}' must be a string, found {}",
                        json_type(&other)
                    )))
                }
            };
            if key.eq_ignore_ascii_case(PREFERENCES_VERSION) {
                let v = text
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| PreferenceError::InvalidVersion(text.clone()))?;
                version = Some(v);
            }
            entries.push((key, text));
        }

        let version = version.ok_or(PreferenceError::MissingVersion)?;
        Ok(Self { entries, version })
    }

    /// Read and parse a bundle file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, PreferenceError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PreferenceError::Io(e.to_string()))?;
        Self::parse(&content)
    }

    /// The declared `preferences_version`.
    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
