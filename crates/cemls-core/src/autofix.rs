//! Autofix payloads for code actions.
//!
//! Diagnostics attach one of these to carry enough information for the
//! matching code action. The payload round-trips through an untyped
//! key/value map so it can ride the editor protocol's `data` field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::documents::Range;

/// What a fix does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutofixKind {
    /// Insert an import that makes a tag available.
    AddImport,
    /// Replace an unknown tag with a known one.
    RenameTag,
    /// Replace an unknown attribute with a declared one.
    RenameAttribute,
}

impl AutofixKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AutofixKind::AddImport => "add-import",
            AutofixKind::RenameTag => "rename-tag",
            AutofixKind::RenameAttribute => "rename-attribute",
        }
    }
}

/// Data carried from a diagnostic to its code action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutofixData {
    #[serde(rename = "type")]
    pub kind: AutofixKind,
    /// The text being replaced or complained about.
    pub original: String,
    /// The replacement or inserted text.
    pub suggestion: String,
    /// Where the fix applies.
    pub range: Range,
    /// Module specifier for [`AutofixKind::AddImport`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_path: Option<String>,
    /// The tag the fix concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
}

impl AutofixData {
    /// Serialize into an untyped map for protocol transport.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Deserialize from an untyped map. Returns `None` on malformed input.
    pub fn from_map(map: Map<String, Value>) -> Option<Self> {
        serde_json::from_value(Value::Object(map)).ok()
    }

    /// Deserialize from any JSON value carrying a map.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Self::from_map(map.clone()),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
