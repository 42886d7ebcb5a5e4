//! Consistency checks over trees and documents.
//!
//! Findings are advisory: they are collected and returned, never raised. Only
//! a document that is not a JSON object at all is an error.
pub mod document;
pub mod tree;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::node::{NodeId, SchemaType};

pub use document::check_document;
pub use tree::check_tree;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// JSON Pointer into the (compiled) document.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    #[serde(flatten)]
    pub kind: FindingKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    // ---- tree ----
    DuplicateName { name: String },
    InapplicableField { field: String, ty: SchemaType },
    TooManyItems { count: usize },
    DanglingChild { child: NodeId },
    ParentMismatch { child: NodeId },
    Unreachable,
    // ---- document ----
    MalformedType { found: Value },
    PropertiesNotMapping,
    SubSchemaNotObject,
    RequiredNotArray,
    RequiredEntryNotString { index: usize },
    UnknownRequiredName { name: String },
    // ---- both ----
    InvalidValue { field: String, expected: &'static str },
    InvalidPattern { message: String },
    InvertedRange { lower: String, upper: String },
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::DuplicateName { name } => write!(f, "duplicate property name `{name}`"),
            FindingKind::InapplicableField { field, ty } => {
                write!(f, "`{field}` does not apply to {ty} schemas")
            }
            FindingKind::TooManyItems { count } => {
                write!(f, "array has {count} items children, expected at most one")
            }
            FindingKind::DanglingChild { child } => write!(f, "child {child} is missing"),
            FindingKind::ParentMismatch { child } => {
                write!(f, "child {child} points at a different parent")
            }
            FindingKind::Unreachable => f.write_str("node is not reachable from the root"),
            FindingKind::MalformedType { found } => write!(f, "unsupported `type` {found}"),
            FindingKind::PropertiesNotMapping => {
                f.write_str("`properties` is not a mapping from name to schema")
            }
            FindingKind::SubSchemaNotObject => f.write_str("sub-schema is not a JSON object"),
            FindingKind::RequiredNotArray => f.write_str("`required` is not an array"),
            FindingKind::RequiredEntryNotString { index } => {
                write!(f, "`required[{index}]` is not a string")
            }
            FindingKind::UnknownRequiredName { name } => {
                write!(f, "`{name}` is required but not declared in `properties`")
            }
            FindingKind::InvalidValue { field, expected } => {
                write!(f, "`{field}` should be {expected}")
            }
            FindingKind::InvalidPattern { message } => write!(f, "invalid `pattern`: {message}"),
            FindingKind::InvertedRange { lower, upper } => {
                write!(f, "`{lower}` is greater than `{upper}`")
            }
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{path}: {}", self.kind)
    }
}

/// What a well-formed value for `key` looks like, for keys with a fixed shape.
pub(crate) fn expected_shape(key: &str) -> Option<&'static str> {
    Some(match key {
        "description" | "format" | "pattern" => "a string",
        "minLength" | "maxLength" => "a non-negative integer",
        "minimum" | "maximum" => "a number",
        "enum" => "an array of strings",
        _ => return None,
    })
}

/// Check `pattern` compiles. JSON Schema patterns are ECMA-262; the `regex`
/// dialect is close enough for the common subset.
pub(crate) fn pattern_error(pattern: &str) -> Option<String> {
    regex::Regex::new(pattern).err().map(|e| e.to_string())
}
