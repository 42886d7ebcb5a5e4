//! Typed node model for the editable schema tree.
//!
//! A node's type-dependent constraints live inside [`Shape`], one variant per
//! [`SchemaType`], so a string node simply has nowhere to keep a `minimum`.
//! Links between nodes are ids; the arena in [`crate::tree`] owns the nodes.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use uuid::Uuid;

// ————————————————————————————————————————————————————————————————————————————
// IDENTITY
// ————————————————————————————————————————————————————————————————————————————

/// Opaque node identity. Never derived from name or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl SchemaType {
    pub const ALL: [SchemaType; 6] = [
        SchemaType::String,
        SchemaType::Number,
        SchemaType::Boolean,
        SchemaType::Array,
        SchemaType::Object,
        SchemaType::Null,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Null => "null",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn is_container(self) -> bool {
        matches!(self, SchemaType::Array | SchemaType::Object)
    }

    /// Constraint fields meaningful for this type, in emission order.
    pub fn applicable_fields(self) -> &'static [ConstraintField] {
        match self {
            SchemaType::String => &[
                ConstraintField::Enum,
                ConstraintField::MinLength,
                ConstraintField::MaxLength,
                ConstraintField::Pattern,
            ],
            SchemaType::Number => &[ConstraintField::Minimum, ConstraintField::Maximum],
            _ => &[],
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VOCABULARY
// ————————————————————————————————————————————————————————————————————————————

/// Document keywords the typed model understands. Anything else is opaque.
pub const KEYWORDS: [&str; 12] = [
    "type",
    "description",
    "format",
    "enum",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "properties",
    "required",
    "items",
];

pub fn is_keyword(key: &str) -> bool {
    KEYWORDS.contains(&key)
}

/// Whether a supported keyword is meaningful on a node of type `ty`.
/// Unknown keys are never "applicable"; they belong to passthrough.
pub fn keyword_applies(key: &str, ty: SchemaType) -> bool {
    match key {
        "type" | "description" | "format" => true,
        "properties" | "required" => ty == SchemaType::Object,
        "items" => ty == SchemaType::Array,
        other => ConstraintField::from_key(other).is_some_and(|f| f.owner() == ty),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRAINTS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintField {
    Enum,
    MinLength,
    MaxLength,
    Pattern,
    Minimum,
    Maximum,
}

impl ConstraintField {
    pub fn key(self) -> &'static str {
        match self {
            ConstraintField::Enum => "enum",
            ConstraintField::MinLength => "minLength",
            ConstraintField::MaxLength => "maxLength",
            ConstraintField::Pattern => "pattern",
            ConstraintField::Minimum => "minimum",
            ConstraintField::Maximum => "maximum",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "enum" => ConstraintField::Enum,
            "minLength" => ConstraintField::MinLength,
            "maxLength" => ConstraintField::MaxLength,
            "pattern" => ConstraintField::Pattern,
            "minimum" => ConstraintField::Minimum,
            "maximum" => ConstraintField::Maximum,
            _ => return None,
        })
    }

    /// The one type this field belongs to.
    pub fn owner(self) -> SchemaType {
        match self {
            ConstraintField::Enum
            | ConstraintField::MinLength
            | ConstraintField::MaxLength
            | ConstraintField::Pattern => SchemaType::String,
            ConstraintField::Minimum | ConstraintField::Maximum => SchemaType::Number,
        }
    }
}

/// A single constraint assignment. `None` clears the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum Constraint {
    Enum(Option<Vec<String>>),
    MinLength(Option<u64>),
    MaxLength(Option<u64>),
    Pattern(Option<String>),
    Minimum(Option<Number>),
    Maximum(Option<Number>),
}

impl Constraint {
    pub fn field(&self) -> ConstraintField {
        match self {
            Constraint::Enum(_) => ConstraintField::Enum,
            Constraint::MinLength(_) => ConstraintField::MinLength,
            Constraint::MaxLength(_) => ConstraintField::MaxLength,
            Constraint::Pattern(_) => ConstraintField::Pattern,
            Constraint::Minimum(_) => ConstraintField::Minimum,
            Constraint::Maximum(_) => ConstraintField::Maximum,
        }
    }

    /// Read a constraint from its document form. `None` when the value has
    /// the wrong JSON shape for the field.
    pub fn from_document(field: ConstraintField, value: &Value) -> Option<Self> {
        Some(match field {
            // a document enum is a set: keep first occurrences only
            ConstraintField::Enum => Constraint::Enum(Some(
                value
                    .as_array()?
                    .iter()
                    .map(|v| v.as_str().map(str::to_owned))
                    .collect::<Option<IndexSet<_>>>()?
                    .into_iter()
                    .collect(),
            )),
            ConstraintField::MinLength => Constraint::MinLength(Some(as_length(value)?)),
            ConstraintField::MaxLength => Constraint::MaxLength(Some(as_length(value)?)),
            ConstraintField::Pattern => Constraint::Pattern(Some(value.as_str()?.to_owned())),
            ConstraintField::Minimum => match value {
                Value::Number(n) => Constraint::Minimum(Some(n.clone())),
                _ => return None,
            },
            ConstraintField::Maximum => match value {
                Value::Number(n) => Constraint::Maximum(Some(n.clone())),
                _ => return None,
            },
        })
    }
}

/// A length bound: a non-negative integer, also when written as `2.0`.
fn as_length(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringConstraints {
    /// Entry order as typed by the user; duplicates allowed until compile.
    /// `Some(vec![])` is an enum that admits nothing.
    pub enum_values: Option<Vec<String>>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberConstraints {
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
}

// ————————————————————————————————————————————————————————————————————————————
// SHAPE
// ————————————————————————————————————————————————————————————————————————————

/// The type of a node together with exactly the fields that type allows.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    String(StringConstraints),
    Number(NumberConstraints),
    Boolean,
    Null,
    Array { items: Option<NodeId> },
    Object { properties: Vec<NodeId> },
}

impl Shape {
    pub fn empty(ty: SchemaType) -> Self {
        match ty {
            SchemaType::String => Shape::String(StringConstraints::default()),
            SchemaType::Number => Shape::Number(NumberConstraints::default()),
            SchemaType::Boolean => Shape::Boolean,
            SchemaType::Null => Shape::Null,
            SchemaType::Array => Shape::Array { items: None },
            SchemaType::Object => Shape::Object { properties: Vec::new() },
        }
    }

    pub fn schema_type(&self) -> SchemaType {
        match self {
            Shape::String(_) => SchemaType::String,
            Shape::Number(_) => SchemaType::Number,
            Shape::Boolean => SchemaType::Boolean,
            Shape::Null => SchemaType::Null,
            Shape::Array { .. } => SchemaType::Array,
            Shape::Object { .. } => SchemaType::Object,
        }
    }

    /// Child ids in order: the items child of an array, the properties of an object.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Shape::Array { items } => items.as_slice(),
            Shape::Object { properties } => properties.as_slice(),
            _ => &[],
        }
    }

    /// Store `constraint` if it belongs to this shape; hand it back otherwise.
    pub(crate) fn apply(&mut self, constraint: Constraint) -> Result<(), Constraint> {
        match (self, constraint) {
            (Shape::String(c), Constraint::Enum(values)) => c.enum_values = values,
            (Shape::String(c), Constraint::MinLength(v)) => c.min_length = v,
            (Shape::String(c), Constraint::MaxLength(v)) => c.max_length = v,
            (Shape::String(c), Constraint::Pattern(v)) => c.pattern = v,
            (Shape::Number(c), Constraint::Minimum(v)) => c.minimum = v,
            (Shape::Number(c), Constraint::Maximum(v)) => c.maximum = v,
            (_, other) => return Err(other),
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PASSTHROUGH
// ————————————————————————————————————————————————————————————————————————————

/// How an imported node declared its type when it wasn't one we model.
#[derive(Debug, Clone, PartialEq)]
pub enum OriginalType {
    Missing,
    Unrecognized(Value),
}

/// Imported document content the typed model does not interpret.
/// Read-only from the editor's point of view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Passthrough {
    /// Set for nodes imported as `string` because their `type` was absent or unknown.
    pub original_type: Option<OriginalType>,
    pub fields: IndexMap<String, Value>,
    /// Entries of an object's `properties` whose sub-schema is not a JSON
    /// object (e.g. `"extra": true`). Emitted after the typed properties.
    pub properties: IndexMap<String, OpaqueProperty>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueProperty {
    pub schema: Value,
    pub required: bool,
}

impl Passthrough {
    pub fn is_empty(&self) -> bool {
        self.original_type.is_none() && self.fields.is_empty() && self.properties.is_empty()
    }

    /// Untyped nodes replay their whole bag; typed nodes never emit keywords from it.
    pub fn is_verbatim(&self) -> bool {
        self.original_type.is_some()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) name: String,
    pub(crate) required: bool,
    pub(crate) description: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) shape: Shape,
    pub(crate) passthrough: Passthrough,
}

impl SchemaNode {
    pub(crate) fn new(id: NodeId, parent: Option<NodeId>, ty: SchemaType) -> Self {
        Self {
            id,
            parent,
            name: String::new(),
            required: false,
            description: None,
            format: None,
            shape: Shape::empty(ty),
            passthrough: Passthrough::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_blank_name(&self) -> bool {
        is_blank(&self.name)
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn schema_type(&self) -> SchemaType {
        self.shape.schema_type()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn passthrough(&self) -> &Passthrough {
        &self.passthrough
    }
}

pub fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_only_modelled_types() {
        assert_eq!(SchemaType::parse("array"), Some(SchemaType::Array));
        assert_eq!(SchemaType::parse("integer"), None);
        assert_eq!(SchemaType::parse("String"), None);
    }

    #[test]
    fn shape_rejects_foreign_constraints() {
        let mut shape = Shape::empty(SchemaType::Boolean);
        let back = shape.apply(Constraint::MinLength(Some(3))).unwrap_err();
        assert_eq!(back.field(), ConstraintField::MinLength);
        assert_eq!(shape, Shape::Boolean);

        let mut shape = Shape::empty(SchemaType::Number);
        shape.apply(Constraint::Minimum(Some(0.into()))).unwrap();
        let Shape::Number(c) = shape else { panic!("still a number") };
        assert_eq!(c.minimum, Some(0.into()));
    }

    #[test]
    fn constraints_read_only_well_shaped_values() {
        assert_eq!(
            Constraint::from_document(ConstraintField::Enum, &json!(["a", "b"])),
            Some(Constraint::Enum(Some(vec!["a".into(), "b".into()])))
        );
        assert_eq!(Constraint::from_document(ConstraintField::Enum, &json!(["a", 1])), None);
        assert_eq!(
            Constraint::from_document(ConstraintField::Enum, &json!(["b", "a", "b"])),
            Some(Constraint::Enum(Some(vec!["b".into(), "a".into()])))
        );
        assert_eq!(
            Constraint::from_document(ConstraintField::Enum, &json!([])),
            Some(Constraint::Enum(Some(Vec::new())))
        );
        assert_eq!(Constraint::from_document(ConstraintField::MinLength, &json!(-1)), None);
        assert_eq!(
            Constraint::from_document(ConstraintField::MinLength, &json!(2.0)),
            Some(Constraint::MinLength(Some(2)))
        );
        assert_eq!(Constraint::from_document(ConstraintField::MaxLength, &json!(2.5)), None);
        assert_eq!(Constraint::from_document(ConstraintField::MaxLength, &json!(-3.0)), None);
        assert_eq!(
            Constraint::from_document(ConstraintField::Maximum, &json!(2.5)),
            Some(Constraint::Maximum(serde_json::Number::from_f64(2.5)))
        );
    }

    #[test]
    fn keyword_applicability_follows_type_table() {
        assert!(keyword_applies("format", SchemaType::Boolean));
        assert!(keyword_applies("pattern", SchemaType::String));
        assert!(!keyword_applies("pattern", SchemaType::Number));
        assert!(keyword_applies("items", SchemaType::Array));
        assert!(!keyword_applies("required", SchemaType::Array));
        assert!(!keyword_applies("$ref", SchemaType::Object));
    }

    #[test]
    fn constraint_wire_form_is_field_and_value() {
        let c: Constraint = serde_json::from_value(json!({"field": "maxLength", "value": 10})).unwrap();
        assert_eq!(c, Constraint::MaxLength(Some(10)));
        let c: Constraint = serde_json::from_value(json!({"field": "pattern", "value": null})).unwrap();
        assert_eq!(c, Constraint::Pattern(None));
    }
}
