//! JSON Schema document → tree.
//!
//! Import is tolerant: anything the typed model cannot hold is parked in the
//! node's passthrough bag rather than rejected. Only a root that is not a JSON
//! object fails.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::node::{
    keyword_applies, Constraint, ConstraintField, NodeId, OpaqueProperty, OriginalType, SchemaNode,
    SchemaType, Shape,
};
use crate::path_de;
use crate::tree::SchemaTree;

pub fn decompile(document: &Value) -> Result<SchemaTree> {
    let Value::Object(schema) = document else {
        return Err(Error::MalformedDocument {
            path: "/".into(),
            reason: format!("expected a JSON object, found {}", json_kind(document)),
        });
    };
    let mut importer = Importer::default();
    let root = importer.import(schema, None, String::new());
    debug!(nodes = importer.nodes.len(), parked = importer.parked, "decompiled document");
    Ok(SchemaTree::from_parts(root, importer.nodes))
}

/// Parse JSON text and decompile it. Syntax errors carry their JSON path.
pub fn decompile_str(src: &str) -> Result<SchemaTree> {
    let document: Value = path_de::from_str_with_path(src)?;
    decompile(&document)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPORTER
// ————————————————————————————————————————————————————————————————————————————

#[derive(Default)]
struct Importer {
    nodes: IndexMap<NodeId, SchemaNode>,
    parked: usize,
}

impl Importer {
    fn fresh_id(&self) -> NodeId {
        loop {
            let id = NodeId::generate();
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    fn import(&mut self, schema: &Map<String, Value>, parent: Option<NodeId>, name: String) -> NodeId {
        let id = self.fresh_id();
        let (ty, original_type) = match schema.get("type") {
            None => (SchemaType::String, Some(OriginalType::Missing)),
            Some(Value::String(s)) => match SchemaType::parse(s) {
                Some(ty) => (ty, None),
                None => (SchemaType::String, Some(OriginalType::Unrecognized(Value::from(s.clone())))),
            },
            Some(other) => (SchemaType::String, Some(OriginalType::Unrecognized(other.clone()))),
        };
        let typed = original_type.is_none();

        let mut node = SchemaNode::new(id, parent, ty);
        node.name = name;
        node.passthrough.original_type = original_type;
        // reserve the slot so children can't draw the same id
        self.nodes.insert(id, node.clone());

        for (key, value) in schema {
            match key.as_str() {
                "type" => {}
                "description" | "format" => match value.as_str() {
                    Some(text) if key == "description" => node.description = Some(text.to_owned()),
                    Some(text) => node.format = Some(text.to_owned()),
                    None => self.park(&mut node, key, value),
                },
                _ if !typed => self.park(&mut node, key, value),
                "properties" | "required" | "items" if keyword_applies(key, ty) => {}
                other => {
                    let accepted = ConstraintField::from_key(other)
                        .and_then(|field| Constraint::from_document(field, value))
                        .is_some_and(|c| node.shape.apply(c).is_ok());
                    if !accepted {
                        self.park(&mut node, key, value);
                    }
                }
            }
        }

        if typed {
            match ty {
                SchemaType::Object => self.import_properties(&mut node, schema),
                SchemaType::Array => self.import_items(&mut node, schema),
                _ => {}
            }
        }

        self.nodes.insert(id, node);
        id
    }

    fn import_properties(&mut self, node: &mut SchemaNode, schema: &Map<String, Value>) {
        let mut children = Vec::new();
        match schema.get("properties") {
            None => {}
            Some(Value::Object(props)) => {
                for (name, sub) in props {
                    match sub {
                        Value::Object(sub) => children.push(self.import(sub, Some(node.id), name.clone())),
                        // boolean and other non-object sub-schemas stay opaque
                        other => {
                            self.parked += 1;
                            let opaque = OpaqueProperty { schema: other.clone(), required: false };
                            node.passthrough.properties.insert(name.clone(), opaque);
                        }
                    }
                }
            }
            Some(other) => self.park(node, "properties", other),
        }

        match schema.get("required") {
            None => {}
            Some(Value::Array(names)) => {
                for name in names.iter().filter_map(Value::as_str) {
                    // names with no matching property are ignored
                    let matched = children
                        .iter()
                        .copied()
                        .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name));
                    if let Some(child) = matched.and_then(|c| self.nodes.get_mut(&c)) {
                        child.required = true;
                    } else if let Some(opaque) = node.passthrough.properties.get_mut(name) {
                        opaque.required = true;
                    }
                }
                if !names.iter().all(Value::is_string) {
                    self.park(node, "required", &Value::Array(names.clone()));
                }
            }
            Some(other) => self.park(node, "required", other),
        }

        node.shape = Shape::Object { properties: children };
    }

    fn import_items(&mut self, node: &mut SchemaNode, schema: &Map<String, Value>) {
        let items = match schema.get("items") {
            None => None,
            Some(Value::Object(sub)) if sub.is_empty() => None,
            Some(Value::Object(sub)) => Some(self.import(sub, Some(node.id), String::new())),
            Some(other) => {
                self.park(node, "items", other);
                None
            }
        };
        node.shape = Shape::Array { items };
    }

    fn park(&mut self, node: &mut SchemaNode, key: &str, value: &Value) {
        self.parked += 1;
        node.passthrough.fields.insert(key.to_owned(), value.clone());
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::node::NumberConstraints;
    use crate::validate::check_tree;
    use serde_json::json;

    #[test]
    fn age_document_survives_round_trip() {
        let doc = json!({
            "type": "object",
            "properties": {"age": {"type": "number", "minimum": 0}},
            "required": ["age"]
        });
        let tree = decompile(&doc).unwrap();
        let age = tree.resolve_pointer("/properties/age").unwrap();
        let node = tree.node(age).unwrap();
        assert!(node.required());
        assert_eq!(
            node.shape(),
            &Shape::Number(NumberConstraints { minimum: Some(0.into()), maximum: None })
        );
        assert_eq!(compile(&tree), doc);
    }

    #[test]
    fn non_object_roots_are_malformed() {
        for doc in [json!([]), json!("object"), json!(null), json!(1)] {
            assert!(matches!(decompile(&doc), Err(Error::MalformedDocument { .. })), "{doc}");
        }
        assert!(matches!(decompile_str("{\"type\": "), Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn property_order_follows_the_document() {
        let doc = json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "number"},
                "mid": {"type": "boolean"}
            }
        });
        let tree = decompile(&doc).unwrap();
        let names: Vec<_> = tree
            .children(tree.root())
            .iter()
            .map(|c| tree.node(*c).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn unknown_type_is_a_string_with_passthrough() {
        let doc = json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer", "minimum": 1, "description": "how many"},
                "anything": {"oneOf": [{"type": "string"}, {"type": "null"}]}
            }
        });
        let tree = decompile(&doc).unwrap();
        let count = tree.node(tree.resolve_pointer("/properties/count").unwrap()).unwrap();
        assert_eq!(count.schema_type(), SchemaType::String);
        assert_eq!(count.description(), Some("how many"));
        assert_eq!(
            count.passthrough().original_type,
            Some(OriginalType::Unrecognized(json!("integer")))
        );
        assert_eq!(count.passthrough().fields.get("minimum"), Some(&json!(1)));

        // replayed verbatim
        assert_eq!(compile(&tree), doc);
    }

    #[test]
    fn unknown_keys_on_typed_nodes_are_preserved() {
        let doc = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "additionalProperties": false,
            "properties": {"id": {"type": "string", "examples": ["a1"]}}
        });
        let tree = decompile(&doc).unwrap();
        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.passthrough().fields.len(), 2);
        assert_eq!(compile(&tree), doc);
    }

    #[test]
    fn inapplicable_keywords_are_parked_but_not_emitted() {
        let doc = json!({"type": "string", "minimum": 3, "items": {"type": "string"}});
        let tree = decompile(&doc).unwrap();
        assert_eq!(tree.node_count(), 1);
        let root = tree.node(tree.root()).unwrap();
        assert!(root.passthrough().fields.contains_key("minimum"));
        assert!(root.passthrough().fields.contains_key("items"));
        assert_eq!(compile(&tree), json!({"type": "string"}));
        assert_eq!(check_tree(&tree).len(), 2);
    }

    #[test]
    fn required_names_without_properties_are_ignored() {
        let doc = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "required": ["a", "ghost"]
        });
        let tree = decompile(&doc).unwrap();
        assert_eq!(compile(&tree)["required"], json!(["a"]));
    }

    #[test]
    fn empty_items_means_no_items_child() {
        let tree = decompile(&json!({"type": "array", "items": {}})).unwrap();
        assert!(tree.children(tree.root()).is_empty());
        let tree = decompile(&json!({"type": "array"})).unwrap();
        assert_eq!(compile(&tree), json!({"type": "array", "items": {}}));
    }

    #[test]
    fn non_object_property_schemas_do_not_hide_their_siblings() {
        let doc = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}, "extra": true, "closed": false},
            "required": ["name", "extra"]
        });
        let tree = decompile(&doc).unwrap();
        let name = tree.resolve_pointer("/properties/name").unwrap();
        assert!(tree.node(name).unwrap().required());
        assert_eq!(tree.children(tree.root()).len(), 1);
        assert!(tree.node(tree.root()).unwrap().passthrough().fields.is_empty());
        assert_eq!(
            compile(&tree),
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}, "extra": true, "closed": false},
                "required": ["name", "extra"]
            })
        );
    }

    #[test]
    fn empty_enums_and_integral_float_lengths_survive() {
        let doc = json!({
            "type": "object",
            "properties": {
                "never": {"type": "string", "enum": []},
                "code": {"type": "string", "minLength": 2.0, "maxLength": 4}
            }
        });
        let out = compile(&decompile(&doc).unwrap());
        assert_eq!(out["properties"]["never"], json!({"type": "string", "enum": []}));
        assert_eq!(out["properties"]["code"], json!({"type": "string", "minLength": 2, "maxLength": 4}));
    }

    #[test]
    fn tuple_items_are_kept_opaque() {
        let doc = json!({"type": "array", "items": [{"type": "string"}]});
        let tree = decompile(&doc).unwrap();
        assert!(tree.children(tree.root()).is_empty());
        assert_eq!(
            tree.node(tree.root()).unwrap().passthrough().fields.get("items"),
            Some(&json!([{"type": "string"}]))
        );
    }

    #[test]
    fn ids_are_fresh_per_import() {
        let doc = json!({"type": "object", "properties": {"x": {"type": "null"}}});
        let a = decompile(&doc).unwrap();
        let b = decompile(&doc).unwrap();
        assert_ne!(a.root(), b.root());
        assert_eq!(a.outline(), b.outline());
    }

    #[test]
    fn normalization_is_idempotent() {
        let doc = json!({
            "type": "object",
            "description": "order",
            "properties": {
                "status": {"type": "string", "enum": ["new", "paid", "new"]},
                "lines": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "sku": {"type": "string", "pattern": "^[A-Z]{3}-\\d+$", "maxLength": 12},
                            "qty": {"type": "number", "minimum": 1, "maximum": 99.5}
                        },
                        "required": ["sku", "qty"]
                    }
                },
                "note": {"type": "null"},
                "paid": {"type": "boolean", "format": "flag"}
            },
            "required": ["status"]
        });
        let first = decompile(&doc).unwrap();
        let second = decompile(&compile(&first)).unwrap();
        assert_eq!(first.outline(), second.outline());
        assert_eq!(compile(&second)["properties"]["status"]["enum"], json!(["new", "paid"]));
    }
}
