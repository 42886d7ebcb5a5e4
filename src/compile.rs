//! Tree → JSON Schema document.
//!
//! Output key order is fixed: `type`, `description`, `format`, the type's
//! constraints, opaque passthrough keys, then `properties`/`required`/`items`.
//! Snapshot tests rely on it.

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::debug;

use crate::node::{is_keyword, NodeId, OriginalType, Shape};
use crate::tree::SchemaTree;

/// Compile the whole tree. Never fails: blank-named properties are skipped
/// and an array without items compiles to `items: {}`.
pub fn compile(tree: &SchemaTree) -> Value {
    let document = compile_node(tree, tree.root());
    debug!(nodes = tree.node_count(), "compiled tree");
    document
}

/// Compile the subtree rooted at `id`. An unknown id yields the empty schema.
pub fn compile_node(tree: &SchemaTree, id: NodeId) -> Value {
    let Some(node) = tree.get(id) else {
        return Value::Object(Map::new());
    };
    let mut o = Map::new();

    match &node.passthrough.original_type {
        None => {
            o.insert("type".into(), Value::from(node.schema_type().as_str()));
        }
        Some(OriginalType::Unrecognized(raw)) => {
            o.insert("type".into(), raw.clone());
        }
        Some(OriginalType::Missing) => {}
    }
    if let Some(description) = &node.description {
        o.insert("description".into(), Value::from(description.clone()));
    }
    if let Some(format) = &node.format {
        o.insert("format".into(), Value::from(format.clone()));
    }

    // ---- type-specific constraints ----
    match &node.shape {
        Shape::String(c) => {
            if let Some(values) = &c.enum_values {
                let unique: IndexSet<&String> = values.iter().collect();
                o.insert(
                    "enum".into(),
                    Value::Array(unique.into_iter().cloned().map(Value::from).collect()),
                );
            }
            if let Some(n) = c.min_length {
                o.insert("minLength".into(), Value::from(n));
            }
            if let Some(n) = c.max_length {
                o.insert("maxLength".into(), Value::from(n));
            }
            if let Some(rx) = &c.pattern {
                o.insert("pattern".into(), Value::from(rx.clone()));
            }
        }
        Shape::Number(c) => {
            if let Some(n) = &c.minimum {
                o.insert("minimum".into(), Value::Number(n.clone()));
            }
            if let Some(n) = &c.maximum {
                o.insert("maximum".into(), Value::Number(n.clone()));
            }
        }
        _ => {}
    }

    // ---- passthrough ----
    let verbatim = node.passthrough.is_verbatim();
    for (key, value) in &node.passthrough.fields {
        if (verbatim || !is_keyword(key)) && !o.contains_key(key) {
            o.insert(key.clone(), value.clone());
        }
    }

    // ---- containers ----
    match &node.shape {
        Shape::Object { properties } => {
            let mut props = Map::new();
            let mut required = Vec::new();
            for child in properties.iter().filter_map(|c| tree.get(*c)) {
                if child.has_blank_name() {
                    continue;
                }
                props.insert(child.name.clone(), compile_node(tree, child.id));
                if child.required {
                    required.push(Value::from(child.name.clone()));
                }
            }
            for (name, opaque) in &node.passthrough.properties {
                if props.contains_key(name) {
                    continue;
                }
                props.insert(name.clone(), opaque.schema.clone());
                if opaque.required {
                    required.push(Value::from(name.clone()));
                }
            }
            o.insert("properties".into(), Value::Object(props));
            if !required.is_empty() {
                o.insert("required".into(), Value::Array(required));
            }
        }
        Shape::Array { items } => {
            let items = match items {
                Some(child) => compile_node(tree, *child),
                None => Value::Object(Map::new()),
            };
            o.insert("items".into(), items);
        }
        _ => {}
    }

    Value::Object(o)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Constraint, SchemaType};
    use serde_json::json;

    fn prop(tree: &mut SchemaTree, parent: NodeId, name: &str, ty: SchemaType) -> NodeId {
        let id = tree.add_property(parent, None).unwrap();
        tree.rename(id, name).unwrap();
        tree.retype(id, ty).unwrap();
        id
    }

    #[test]
    fn empty_tree_is_an_empty_object_schema() {
        assert_eq!(compile(&SchemaTree::new()), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn array_without_items_gets_open_items() {
        let tree = SchemaTree::with_root(SchemaType::Array);
        assert_eq!(compile(&tree), json!({"type": "array", "items": {}}));
    }

    #[test]
    fn blank_names_are_skipped_everywhere() {
        let mut tree = SchemaTree::new();
        let root = tree.root();
        let blank = tree.add_property(root, None).unwrap();
        tree.toggle_required(blank).unwrap();
        let named = prop(&mut tree, root, "kept", SchemaType::Boolean);
        tree.toggle_required(named).unwrap();

        assert_eq!(
            compile(&tree),
            json!({
                "type": "object",
                "properties": {"kept": {"type": "boolean"}},
                "required": ["kept"]
            })
        );
    }

    #[test]
    fn key_order_is_stable() {
        let mut tree = SchemaTree::new();
        let root = tree.root();
        tree.set_description(root, Some("person".into())).unwrap();
        let name = prop(&mut tree, root, "name", SchemaType::String);
        tree.set_constraint(name, Constraint::Pattern(Some("^[A-Z]".into()))).unwrap();
        tree.set_constraint(name, Constraint::MinLength(Some(1))).unwrap();
        tree.set_format(name, Some("hostname".into())).unwrap();
        tree.set_description(name, Some("display name".into())).unwrap();

        let text = serde_json::to_string(&compile(&tree)).unwrap();
        assert_eq!(
            text,
            r#"{"type":"object","description":"person","properties":{"name":{"type":"string","description":"display name","format":"hostname","minLength":1,"pattern":"^[A-Z]"}}}"#
        );
    }

    #[test]
    fn enum_is_deduplicated_in_entry_order() {
        let mut tree = SchemaTree::new();
        let root = tree.root();
        let color = prop(&mut tree, root, "color", SchemaType::String);
        let values = ["red", "green", "red", "blue", "green"].map(String::from).to_vec();
        tree.set_constraint(color, Constraint::Enum(Some(values))).unwrap();
        let doc = compile(&tree);
        assert_eq!(doc["properties"]["color"]["enum"], json!(["red", "green", "blue"]));
    }

    #[test]
    fn empty_enum_is_kept_and_cleared_enum_is_dropped() {
        let mut tree = SchemaTree::with_root(SchemaType::String);
        let root = tree.root();
        tree.set_constraint(root, Constraint::Enum(Some(Vec::new()))).unwrap();
        assert_eq!(compile(&tree), json!({"type": "string", "enum": []}));
        tree.set_constraint(root, Constraint::Enum(None)).unwrap();
        assert_eq!(compile(&tree), json!({"type": "string"}));
    }

    #[test]
    fn zero_bounds_are_emitted() {
        let mut tree = SchemaTree::new();
        let root = tree.root();
        let age = prop(&mut tree, root, "age", SchemaType::Number);
        tree.set_constraint(age, Constraint::Minimum(Some(0.into()))).unwrap();
        tree.set_constraint(age, Constraint::Maximum(Some(0.into()))).unwrap();
        assert_eq!(
            compile(&tree)["properties"]["age"],
            json!({"type": "number", "minimum": 0, "maximum": 0})
        );
    }

    #[test]
    fn nested_arrays_of_objects() {
        let mut tree = SchemaTree::new();
        let root = tree.root();
        let tags = prop(&mut tree, root, "tags", SchemaType::Array);
        let item = tree.set_items(tags).unwrap();
        tree.retype(item, SchemaType::Object).unwrap();
        let label = prop(&mut tree, item, "label", SchemaType::String);
        tree.toggle_required(label).unwrap();

        assert_eq!(
            compile(&tree)["properties"]["tags"],
            json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {"label": {"type": "string"}},
                    "required": ["label"]
                }
            })
        );
    }
}
