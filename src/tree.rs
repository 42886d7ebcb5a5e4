//! Arena-backed schema tree.
//!
//! The arena owns every node; parent/child links are plain ids. Structural
//! mutations live in [`mutate`].
pub mod mutate;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::node::{
    NodeId, NumberConstraints, Passthrough, SchemaNode, SchemaType, Shape, StringConstraints,
};

#[derive(Debug, Clone)]
pub struct SchemaTree {
    root: NodeId,
    nodes: IndexMap<NodeId, SchemaNode>,
}

impl Default for SchemaTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaTree {
    /// A fresh editing tree: a single empty `object` root.
    pub fn new() -> Self {
        Self::with_root(SchemaType::Object)
    }

    pub fn with_root(ty: SchemaType) -> Self {
        let root = NodeId::generate();
        let mut nodes = IndexMap::new();
        nodes.insert(root, SchemaNode::new(root, None, ty));
        Self { root, nodes }
    }

    /// Assemble a tree from a prebuilt arena. No invariants are checked here;
    /// run [`crate::validate::check_tree`] on anything not built by this crate.
    pub(crate) fn from_parts(root: NodeId, nodes: IndexMap<NodeId, SchemaNode>) -> Self {
        Self { root, nodes }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Result<&SchemaNode> {
        self.nodes.get(&id).ok_or(Error::NotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut SchemaNode> {
        self.nodes.get_mut(&id).ok_or(Error::NotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node in the arena, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaNode> {
        self.nodes.values()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(|n| n.shape.children()).unwrap_or(&[])
    }

    /// All nodes below `id`, preorder, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// True when `ancestor` lies on the parent chain of `id` (strictly above it).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    /// Find the first property named `name` directly under `parent`.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    // ————————————————————————————————————————————————————————————————————
    // POINTERS
    // ————————————————————————————————————————————————————————————————————

    /// JSON Pointer of the node inside the compiled document,
    /// e.g. `/properties/address/items`. The root is `""`.
    pub fn pointer_of(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.nodes.get(&id)?;
        while let Some(parent_id) = current.parent {
            let parent = self.nodes.get(&parent_id)?;
            match parent.shape {
                Shape::Array { .. } => segments.push("items".to_string()),
                _ => {
                    segments.push(escape_pointer(&current.name));
                    segments.push("properties".to_string());
                }
            }
            current = parent;
        }
        Some(segments.iter().rev().map(|s| format!("/{s}")).collect())
    }

    /// Inverse of [`pointer_of`](Self::pointer_of).
    pub fn resolve_pointer(&self, pointer: &str) -> Option<NodeId> {
        if pointer.is_empty() || pointer == "/" {
            return Some(self.root);
        }
        let rest = pointer.strip_prefix('/')?;
        let mut segments = rest.split('/').map(unescape_pointer);
        let mut current = self.root;
        while let Some(segment) = segments.next() {
            current = match (segment.as_str(), &self.nodes.get(&current)?.shape) {
                ("items", Shape::Array { items }) => (*items)?,
                ("properties", Shape::Object { .. }) => {
                    let name = segments.next()?;
                    self.child_named(current, &name)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    // ————————————————————————————————————————————————————————————————————
    // OUTLINE
    // ————————————————————————————————————————————————————————————————————

    /// Id-free snapshot of the whole tree, for structural comparison.
    pub fn outline(&self) -> Outline {
        self.outline_of(self.root)
    }

    pub fn outline_of(&self, id: NodeId) -> Outline {
        let Some(node) = self.nodes.get(&id) else {
            return Outline::missing();
        };
        let kind = match &node.shape {
            Shape::String(c) => OutlineKind::String(c.clone()),
            Shape::Number(c) => OutlineKind::Number(c.clone()),
            Shape::Boolean => OutlineKind::Boolean,
            Shape::Null => OutlineKind::Null,
            Shape::Array { items } => {
                OutlineKind::Array(items.map(|child| Box::new(self.outline_of(child))))
            }
            Shape::Object { properties } => {
                OutlineKind::Object(properties.iter().map(|c| self.outline_of(*c)).collect())
            }
        };
        Outline {
            name: node.name.clone(),
            required: node.required,
            description: node.description.clone(),
            format: node.format.clone(),
            passthrough: node.passthrough.clone(),
            kind,
        }
    }
}

/// A node and its subtree with identities stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub name: String,
    pub required: bool,
    pub description: Option<String>,
    pub format: Option<String>,
    pub passthrough: Passthrough,
    pub kind: OutlineKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutlineKind {
    String(StringConstraints),
    Number(NumberConstraints),
    Boolean,
    Null,
    Array(Option<Box<Outline>>),
    Object(Vec<Outline>),
    /// A child id that did not resolve in the arena.
    Missing,
}

impl Outline {
    fn missing() -> Self {
        Self {
            name: String::new(),
            required: false,
            description: None,
            format: None,
            passthrough: Passthrough::default(),
            kind: OutlineKind::Missing,
        }
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_pointer(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SchemaTree, NodeId, NodeId, NodeId) {
        let mut tree = SchemaTree::new();
        let root = tree.root();
        let address = tree.add_property(root, None).unwrap();
        tree.rename(address, "address").unwrap();
        tree.retype(address, SchemaType::Object).unwrap();
        let tags = tree.add_property(address, None).unwrap();
        tree.rename(tags, "a/b").unwrap();
        tree.retype(tags, SchemaType::Array).unwrap();
        let item = tree.set_items(tags).unwrap();
        (tree, address, tags, item)
    }

    #[test]
    fn pointers_round_trip_through_resolution() {
        let (tree, address, tags, item) = sample();
        assert_eq!(tree.pointer_of(tree.root()).as_deref(), Some(""));
        assert_eq!(tree.pointer_of(address).as_deref(), Some("/properties/address"));
        assert_eq!(
            tree.pointer_of(item).as_deref(),
            Some("/properties/address/properties/a~1b/items")
        );
        for id in [tree.root(), address, tags, item] {
            let pointer = tree.pointer_of(id).unwrap();
            assert_eq!(tree.resolve_pointer(&pointer), Some(id), "pointer {pointer}");
        }
        assert_eq!(tree.resolve_pointer("/properties/nope"), None);
        assert_eq!(tree.resolve_pointer("/items"), None);
    }

    #[test]
    fn descendants_are_preorder_and_ancestry_walks_up() {
        let (tree, address, tags, item) = sample();
        assert_eq!(tree.descendants(tree.root()), vec![address, tags, item]);
        assert!(tree.is_ancestor(tree.root(), item));
        assert!(tree.is_ancestor(address, item));
        assert!(!tree.is_ancestor(item, address));
        assert!(!tree.is_ancestor(item, item));
    }

    #[test]
    fn outline_ignores_identity() {
        let (a, ..) = sample();
        let (b, ..) = sample();
        assert_ne!(a.root(), b.root());
        assert_eq!(a.outline(), b.outline());
    }
}
