//! Structural edits. Each operation checks everything it needs first and
//! only then touches the arena, so a failed call leaves the tree untouched.

use tracing::debug;

use super::SchemaTree;
use crate::error::{Error, Result};
use crate::node::{is_blank, Constraint, NodeId, SchemaNode, SchemaType, Shape};

impl SchemaTree {
    /// Insert a blank `string` property under an `object` node, at the end or
    /// right after `after`.
    pub fn add_property(&mut self, parent: NodeId, after: Option<NodeId>) -> Result<NodeId> {
        // a non-object parent is treated as an unresolved container
        let Shape::Object { properties } = &self.node(parent)?.shape else {
            return Err(Error::NotFound(parent));
        };
        let position = match after {
            None => properties.len(),
            Some(sibling) => properties
                .iter()
                .position(|c| *c == sibling)
                .map(|i| i + 1)
                .ok_or(Error::NotFound(sibling))?,
        };

        let id = self.fresh_id();
        self.nodes.insert(id, SchemaNode::new(id, Some(parent), SchemaType::String));
        if let Shape::Object { properties } = &mut self.node_mut(parent)?.shape {
            properties.insert(position, id);
        }
        debug!(%parent, %id, position, "added property");
        Ok(id)
    }

    /// Delete a node and everything below it.
    pub fn remove_property(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(Error::InvalidOperation("the root node cannot be removed".into()));
        }
        let parent = self.node(id)?.parent;
        self.detach(id, parent);
        let dropped = self.drop_subtree(id);
        debug!(%id, dropped, "removed property");
        Ok(())
    }

    /// Change a node's type. Constraints of the old type are discarded; leaving
    /// a container type discards every descendant.
    pub fn retype(&mut self, id: NodeId, ty: SchemaType) -> Result<()> {
        let node = self.node(id)?;
        let previous = node.schema_type();
        let orphaned = node.shape.children().to_vec();
        if previous == ty {
            // an explicit choice still settles an imported node's unknown type
            self.node_mut(id)?.passthrough.original_type = None;
            return Ok(());
        }
        let mut dropped = 0;
        for child in orphaned {
            dropped += self.drop_subtree(child);
        }
        let node = self.node_mut(id)?;
        node.shape = Shape::empty(ty);
        node.passthrough.original_type = None;
        node.passthrough.properties.clear();
        debug!(%id, from = %previous, to = %ty, dropped, "retyped node");
        Ok(())
    }

    /// Rename a node. Blank names never collide; anything else must be unique
    /// among its siblings.
    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let node = self.property(id)?;
        if let Some(parent) = node.parent {
            self.ensure_name_free(parent, &name, Some(id))?;
        }
        debug!(%id, name = %name, "renamed node");
        self.node_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_constraint(&mut self, id: NodeId, constraint: Constraint) -> Result<()> {
        let node = self.node_mut(id)?;
        let field = constraint.field();
        let ty = node.shape.schema_type();
        node.shape
            .apply(constraint)
            .map_err(|_| Error::InapplicableField { field, ty })?;
        debug!(%id, field = field.key(), "set constraint");
        Ok(())
    }

    /// Flip `required` and return the new value.
    pub fn toggle_required(&mut self, id: NodeId) -> Result<bool> {
        self.property(id)?;
        let node = self.node_mut(id)?;
        node.required = !node.required;
        Ok(node.required)
    }

    pub fn set_required(&mut self, id: NodeId, required: bool) -> Result<()> {
        self.property(id)?;
        self.node_mut(id)?.required = required;
        Ok(())
    }

    pub fn set_description(&mut self, id: NodeId, description: Option<String>) -> Result<()> {
        self.node_mut(id)?.description = description;
        Ok(())
    }

    pub fn set_format(&mut self, id: NodeId, format: Option<String>) -> Result<()> {
        self.node_mut(id)?.format = format;
        Ok(())
    }

    /// Relocate a node and its subtree under another `object` node. `index` is
    /// a position among the new parent's properties once the node has left its
    /// old place, and is clamped to the end.
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<()> {
        if id == self.root {
            return Err(Error::InvalidOperation("the root node cannot be moved".into()));
        }
        let node = self.node(id)?;
        let old_parent = node.parent;
        let target = self.node(new_parent)?;
        if !matches!(target.shape, Shape::Object { .. }) {
            return Err(Error::InvalidOperation(format!(
                "cannot move a node under {} node {new_parent}",
                target.schema_type()
            )));
        }
        if new_parent == id || self.is_ancestor(id, new_parent) {
            return Err(Error::InvalidOperation(format!(
                "moving {id} under {new_parent} would create a cycle"
            )));
        }
        let name = node.name.clone();
        self.ensure_name_free(new_parent, &name, Some(id))?;

        self.detach(id, old_parent);
        if let Shape::Object { properties } = &mut self.node_mut(new_parent)?.shape {
            let index = index.min(properties.len());
            properties.insert(index, id);
        }
        self.node_mut(id)?.parent = Some(new_parent);
        debug!(%id, %new_parent, index, "moved node");
        Ok(())
    }

    /// Give an `array` node a fresh `string` items child, replacing (and
    /// deleting) any previous one.
    pub fn set_items(&mut self, array: NodeId) -> Result<NodeId> {
        let node = self.node(array)?;
        let Shape::Array { items } = node.shape else {
            return Err(Error::InvalidOperation(format!(
                "{} node {array} has no items slot",
                node.schema_type()
            )));
        };
        if let Some(previous) = items {
            self.drop_subtree(previous);
        }
        let id = self.fresh_id();
        self.nodes.insert(id, SchemaNode::new(id, Some(array), SchemaType::String));
        self.node_mut(array)?.shape = Shape::Array { items: Some(id) };
        debug!(%array, %id, "set array items");
        Ok(id)
    }

    /// Drop an `array` node's items child; the array compiles to `items: {}`.
    pub fn clear_items(&mut self, array: NodeId) -> Result<()> {
        let node = self.node(array)?;
        let Shape::Array { items } = node.shape else {
            return Err(Error::InvalidOperation(format!(
                "{} node {array} has no items slot",
                node.schema_type()
            )));
        };
        if let Some(previous) = items {
            self.drop_subtree(previous);
        }
        self.node_mut(array)?.shape = Shape::Array { items: None };
        Ok(())
    }

    // ————————————————————————————————————————————————————————————————————
    // INTERNAL HELPERS
    // ————————————————————————————————————————————————————————————————————

    fn fresh_id(&self) -> NodeId {
        loop {
            let id = NodeId::generate();
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Look up a node that may carry a name and a `required` flag. An array's
    /// items child has neither in the compiled document.
    fn property(&self, id: NodeId) -> Result<&SchemaNode> {
        let node = self.node(id)?;
        let parent_shape = node.parent.and_then(|p| self.nodes.get(&p)).map(|p| &p.shape);
        if let Some(Shape::Array { .. }) = parent_shape {
            return Err(Error::InvalidOperation(format!(
                "items node {id} has no name or required flag"
            )));
        }
        Ok(node)
    }

    fn ensure_name_free(&self, parent: NodeId, name: &str, except: Option<NodeId>) -> Result<()> {
        if is_blank(name) {
            return Ok(());
        }
        let taken = self.children(parent).iter().any(|sibling| {
            Some(*sibling) != except && self.nodes.get(sibling).is_some_and(|n| n.name == name)
        }) || self
            .nodes
            .get(&parent)
            .is_some_and(|p| p.passthrough.properties.contains_key(name));
        if taken {
            return Err(Error::DuplicateName { parent, name: name.to_string() });
        }
        Ok(())
    }

    /// Unlink `id` from its parent's child list.
    fn detach(&mut self, id: NodeId, parent: Option<NodeId>) {
        let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) else {
            return;
        };
        match &mut parent.shape {
            Shape::Object { properties } => properties.retain(|c| *c != id),
            Shape::Array { items } if *items == Some(id) => *items = None,
            _ => {}
        }
    }

    /// Remove `id` and all its descendants from the arena. Returns how many
    /// nodes were dropped.
    fn drop_subtree(&mut self, id: NodeId) -> usize {
        let mut dropped = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.swap_remove(&next) {
                stack.extend_from_slice(node.shape.children());
                dropped += 1;
            }
        }
        dropped
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
