//! Edit scripts: a JSON array of node-model operations addressed by JSON
//! Pointer, e.g.
//!
//! ```json
//! [
//!   {"op": "add", "parent": "", "name": "age", "type": "number"},
//!   {"op": "constraint", "target": "/properties/age", "constraint": {"field": "minimum", "value": 0}},
//!   {"op": "required", "target": "/properties/age", "value": true}
//! ]
//! ```
//!
//! Ops run in order. Each op is atomic; the first failure stops the script and
//! keeps the effect of every earlier op.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::node::{Constraint, NodeId, SchemaType};
use crate::path_de;
use crate::tree::SchemaTree;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum EditOp {
    Add {
        parent: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default, rename = "type")]
        ty: Option<SchemaType>,
        /// Pointer of the sibling to insert after.
        #[serde(default)]
        after: Option<String>,
    },
    Remove {
        target: String,
    },
    Retype {
        target: String,
        #[serde(rename = "type")]
        ty: SchemaType,
    },
    Rename {
        target: String,
        name: String,
    },
    Constraint {
        target: String,
        constraint: Constraint,
    },
    /// Sets `required`, or toggles it when `value` is omitted.
    Required {
        target: String,
        #[serde(default)]
        value: Option<bool>,
    },
    Description {
        target: String,
        #[serde(default)]
        value: Option<String>,
    },
    Format {
        target: String,
        #[serde(default)]
        value: Option<String>,
    },
    Move {
        target: String,
        parent: String,
        #[serde(default = "at_end")]
        index: usize,
    },
    /// Replace an array's items with a fresh node of `type` (default `string`).
    Items {
        target: String,
        #[serde(default, rename = "type")]
        ty: Option<SchemaType>,
    },
}

pub fn parse_script(src: &str) -> Result<Vec<EditOp>> {
    path_de::from_str_with_path(src).context("invalid edit script")
}

pub fn apply_script(tree: &mut SchemaTree, ops: &[EditOp]) -> Result<()> {
    for (index, op) in ops.iter().enumerate() {
        apply_op(tree, op).with_context(|| format!("edit op #{index} failed"))?;
    }
    Ok(())
}

pub fn apply_op(tree: &mut SchemaTree, op: &EditOp) -> Result<()> {
    match op {
        EditOp::Add { parent, name, ty, after } => {
            let parent = resolve(tree, parent)?;
            let after = after.as_deref().map(|p| resolve(tree, p)).transpose()?;
            let id = tree.add_property(parent, after)?;
            let configured = name
                .as_ref()
                .map_or(Ok(()), |name| tree.rename(id, name.clone()))
                .and_then(|_| ty.map_or(Ok(()), |ty| tree.retype(id, ty)));
            if let Err(err) = configured {
                tree.remove_property(id)?;
                return Err(err.into());
            }
        }
        EditOp::Remove { target } => tree.remove_property(resolve(tree, target)?)?,
        EditOp::Retype { target, ty } => tree.retype(resolve(tree, target)?, *ty)?,
        EditOp::Rename { target, name } => tree.rename(resolve(tree, target)?, name.clone())?,
        EditOp::Constraint { target, constraint } => {
            tree.set_constraint(resolve(tree, target)?, constraint.clone())?
        }
        EditOp::Required { target, value } => {
            let id = resolve(tree, target)?;
            match value {
                Some(required) => tree.set_required(id, *required)?,
                None => {
                    tree.toggle_required(id)?;
                }
            }
        }
        EditOp::Description { target, value } => {
            tree.set_description(resolve(tree, target)?, value.clone())?
        }
        EditOp::Format { target, value } => tree.set_format(resolve(tree, target)?, value.clone())?,
        EditOp::Move { target, parent, index } => {
            let id = resolve(tree, target)?;
            let parent = resolve(tree, parent)?;
            tree.move_node(id, parent, *index)?;
        }
        EditOp::Items { target, ty } => {
            let array = resolve(tree, target)?;
            let items = tree.set_items(array)?;
            if let Some(ty) = ty {
                tree.retype(items, *ty)?;
            }
        }
    }
    Ok(())
}

fn at_end() -> usize {
    usize::MAX
}

fn resolve(tree: &SchemaTree, pointer: &str) -> Result<NodeId> {
    tree.resolve_pointer(pointer).ok_or_else(|| anyhow!("no node at `{pointer}`"))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
