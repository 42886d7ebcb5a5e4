use crate::node::{ConstraintField, NodeId, SchemaType};

/// Failures raised by the node model and by `decompile`.
///
/// Every tree operation checks its preconditions before touching the arena,
/// so an `Err` always means the tree was left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("node {0} not found")]
    NotFound(NodeId),

    #[error("a sibling named `{name}` already exists under node {parent}")]
    DuplicateName { parent: NodeId, name: String },

    #[error("`{}` does not apply to {ty} nodes", field.key())]
    InapplicableField { field: ConstraintField, ty: SchemaType },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("malformed document at `{path}`: {reason}")]
    MalformedDocument { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
