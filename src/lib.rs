//! Editable JSON Schema trees.
//!
//! A [`SchemaTree`] is edited in place through id-addressed operations,
//! compiled to a JSON Schema document with [`compile`], and rebuilt from one
//! with [`decompile`].
pub mod compile;
pub mod decompile;
pub mod error;
pub mod jq_exec;
pub mod node;
pub mod path_de;
pub mod script;
pub mod session;
pub mod store;
pub mod tree;
pub mod validate;

pub use compile::{compile, compile_node};
pub use decompile::{decompile, decompile_str};
pub use error::{Error, Result};
pub use node::{Constraint, ConstraintField, NodeId, SchemaNode, SchemaType, Shape};
pub use tree::{Outline, SchemaTree};
pub use validate::{check_document, check_tree, Finding, FindingKind};
