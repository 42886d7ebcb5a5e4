//! One editing session: the tree being edited, the presentation flags the
//! renderer keeps per node, and the hand-off point for generated schemas.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::compile::compile;
use crate::decompile::decompile;
use crate::node::NodeId;
use crate::tree::SchemaTree;

// ————————————————————————————————————————————————————————————————————————————
// GENERATION COLLABORATOR
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// The current compiled document, so the generator can refine it.
    pub existing_document: Option<Value>,
}

/// Produces a candidate schema document from a natural-language prompt.
pub trait SchemaGenerator {
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<Value>;
}

/// Identifies the session state a generation request was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The session was replaced or closed after the request was issued.
    Stale,
}

// ————————————————————————————————————————————————————————————————————————————
// VIEW STATE
// ————————————————————————————————————————————————————————————————————————————

/// Per-node display flags. Never compiled, never compared.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    show_options: HashSet<NodeId>,
    show_children: HashSet<NodeId>,
}

impl ViewState {
    pub fn shows_options(&self, id: NodeId) -> bool {
        self.show_options.contains(&id)
    }

    pub fn shows_children(&self, id: NodeId) -> bool {
        self.show_children.contains(&id)
    }

    pub fn toggle_options(&mut self, id: NodeId) -> bool {
        toggle(&mut self.show_options, id)
    }

    pub fn toggle_children(&mut self, id: NodeId) -> bool {
        toggle(&mut self.show_children, id)
    }

    /// Forget flags for nodes that no longer exist.
    pub fn prune(&mut self, tree: &SchemaTree) {
        self.show_options.retain(|id| tree.contains(*id));
        self.show_children.retain(|id| tree.contains(*id));
    }
}

fn toggle(set: &mut HashSet<NodeId>, id: NodeId) -> bool {
    if set.remove(&id) {
        false
    } else {
        set.insert(id);
        true
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SESSION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
pub struct EditorSession {
    tree: SchemaTree,
    view: ViewState,
    /// Bumped whenever the tree is replaced wholesale or the session closes.
    epoch: u64,
    closed: bool,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: SchemaTree) -> Self {
        Self { tree, ..Self::default() }
    }

    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut SchemaTree {
        &mut self.tree
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn compile(&self) -> Value {
        compile(&self.tree)
    }

    /// Replace the tree with an imported document. On error nothing changes.
    pub fn import(&mut self, document: &Value) -> crate::error::Result<()> {
        let tree = decompile(document)?;
        self.replace(tree);
        Ok(())
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.epoch += 1;
    }

    pub fn begin_generation(&self) -> GenerationTicket {
        GenerationTicket { epoch: self.epoch }
    }

    pub fn generation_options(&self) -> GenerateOptions {
        GenerateOptions { existing_document: Some(self.compile()) }
    }

    /// Apply the outcome of a generation request issued under `ticket`.
    ///
    /// Late results are dropped. A failed request or a document that cannot be
    /// imported returns the error and leaves the current tree untouched.
    pub fn apply_generated(
        &mut self,
        ticket: GenerationTicket,
        result: Result<Value>,
    ) -> Result<ApplyOutcome> {
        if self.closed || ticket.epoch != self.epoch {
            warn!(ticket = ticket.epoch, current = self.epoch, "dropping stale generation result");
            return Ok(ApplyOutcome::Stale);
        }
        let document = result.context("schema generation failed")?;
        let tree = decompile(&document).context("generated schema could not be imported")?;
        self.replace(tree);
        Ok(ApplyOutcome::Applied)
    }

    /// Issue a request to `generator` and apply its result in one step.
    pub fn generate(&mut self, generator: &dyn SchemaGenerator, prompt: &str) -> Result<ApplyOutcome> {
        let ticket = self.begin_generation();
        let options = self.generation_options();
        let result = generator.generate(prompt, &options);
        self.apply_generated(ticket, result)
    }

    fn replace(&mut self, tree: SchemaTree) {
        self.tree = tree;
        self.view = ViewState::default();
        self.epoch += 1;
        debug!(epoch = self.epoch, nodes = self.tree.node_count(), "replaced session tree");
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
