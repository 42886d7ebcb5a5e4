//! `jq` pre-selection for inputs that wrap the schema, e.g. a generation
//! service response `{"schema": {...}, "usage": {...}}` filtered with `.schema`.
//!
//! A [`Selector`] is compiled once and run over every input document.
use anyhow::{anyhow, Result};
use jaq_core::{load, Compiler, Ctx, Filter, Native, RcIter};
use jaq_json::Val;
use serde_json::Value;

pub struct Selector {
    source: String,
    filter: Filter<Native<Val>>,
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector").field("source", &self.source).finish_non_exhaustive()
    }
}

impl Selector {
    pub fn compile(source: &str) -> Result<Self> {
        let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = load::Arena::default();
        let modules = loader
            .load(&arena, load::File { code: source, path: () })
            .map_err(|errs| {
                let reasons: Vec<String> = errs.iter().map(|(_, err)| format!("{err:?}")).collect();
                anyhow!("jq filter `{source}` does not parse: {}", reasons.join("; "))
            })?;
        let filter = Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(|errs| {
                let names: Vec<&str> = errs
                    .iter()
                    .flat_map(|(_, undefined)| undefined.iter().map(|(name, _)| *name))
                    .collect();
                anyhow!("jq filter `{source}` uses undefined names: {}", names.join(", "))
            })?;
        Ok(Self { source: source.to_string(), filter })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every output of the filter on `input`, in order.
    pub fn select(&self, input: &Value) -> Result<Vec<Value>> {
        let inputs = RcIter::new(core::iter::empty());
        self.filter
            .run((Ctx::new([], &inputs), Val::from(input.clone())))
            .map(|item| {
                item.map(Value::from)
                    .map_err(|e| anyhow!("jq filter `{}` failed: {e}", self.source))
            })
            .collect()
    }
}
