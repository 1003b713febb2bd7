//! Name-to-factory catalog of component kinds.
//!
//! Populated explicitly at startup (see `components::register_builtin`)
//! and consulted by the pipeline builder.

use crate::pipeline::component::Component;
use crate::pipeline::error::{PipelineError, PipelineResult};
use std::collections::BTreeMap;

/// Builds a new component instance given its instance name.
pub type ComponentFactory = Box<dyn Fn(&str) -> Box<dyn Component> + Send + Sync>;

#[derive(Default)]
pub struct Catalog {
    factories: BTreeMap<String, ComponentFactory>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `kind`. Kinds are unique.
    pub fn register<F>(&mut self, kind: &str, factory: F) -> PipelineResult<()>
    where
        F: Fn(&str) -> Box<dyn Component> + Send + Sync + 'static,
    {
        if self.factories.contains_key(kind) {
            return Err(PipelineError::DuplicateKind(kind.to_string()));
        }
        tracing::debug!("Catalog: registered kind '{}'", kind);
        self.factories.insert(kind.to_string(), Box::new(factory));
        Ok(())
    }

    pub fn create(&self, kind: &str, instance: &str) -> PipelineResult<Box<dyn Component>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| PipelineError::UnknownKind(kind.to_string()))?;
        Ok(factory(instance))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
