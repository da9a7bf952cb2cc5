//! Scoped context - local bindings layered over a borrowed parent

use indexmap::IndexMap;
use serde_json::Value;

use super::{lookup_path, ConfigContext, ContextError};
use crate::template::ResolveOptions;

/// Local bindings (e.g. `item` inside `$forEach`) over a parent context
///
/// The parent is borrowed, never owned: a scope lives for one loop iteration.
pub struct ScopedContext<'p> {
    parent: &'p dyn ConfigContext,
    bindings: IndexMap<String, Value>,
}

impl<'p> ScopedContext<'p> {
    pub fn new(parent: &'p dyn ConfigContext) -> Self {
        Self {
            parent,
            bindings: IndexMap::new(),
        }
    }

    /// Add a binding, shadowing any parent key of the same name
    pub fn with_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }
}

impl ConfigContext for ScopedContext<'_> {
    fn resolve(&self, path: &[String], opts: &ResolveOptions) -> Result<Value, ContextError> {
        if let Some((first, rest)) = path.split_first() {
            if let Some(bound) = self.bindings.get(first) {
                return lookup_path(bound, rest).map_err(|e| e.qualify(first));
            }
        }

        match self.parent.resolve(path, opts) {
            Err(ContextError::MissingKey {
                key,
                under,
                mut available,
            }) if under.is_empty() => {
                available.extend(self.bindings.keys().cloned());
                available.sort();
                available.dedup();
                Err(ContextError::MissingKey {
                    key,
                    under,
                    available,
                })
            }
            other => other,
        }
    }

    fn available_keys(&self) -> Vec<String> {
        let mut keys = self.parent.available_keys();
        keys.extend(self.bindings.keys().cloned());
        keys.sort();
        keys.dedup();
        keys
    }
}
