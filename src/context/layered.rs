//! Layered and nested contexts
//!
//! `LayeredContext` stacks whole contexts (first layer that has the key wins),
//! `NestedContext` exposes named sub-contexts (`var`, `secrets`, `environment`)
//! under one root and re-qualifies their failures with the sub-context name.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{lookup_path, ConfigContext, ContextError};
use crate::template::ResolveOptions;

/// Ordered stack of contexts
#[derive(Clone, Default)]
pub struct LayeredContext {
    layers: Vec<Arc<dyn ConfigContext>>,
}

impl LayeredContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer with lower priority than the existing ones
    pub fn with_layer(mut self, layer: Arc<dyn ConfigContext>) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl ConfigContext for LayeredContext {
    fn resolve(&self, path: &[String], opts: &ResolveOptions) -> Result<Value, ContextError> {
        let mut first_error: Option<ContextError> = None;

        for layer in &self.layers {
            match layer.resolve(path, opts) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    // A deeper miss is more informative than a root miss in another layer
                    let replace = match &first_error {
                        None => true,
                        Some(existing) => existing.is_root_miss() && !err.is_root_miss(),
                    };
                    if replace {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(ContextError::MissingKey { key, under, .. }) if under.is_empty() => {
                Err(ContextError::MissingKey {
                    key,
                    under,
                    available: self.available_keys(),
                })
            }
            Some(err) => Err(err),
            None => Err(ContextError::MissingKey {
                key: path.first().cloned().unwrap_or_default(),
                under: Vec::new(),
                available: Vec::new(),
            }),
        }
    }

    fn available_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .layers
            .iter()
            .flat_map(|layer| layer.available_keys())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Entry of a `NestedContext`: a plain value or a delegated sub-context
#[derive(Clone)]
pub enum ContextEntry {
    Value(Value),
    Context(Arc<dyn ConfigContext>),
}

/// Named sub-contexts and values under one root
#[derive(Clone, Default)]
pub struct NestedContext {
    entries: IndexMap<String, ContextEntry>,
}

impl NestedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.insert(name.into(), ContextEntry::Value(value));
        self
    }

    pub fn with_context(mut self, name: impl Into<String>, context: Arc<dyn ConfigContext>) -> Self {
        self.entries
            .insert(name.into(), ContextEntry::Context(context));
        self
    }
}

impl ConfigContext for NestedContext {
    fn resolve(&self, path: &[String], opts: &ResolveOptions) -> Result<Value, ContextError> {
        let Some((first, rest)) = path.split_first() else {
            let mut map = Map::new();
            for (name, entry) in &self.entries {
                let value = match entry {
                    ContextEntry::Value(v) => v.clone(),
                    ContextEntry::Context(ctx) => ctx.resolve(&[], opts)?,
                };
                map.insert(name.clone(), value);
            }
            return Ok(Value::Object(map));
        };

        match self.entries.get(first) {
            Some(ContextEntry::Value(value)) => {
                lookup_path(value, rest).map_err(|e| e.qualify(first))
            }
            Some(ContextEntry::Context(ctx)) => {
                ctx.resolve(rest, opts).map_err(|e| e.qualify(first))
            }
            None => Err(ContextError::MissingKey {
                key: first.clone(),
                under: Vec::new(),
                available: self.available_keys(),
            }),
        }
    }

    fn available_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
