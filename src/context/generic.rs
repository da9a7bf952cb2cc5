//! Value-backed context

use serde_json::Value;

use super::{lookup_path, sorted_keys, ConfigContext, ContextError};
use crate::template::ResolveOptions;

/// Context backed by a single JSON value (usually a mapping)
#[derive(Debug, Clone, Default)]
pub struct GenericContext {
    data: Value,
}

impl GenericContext {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// Build a context from YAML text
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        let data: Value = serde_yaml::from_str(yaml)?;
        Ok(Self::new(data))
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl From<Value> for GenericContext {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

impl ConfigContext for GenericContext {
    fn resolve(&self, path: &[String], _opts: &ResolveOptions) -> Result<Value, ContextError> {
        lookup_path(&self.data, path)
    }

    fn available_keys(&self) -> Vec<String> {
        sorted_keys(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_whole_and_nested() {
        let ctx = GenericContext::new(json!({"var": {"name": "api"}}));
        let opts = ResolveOptions::default();
        assert_eq!(
            ctx.resolve(&[], &opts).unwrap(),
            json!({"var": {"name": "api"}})
        );
        assert_eq!(
            ctx.resolve(&["var".into(), "name".into()], &opts).unwrap(),
            json!("api")
        );
    }

    #[test]
    fn from_yaml_keeps_order() {
        let ctx = GenericContext::from_yaml("z: 1\na: 2\n").unwrap();
        let keys: Vec<_> = ctx.data().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(ctx.available_keys(), vec!["a", "z"]);
    }
}
