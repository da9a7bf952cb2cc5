//! Config Contexts - key-path resolution for template expressions
//!
//! A context answers one question: what value lives at `a.b.c`?
//! - `generic`: context backed by a JSON/YAML value
//! - `scoped`: local bindings (`item` in `$forEach`) over a borrowed parent
//! - `layered`: ordered layers and named sub-contexts
//!
//! Failures carry the fully qualified path so that a miss three levels deep
//! reads `Could not find key missing under nested.deeper`.

mod generic;
mod layered;
mod scoped;

pub use generic::GenericContext;
pub use layered::{ContextEntry, LayeredContext, NestedContext};
pub use scoped::ScopedContext;

use serde_json::Value;
use thiserror::Error;

use crate::template::value::type_name;
use crate::template::ResolveOptions;

/// Capability object resolving key paths to values
///
/// Implementations are read-only for the duration of a resolution pass, so
/// they must be shareable across threads.
pub trait ConfigContext: Send + Sync {
    /// Resolve a key path. An empty path resolves the whole context.
    fn resolve(&self, path: &[String], opts: &ResolveOptions) -> Result<Value, ContextError>;

    /// Top-level keys, used for "available keys" hints
    fn available_keys(&self) -> Vec<String>;
}

/// Context lookup failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("{}", describe_missing(.key, .under, .available))]
    MissingKey {
        key: String,
        /// Path of the container the key was looked up in
        under: Vec<String>,
        /// Sorted keys available at the root (only for root-level misses)
        available: Vec<String>,
    },

    #[error("Attempted to look up key {key} on a {value_type}")]
    NotIndexable { key: String, value_type: &'static str },
}

impl ContextError {
    /// Prefix the error with the name of the enclosing context/key
    pub fn qualify(self, prefix: &str) -> Self {
        match self {
            ContextError::MissingKey { key, mut under, .. } => {
                under.insert(0, prefix.to_string());
                ContextError::MissingKey {
                    key,
                    under,
                    available: Vec::new(),
                }
            }
            other => other,
        }
    }

    /// True when the missing key sits at the context root
    pub fn is_root_miss(&self) -> bool {
        matches!(self, ContextError::MissingKey { under, .. } if under.is_empty())
    }

    pub fn is_missing_key(&self) -> bool {
        matches!(self, ContextError::MissingKey { .. })
    }
}

fn describe_missing(key: &str, under: &[String], available: &[String]) -> String {
    let mut message = format!("Could not find key {}", key);
    if !under.is_empty() {
        message.push_str(" under ");
        message.push_str(&under.join("."));
    }
    if !available.is_empty() {
        message.push_str(". Available keys: ");
        message.push_str(&natural_list(available));
    }
    message
}

/// Join items as natural language: `a`, `a and b`, `a, b and c`
pub fn natural_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => format!(
            "{} and {}",
            init.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
            last.as_ref()
        ),
    }
}

/// Walk `path` inside `root`
///
/// Numeric segments index into arrays. Root-level misses list the sorted
/// keys of `root` when it is a mapping.
pub(crate) fn lookup_path(root: &Value, path: &[String]) -> Result<Value, ContextError> {
    let mut current = root;

    for (depth, key) in path.iter().enumerate() {
        let next = match current {
            Value::Object(map) => map.get(key.as_str()),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            other => {
                return Err(ContextError::NotIndexable {
                    key: key.clone(),
                    value_type: type_name(other),
                })
            }
        };

        match next {
            Some(value) => current = value,
            None => {
                let available = if depth == 0 {
                    sorted_keys(current)
                } else {
                    Vec::new()
                };
                return Err(ContextError::MissingKey {
                    key: key.clone(),
                    under: path[..depth].to_vec(),
                    available,
                });
            }
        }
    }

    Ok(current.clone())
}

/// Sorted mapping keys of a value (empty for non-mappings)
pub(crate) fn sorted_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            keys
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn natural_list_forms() {
        assert_eq!(natural_list::<&str>(&[]), "");
        assert_eq!(natural_list(&["a"]), "a");
        assert_eq!(natural_list(&["a", "b"]), "a and b");
        assert_eq!(natural_list(&["a", "b", "c"]), "a, b and c");
    }

    #[test]
    fn lookup_nested_and_indexed() {
        let root = json!({"a": {"list": [10, 20]}});
        assert_eq!(lookup_path(&root, &path(&["a", "list", "1"])).unwrap(), json!(20));
    }

    #[test]
    fn lookup_missing_root_lists_keys() {
        let root = json!({"b": 1, "a": 2});
        let err = lookup_path(&root, &path(&["c"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find key c. Available keys: a and b"
        );
        assert!(err.is_root_miss());
    }

    #[test]
    fn lookup_missing_nested_reports_path() {
        let root = json!({"nested": {"deeper": {}}});
        let err = lookup_path(&root, &path(&["nested", "deeper", "missing"])).unwrap_err();
        assert_eq!(err.to_string(), "Could not find key missing under nested.deeper");
        assert!(!err.is_root_miss());
    }

    #[test]
    fn lookup_on_primitive() {
        let root = json!({"name": "api"});
        let err = lookup_path(&root, &path(&["name", "first"])).unwrap_err();
        assert_eq!(err.to_string(), "Attempted to look up key first on a string");
        assert!(!err.is_missing_key());
    }

    #[test]
    fn qualify_prefixes_and_drops_hints() {
        let err = ContextError::MissingKey {
            key: "x".to_string(),
            under: vec![],
            available: vec!["y".to_string()],
        };
        assert_eq!(err.qualify("var").to_string(), "Could not find key x under var");
    }
}
