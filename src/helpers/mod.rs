//! Helper Registry - pure functions callable from template expressions
//!
//! Process-wide, read-only table built once on first use. Every helper
//! declares an argument schema that is validated before dispatch, so
//! implementations can rely on argument types.
//!
//! Families:
//! - `string`: case conversion, trimming, splitting, replacing
//! - `encoding`: base64, JSON, YAML, sha256
//! - `collection`: concat, join, slice, isEmpty

mod collection;
mod encoding;
mod string;

use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use crate::context::natural_list;
use crate::template::value::type_name;

/// Global helper table
pub static HELPERS: LazyLock<HelperRegistry> = LazyLock::new(HelperRegistry::builtin);

/// Accepted type for one helper argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    String,
    Number,
    Array,
    StringOrArray,
    Any,
}

impl ArgType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            ArgType::String => value.is_string(),
            ArgType::Number => value.is_number(),
            ArgType::Array => value.is_array(),
            ArgType::StringOrArray => value.is_string() || value.is_array(),
            ArgType::Any => true,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ArgType::String => "a string",
            ArgType::Number => "a number",
            ArgType::Array => "an array",
            ArgType::StringOrArray => "a string or an array",
            ArgType::Any => "any value",
        }
    }
}

/// Argument schema entry
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, ty: ArgType) -> Self {
        Self {
            name,
            ty,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: ArgType) -> Self {
        Self {
            name,
            ty,
            required: false,
        }
    }
}

/// Helper implementation; arguments are already validated against `args`
pub type HelperFn = fn(&[Value]) -> Result<Value, String>;

/// Helper function descriptor
#[derive(Debug, Clone, Copy)]
pub struct HelperFunction {
    pub name: &'static str,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
    pub call: HelperFn,
}

/// Helper dispatch failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HelperError {
    #[error("Could not find helper function '{name}'. Available helper functions: {available}")]
    UnknownHelper { name: String, available: String },

    #[error("Missing argument '{arg}' for {helper} helper function")]
    MissingArgument { arg: String, helper: String },

    #[error("Error validating argument '{arg}' for {helper} helper function: {reason}")]
    InvalidArgument {
        arg: String,
        helper: String,
        reason: String,
    },

    #[error("Too many arguments for {helper} helper function (expected at most {max}, got {got})")]
    TooManyArguments {
        helper: String,
        max: usize,
        got: usize,
    },

    #[error("Error from helper function {helper}: {message}")]
    Failed { helper: String, message: String },
}

/// Name → descriptor table
pub struct HelperRegistry {
    functions: FxHashMap<&'static str, HelperFunction>,
}

impl HelperRegistry {
    /// Registry with every built-in helper
    pub fn builtin() -> Self {
        let functions = string::FUNCTIONS
            .iter()
            .chain(encoding::FUNCTIONS)
            .chain(collection::FUNCTIONS)
            .map(|f| (f.name, *f))
            .collect();
        Self { functions }
    }

    pub fn get(&self, name: &str) -> Option<&HelperFunction> {
        self.functions.get(name)
    }

    /// Sorted helper names
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Validate `args` against the helper's schema and call it
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, HelperError> {
        let Some(function) = self.functions.get(name) else {
            return Err(HelperError::UnknownHelper {
                name: name.to_string(),
                available: natural_list(&self.names()),
            });
        };

        if args.len() > function.args.len() {
            return Err(HelperError::TooManyArguments {
                helper: function.name.to_string(),
                max: function.args.len(),
                got: args.len(),
            });
        }

        for (index, spec) in function.args.iter().enumerate() {
            match args.get(index) {
                None if spec.required => {
                    return Err(HelperError::MissingArgument {
                        arg: spec.name.to_string(),
                        helper: function.name.to_string(),
                    })
                }
                None => {}
                Some(Value::Null) if !spec.required => {}
                Some(value) if !spec.ty.accepts(value) => {
                    return Err(HelperError::InvalidArgument {
                        arg: spec.name.to_string(),
                        helper: function.name.to_string(),
                        reason: format!(
                            "must be {} (got {})",
                            spec.ty.describe(),
                            type_name(value)
                        ),
                    })
                }
                Some(_) => {}
            }
        }

        (function.call)(args).map_err(|message| HelperError::Failed {
            helper: function.name.to_string(),
            message,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// ARGUMENT ACCESS (schema already validated)
// ═══════════════════════════════════════════════════════════════

fn str_arg(args: &[Value], index: usize) -> &str {
    args.get(index).and_then(Value::as_str).unwrap_or_default()
}

fn opt_str_arg(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

fn opt_number_arg(args: &[Value], index: usize) -> Option<f64> {
    args.get(index).and_then(Value::as_f64)
}

fn any_arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

/// Largest indentation a helper will pad with
const MAX_INDENT: usize = 1024;

fn indent_width(spaces: f64) -> Result<usize, String> {
    if spaces < 0.0 || spaces.fract() != 0.0 {
        return Err(format!("spaces must be a non-negative integer (got {})", spaces));
    }
    if spaces > MAX_INDENT as f64 {
        return Err(format!("spaces must be at most {} (got {})", MAX_INDENT, spaces));
    }
    Ok(spaces as usize)
}
