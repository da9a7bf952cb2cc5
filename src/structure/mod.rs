//! Structural Resolver - template resolution over nested values
//!
//! Walks mappings and sequences depth-first, resolving every template string
//! and interpreting three directives:
//!
//! ```text
//! { $merge: {...}, k: v }           positional merge into the owning mapping
//! [ a, { $concat: [b, c] }, d ]     splice into the owning sequence
//! { $forEach: x, $return: r,        one output item per element of x
//!   $filter: f }
//! ```
//!
//! Directive values are always resolved before they are spliced or iterated.
//! Misuse of a directive is a structural error and is never softened by
//! partial resolution.

mod for_each;

use serde_json::{Map, Value};
use tracing::instrument;

use crate::context::ConfigContext;
use crate::error::{Result, TemplarError};
use crate::template::value::{is_unresolved, type_name};
use crate::template::{resolve_template_string, ResolveOptions};

pub const MERGE_KEY: &str = "$merge";
pub const CONCAT_KEY: &str = "$concat";
pub const FOR_EACH_KEY: &str = "$forEach";
pub const RETURN_KEY: &str = "$return";
pub const FILTER_KEY: &str = "$filter";

/// Resolve every template string and directive in `value`
#[instrument(skip(value, context, opts), fields(kind = type_name(value)))]
pub fn resolve_template_struct(
    value: &Value,
    context: &dyn ConfigContext,
    opts: &ResolveOptions,
) -> Result<Value> {
    resolve_value(value, context, opts)
}

pub(crate) fn structural(reason: impl Into<String>) -> TemplarError {
    TemplarError::Structural {
        reason: reason.into(),
    }
}

fn resolve_value(value: &Value, context: &dyn ConfigContext, opts: &ResolveOptions) -> Result<Value> {
    match value {
        Value::String(template) => resolve_template_string(template, context, opts),
        Value::Array(items) => resolve_array(items, context, opts),
        Value::Object(map) if map.contains_key(FOR_EACH_KEY) => {
            for_each::resolve_for_each(map, context, opts)
        }
        Value::Object(map) => resolve_object(map, context, opts),
        other => Ok(other.clone()),
    }
}

fn resolve_object(
    map: &Map<String, Value>,
    context: &dyn ConfigContext,
    opts: &ResolveOptions,
) -> Result<Value> {
    let mut output = Map::new();

    for (key, value) in map {
        let resolved = resolve_value(value, context, opts)?;

        if key != MERGE_KEY {
            output.insert(key.clone(), resolved);
            continue;
        }

        match resolved {
            // Existing keys keep their position, later values win
            Value::Object(entries) => {
                for (merged_key, merged_value) in entries {
                    output.insert(merged_key, merged_value);
                }
            }
            other if opts.allow_partial && is_unresolved(&other) => {
                output.insert(key.clone(), other);
            }
            other => {
                return Err(structural(format!(
                    "Value of {} key must be (or resolve to) a mapping object (got {})",
                    MERGE_KEY,
                    type_name(&other)
                )))
            }
        }
    }

    Ok(Value::Object(output))
}

fn resolve_array(items: &[Value], context: &dyn ConfigContext, opts: &ResolveOptions) -> Result<Value> {
    let mut output = Vec::with_capacity(items.len());

    for item in items {
        let concat = match item {
            Value::Object(map) => map.get(CONCAT_KEY).map(|value| (map, value)),
            _ => None,
        };
        let Some((map, value)) = concat else {
            output.push(resolve_value(item, context, opts)?);
            continue;
        };

        check_concat_item(map)?;
        let resolved = resolve_value(value, context, opts)?;
        splice_concat(&mut output, resolved, opts)?;
    }

    Ok(Value::Array(output))
}

/// A list item carrying `$concat` must not have sibling keys
pub(crate) fn check_concat_item(map: &Map<String, Value>) -> Result<()> {
    if map.len() <= 1 {
        return Ok(());
    }
    let mut others: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|k| *k != CONCAT_KEY)
        .collect();
    others.sort_unstable();
    Err(structural(format!(
        "A list item with a {} key cannot have any other keys (found {})",
        CONCAT_KEY,
        others.join(", ")
    )))
}

/// Splice an already resolved `$concat` value into `output`.
///
/// Under `allow_partial`, unresolved text is kept as a `{ $concat: ... }` node.
pub(crate) fn splice_concat(output: &mut Vec<Value>, resolved: Value, opts: &ResolveOptions) -> Result<()> {
    match resolved {
        Value::Array(spliced) => output.extend(spliced),
        other if opts.allow_partial && is_unresolved(&other) => {
            let mut node = Map::new();
            node.insert(CONCAT_KEY.to_string(), other);
            output.push(Value::Object(node));
        }
        other => {
            return Err(structural(format!(
                "Value of {} key must be (or resolve to) an array (got {})",
                CONCAT_KEY,
                type_name(&other)
            )))
        }
    }
    Ok(())
}
