//! `$forEach` / `$return` / `$filter` loops

use serde_json::{json, Map, Value};
use tracing::debug;

use super::{
    check_concat_item, resolve_value, splice_concat, structural, CONCAT_KEY, FILTER_KEY, FOR_EACH_KEY,
    RETURN_KEY,
};
use crate::context::{ConfigContext, ScopedContext};
use crate::error::Result;
use crate::template::value::type_name;
use crate::template::ResolveOptions;

/// Name of the loop variable bound in `$return` and `$filter`
pub const ITEM_BINDING: &str = "item";

const ALLOWED_KEYS: [&str; 3] = [FOR_EACH_KEY, RETURN_KEY, FILTER_KEY];

pub(super) fn resolve_for_each(
    map: &Map<String, Value>,
    context: &dyn ConfigContext,
    opts: &ResolveOptions,
) -> Result<Value> {
    let mut unexpected: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|key| !ALLOWED_KEYS.contains(key))
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort_unstable();
        return Err(structural(format!(
            "Found one or more unexpected keys on {} object: {}. Allowed keys: {}",
            FOR_EACH_KEY,
            unexpected.join(", "),
            ALLOWED_KEYS.join(", ")
        )));
    }

    let Some(template) = map.get(RETURN_KEY) else {
        return Err(structural(format!(
            "Missing {} field next to {} field",
            RETURN_KEY, FOR_EACH_KEY
        )));
    };

    let source = map.get(FOR_EACH_KEY).unwrap_or(&Value::Null);
    let entries: Vec<(Value, Value)> = match resolve_value(source, context, opts)? {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, value)| (Value::from(index), value))
            .collect(),
        Value::Object(fields) => fields
            .into_iter()
            .map(|(key, value)| (Value::String(key), value))
            .collect(),
        _ if opts.allow_partial => return Ok(Value::Object(map.clone())),
        other => {
            return Err(structural(format!(
                "Value of {} key must be (or resolve to) an array or mapping object (got {})",
                FOR_EACH_KEY,
                type_name(&other)
            )))
        }
    };

    debug!(items = entries.len(), "expanding $forEach");

    let filter = map.get(FILTER_KEY);
    let mut output = Vec::with_capacity(entries.len());

    for (key, value) in entries {
        let scope =
            ScopedContext::new(context).with_binding(ITEM_BINDING, json!({"key": key, "value": value}));

        if let Some(filter) = filter {
            match resolve_value(filter, &scope, opts)? {
                Value::Bool(true) => {}
                Value::Bool(false) => continue,
                other => {
                    return Err(structural(format!(
                        "{} clause in {} loop must resolve to a boolean value (got {})",
                        FILTER_KEY,
                        FOR_EACH_KEY,
                        type_name(&other)
                    )))
                }
            }
        }

        match resolve_value(template, &scope, opts)? {
            Value::Object(mut item) if item.contains_key(CONCAT_KEY) => {
                check_concat_item(&item)?;
                if let Some(spliced) = item.remove(CONCAT_KEY) {
                    splice_concat(&mut output, spliced, opts)?;
                }
            }
            other => output.push(other),
        }
    }

    Ok(Value::Array(output))
}
