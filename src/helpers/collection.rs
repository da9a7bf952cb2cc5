//! Array and collection helpers

use serde_json::Value;

use super::{any_arg, opt_number_arg, opt_str_arg, ArgSpec, ArgType, HelperFunction};
use crate::template::value::{render, type_name};

pub(super) const FUNCTIONS: &[HelperFunction] = &[
    HelperFunction {
        name: "concat",
        description: "Concatenates two arrays or two strings",
        args: &[
            ArgSpec::required("arg1", ArgType::StringOrArray),
            ArgSpec::required("arg2", ArgType::StringOrArray),
        ],
        call: |args| match (any_arg(args, 0), any_arg(args, 1)) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b).cloned().collect()))
            }
            (a, b) => Err(format!(
                "both arguments must be of the same type (got {} and {})",
                type_name(a),
                type_name(b)
            )),
        },
    },
    HelperFunction {
        name: "join",
        description: "Joins array items into a string, separated by the given separator (default ',')",
        args: &[
            ArgSpec::required("input", ArgType::Array),
            ArgSpec::optional("separator", ArgType::String),
        ],
        call: |args| {
            let separator = opt_str_arg(args, 1).unwrap_or(",");
            let items = any_arg(args, 0).as_array().map(Vec::as_slice).unwrap_or_default();
            let parts: Vec<String> = items.iter().map(render).collect();
            Ok(Value::String(parts.join(separator)))
        },
    },
    HelperFunction {
        name: "slice",
        description: "Slices a string or array; negative indices count from the end",
        args: &[
            ArgSpec::required("input", ArgType::StringOrArray),
            ArgSpec::required("start", ArgType::Number),
            ArgSpec::optional("end", ArgType::Number),
        ],
        call: |args| {
            let start = opt_number_arg(args, 1).unwrap_or_default();
            let end = opt_number_arg(args, 2);
            match any_arg(args, 0) {
                Value::String(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let (from, to) = bounds(chars.len(), start, end);
                    Ok(Value::String(chars[from..to].iter().collect()))
                }
                Value::Array(items) => {
                    let (from, to) = bounds(items.len(), start, end);
                    Ok(Value::Array(items[from..to].to_vec()))
                }
                other => Err(format!("cannot slice a {}", type_name(other))),
            }
        },
    },
    HelperFunction {
        name: "isEmpty",
        description: "True for null, empty strings, empty arrays and empty objects",
        args: &[ArgSpec::required("value", ArgType::Any)],
        call: |args| {
            let empty = match any_arg(args, 0) {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                Value::Bool(_) | Value::Number(_) => false,
            };
            Ok(Value::Bool(empty))
        },
    },
];

/// Clamp `start..end` to `0..len`, resolving negative offsets from the end
fn bounds(len: usize, start: f64, end: Option<f64>) -> (usize, usize) {
    let resolve = |index: f64| -> usize {
        let index = index.trunc();
        if index < 0.0 {
            (len as f64 + index).max(0.0) as usize
        } else {
            (index as usize).min(len)
        }
    };
    let from = resolve(start);
    let to = end.map(resolve).unwrap_or(len);
    (from, to.max(from))
}
