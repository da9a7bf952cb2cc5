//! String helpers

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{any_arg, indent_width, opt_number_arg, str_arg, ArgSpec, ArgType, HelperFunction};
use crate::template::value::render;

static WORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("Invalid regex pattern"));

const STR: ArgSpec = ArgSpec::required("str", ArgType::String);

pub(super) const FUNCTIONS: &[HelperFunction] = &[
    HelperFunction {
        name: "camelCase",
        description: "Converts the given string to camelCase",
        args: &[STR],
        call: |args| Ok(Value::String(camel_case(str_arg(args, 0)))),
    },
    HelperFunction {
        name: "kebabCase",
        description: "Converts the given string to kebab-case",
        args: &[STR],
        call: |args| Ok(Value::String(words(str_arg(args, 0)).join("-"))),
    },
    HelperFunction {
        name: "lower",
        description: "Lower-cases the given string",
        args: &[STR],
        call: |args| Ok(Value::String(str_arg(args, 0).to_lowercase())),
    },
    HelperFunction {
        name: "upper",
        description: "Upper-cases the given string",
        args: &[STR],
        call: |args| Ok(Value::String(str_arg(args, 0).to_uppercase())),
    },
    HelperFunction {
        name: "trim",
        description: "Removes leading and trailing whitespace",
        args: &[STR],
        call: |args| Ok(Value::String(str_arg(args, 0).trim().to_string())),
    },
    HelperFunction {
        name: "replace",
        description: "Replaces every occurrence of a substring",
        args: &[
            STR,
            ArgSpec::required("substring", ArgType::String),
            ArgSpec::required("replacement", ArgType::String),
        ],
        call: |args| {
            let substring = str_arg(args, 1);
            if substring.is_empty() {
                return Err("substring must not be empty".to_string());
            }
            Ok(Value::String(
                str_arg(args, 0).replace(substring, str_arg(args, 2)),
            ))
        },
    },
    HelperFunction {
        name: "split",
        description: "Splits a string by a separator into an array of strings",
        args: &[STR, ArgSpec::required("separator", ArgType::String)],
        call: |args| {
            let input = str_arg(args, 0);
            let separator = str_arg(args, 1);
            let parts: Vec<Value> = if separator.is_empty() {
                input.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                input
                    .split(separator)
                    .map(|part| Value::String(part.to_string()))
                    .collect()
            };
            Ok(Value::Array(parts))
        },
    },
    HelperFunction {
        name: "indent",
        description: "Indents every non-empty line by the given number of spaces",
        args: &[STR, ArgSpec::required("spaces", ArgType::Number)],
        call: |args| {
            let spaces = indent_width(opt_number_arg(args, 1).unwrap_or_default())?;
            let pad = " ".repeat(spaces);
            let indented: Vec<String> = str_arg(args, 0)
                .split('\n')
                .map(|line| {
                    if line.is_empty() {
                        String::new()
                    } else {
                        format!("{}{}", pad, line)
                    }
                })
                .collect();
            Ok(Value::String(indented.join("\n")))
        },
    },
    HelperFunction {
        name: "string",
        description: "Converts any value to its string representation",
        args: &[ArgSpec::required("value", ArgType::Any)],
        call: |args| Ok(Value::String(render(any_arg(args, 0)))),
    },
];

/// Lower-cased words, split on separators and case boundaries
///
/// `fooBar-baz` → `foo bar baz`, `HTTPServer` → `http server`
fn words(input: &str) -> Vec<String> {
    let mut words = Vec::new();

    for chunk in WORD_SEPARATOR.split(input).filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();

        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0 && {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
                (c.is_ascii_uppercase() && (prev.is_ascii_lowercase() || prev.is_ascii_digit()))
                    || (c.is_ascii_uppercase() && prev.is_ascii_uppercase() && next_lower)
            };
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c.to_ascii_lowercase());
        }

        if !current.is_empty() {
            words.push(current);
        }
    }

    words
}

fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, word) in words(input).iter().enumerate() {
        if i == 0 {
            out.push_str(word);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
