//! Encoding and hashing helpers

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{any_arg, indent_width, opt_number_arg, str_arg, ArgSpec, ArgType, HelperFunction};

const STR: ArgSpec = ArgSpec::required("str", ArgType::String);
const VALUE: ArgSpec = ArgSpec::required("value", ArgType::Any);

pub(super) const FUNCTIONS: &[HelperFunction] = &[
    HelperFunction {
        name: "base64Decode",
        description: "Decodes a base64 encoded UTF-8 string",
        args: &[STR],
        call: |args| {
            let bytes = STANDARD
                .decode(str_arg(args, 0))
                .map_err(|e| format!("invalid base64 input: {}", e))?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|_| "decoded value is not valid UTF-8".to_string())
        },
    },
    HelperFunction {
        name: "base64Encode",
        description: "Encodes a string as base64",
        args: &[STR],
        call: |args| Ok(Value::String(STANDARD.encode(str_arg(args, 0)))),
    },
    HelperFunction {
        name: "jsonDecode",
        description: "Parses a JSON string",
        args: &[STR],
        call: |args| serde_json::from_str(str_arg(args, 0)).map_err(|e| e.to_string()),
    },
    HelperFunction {
        name: "jsonEncode",
        description: "Serializes a value as JSON, optionally pretty-printed with the given indentation",
        args: &[VALUE, ArgSpec::optional("spaces", ArgType::Number)],
        call: |args| {
            let value = any_arg(args, 0);
            let encoded = match opt_number_arg(args, 1) {
                Some(spaces) if spaces > 0.0 => pretty_json(value, indent_width(spaces)?)?,
                _ => serde_json::to_string(value).map_err(|e| e.to_string())?,
            };
            Ok(Value::String(encoded))
        },
    },
    HelperFunction {
        name: "yamlDecode",
        description: "Parses a YAML string",
        args: &[STR],
        call: |args| serde_yaml::from_str(str_arg(args, 0)).map_err(|e| e.to_string()),
    },
    HelperFunction {
        name: "yamlEncode",
        description: "Serializes a value as YAML",
        args: &[VALUE],
        call: |args| {
            serde_yaml::to_string(any_arg(args, 0))
                .map(Value::String)
                .map_err(|e| e.to_string())
        },
    },
    HelperFunction {
        name: "sha256",
        description: "Hex-encoded SHA-256 digest of a string",
        args: &[STR],
        call: |args| {
            let digest = Sha256::digest(str_arg(args, 0).as_bytes());
            let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
            Ok(Value::String(hex))
        },
    },
];

fn pretty_json(value: &Value, spaces: usize) -> Result<String, String> {
    let indent = " ".repeat(spaces);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(value, &mut serializer).map_err(|e| e.to_string())?;
    String::from_utf8(buf).map_err(|e| e.to_string())
}
