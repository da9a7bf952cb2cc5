//! Structural resolver tests
//!
//! Directives over whole configuration trees, loaded from YAML the way
//! configs arrive in practice:
//!
//! ```yaml
//! services:
//!   $forEach: ${var.services}
//!   $return:
//!     name: ${item.key}
//!     port: ${item.value.port}
//! ```

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use templar::context::GenericContext;
use templar::{resolve_template_struct, ResolveOptions, TemplarError};

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn resolve(value: &Value, data: Value) -> Result<Value, TemplarError> {
    resolve_template_struct(value, &GenericContext::new(data), &ResolveOptions::default())
}

// ═══════════════════════════════════════════════════════════════
// $merge
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_merge_position_decides_override() {
    let before = json!({"$merge": {"a": "a", "b": "b"}, "b": "B", "c": "c"});
    assert_eq!(
        resolve(&before, json!({})).unwrap(),
        json!({"a": "a", "b": "B", "c": "c"})
    );

    let after = json!({"b": "B", "$merge": {"a": "a", "b": "b"}, "c": "c"});
    assert_eq!(resolve(&after, json!({})).unwrap()["b"], json!("b"));
}

#[test]
fn test_merge_keeps_declaration_order() {
    let value = yaml("z: 1\n$merge:\n  y: 2\n  x: 3\nw: 4\n");
    let out = resolve(&value, json!({})).unwrap();
    let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "y", "x", "w"]);
}

#[test]
fn test_nested_merge_resolves_depth_first() {
    let value = json!({
        "$merge": {"$merge": "${var.base}", "extra": "${var.extra}"},
        "own": 1
    });
    let out = resolve(
        &value,
        json!({"var": {"base": {"from_base": true}, "extra": "e"}}),
    )
    .unwrap();
    assert_eq!(out, json!({"from_base": true, "extra": "e", "own": 1}));
}

#[test]
fn test_merge_non_mapping_is_structural_error() {
    let err = resolve(&json!({"$merge": "${v}"}), json!({"v": 1})).unwrap_err();
    assert_eq!(err.code(), "TPL-020");
    assert_eq!(
        err.to_string(),
        "Value of $merge key must be (or resolve to) a mapping object (got number)"
    );
}

// ═══════════════════════════════════════════════════════════════
// $concat
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_concat_flattens_into_parent() {
    let value = json!(["a", {"$concat": ["b", "c"]}, "d"]);
    assert_eq!(resolve(&value, json!({})).unwrap(), json!(["a", "b", "c", "d"]));
}

#[test]
fn test_concat_from_template() {
    let value = yaml("args:\n  - --verbose\n  - $concat: ${var.extra}\n");
    let out = resolve(&value, json!({"var": {"extra": ["--a", "--b"]}})).unwrap();
    assert_eq!(out, json!({"args": ["--verbose", "--a", "--b"]}));
}

#[test]
fn test_concat_partial_keeps_node() {
    let value = json!(["a", {"$concat": "${var.missing}"}]);
    let out = resolve_template_struct(
        &value,
        &GenericContext::new(json!({})),
        &ResolveOptions::partial(),
    )
    .unwrap();
    assert_eq!(out, value);
}

#[test]
fn test_concat_sibling_keys_fail_even_under_partial() {
    let value = json!([{"$concat": [], "other": 1}]);
    let err = resolve_template_struct(
        &value,
        &GenericContext::new(json!({})),
        &ResolveOptions::partial(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "A list item with a $concat key cannot have any other keys (found other)"
    );
}

// ═══════════════════════════════════════════════════════════════
// $forEach
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_for_each_over_mapping() {
    let value = json!({"$forEach": {"a": 1, "b": 2, "c": 3}, "$return": "${item.key}: ${item.value}"});
    assert_eq!(
        resolve(&value, json!({})).unwrap(),
        json!(["a: 1", "b: 2", "c: 3"])
    );
}

#[test]
fn test_for_each_from_yaml_config() {
    let value = yaml(
        r#"
services:
  $forEach: ${var.services}
  $filter: ${item.value.enabled}
  $return:
    name: ${item.key}
    port: ${item.value.port}
"#,
    );
    let data = json!({"var": {"services": {
        "api": {"port": 8080, "enabled": true},
        "worker": {"port": 9000, "enabled": false},
        "web": {"port": 80, "enabled": true}
    }}});

    assert_eq!(
        resolve(&value, data).unwrap(),
        json!({"services": [
            {"name": "api", "port": 8080},
            {"name": "web", "port": 80}
        ]})
    );
}

#[test]
fn test_for_each_return_with_merge() {
    let value = json!({
        "$forEach": ["a", "b"],
        "$return": {"$merge": "${var.defaults}", "id": "${item.value}"}
    });
    let out = resolve(&value, json!({"var": {"defaults": {"kind": "x", "id": "none"}}})).unwrap();
    assert_eq!(
        out,
        json!([{"kind": "x", "id": "a"}, {"kind": "x", "id": "b"}])
    );
}

#[test]
fn test_for_each_item_shadows_context_key() {
    let value = json!({"$forEach": [1], "$return": "${item.value}-${other}"});
    let out = resolve(&value, json!({"item": "outer", "other": "o"})).unwrap();
    assert_eq!(out, json!(["1-o"]));
}

#[test]
fn test_for_each_structural_errors_ignore_partial() {
    let value = json!({"$forEach": [1], "$filter": "x"});
    let err = resolve_template_struct(
        &value,
        &GenericContext::new(json!({})),
        &ResolveOptions::partial(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Missing $return field next to $forEach field");
}

#[test]
fn test_for_each_returned_concat_must_be_array() {
    let value = yaml(
        r#"
args:
  $forEach: ${var.flags}
  $return:
    $concat: ${item.value}
"#,
    );
    let err = resolve(&value, json!({"var": {"flags": ["--a", "--b"]}})).unwrap_err();
    assert_eq!(err.code(), "TPL-020");
    assert_eq!(
        err.to_string(),
        "Value of $concat key must be (or resolve to) an array (got string)"
    );
}

#[test]
fn test_for_each_returned_concat_rejects_siblings() {
    let value = json!({
        "$forEach": {"a": [1]},
        "$return": {"$concat": "${item.value}", "name": "${item.key}", "extra": true}
    });
    let err = resolve(&value, json!({})).unwrap_err();
    assert_eq!(
        err.to_string(),
        "A list item with a $concat key cannot have any other keys (found extra, name)"
    );
}

#[test]
fn test_for_each_returned_concat_partial_passes_through() {
    let value = json!({
        "$forEach": [1, 2],
        "$return": {"$concat": "${var.extra}"}
    });
    let out = resolve_template_struct(
        &value,
        &GenericContext::new(json!({})),
        &ResolveOptions::partial(),
    )
    .unwrap();
    assert_eq!(
        out,
        json!([{"$concat": "${var.extra}"}, {"$concat": "${var.extra}"}])
    );
}

#[test]
fn test_for_each_returned_concat_partial_still_splices_arrays() {
    let value = json!({
        "$forEach": {"a": [1, 2], "b": [3]},
        "$return": {"$concat": "${item.value}"}
    });
    let out = resolve_template_struct(
        &value,
        &GenericContext::new(json!({})),
        &ResolveOptions::partial(),
    )
    .unwrap();
    assert_eq!(out, json!([1, 2, 3]));
}

// ═══════════════════════════════════════════════════════════════
// Error propagation
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_first_error_aborts_pass() {
    let value = json!({"ok": "${a}", "bad": "${missing}", "also_bad": "${x.y}"});
    let err = resolve(&value, json!({"a": 1})).unwrap_err();
    assert!(err.to_string().contains("Could not find key missing"));
}

#[test]
fn test_non_string_scalars_pass_through() {
    let value = json!({"n": 1, "b": true, "z": null, "f": 2.5});
    assert_eq!(resolve(&value, json!({})).unwrap(), value);
}
