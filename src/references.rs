//! Reference Collectors - static scans over template expressions
//!
//! Nothing is evaluated here (except dynamic action kinds when a context is
//! supplied): every template string in a tree is scanned and parsed, and the
//! AST is walked for key paths.
//!
//! - `collect_template_references`: every dotted path, distinct and sorted
//! - `get_action_template_references`: typed `action[...]` / `runtime[...]` pointers

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::context::ConfigContext;
use crate::error::{Result, TemplarError};
use crate::template::ast::{Expr, MemberKey};
use crate::template::{display_template, evaluate, parser, scanner, ResolveOptions};

/// One segment of a referenced key path
#[derive(Debug, Clone, PartialEq)]
pub enum RefSegment {
    /// `a.b` or `a["b"]`
    Key(String),
    /// `a[0]`
    Number(String),
    /// `a[expr]`, only known at evaluation time
    Dynamic(Expr),
}

impl RefSegment {
    fn as_key(&self) -> Option<&str> {
        match self {
            RefSegment::Key(key) | RefSegment::Number(key) => Some(key),
            RefSegment::Dynamic(_) => None,
        }
    }
}

/// Kind of an action reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ActionKind {
    Build,
    Deploy,
    Run,
    Test,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Build => "Build",
            ActionKind::Deploy => "Deploy",
            ActionKind::Run => "Run",
            ActionKind::Test => "Test",
        };
        f.write_str(name)
    }
}

/// Typed pointer to another action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReference {
    pub kind: ActionKind,
    pub name: String,
    /// `[prefix, kind, name]` as written in the template
    pub full_ref: Vec<String>,
}

/// Call `f` with every string in `value` that contains a template segment
pub(crate) fn for_each_template<'a>(
    value: &'a Value,
    f: &mut impl FnMut(&'a str) -> Result<()>,
) -> Result<()> {
    match value {
        Value::String(s) if s.contains("${") => f(s.as_str()),
        Value::Array(items) => items.iter().try_for_each(|item| for_each_template(item, f)),
        Value::Object(map) => map.values().try_for_each(|item| for_each_template(item, f)),
        _ => Ok(()),
    }
}

/// Raw reference paths (with dynamic segments) in appearance order
pub fn template_references(value: &Value) -> Result<Vec<Vec<RefSegment>>> {
    let mut paths = Vec::new();

    for_each_template(value, &mut |template| {
        let parse_error = |reason: String| TemplarError::TemplateParse {
            template: display_template(template),
            reason,
        };
        let chunks = scanner::scan(template, false).map_err(|e| parse_error(e.reason))?;

        let mut result = Ok(());
        scanner::for_each_segment(&chunks, &mut |segment| {
            if result.is_err() {
                return;
            }
            match parser::parse(segment.expr) {
                Ok(expr) => collect_paths(&expr, &mut paths),
                Err(e) => result = Err(parse_error(e.reason)),
            }
        });
        result
    })?;

    Ok(paths)
}

/// Every key path referenced by a template in `value`, distinct and sorted
///
/// Paths stop before the first dynamic (`[expr]`) segment.
pub fn collect_template_references(value: &Value) -> Result<Vec<Vec<String>>> {
    let paths: BTreeSet<Vec<String>> = template_references(value)?
        .iter()
        .map(|path| {
            path.iter()
                .map_while(|segment| segment.as_key().map(str::to_string))
                .collect::<Vec<_>>()
        })
        .filter(|path| !path.is_empty())
        .collect();

    debug!(count = paths.len(), "collected template references");
    Ok(paths.into_iter().collect())
}

/// Walk an expression, pushing every identifier-rooted member chain
fn collect_paths(expr: &Expr, paths: &mut Vec<Vec<RefSegment>>) {
    if let Some(path) = member_path(expr, paths) {
        paths.push(path);
        return;
    }

    match expr {
        Expr::Literal(_) | Expr::Identifier(_) => {}
        Expr::Member { base, key } => {
            collect_paths(base, paths);
            if let MemberKey::Index(index) = key {
                collect_paths(index, paths);
            }
        }
        Expr::Call { args, .. } => args.iter().for_each(|arg| collect_paths(arg, paths)),
        Expr::Unary { operand, .. } => collect_paths(operand, paths),
        Expr::Binary { left, right, .. } => {
            collect_paths(left, paths);
            collect_paths(right, paths);
        }
        Expr::Ternary {
            condition,
            then,
            otherwise,
        } => {
            collect_paths(condition, paths);
            collect_paths(then, paths);
            collect_paths(otherwise, paths);
        }
        Expr::Array(items) => items.iter().for_each(|item| collect_paths(item, paths)),
    }
}

/// Path of an identifier-rooted chain; bracket expressions are walked too
fn member_path(expr: &Expr, paths: &mut Vec<Vec<RefSegment>>) -> Option<Vec<RefSegment>> {
    match expr {
        Expr::Identifier(name) => Some(vec![RefSegment::Key(name.clone())]),
        Expr::Member { base, key } => {
            let mut path = member_path(base, paths)?;
            path.push(match key {
                MemberKey::Name(name) => RefSegment::Key(name.clone()),
                MemberKey::Index(index) => match index.as_ref() {
                    Expr::Literal(Value::String(s)) => RefSegment::Key(s.clone()),
                    Expr::Literal(Value::Number(n)) => RefSegment::Number(n.to_string()),
                    other => {
                        collect_paths(other, paths);
                        RefSegment::Dynamic(other.clone())
                    }
                },
            });
            Some(path)
        }
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════
// ACTION / RUNTIME REFERENCES
// ═══════════════════════════════════════════════════════════════

fn action_kind(prefix: &str, kind: &str) -> Option<ActionKind> {
    match (prefix, kind) {
        ("action", "build") => Some(ActionKind::Build),
        ("action", "deploy") => Some(ActionKind::Deploy),
        ("action", "run") => Some(ActionKind::Run),
        ("action", "test") => Some(ActionKind::Test),
        ("runtime", "services") => Some(ActionKind::Deploy),
        ("runtime", "tasks") => Some(ActionKind::Run),
        _ => None,
    }
}

/// Typed `action["<kind>"].<name>` / `runtime["<kind>"].<name>` references
///
/// A kind given as an expression (`action[var.kind]`) is evaluated against
/// `context` when one is supplied; it must resolve to a string.
pub fn get_action_template_references(
    value: &Value,
    context: Option<&dyn ConfigContext>,
) -> Result<Vec<ActionReference>> {
    let mut refs: Vec<ActionReference> = Vec::new();

    for path in template_references(value)? {
        let Some(prefix @ ("action" | "runtime")) = path.first().and_then(RefSegment::as_key)
        else {
            continue;
        };
        let invalid = |reason: String| TemplarError::InvalidReference {
            prefix: prefix.to_string(),
            reason,
        };

        let kind_name = match path.get(1) {
            None => return Err(invalid("missing kind".to_string())),
            Some(RefSegment::Key(kind)) => kind.clone(),
            Some(RefSegment::Number(_)) => return Err(invalid("kind is not a string".to_string())),
            Some(RefSegment::Dynamic(expr)) => {
                let resolved = context
                    .and_then(|ctx| evaluate(expr, ctx, &ResolveOptions::default()).ok());
                match resolved {
                    Some(Value::String(kind)) => kind,
                    Some(_) => return Err(invalid("kind is not a string".to_string())),
                    None => {
                        return Err(invalid(
                            "kind must be a literal string, got an unresolvable reference"
                                .to_string(),
                        ))
                    }
                }
            }
        };

        let Some(kind) = action_kind(prefix, &kind_name) else {
            return Err(invalid(format!("invalid kind '{}'", kind_name)));
        };

        let name = match path.get(2) {
            None => return Err(invalid("missing name".to_string())),
            Some(RefSegment::Key(name)) => name.clone(),
            Some(_) => return Err(invalid("name is not a string".to_string())),
        };

        let reference = ActionReference {
            kind,
            full_ref: vec![prefix.to_string(), kind_name, name.clone()],
            name,
        };
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }

    debug!(count = refs.len(), "collected action references");
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenericContext;
    use serde_json::json;

    #[test]
    fn collects_sorted_distinct_paths() {
        let refs = collect_template_references(&json!({
            "foo": "${my.reference}",
            "nested": {"boo": "${moo}", "again": "x-${moo}"}
        }))
        .unwrap();
        assert_eq!(
            refs,
            vec![vec!["moo".to_string()], vec!["my".to_string(), "reference".to_string()]]
        );
    }

    #[test]
    fn collects_from_operators_calls_and_blocks() {
        let refs = collect_template_references(&json!(
            "${if a.on}${upper(b) || c[\"d\"]}${endif}"
        ))
        .unwrap();
        assert_eq!(
            refs,
            vec![
                vec!["a".to_string(), "on".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn dynamic_segments_truncate_path() {
        let refs = collect_template_references(&json!("${a.b[var.k].c}")).unwrap();
        assert_eq!(
            refs,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["var".to_string(), "k".to_string()],
            ]
        );
    }

    #[test]
    fn parse_errors_propagate() {
        let err = collect_template_references(&json!({"x": "${a +}"})).unwrap_err();
        assert_eq!(err.code(), "TPL-001");
    }

    #[test]
    fn action_reference() {
        let refs =
            get_action_template_references(&json!({"build": "${action[\"build\"].build-a}"}), None)
                .unwrap();
        assert_eq!(
            refs,
            vec![ActionReference {
                kind: ActionKind::Build,
                name: "build-a".to_string(),
                full_ref: vec!["action".into(), "build".into(), "build-a".into()],
            }]
        );
    }

    #[test]
    fn runtime_reference_maps_kind() {
        let refs = get_action_template_references(
            &json!(["${runtime.services.api.outputs}", "${runtime[\"tasks\"].migrate}"]),
            None,
        )
        .unwrap();
        assert_eq!(refs[0].kind, ActionKind::Deploy);
        assert_eq!(refs[0].name, "api");
        assert_eq!(refs[1].kind, ActionKind::Run);
    }

    #[test]
    fn invalid_kind() {
        let err = get_action_template_references(&json!("${action[\"badkind\"].x}"), None)
            .unwrap_err();
        assert!(err.to_string().contains("invalid kind 'badkind'"));
    }

    #[test]
    fn missing_kind_and_name() {
        let err = get_action_template_references(&json!("${action}"), None).unwrap_err();
        assert_eq!(err.to_string(), "Found invalid action reference (missing kind).");
        let err = get_action_template_references(&json!("${action.build}"), None).unwrap_err();
        assert_eq!(err.to_string(), "Found invalid action reference (missing name).");
    }

    #[test]
    fn non_string_kind_and_name() {
        let err = get_action_template_references(&json!("${action[0].x}"), None).unwrap_err();
        assert!(err.to_string().contains("kind is not a string"));
        let err =
            get_action_template_references(&json!("${action.build[1]}"), None).unwrap_err();
        assert!(err.to_string().contains("name is not a string"));
    }

    #[test]
    fn dynamic_kind_needs_context() {
        let value = json!("${action[var.kind].api}");
        let err = get_action_template_references(&value, None).unwrap_err();
        assert!(err
            .to_string()
            .contains("kind must be a literal string, got an unresolvable reference"));

        let ctx = GenericContext::new(json!({"var": {"kind": "deploy"}}));
        let refs = get_action_template_references(&value, Some(&ctx as &dyn ConfigContext)).unwrap();
        assert_eq!(refs[0].kind, ActionKind::Deploy);
        assert_eq!(refs[0].full_ref, vec!["action", "deploy", "api"]);
    }
}
