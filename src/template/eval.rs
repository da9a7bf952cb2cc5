//! Evaluator - walks an expression AST against a context
//!
//! One arm per AST variant. Member chains rooted at an identifier become a
//! single key path handed to the context, so nested-context failures carry
//! the full qualified path. Any other base (call result, literal, grouped
//! expression) is evaluated first and then indexed by value.

use serde_json::Value;
use smallvec::SmallVec;
use thiserror::Error;

use super::ast::{BinaryOp, Expr, MemberKey, UnaryOp};
use super::value::{self, as_number, is_truthy, render, type_name, values_equal};
use super::ResolveOptions;
use crate::context::{lookup_path, ConfigContext, ContextError};
use crate::helpers::HelperRegistry;

/// Evaluation failure, local to the template module
///
/// `Missing` is the only failure the `||`, `&&`, ternary and `?` rules
/// treat specially.
#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum EvalError {
    #[error("{0}")]
    Missing(String),
    #[error("{0}")]
    Invalid(String),
}

impl EvalError {
    pub(crate) fn is_missing(&self) -> bool {
        matches!(self, EvalError::Missing(_))
    }

    pub(crate) fn reason(&self) -> &str {
        match self {
            EvalError::Missing(reason) | EvalError::Invalid(reason) => reason,
        }
    }
}

impl From<ContextError> for EvalError {
    fn from(err: ContextError) -> Self {
        if err.is_missing_key() {
            EvalError::Missing(err.to_string())
        } else {
            EvalError::Invalid(err.to_string())
        }
    }
}

pub(crate) type EvalResult<T> = std::result::Result<T, EvalError>;

type KeyPath = SmallVec<[String; 4]>;

pub(crate) struct Evaluator<'a> {
    context: &'a dyn ConfigContext,
    opts: &'a ResolveOptions,
    helpers: &'a HelperRegistry,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        context: &'a dyn ConfigContext,
        opts: &'a ResolveOptions,
        helpers: &'a HelperRegistry,
    ) -> Self {
        Self {
            context,
            opts,
            helpers,
        }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Identifier(_) | Expr::Member { .. } => self.eval_member(expr),
            Expr::Call { name, args } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.helpers
                    .call(name, &values)
                    .map_err(|err| EvalError::Invalid(err.to_string()))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!is_truthy(&value)),
                    UnaryOp::TypeOf => Value::String(type_name(&value).to_string()),
                })
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let chosen = match self.eval(condition) {
                    Ok(value) => is_truthy(&value),
                    Err(err) if err.is_missing() && !self.opts.allow_partial => false,
                    Err(err) => return Err(err),
                };
                if chosen {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Array(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::Array),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // MEMBER ACCESS
    // ═══════════════════════════════════════════════════════════════

    fn eval_member(&self, expr: &Expr) -> EvalResult<Value> {
        if let Some(path) = self.key_path(expr)? {
            return Ok(self.context.resolve(&path, self.opts)?);
        }

        let Expr::Member { base, key } = expr else {
            // key_path always succeeds for bare identifiers
            return Err(EvalError::Invalid(
                "Unable to resolve identifier".to_string(),
            ));
        };
        let base = self.eval(base)?;
        let key = self.member_key(key)?;
        Ok(lookup_path(&base, std::slice::from_ref(&key))?)
    }

    /// Key path for a member chain rooted at an identifier, `None` otherwise
    fn key_path(&self, expr: &Expr) -> EvalResult<Option<KeyPath>> {
        match expr {
            Expr::Identifier(name) => {
                let mut path = KeyPath::new();
                path.push(name.clone());
                Ok(Some(path))
            }
            Expr::Member { base, key } => match self.key_path(base)? {
                Some(mut path) => {
                    path.push(self.member_key(key)?);
                    Ok(Some(path))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn member_key(&self, key: &MemberKey) -> EvalResult<String> {
        match key {
            MemberKey::Name(name) => Ok(name.clone()),
            MemberKey::Index(expr) => match self.eval(expr)? {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(EvalError::Invalid(format!(
                    "Expression in bracket must resolve to a primitive (got {})",
                    type_name(&other)
                ))),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // OPERATORS
    // ═══════════════════════════════════════════════════════════════

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> EvalResult<Value> {
        match op {
            BinaryOp::Or => match self.eval(left) {
                Ok(value) if is_truthy(&value) => Ok(value),
                Ok(_) => self.eval(right),
                Err(err) if err.is_missing() => self.eval(right),
                Err(err) => Err(err),
            },
            BinaryOp::And => {
                let lhs = match self.eval(left) {
                    Ok(value) => value,
                    Err(err) => return self.missing_in_and(err),
                };
                if !is_truthy(&lhs) {
                    return Ok(lhs);
                }
                self.eval(right).or_else(|err| self.missing_in_and(err))
            }
            _ => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                apply(op, &lhs, &rhs).map_err(EvalError::Invalid)
            }
        }
    }

    /// A missing key inside `&&` makes the conjunction false, except under
    /// partial resolution where the whole segment passes through.
    fn missing_in_and(&self, err: EvalError) -> EvalResult<Value> {
        if err.is_missing() && !self.opts.allow_partial {
            Ok(Value::Bool(false))
        } else {
            Err(err)
        }
    }
}

/// Apply an eagerly-evaluated binary operator
fn apply(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let (a, b) = numbers(op, lhs, rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            }))
        }
        BinaryOp::Contains => contains(lhs, rhs),
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, lhs, rhs),
        // Short-circuit operators never reach here
        BinaryOp::Or | BinaryOp::And => Err(format!("Unexpected {} operator", op.symbol())),
    }
}

fn numbers(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<(f64, f64), String> {
    match (as_number(lhs), as_number(rhs)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(format!(
            "Both terms need to be numbers for {} operator (got {} and {})",
            op.symbol(),
            type_name(lhs),
            type_name(rhs)
        )),
    }
}

fn finite(op: BinaryOp, result: f64) -> Result<Value, String> {
    value::number(result)
        .ok_or_else(|| format!("Result of {} operator is not a finite number", op.symbol()))
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, String> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) if x.checked_add(y).is_some() => Ok(Value::from(x + y)),
            _ => {
                let (x, y) = numbers(BinaryOp::Add, lhs, rhs)?;
                finite(BinaryOp::Add, x + y)
            }
        },
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => Err(format!(
            "Both terms need to be either arrays or strings or numbers for + operator (got {} and {})",
            type_name(lhs),
            type_name(rhs)
        )),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, String> {
    let (a, b) = numbers(op, lhs, rhs)?;

    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
        return Err(format!("Division by zero in {} operator", op.symbol()));
    }

    // Exact integer path where it exists
    if let (Some(x), Some(y)) = (lhs.as_i64(), rhs.as_i64()) {
        let exact = match op {
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Rem => x.checked_rem(y),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let result = match op {
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    finite(op, result)
}

fn contains(lhs: &Value, rhs: &Value) -> Result<Value, String> {
    if matches!(rhs, Value::Array(_) | Value::Object(_)) {
        return Err(format!(
            "The right-hand side of a 'contains' operator must be a string, number, boolean or null (got {})",
            type_name(rhs)
        ));
    }

    let found = match lhs {
        Value::String(s) => s.contains(render(rhs).as_str()),
        Value::Array(items) => items.iter().any(|item| values_equal(item, rhs)),
        Value::Object(map) => map.contains_key(render(rhs).as_str()),
        other => {
            return Err(format!(
                "The left-hand side of a 'contains' operator must be a string, array or object (got {})",
                type_name(other)
            ))
        }
    };
    Ok(Value::Bool(found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenericContext;
    use crate::helpers::HELPERS;
    use crate::template::parser::parse;
    use serde_json::json;

    fn eval_with(source: &str, data: Value, opts: ResolveOptions) -> EvalResult<Value> {
        let ctx = GenericContext::new(data);
        let expr = parse(source).unwrap();
        Evaluator::new(&ctx, &opts, &HELPERS).eval(&expr)
    }

    fn eval(source: &str, data: Value) -> EvalResult<Value> {
        eval_with(source, data, ResolveOptions::default())
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("(1 + 2) * (3 + 4)", json!({})).unwrap(), json!(21));
        assert_eq!(eval("10 - 4 / 2", json!({})).unwrap(), json!(8));
        assert_eq!(eval("7 % 3", json!({})).unwrap(), json!(1));
        assert_eq!(eval("1 / 4", json!({})).unwrap(), json!(0.25));
    }

    #[test]
    fn division_by_zero_is_error() {
        let err = eval("1 / 0", json!({})).unwrap_err();
        assert_eq!(err.reason(), "Division by zero in / operator");
    }

    #[test]
    fn add_strings_and_arrays() {
        assert_eq!(eval("'a' + 'b'", json!({})).unwrap(), json!("ab"));
        assert_eq!(eval("[1] + [2, 3]", json!({})).unwrap(), json!([1, 2, 3]));
        let err = eval("'a' + 1", json!({})).unwrap_err();
        assert_eq!(
            err.reason(),
            "Both terms need to be either arrays or strings or numbers for + operator (got string and number)"
        );
    }

    #[test]
    fn comparison_requires_numbers() {
        assert_eq!(eval("2 >= 2", json!({})).unwrap(), json!(true));
        let err = eval("'a' < 1", json!({})).unwrap_err();
        assert_eq!(
            err.reason(),
            "Both terms need to be numbers for < operator (got string and number)"
        );
    }

    #[test]
    fn equality_is_typed() {
        assert_eq!(eval("1 == '1'", json!({})).unwrap(), json!(false));
        assert_eq!(eval("a == 'x'", json!({"a": "x"})).unwrap(), json!(true));
        assert_eq!(eval("a != null", json!({"a": null})).unwrap(), json!(false));
    }

    #[test]
    fn or_falls_through_missing_and_falsy() {
        assert_eq!(eval("a || b", json!({"b": "abc"})).unwrap(), json!("abc"));
        assert_eq!(eval("a || 'x'", json!({"a": ""})).unwrap(), json!("x"));
        assert_eq!(eval("a || b || 'c'", json!({})).unwrap(), json!("c"));
        let err = eval("a || b", json!({})).unwrap_err();
        assert!(err.is_missing());
        assert!(err.reason().starts_with("Could not find key b"));
    }

    #[test]
    fn or_propagates_non_missing_errors() {
        let err = eval("(1 < 'a') || true", json!({})).unwrap_err();
        assert!(!err.is_missing());
    }

    #[test]
    fn and_short_circuits() {
        assert_eq!(eval("false && a", json!({})).unwrap(), json!(false));
        assert_eq!(eval("a && 'x'", json!({"a": 1})).unwrap(), json!("x"));
    }

    #[test]
    fn and_with_missing_key() {
        assert_eq!(
            eval("var.foo && 'a'", json!({"var": {}})).unwrap(),
            json!(false)
        );
        let partial = ResolveOptions {
            allow_partial: true,
            ..Default::default()
        };
        let err = eval_with("var.foo && 'a'", json!({"var": {}}), partial).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn ternary_only_evaluates_chosen_branch() {
        assert_eq!(eval("foo ? true : false", json!({"foo": true})).unwrap(), json!(true));
        assert_eq!(
            eval("var.foo ? replace(var.foo, ' ', ',') : null", json!({"var": {}})).unwrap(),
            json!(null)
        );
    }

    #[test]
    fn contains_on_each_collection() {
        let data = json!({"a": {"foo": 123}, "s": "hello", "l": [1, "x"]});
        assert_eq!(eval("a contains 'foo'", data.clone()).unwrap(), json!(true));
        assert_eq!(eval("a contains 'bar'", data.clone()).unwrap(), json!(false));
        assert_eq!(eval("a contains 123", data.clone()).unwrap(), json!(false));
        assert_eq!(eval("s contains 'ell'", data.clone()).unwrap(), json!(true));
        assert_eq!(eval("l contains 1", data.clone()).unwrap(), json!(true));
        assert_eq!(eval("l contains '1'", data).unwrap(), json!(false));
    }

    #[test]
    fn contains_operand_checks() {
        let err = eval("'a' contains [1]", json!({})).unwrap_err();
        assert_eq!(
            err.reason(),
            "The right-hand side of a 'contains' operator must be a string, number, boolean or null (got array)"
        );
        let err = eval("1 contains 1", json!({})).unwrap_err();
        assert_eq!(
            err.reason(),
            "The left-hand side of a 'contains' operator must be a string, array or object (got number)"
        );
    }

    #[test]
    fn typeof_and_not() {
        assert_eq!(eval("typeof a", json!({"a": 1})).unwrap(), json!("number"));
        assert_eq!(eval("typeof a", json!({"a": [1]})).unwrap(), json!("array"));
        assert_eq!(eval("!a", json!({"a": ""})).unwrap(), json!(true));
    }

    #[test]
    fn bracket_access() {
        let data = json!({"m": {"k": "v"}, "key": "k", "l": ["a", "b"]});
        assert_eq!(eval("m[key]", data.clone()).unwrap(), json!("v"));
        assert_eq!(eval("m['k']", data.clone()).unwrap(), json!("v"));
        assert_eq!(eval("l[1]", data.clone()).unwrap(), json!("b"));
        let err = eval("m[l]", data).unwrap_err();
        assert_eq!(
            err.reason(),
            "Expression in bracket must resolve to a primitive (got array)"
        );
    }

    #[test]
    fn lookup_on_primitive() {
        let err = eval("a.b", json!({"a": "text"})).unwrap_err();
        assert_eq!(err.reason(), "Attempted to look up key b on a string");
        assert!(!err.is_missing());
    }

    #[test]
    fn index_into_computed_value() {
        assert_eq!(
            eval("split(a, ',')[1]", json!({"a": "x,y"})).unwrap(),
            json!("y")
        );
        assert_eq!(eval("[10, 20][0]", json!({})).unwrap(), json!(10));
    }

    #[test]
    fn nested_missing_reports_full_path() {
        let err = eval("nested.deeper.missing", json!({"nested": {"deeper": {}}})).unwrap_err();
        assert_eq!(err.reason(), "Could not find key missing under nested.deeper");
    }
}
