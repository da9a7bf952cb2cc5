//! Template Module - `${...}` string resolution
//!
//! Pipeline per string: scan → parse every segment → evaluate → splice.
//!
//! - `scanner`: literal / expression / if-block chunks
//! - `parser`: expression AST with full operator precedence
//! - `eval`: AST evaluation against a `ConfigContext`
//! - `value`: type names, truthiness, rendering, equality
//!
//! All segments are parsed before any is evaluated, so a syntax error
//! anywhere in the string is fatal even under partial resolution.

pub mod ast;
mod eval;
pub mod parser;
pub mod scanner;
pub mod value;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::context::ConfigContext;
use crate::error::{Result, TemplarError};
use crate::helpers::HELPERS;
use ast::Expr;
use eval::{EvalError, Evaluator};
use scanner::{Chunk, Segment, SyntaxError};

/// Template text longer than this is cut in error messages
pub const MAX_DISPLAY_LEN: usize = 200;

/// Options passed unchanged through a whole resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Leave unresolvable segments as literal text instead of failing
    pub allow_partial: bool,
    /// Turn `$${...}` escapes into `${...}` (one level removed, not evaluated)
    pub unescape: bool,
}

impl ResolveOptions {
    pub fn partial() -> Self {
        Self {
            allow_partial: true,
            unescape: false,
        }
    }

    pub fn with_allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }

    pub fn with_unescape(mut self, unescape: bool) -> Self {
        self.unescape = unescape;
        self
    }
}

/// Template text as shown in error messages: newlines escaped, long text truncated
pub fn display_template(template: &str) -> String {
    let escaped = template.replace('\n', "\\n");
    if escaped.chars().count() <= MAX_DISPLAY_LEN {
        return escaped;
    }
    let mut cut: String = escaped.chars().take(MAX_DISPLAY_LEN).collect();
    cut.push_str("...");
    cut
}

/// Resolve every `${...}` segment of `input` against `context`
///
/// A string that is exactly one expression yields the raw value (any type);
/// otherwise values are rendered to text and spliced between the literals.
pub fn resolve_template_string(
    input: &str,
    context: &dyn ConfigContext,
    opts: &ResolveOptions,
) -> Result<Value> {
    if !input.contains("${") {
        return Ok(Value::String(input.to_string()));
    }

    trace!(template = %display_template(input), "resolving template string");

    let chunks = scanner::scan(input, opts.unescape).map_err(|e| parse_error(input, e))?;
    let nodes = compile(chunks).map_err(|e| parse_error(input, e))?;

    let evaluator = Evaluator::new(context, opts, &HELPERS);
    let resolver = SegmentResolver { evaluator, opts };

    if let [Node::Expression { segment, expr }] = nodes.as_slice() {
        return match resolver.resolve(segment, expr) {
            Ok(Outcome::Value(value)) => Ok(value),
            Ok(Outcome::Absent) => Ok(Value::Null),
            Ok(Outcome::Passthrough) => Ok(Value::String(input.to_string())),
            Err(err) => Err(resolve_error(input, err)),
        };
    }

    let mut out = String::with_capacity(input.len());
    match resolver.render(&nodes, &mut out) {
        Ok(Flow::Continue) => Ok(Value::String(out)),
        Ok(Flow::Passthrough) => Ok(Value::String(input.to_string())),
        Err(err) => Err(resolve_error(input, err)),
    }
}

/// Evaluate a single parsed expression, returning the failure reason on error
pub(crate) fn evaluate(
    expr: &Expr,
    context: &dyn ConfigContext,
    opts: &ResolveOptions,
) -> std::result::Result<Value, String> {
    Evaluator::new(context, opts, &HELPERS)
        .eval(expr)
        .map_err(|err| err.reason().to_string())
}

fn parse_error(input: &str, err: SyntaxError) -> TemplarError {
    TemplarError::TemplateParse {
        template: display_template(input),
        reason: err.reason,
    }
}

fn resolve_error(input: &str, err: EvalError) -> TemplarError {
    TemplarError::TemplateResolve {
        template: display_template(input),
        missing_key: err.is_missing(),
        reason: err.reason().to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════
// PARSED TEMPLATE
// ═══════════════════════════════════════════════════════════════

/// Scanned chunk with its expression parsed
enum Node<'a> {
    Text(String),
    Expression {
        segment: Segment<'a>,
        expr: Expr,
    },
    Conditional {
        condition: Expr,
        then: Vec<Node<'a>>,
        otherwise: Vec<Node<'a>>,
    },
}

fn compile(chunks: Vec<Chunk<'_>>) -> std::result::Result<Vec<Node<'_>>, SyntaxError> {
    let mut nodes = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        nodes.push(match chunk {
            Chunk::Literal(text) => Node::Text(text),
            Chunk::Expression(segment) => Node::Expression {
                expr: parser::parse(segment.expr)?,
                segment,
            },
            Chunk::Conditional {
                condition,
                then,
                otherwise,
            } => Node::Conditional {
                condition: parser::parse(condition.expr)?,
                then: compile(then)?,
                otherwise: compile(otherwise)?,
            },
        });
    }
    Ok(nodes)
}

/// Result of one segment after the partial/optional rules
enum Outcome {
    Value(Value),
    /// Optional segment whose key is missing
    Absent,
    /// Unresolvable under partial resolution, keep the source text
    Passthrough,
}

enum Flow {
    Continue,
    /// An if-condition could not be resolved, the whole input passes through
    Passthrough,
}

struct SegmentResolver<'a> {
    evaluator: Evaluator<'a>,
    opts: &'a ResolveOptions,
}

impl SegmentResolver<'_> {
    fn resolve(&self, segment: &Segment<'_>, expr: &Expr) -> std::result::Result<Outcome, EvalError> {
        match self.evaluator.eval(expr) {
            Ok(value) => Ok(Outcome::Value(value)),
            Err(_) if self.opts.allow_partial => Ok(Outcome::Passthrough),
            Err(err) if err.is_missing() && segment.optional => Ok(Outcome::Absent),
            Err(err) => Err(err),
        }
    }

    fn render(&self, nodes: &[Node<'_>], out: &mut String) -> std::result::Result<Flow, EvalError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Expression { segment, expr } => match self.resolve(segment, expr)? {
                    Outcome::Value(value) => out.push_str(&value::render(&value)),
                    Outcome::Absent => {}
                    Outcome::Passthrough => out.push_str(segment.source),
                },
                Node::Conditional {
                    condition,
                    then,
                    otherwise,
                } => {
                    let branch = match self.evaluator.eval(condition) {
                        Ok(value) if value::is_truthy(&value) => then,
                        Ok(_) => otherwise,
                        Err(_) if self.opts.allow_partial => return Ok(Flow::Passthrough),
                        Err(err) => return Err(err),
                    };
                    if let Flow::Passthrough = self.render(branch, out)? {
                        return Ok(Flow::Passthrough);
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }
}
