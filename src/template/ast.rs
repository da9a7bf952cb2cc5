//! Expression AST
//!
//! One sum type, one evaluator arm per variant. Built fresh for every
//! template segment and dropped right after evaluation.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String, number, boolean or null literal
    Literal(Value),
    /// Root key lookup (`var`, `build-a`)
    Identifier(String),
    /// `base.key` or `base[expr]`
    Member { base: Box<Expr>, key: MemberKey },
    /// Helper call `name(arg, ...)`
    Call { name: String, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `[a, b, c]`
    Array(Vec<Expr>),
}

/// Member access key
#[derive(Debug, Clone, PartialEq)]
pub enum MemberKey {
    /// Dot access: `a.b`
    Name(String),
    /// Bracket access: `a["b"]`, `a[0]`, `a[var.key]`
    Index(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Contains => "contains",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

impl Expr {
    pub(crate) fn member(base: Expr, key: MemberKey) -> Self {
        Expr::Member {
            base: Box::new(base),
            key,
        }
    }

    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
