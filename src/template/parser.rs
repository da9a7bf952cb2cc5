//! Expression parser - lexer + recursive descent
//!
//! Precedence (lowest first):
//!
//! ```text
//! ternary  ? :          (right-associative)
//! ||
//! &&
//! ==  !=
//! <  <=  >  >=
//! contains
//! +  -
//! *  /  %
//! !  typeof             (prefix)
//! .name  [expr]         (postfix)
//! primary               literal, identifier, call, ( expr ), [ items ]
//! ```
//!
//! Identifiers may contain hyphens (`build-a`), so subtraction between two
//! identifiers needs surrounding whitespace: `a - b`.

use serde_json::Value;

use super::ast::{BinaryOp, Expr, MemberKey, UnaryOp};
use super::scanner::{SyntaxError, PARSE_FAILURE};
use super::value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    Contains,
    TypeOf,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
    Bang,
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl Token {
    fn describe(&self) -> String {
        let text = match self {
            Token::Ident(name) => return format!("'{}'", name),
            Token::Number(n) => return format!("'{}'", n),
            Token::Str(s) => return format!("string '{}'", s),
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Contains => "contains",
            Token::TypeOf => "typeof",
            Token::Dot => ".",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Bang => "!",
            Token::OrOr => "||",
            Token::AndAnd => "&&",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
        };
        format!("'{}'", text)
    }
}

/// Parse one expression segment into an AST
pub fn parse(source: &str) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new(PARSE_FAILURE));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(SyntaxError::new(format!(
            "Unexpected token {}",
            token.describe()
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════
// LEXER
// ═══════════════════════════════════════════════════════════════

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // After a dot, any run of name characters is a key (`a.0`, `a.true`)
        if tokens.last() == Some(&Token::Dot) && (is_ident_char(c) || c == '-') {
            let start = i;
            while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '-') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            i += 1;
            while i < chars.len() {
                let ch = chars[i];
                let hyphen = ch == '-' && chars.get(i + 1).is_some_and(|&n| is_ident_char(n));
                if is_ident_char(ch) || hyphen {
                    i += 1;
                } else {
                    break;
                }
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(match word.as_str() {
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                "contains" => Token::Contains,
                "typeof" => Token::TypeOf,
                _ => Token::Ident(word),
            });
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let number = text
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| SyntaxError::new(format!("Invalid number literal '{}'", text)))?;
            tokens.push(Token::Number(number));
            continue;
        }

        if c == '\'' || c == '"' {
            let (text, next) = lex_string(&chars, i)?;
            tokens.push(Token::Str(text));
            i = next;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('|', Some('|')) => (Token::OrOr, 2),
            ('&', Some('&')) => (Token::AndAnd, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Bang, 1),
            ('.', _) => (Token::Dot, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('?', _) => (Token::Question, 1),
            (':', _) => (Token::Colon, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            _ => {
                return Err(SyntaxError::new(format!("Unexpected character '{}'", c)));
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

/// Lex a quoted string starting at `start`; returns the text and the index after the closing quote
fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), SyntaxError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((text, i + 1));
        }
        if c == '\\' {
            let Some(&escaped) = chars.get(i + 1) else {
                break;
            };
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '\\' | '\'' | '"' => text.push(escaped),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
            i += 2;
            continue;
        }
        text.push(c);
        i += 1;
    }

    Err(SyntaxError::new("Unterminated string literal"))
}

// ═══════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), SyntaxError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(SyntaxError::new(format!(
                "Expected {} but found {}",
                expected.describe(),
                token.describe()
            ))),
            None => Err(SyntaxError::new(format!(
                "Expected {} but reached end of expression",
                expected.describe()
            ))),
        }
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, SyntaxError> {
        let condition = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.ternary()?;
        self.expect(Token::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Left-associative binary level
    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::binary(*op, left, right);
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&[(Token::OrOr, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&[(Token::AndAnd, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[(Token::EqEq, BinaryOp::Eq), (Token::NotEq, BinaryOp::NotEq)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                (Token::Le, BinaryOp::Le),
                (Token::Ge, BinaryOp::Ge),
                (Token::Lt, BinaryOp::Lt),
                (Token::Gt, BinaryOp::Gt),
            ],
            Self::contains,
        )
    }

    fn contains(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(&[(Token::Contains, BinaryOp::Contains)], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::TypeOf) => UnaryOp::TypeOf,
            _ => return self.postfix(),
        };
        self.pos += 1;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::member(expr, MemberKey::Name(name));
                    }
                    Some(token) => {
                        return Err(SyntaxError::new(format!(
                            "Expected a key after '.' but found {}",
                            token.describe()
                        )))
                    }
                    None => {
                        return Err(SyntaxError::new(
                            "Expected a key after '.' but reached end of expression",
                        ))
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(Token::RBracket)?;
                expr = Expr::member(expr, MemberKey::Index(Box::new(index)));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let Some(token) = self.advance() else {
            return Err(SyntaxError::new("Unexpected end of expression"));
        };

        match token {
            Token::Number(n) => number_literal(n),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Minus => match self.advance() {
                Some(Token::Number(n)) => number_literal(-n),
                Some(other) => Err(SyntaxError::new(format!(
                    "Unexpected token {} after '-'",
                    other.describe()
                ))),
                None => Err(SyntaxError::new("Unexpected end of expression")),
            },
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.list(Token::RParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => Ok(Expr::Array(self.list(Token::RBracket)?)),
            other => Err(SyntaxError::new(format!(
                "Unexpected token {}",
                other.describe()
            ))),
        }
    }

    /// Comma-separated expressions up to `close` (already past the opener)
    fn list(&mut self, close: Token) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close.clone())?;
            return Ok(items);
        }
    }
}

fn number_literal(n: f64) -> Result<Expr, SyntaxError> {
    value::number(n)
        .map(Expr::Literal)
        .ok_or_else(|| SyntaxError::new(format!("Invalid number literal '{}'", n)))
}
