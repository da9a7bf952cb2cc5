//! Scanner - splits a template string into literal text and `${...}` segments
//!
//! Recognizes:
//! - `${expr}` expression segments, with an optional trailing `?`
//! - `$${expr}` escapes (kept literally; `unescape` strips one `$`)
//! - `${if expr}` / `${else}` / `${endif}` conditional blocks, nested via a stack
//!
//! The scanner never looks inside an expression beyond quote tracking: a `}`
//! inside a string literal does not close the segment.

use thiserror::Error;

/// Reason used for malformed or unterminated segments
pub const PARSE_FAILURE: &str = "Unable to parse as valid template string";

/// Syntax error raised by the scanner or the expression parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct SyntaxError {
    pub reason: String,
}

impl SyntaxError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// One `${...}` segment as it appears in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Full source text, including `${`, `}` and the `?` suffix if present
    pub source: &'a str,
    /// Expression text (for `${if cond}` this is `cond`)
    pub expr: &'a str,
    pub optional: bool,
}

/// Scanned template structure
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk<'a> {
    Literal(String),
    Expression(Segment<'a>),
    Conditional {
        condition: Segment<'a>,
        then: Vec<Chunk<'a>>,
        otherwise: Vec<Chunk<'a>>,
    },
}

/// Flat token stream before block matching
#[derive(Debug)]
enum Raw<'a> {
    Text(&'a str),
    Expr(Segment<'a>),
    If(Segment<'a>),
    Else,
    EndIf,
}

struct Frame<'a> {
    condition: Segment<'a>,
    then: Vec<Chunk<'a>>,
    otherwise: Option<Vec<Chunk<'a>>>,
}

/// Scan a template string into chunks
pub fn scan(input: &str, unescape: bool) -> Result<Vec<Chunk<'_>>, SyntaxError> {
    let raw = tokenize(input, unescape)?;
    build_blocks(raw)
}

/// Call `f` for every expression segment, including block conditions
pub fn for_each_segment<'a>(chunks: &[Chunk<'a>], f: &mut impl FnMut(&Segment<'a>)) {
    for chunk in chunks {
        match chunk {
            Chunk::Literal(_) => {}
            Chunk::Expression(segment) => f(segment),
            Chunk::Conditional {
                condition,
                then,
                otherwise,
            } => {
                f(condition);
                for_each_segment(then, f);
                for_each_segment(otherwise, f);
            }
        }
    }
}

fn tokenize(input: &str, unescape: bool) -> Result<Vec<Raw<'_>>, SyntaxError> {
    let bytes = input.as_bytes();
    let mut raw = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        let escaped = bytes.get(i + 1) == Some(&b'$') && bytes.get(i + 2) == Some(&b'{');
        if escaped {
            let Ok(close) = find_closing_brace(bytes, i + 3) else {
                // No well-formed segment follows, the text is plain literal
                i += 2;
                continue;
            };
            if i > literal_start {
                raw.push(Raw::Text(&input[literal_start..i]));
            }
            let text = if unescape {
                &input[i + 1..=close]
            } else {
                &input[i..=close]
            };
            raw.push(Raw::Text(text));
            i = close + 1;
            literal_start = i;
            continue;
        }

        if bytes.get(i + 1) == Some(&b'{') {
            if i > literal_start {
                raw.push(Raw::Text(&input[literal_start..i]));
            }
            let close = find_closing_brace(bytes, i + 2)?;
            let mut end = close + 1;
            let optional = bytes.get(end) == Some(&b'?');
            if optional {
                end += 1;
            }
            let segment = Segment {
                source: &input[i..end],
                expr: &input[i + 2..close],
                optional,
            };
            raw.push(classify(segment)?);
            i = end;
            literal_start = end;
            continue;
        }

        i += 1;
    }

    if literal_start < bytes.len() {
        raw.push(Raw::Text(&input[literal_start..]));
    }

    Ok(raw)
}

/// Find the `}` closing a segment whose body starts at `from`
///
/// Quotes are tracked so that braces in string literals don't count.
/// An unescaped `${` before the closing brace is a syntax error.
fn find_closing_brace(bytes: &[u8], from: usize) -> Result<usize, SyntaxError> {
    let mut quote: Option<u8> = None;
    let mut j = from;

    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    j += 2;
                    continue;
                }
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'}' => return Ok(j),
                b'$' if bytes.get(j + 1) == Some(&b'{') => {
                    return Err(SyntaxError::new(PARSE_FAILURE));
                }
                _ => {}
            },
        }
        j += 1;
    }

    Err(SyntaxError::new(PARSE_FAILURE))
}

fn classify(segment: Segment<'_>) -> Result<Raw<'_>, SyntaxError> {
    let trimmed = segment.expr.trim();

    let block = match trimmed {
        "else" => Some(Raw::Else),
        "endif" => Some(Raw::EndIf),
        "if" => return Err(SyntaxError::new(PARSE_FAILURE)),
        _ => match trimmed.strip_prefix("if") {
            Some(rest) if rest.starts_with(char::is_whitespace) => Some(Raw::If(Segment {
                expr: rest.trim(),
                ..segment
            })),
            _ => None,
        },
    };

    match block {
        Some(_) if segment.optional => Err(SyntaxError::new(
            "Cannot specify optional suffix in if-block",
        )),
        Some(raw) => Ok(raw),
        None => Ok(Raw::Expr(segment)),
    }
}

fn build_blocks(raw: Vec<Raw<'_>>) -> Result<Vec<Chunk<'_>>, SyntaxError> {
    let mut root: Vec<Chunk<'_>> = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();

    for token in raw {
        match token {
            Raw::Text(text) => push_text(target(&mut root, &mut stack), text),
            Raw::Expr(segment) => target(&mut root, &mut stack).push(Chunk::Expression(segment)),
            Raw::If(condition) => stack.push(Frame {
                condition,
                then: Vec::new(),
                otherwise: None,
            }),
            Raw::Else => {
                let Some(frame) = stack.last_mut() else {
                    return Err(SyntaxError::new(
                        "Found ${else} block without a preceding ${if...} block",
                    ));
                };
                if frame.otherwise.is_some() {
                    return Err(SyntaxError::new(
                        "Found multiple ${else} blocks in the same ${if...} block",
                    ));
                }
                frame.otherwise = Some(Vec::new());
            }
            Raw::EndIf => {
                let Some(frame) = stack.pop() else {
                    return Err(SyntaxError::new(
                        "Found ${endif} block without a preceding ${if...} block",
                    ));
                };
                let chunk = Chunk::Conditional {
                    condition: frame.condition,
                    then: frame.then,
                    otherwise: frame.otherwise.unwrap_or_default(),
                };
                target(&mut root, &mut stack).push(chunk);
            }
        }
    }

    if !stack.is_empty() {
        return Err(SyntaxError::new(
            "Missing ${endif} after ${if ...} block",
        ));
    }

    Ok(root)
}

fn target<'s, 'a>(root: &'s mut Vec<Chunk<'a>>, stack: &'s mut [Frame<'a>]) -> &'s mut Vec<Chunk<'a>> {
    match stack.last_mut() {
        Some(Frame {
            otherwise: Some(otherwise),
            ..
        }) => otherwise,
        Some(frame) => &mut frame.then,
        None => root,
    }
}

fn push_text(chunks: &mut Vec<Chunk<'_>>, text: &str) {
    if let Some(Chunk::Literal(existing)) = chunks.last_mut() {
        existing.push_str(text);
    } else {
        chunks.push(Chunk::Literal(text.to_string()));
    }
}
