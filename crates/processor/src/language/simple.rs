//! Parser for the `simple` text form
//!
//! A small recursive-descent parser. Errors carry the byte position of the
//! offending token and surface when routes are built.

use regex::Regex;
use serde_json::{Number, Value};

use super::{CompareOp, Expression, Predicate, TemplatePart};
use crate::{ProcessorError, Result};

#[cfg(test)]
#[path = "simple_test.rs"]
mod tests;

/// Parse an expression
///
/// Text containing `${...}` placeholders becomes a template; a text that is
/// a single placeholder evaluates to the placeholder's value with its type
/// kept. A bare reference such as `header.foo` or `body` is accepted as
/// well. Anything else is literal text.
///
/// # Errors
///
/// Returns `ProcessorError::Parse` for an unclosed or unknown placeholder.
pub fn simple(text: &str) -> Result<Expression> {
    if !text.contains("${") {
        return Ok(resolve_reference(text.trim()).unwrap_or_else(|| Expression::from(text)));
    }

    let mut parts = Vec::new();
    let mut rest = text;
    let mut offset = 0;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            parts.push(TemplatePart::Literal(rest[..start].to_string()));
        }
        let inner_start = start + 2;
        let end = rest[inner_start..]
            .find('}')
            .map(|i| inner_start + i)
            .ok_or_else(|| ProcessorError::parse(text, offset + start, "unclosed '${'"))?;
        let inner = rest[inner_start..end].trim();
        let expr = resolve_reference(inner).ok_or_else(|| {
            ProcessorError::parse(text, offset + inner_start, format!("unknown reference '{inner}'"))
        })?;
        parts.push(TemplatePart::Expr(expr));
        offset += end + 1;
        rest = &rest[end + 1..];
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Literal(rest.to_string()));
    }

    match parts.as_slice() {
        [TemplatePart::Expr(expr)] => Ok(expr.clone()),
        _ => Ok(Expression::Template(parts)),
    }
}

/// Parse a predicate
///
/// # Errors
///
/// Returns `ProcessorError::Parse` on a syntax error, an unknown reference
/// or an invalid regex.
pub fn simple_predicate(text: &str) -> Result<Predicate> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        input: text,
        tokens,
        pos: 0,
    };
    let predicate = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(ProcessorError::parse(
            text,
            token.pos,
            format!("unexpected {}", token.kind.describe()),
        ));
    }
    Ok(predicate)
}

/// Resolve a reference such as `header.foo` to an expression
fn resolve_reference(name: &str) -> Option<Expression> {
    const HEADER_PREFIXES: [&str; 4] = ["header.", "headers.", "in.header.", "in.headers."];
    const PROPERTY_PREFIXES: [&str; 2] = ["exchangeProperty.", "property."];

    for prefix in HEADER_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix)
            && !rest.is_empty()
        {
            return Some(Expression::Header(rest.to_string()));
        }
    }
    for prefix in PROPERTY_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix)
            && !rest.is_empty()
        {
            return Some(Expression::Property(rest.to_string()));
        }
    }
    match name {
        "body" | "in.body" => Some(Expression::Body),
        "exchangeId" => Some(Expression::ExchangeId),
        _ => name
            .strip_prefix("body.")
            .filter(|p| !p.is_empty())
            .map(|p| Expression::BodyPath(p.to_string())),
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Placeholder(String),
    Str(String),
    Num(Number),
    Op(CompareOp),
    Regex,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Ident(s) => format!("'{s}'"),
            Self::Placeholder(s) => format!("'${{{s}}}'"),
            Self::Str(s) => format!("string '{s}'"),
            Self::Num(n) => format!("number {n}"),
            Self::Op(op) => format!("'{}'", op.as_str()),
            Self::Regex => "'~='".to_string(),
            Self::And => "'&&'".to_string(),
            Self::Or => "'||'".to_string(),
            Self::Not => "'!'".to_string(),
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let pos = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = input.get(i..i + 2).unwrap_or("");
        let (kind, len) = match two {
            "==" => (TokenKind::Op(CompareOp::Eq), 2),
            "!=" => (TokenKind::Op(CompareOp::Ne), 2),
            "<=" => (TokenKind::Op(CompareOp::Le), 2),
            ">=" => (TokenKind::Op(CompareOp::Ge), 2),
            "~=" => (TokenKind::Regex, 2),
            "&&" => (TokenKind::And, 2),
            "||" => (TokenKind::Or, 2),
            "${" => {
                let end = input[i + 2..]
                    .find('}')
                    .ok_or_else(|| ProcessorError::parse(input, pos, "unclosed '${'"))?;
                let inner = input[i + 2..i + 2 + end].trim().to_string();
                (TokenKind::Placeholder(inner), end + 3)
            }
            _ => match c {
                b'<' => (TokenKind::Op(CompareOp::Lt), 1),
                b'>' => (TokenKind::Op(CompareOp::Gt), 1),
                b'!' => (TokenKind::Not, 1),
                b'(' => (TokenKind::LParen, 1),
                b')' => (TokenKind::RParen, 1),
                b'\'' | b'"' => {
                    let (s, len) = lex_string(input, i)?;
                    (TokenKind::Str(s), len)
                }
                b'0'..=b'9' | b'-' => {
                    let (n, len) = lex_number(input, i)?;
                    (TokenKind::Num(n), len)
                }
                c if c.is_ascii_alphabetic() || c == b'_' => {
                    let len = input[i..]
                        .find(|ch: char| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')))
                        .unwrap_or(input.len() - i);
                    let word = &input[i..i + len];
                    let kind = match word {
                        "and" => TokenKind::And,
                        "or" => TokenKind::Or,
                        "not" => TokenKind::Not,
                        "contains" => TokenKind::Op(CompareOp::Contains),
                        _ => TokenKind::Ident(word.to_string()),
                    };
                    (kind, len)
                }
                _ => {
                    let ch = input[i..].chars().next().unwrap_or('?');
                    return Err(ProcessorError::parse(input, pos, format!("unexpected character '{ch}'")));
                }
            },
        };

        tokens.push(Token { kind, pos });
        i += len;
    }

    Ok(tokens)
}

fn lex_string(input: &str, start: usize) -> Result<(String, usize)> {
    let mut chars = input[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ProcessorError::parse(input, start, "expected string"));
    };
    let mut out = String::new();
    let mut escaped = false;
    for (offset, ch) in chars {
        if escaped {
            // Only quotes and backslashes are escapes; regex classes like \s pass through
            if ch != quote && ch != '\\' {
                out.push('\\');
            }
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            return Ok((out, offset + ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    Err(ProcessorError::parse(input, start, "unterminated string"))
}

fn lex_number(input: &str, start: usize) -> Result<(Number, usize)> {
    let len = input[start..]
        .char_indices()
        .find(|&(i, ch)| !(ch.is_ascii_digit() || ch == '.' || (i == 0 && ch == '-')))
        .map(|(i, _)| i)
        .unwrap_or(input.len() - start);
    let text = &input[start..start + len];

    let number = if let Ok(n) = text.parse::<i64>() {
        Some(Number::from(n))
    } else {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    };
    number
        .map(|n| (n, len))
        .ok_or_else(|| ProcessorError::parse(input, start, format!("invalid number '{text}'")))
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn end_pos(&self) -> usize {
        self.input.len()
    }

    fn error(&self, pos: usize, message: impl Into<String>) -> ProcessorError {
        ProcessorError::parse(self.input, pos, message)
    }

    fn parse_or(&mut self) -> Result<Predicate> {
        let mut any = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token { kind: TokenKind::Or, .. })) {
            self.pos += 1;
            any.push(self.parse_and()?);
        }
        Ok(if any.len() == 1 { any.remove(0) } else { Predicate::Or(any) })
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut all = vec![self.parse_unary()?];
        while matches!(self.peek(), Some(Token { kind: TokenKind::And, .. })) {
            self.pos += 1;
            all.push(self.parse_unary()?);
        }
        Ok(if all.len() == 1 { all.remove(0) } else { Predicate::And(all) })
    }

    fn parse_unary(&mut self) -> Result<Predicate> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Not) => {
                self.pos += 1;
                Ok(self.parse_unary()?.negate())
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(t) => Err(self.error(t.pos, format!("expected ')', found {}", t.kind.describe()))),
                    None => Err(self.error(self.end_pos(), "expected ')'")),
                }
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<Predicate> {
        let left = self.parse_operand()?;

        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Op(op)) => {
                self.pos += 1;
                let right = self.parse_operand()?;
                Ok(Predicate::Compare { left, op, right })
            }
            Some(TokenKind::Regex) => {
                self.pos += 1;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Str(pattern),
                        pos,
                    }) => {
                        let regex = Regex::new(&pattern)
                            .map_err(|e| self.error(pos, format!("invalid regex: {e}")))?;
                        Ok(Predicate::Matches { expr: left, regex })
                    }
                    Some(t) => Err(self.error(t.pos, "expected quoted regex after '~='")),
                    None => Err(self.error(self.end_pos(), "expected quoted regex after '~='")),
                }
            }
            _ => Ok(match left {
                Expression::Constant(Value::Bool(b)) => Predicate::Constant(b),
                other => Predicate::Truthy(other),
            }),
        }
    }

    fn parse_operand(&mut self) -> Result<Expression> {
        let Some(token) = self.next() else {
            return Err(self.error(self.end_pos(), "expected operand"));
        };
        match token.kind {
            TokenKind::Str(s) => Ok(Expression::Constant(Value::String(s))),
            TokenKind::Num(n) => Ok(Expression::Constant(Value::Number(n))),
            TokenKind::Ident(word) | TokenKind::Placeholder(word) => match word.as_str() {
                "true" => Ok(Expression::Constant(Value::Bool(true))),
                "false" => Ok(Expression::Constant(Value::Bool(false))),
                "null" => Ok(Expression::Constant(Value::Null)),
                name => resolve_reference(name)
                    .ok_or_else(|| self.error(token.pos, format!("unknown reference '{name}'"))),
            },
            other => Err(self.error(token.pos, format!("expected operand, found {}", other.describe()))),
        }
    }
}
