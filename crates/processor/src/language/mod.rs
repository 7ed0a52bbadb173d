//! Expression language
//!
//! Expressions compute values from an exchange; predicates compute
//! booleans. Both can be built in code or parsed from the `simple` text
//! form used by configuration files.
//!
//! # Text form
//!
//! | Form | Meaning |
//! |------|---------|
//! | `header.name`, `${header.name}` | Message header |
//! | `exchangeProperty.name` | Exchange property |
//! | `body`, `body.user.id` | Body, or a dot path into a JSON body |
//! | `exchangeId` | Exchange id |
//! | `'text'`, `42`, `true`, `null` | Literals |
//! | `a == b`, `!=`, `<`, `<=`, `>`, `>=` | Comparison |
//! | `a contains b`, `a ~= 'regex'` | Substring / membership, regex match |
//! | `p && q`, `p \|\| q`, `!p`, `(p)` | Boolean logic |
//!
//! Templates mix literal text and placeholders:
//! `"got ${body} from ${header.source}"`.
//!
//! # Comparison rules
//!
//! When both sides coerce to numbers (JSON numbers or numeric strings) they
//! are compared numerically; otherwise they are compared as strings.
//! A missing value is `null`: it equals only `null` and is never ordered.
//!
//! # Example
//!
//! ```
//! use switchyard_exchange::Exchange;
//! use switchyard_processor::language::{header, simple_predicate};
//!
//! let mut exchange = Exchange::with_body("order");
//! exchange.message_mut().set_header("foo", "bar");
//!
//! assert!(header("foo").is_equal_to("bar").matches(&exchange).unwrap());
//!
//! let p = simple_predicate("header.foo == 'bar' && body contains 'ord'").unwrap();
//! assert!(p.matches(&exchange).unwrap());
//! ```

mod simple;

pub use simple::{simple, simple_predicate};

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use switchyard_exchange::{Exchange, ExchangeError, ProcessResult};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

/// Closure evaluating a value
pub type ValueFn = Arc<dyn Fn(&Exchange) -> ProcessResult<Value> + Send + Sync>;

/// Closure evaluating a condition
pub type ConditionFn = Arc<dyn Fn(&Exchange) -> ProcessResult<bool> + Send + Sync>;

/// A value computed from an exchange
#[derive(Clone)]
pub enum Expression {
    /// Fixed value
    Constant(Value),
    /// Message header (`null` if absent)
    Header(String),
    /// Exchange property (`null` if absent)
    Property(String),
    /// Whole message body
    Body,
    /// Dot path into a JSON body (`null` if any segment is missing)
    BodyPath(String),
    /// Exchange id
    ExchangeId,
    /// Literal text interleaved with expressions, rendered as a string
    Template(Vec<TemplatePart>),
    /// User closure
    Custom(ValueFn),
}

/// One segment of a template
#[derive(Debug, Clone)]
pub enum TemplatePart {
    /// Literal text
    Literal(String),
    /// Placeholder
    Expr(Expression),
}

impl Expression {
    /// Evaluate against an exchange
    ///
    /// # Errors
    ///
    /// Only custom closures and JSON body paths over a non-JSON body fail.
    pub fn evaluate(&self, exchange: &Exchange) -> ProcessResult<Value> {
        let message = exchange.message();
        match self {
            Self::Constant(v) => Ok(v.clone()),
            Self::Header(name) => Ok(message.header(name).cloned().unwrap_or(Value::Null)),
            Self::Property(name) => Ok(exchange.property(name).cloned().unwrap_or(Value::Null)),
            Self::Body => Ok(message.body().to_value()),
            Self::BodyPath(path) => {
                let json = message.body().to_json()?;
                Ok(json_path(&json, path).cloned().unwrap_or(Value::Null))
            }
            Self::ExchangeId => Ok(Value::String(exchange.id().to_string())),
            Self::Template(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Literal(text) => out.push_str(text),
                        TemplatePart::Expr(expr) => out.push_str(&value_to_string(&expr.evaluate(exchange)?)),
                    }
                }
                Ok(Value::String(out))
            }
            Self::Custom(f) => f(exchange),
        }
    }

    /// Evaluate and render as a string (`null` renders empty)
    pub fn evaluate_string(&self, exchange: &Exchange) -> ProcessResult<String> {
        self.evaluate(exchange).map(|v| value_to_string(&v))
    }

    /// Evaluate as a non-negative integer
    ///
    /// # Errors
    ///
    /// Returns `ExchangeError::Expression` if the value is not a
    /// non-negative whole number or numeric string.
    pub fn evaluate_u64(&self, exchange: &Exchange) -> ProcessResult<u64> {
        let value = self.evaluate(exchange)?;
        value_to_u64(&value)
            .ok_or_else(|| ExchangeError::expression(format!("expected a non-negative integer, got {value}")))
    }

    /// Create an expression from a closure
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Exchange) -> ProcessResult<Value> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    // ------------------------------------------------------------------------
    // Predicate builders
    // ------------------------------------------------------------------------

    fn compare(self, op: CompareOp, right: impl Into<Expression>) -> Predicate {
        Predicate::Compare {
            left: self,
            op,
            right: right.into(),
        }
    }

    /// `self == right`
    pub fn is_equal_to(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Eq, right)
    }

    /// `self != right`
    pub fn is_not_equal_to(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Ne, right)
    }

    /// `self > right`
    pub fn is_greater_than(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Gt, right)
    }

    /// `self >= right`
    pub fn is_greater_than_or_equal_to(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Ge, right)
    }

    /// `self < right`
    pub fn is_less_than(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Lt, right)
    }

    /// `self <= right`
    pub fn is_less_than_or_equal_to(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Le, right)
    }

    /// `self contains right`
    pub fn contains(self, right: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::Contains, right)
    }

    /// Value is present (not `null`)
    pub fn exists(self) -> Predicate {
        Predicate::Exists(self)
    }

    /// Value matches a regex
    ///
    /// # Errors
    ///
    /// Returns the regex compile error.
    pub fn matches_regex(self, pattern: &str) -> Result<Predicate, regex::Error> {
        Ok(Predicate::Matches {
            expr: self,
            regex: Regex::new(pattern)?,
        })
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "constant({v})"),
            Self::Header(name) => write!(f, "header({name})"),
            Self::Property(name) => write!(f, "property({name})"),
            Self::Body => f.write_str("body"),
            Self::BodyPath(path) => write!(f, "body.{path}"),
            Self::ExchangeId => f.write_str("exchangeId"),
            Self::Template(parts) => f.debug_tuple("template").field(parts).finish(),
            Self::Custom(_) => f.write_str("custom"),
        }
    }
}

impl From<&str> for Expression {
    fn from(s: &str) -> Self {
        Self::Constant(Value::String(s.to_string()))
    }
}

impl From<String> for Expression {
    fn from(s: String) -> Self {
        Self::Constant(Value::String(s))
    }
}

impl From<i64> for Expression {
    fn from(n: i64) -> Self {
        Self::Constant(Value::from(n))
    }
}

impl From<i32> for Expression {
    fn from(n: i32) -> Self {
        Self::Constant(Value::from(n))
    }
}

impl From<u64> for Expression {
    fn from(n: u64) -> Self {
        Self::Constant(Value::from(n))
    }
}

impl From<f64> for Expression {
    fn from(n: f64) -> Self {
        Self::Constant(Value::from(n))
    }
}

impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Self::Constant(Value::Bool(b))
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Self::Constant(v)
    }
}

/// Message header expression
pub fn header(name: impl Into<String>) -> Expression {
    Expression::Header(name.into())
}

/// Exchange property expression
pub fn property(name: impl Into<String>) -> Expression {
    Expression::Property(name.into())
}

/// Body expression
pub fn body() -> Expression {
    Expression::Body
}

/// Constant expression
pub fn constant(value: impl Into<Value>) -> Expression {
    Expression::Constant(value.into())
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `contains`
    Contains,
}

impl CompareOp {
    /// Get as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Contains => "contains",
        }
    }
}

/// A condition evaluated against an exchange
#[derive(Clone)]
pub enum Predicate {
    /// Fixed result
    Constant(bool),
    /// Binary comparison
    Compare {
        /// Left operand
        left: Expression,
        /// Operator
        op: CompareOp,
        /// Right operand
        right: Expression,
    },
    /// Regex match on the string form of a value
    Matches {
        /// Value to test
        expr: Expression,
        /// Compiled pattern
        regex: Regex,
    },
    /// Value is not `null`
    Exists(Expression),
    /// Truthiness of a value (`true`, `"true"`, non-zero number)
    Truthy(Expression),
    /// Negation
    Not(Box<Predicate>),
    /// All must match (short-circuit)
    And(Vec<Predicate>),
    /// Any must match (short-circuit)
    Or(Vec<Predicate>),
    /// User closure
    Custom(ConditionFn),
}

impl Predicate {
    /// Evaluate against an exchange
    pub fn matches(&self, exchange: &Exchange) -> ProcessResult<bool> {
        match self {
            Self::Constant(b) => Ok(*b),
            Self::Compare { left, op, right } => {
                let l = left.evaluate(exchange)?;
                let r = right.evaluate(exchange)?;
                Ok(compare_values(&l, *op, &r))
            }
            Self::Matches { expr, regex } => {
                let value = expr.evaluate(exchange)?;
                Ok(!value.is_null() && regex.is_match(&value_to_string(&value)))
            }
            Self::Exists(expr) => Ok(!expr.evaluate(exchange)?.is_null()),
            Self::Truthy(expr) => Ok(is_truthy(&expr.evaluate(exchange)?)),
            Self::Not(inner) => Ok(!inner.matches(exchange)?),
            Self::And(all) => {
                for p in all {
                    if !p.matches(exchange)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(any) => {
                for p in any {
                    if p.matches(exchange)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Custom(f) => f(exchange),
        }
    }

    /// Create a predicate from a closure
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Exchange) -> ProcessResult<bool> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Both must match
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Either must match
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Negate
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(b) => write!(f, "{b}"),
            Self::Compare { left, op, right } => write!(f, "({left:?} {} {right:?})", op.as_str()),
            Self::Matches { expr, regex } => write!(f, "({expr:?} ~= {})", regex.as_str()),
            Self::Exists(expr) => write!(f, "exists({expr:?})"),
            Self::Truthy(expr) => write!(f, "{expr:?}"),
            Self::Not(inner) => write!(f, "!{inner:?}"),
            Self::And(all) => f.debug_tuple("and").field(all).finish(),
            Self::Or(any) => f.debug_tuple("or").field(any).finish(),
            Self::Custom(_) => f.write_str("custom"),
        }
    }
}

// ============================================================================
// Value helpers
// ============================================================================

/// Render a value as plain text: strings unquoted, `null` empty
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce a value to a number (JSON number or numeric string)
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { s.parse().ok() }
        }
        _ => None,
    }
}

/// Coerce a value to a non-negative integer
pub fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Compare two values with numeric coercion
pub fn compare_values(left: &Value, op: CompareOp, right: &Value) -> bool {
    if op == CompareOp::Contains {
        return contains(left, right);
    }

    let ordering = match (value_to_f64(left), value_to_f64(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => match (left, right) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) | (_, Value::Null) => None,
            _ => Some(value_to_string(left).cmp(&value_to_string(right))),
        },
    };

    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Contains => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Null => false,
        Value::Array(items) => items
            .iter()
            .any(|item| compare_values(item, CompareOp::Eq, needle)),
        Value::Object(map) => map.contains_key(&value_to_string(needle)),
        other => value_to_string(other).contains(&value_to_string(needle)),
    }
}

/// Get a field from JSON using dot notation
pub fn json_path<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = json;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
