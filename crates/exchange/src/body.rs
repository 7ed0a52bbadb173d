//! Message body
//!
//! A typed body with explicit conversions. Conversions are methods on the
//! body itself rather than a global converter registry.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{ExchangeError, ProcessResult};

#[cfg(test)]
#[path = "body_test.rs"]
mod tests;

/// Message payload
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No payload
    #[default]
    Empty,
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Structured JSON value
    Json(Value),
}

impl Body {
    /// Short name of the representation, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }

    /// Check if the body carries no payload
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Borrow the body as a string slice, if it is text
    ///
    /// JSON strings are returned as well; other representations need
    /// [`Body::to_text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Convert the body to text
    ///
    /// Bytes must be valid UTF-8. JSON values other than strings are
    /// serialized.
    pub fn to_text(&self) -> ProcessResult<Cow<'_, str>> {
        match self {
            Self::Empty => Ok(Cow::Borrowed("")),
            Self::Text(s) => Ok(Cow::Borrowed(s)),
            Self::Bytes(b) => std::str::from_utf8(b)
                .map(Cow::Borrowed)
                .map_err(|_| ExchangeError::TypeConversion {
                    from: "bytes",
                    to: "text",
                }),
            Self::Json(Value::String(s)) => Ok(Cow::Borrowed(s)),
            Self::Json(v) => Ok(Cow::Owned(v.to_string())),
        }
    }

    /// Convert the body to bytes
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Self::Bytes(b) => b.clone(),
            Self::Json(v) => Bytes::from(v.to_string()),
        }
    }

    /// Convert the body to a JSON value, parsing text and bytes
    pub fn to_json(&self) -> ProcessResult<Value> {
        match self {
            Self::Empty => Ok(Value::Null),
            Self::Json(v) => Ok(v.clone()),
            Self::Text(s) => serde_json::from_str(s).map_err(|_| ExchangeError::TypeConversion {
                from: "text",
                to: "json",
            }),
            Self::Bytes(b) => {
                serde_json::from_slice(b).map_err(|_| ExchangeError::TypeConversion {
                    from: "bytes",
                    to: "json",
                })
            }
        }
    }

    /// Lossless view of the body as a value for expression evaluation
    ///
    /// Unlike [`Body::to_json`] this never parses: text stays a string.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            Self::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Self::Json(Value::String(s)) => f.write_str(s),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Empty,
            other => Self::Json(other),
        }
    }
}

impl From<i64> for Body {
    fn from(n: i64) -> Self {
        Self::Json(Value::from(n))
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}
