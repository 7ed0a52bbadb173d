//! Message: body plus string-keyed headers

use std::collections::HashMap;

use serde_json::Value;

use crate::Body;

/// A message owned by exactly one exchange
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    body: Body,
    headers: HashMap<String, Value>,
}

impl Message {
    /// Create an empty message
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message with the given body
    pub fn with_body(body: impl Into<Body>) -> Self {
        Self {
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Get the body
    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replace the body
    #[inline]
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Take the body, leaving it empty
    #[inline]
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Get a header value
    #[inline]
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// Set a header, returning the previous value
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.headers.insert(name.into(), value.into())
    }

    /// Remove a header
    #[inline]
    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers.remove(name)
    }

    /// Check if a header is present
    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// All headers
    #[inline]
    pub fn headers(&self) -> &HashMap<String, Value> {
        &self.headers
    }

    /// Mutable access to all headers
    #[inline]
    pub fn headers_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.headers
    }
}
