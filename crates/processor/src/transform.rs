//! Message transformation leaves
//!
//! Header, property and body setters, header removal and body conversion.

use std::str::FromStr;

use serde_json::Value;
use switchyard_exchange::{Body, Exchange, ProcessFuture, Processor};

use crate::ProcessorError;
use crate::language::Expression;

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;

/// Sets a message header from an expression
#[derive(Debug, Clone)]
pub struct SetHeaderProcessor {
    name: String,
    value: Expression,
}

impl SetHeaderProcessor {
    /// Create a header setter
    pub fn new(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Processor for SetHeaderProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let value = self.value.evaluate(exchange)?;
            exchange.message_mut().set_header(self.name.clone(), value);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "set_header"
    }
}

/// Sets an exchange property from an expression
#[derive(Debug, Clone)]
pub struct SetPropertyProcessor {
    name: String,
    value: Expression,
}

impl SetPropertyProcessor {
    /// Create a property setter
    pub fn new(name: impl Into<String>, value: Expression) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Processor for SetPropertyProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let value = self.value.evaluate(exchange)?;
            exchange.set_property(self.name.clone(), value);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "set_property"
    }
}

/// Replaces the message body with the value of an expression
///
/// Strings become text bodies, `null` an empty body and any other value a
/// JSON body.
#[derive(Debug, Clone)]
pub struct SetBodyProcessor {
    value: Expression,
}

impl SetBodyProcessor {
    /// Create a body setter
    pub fn new(value: Expression) -> Self {
        Self { value }
    }
}

impl Processor for SetBodyProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let body = value_to_body(self.value.evaluate(exchange)?);
            exchange.message_mut().set_body(body);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "set_body"
    }
}

/// Convert an evaluated value into a body
pub fn value_to_body(value: Value) -> Body {
    match value {
        Value::String(s) => Body::Text(s),
        other => Body::from(other),
    }
}

/// Removes headers by exact name, or by prefix when the name ends in `*`
#[derive(Debug, Clone)]
pub struct RemoveHeaderProcessor {
    pattern: String,
}

impl RemoveHeaderProcessor {
    /// Create a header remover
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl Processor for RemoveHeaderProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let headers = exchange.message_mut().headers_mut();
            match self.pattern.strip_suffix('*') {
                Some(prefix) => headers.retain(|name, _| !name.starts_with(prefix)),
                None => {
                    headers.remove(&self.pattern);
                }
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "remove_header"
    }
}

/// Target representation for body conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// UTF-8 text
    Text,
    /// Raw bytes
    Bytes,
    /// Parsed JSON
    Json,
}

impl FromStr for BodyType {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => Ok(Self::Text),
            "bytes" | "binary" => Ok(Self::Bytes),
            "json" => Ok(Self::Json),
            other => Err(ProcessorError::config(format!(
                "unknown body type '{other}', expected text, bytes or json"
            ))),
        }
    }
}

/// Converts the body to another representation
#[derive(Debug, Clone, Copy)]
pub struct ConvertBodyProcessor {
    target: BodyType,
}

impl ConvertBodyProcessor {
    /// Create a converter
    pub fn new(target: BodyType) -> Self {
        Self { target }
    }
}

impl Processor for ConvertBodyProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let body = exchange.message().body();
            let converted = match self.target {
                BodyType::Text => Body::Text(body.to_text()?.into_owned()),
                BodyType::Bytes => Body::Bytes(body.to_bytes()),
                BodyType::Json => Body::from(body.to_json()?),
            };
            exchange.message_mut().set_body(converted);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "convert_body"
    }
}
