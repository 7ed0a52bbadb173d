//! Consumable endpoint parameters
//!
//! Components take the parameters they understand; whatever is left over
//! when [`EndpointParameters::ensure_consumed`] runs is a configuration
//! error.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::{EndpointError, Result};

/// Query parameters of one endpoint URI, removed as they are read
#[derive(Debug, Clone)]
pub struct EndpointParameters {
    uri: String,
    params: BTreeMap<String, String>,
}

impl EndpointParameters {
    /// Create a parameter set for the given URI
    pub fn new(uri: impl Into<String>, params: BTreeMap<String, String>) -> Self {
        Self {
            uri: uri.into(),
            params,
        }
    }

    /// URI the parameters belong to
    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Take a string parameter
    pub fn take_str(&mut self, name: &str) -> Option<String> {
        self.params.remove(name)
    }

    /// Take an unsigned integer parameter
    pub fn take_u64(&mut self, name: &str) -> Result<Option<u64>> {
        self.take_parsed(name, "unsigned integer", |v| v.parse().ok())
    }

    /// Take a usize parameter
    pub fn take_usize(&mut self, name: &str) -> Result<Option<usize>> {
        self.take_parsed(name, "unsigned integer", |v| v.parse().ok())
    }

    /// Take a boolean parameter
    ///
    /// A bare flag (`?showBody`) counts as `true`.
    pub fn take_bool(&mut self, name: &str) -> Result<Option<bool>> {
        self.take_parsed(name, "boolean", |v| match v.to_ascii_lowercase().as_str() {
            "" | "true" => Some(true),
            "false" => Some(false),
            _ => None,
        })
    }

    /// Take a duration given in milliseconds
    pub fn take_duration_ms(&mut self, name: &str) -> Result<Option<Duration>> {
        self.take_parsed(name, "milliseconds", |v| v.parse().ok().map(Duration::from_millis))
    }

    /// Fail if any parameter was not taken
    pub fn ensure_consumed(&self) -> Result<()> {
        if self.params.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = self.params.keys().map(String::as_str).collect();
        Err(EndpointError::UnknownParameters {
            uri: self.uri.clone(),
            names: names.join(", "),
        })
    }

    /// Number of parameters not yet taken
    #[inline]
    pub fn remaining(&self) -> usize {
        self.params.len()
    }

    fn take_parsed<T>(
        &mut self,
        name: &str,
        expected: &'static str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<Option<T>> {
        let Some(value) = self.params.remove(name) else {
            return Ok(None);
        };
        match parse(value.trim()) {
            Some(parsed) => Ok(Some(parsed)),
            None => Err(EndpointError::InvalidParameter {
                uri: self.uri.clone(),
                name: name.to_string(),
                value,
                expected,
            }),
        }
    }
}
