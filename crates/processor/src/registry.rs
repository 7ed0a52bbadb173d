//! Processor Registry - Named processors and beans
//!
//! The registry maps processor names to factory implementations, so routes
//! defined in configuration can reference processors by name (`process`
//! steps with a `ref`).
//!
//! # Design
//!
//! - **Extensible**: users implement [`ProcessorFactory`] or register a
//!   shared processor instance as a bean
//! - **Config-driven**: factories read their options from a key-value map
//! - **Fail fast**: unknown names are build errors listing what is available
//!
//! # Example
//!
//! ```
//! use switchyard_processor::{ProcessorOptions, default_registry};
//!
//! let registry = default_registry();
//! let noop = registry.create("noop", &ProcessorOptions::new()).unwrap();
//! assert_eq!(noop.name(), "noop");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use switchyard_exchange::Processor;

use crate::control::{NoopProcessor, ThrowExceptionProcessor};
use crate::transform::{BodyType, ConvertBodyProcessor};
use crate::{ProcessorError, Result};

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Options passed to processor factories
pub type ProcessorOptions = HashMap<String, Value>;

/// Factory creating processors from options
pub trait ProcessorFactory: Send + Sync {
    /// Create a processor instance
    ///
    /// # Errors
    ///
    /// Returns `ProcessorError::Config` if the options are invalid.
    fn create(&self, options: &ProcessorOptions) -> Result<Box<dyn Processor>>;

    /// Human-readable factory name
    fn name(&self) -> &'static str;
}

/// Registry of processor factories, keyed by name
pub struct ProcessorRegistry {
    factories: HashMap<String, Box<dyn ProcessorFactory>>,
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered. Use `try_register` for
    /// fallible registration.
    pub fn register<F: ProcessorFactory + 'static>(&mut self, name: &str, factory: F) {
        if !self.try_register(name, factory) {
            panic!("processor '{}' already registered", name);
        }
    }

    /// Try to register a factory
    ///
    /// Returns `false` if the name is already registered.
    pub fn try_register<F: ProcessorFactory + 'static>(&mut self, name: &str, factory: F) -> bool {
        if self.factories.contains_key(name) {
            return false;
        }
        self.factories.insert(name.to_string(), Box::new(factory));
        true
    }

    /// Register a shared processor instance under a name
    ///
    /// Every route referencing the bean uses the same instance.
    ///
    /// # Panics
    ///
    /// Panics if the name is already registered.
    pub fn register_bean(&mut self, name: &str, processor: Arc<dyn Processor>) {
        self.register(name, BeanFactory(processor));
    }

    /// Create a processor by name
    ///
    /// # Errors
    ///
    /// - `ProcessorError::UnknownProcessor` if the name is not registered
    /// - `ProcessorError::Config` if the factory rejects the options
    pub fn create(&self, name: &str, options: &ProcessorOptions) -> Result<Box<dyn Processor>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ProcessorError::UnknownProcessor {
                name: name.to_string(),
                available: self.available().join(", "),
            })?;
        factory.create(options)
    }

    /// Check if a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct BeanFactory(Arc<dyn Processor>);

impl ProcessorFactory for BeanFactory {
    fn create(&self, _options: &ProcessorOptions) -> Result<Box<dyn Processor>> {
        Ok(Box::new(Arc::clone(&self.0)))
    }

    fn name(&self) -> &'static str {
        "bean"
    }
}

/// Factory for [`NoopProcessor`]
pub struct NoopFactory;

impl ProcessorFactory for NoopFactory {
    fn create(&self, _options: &ProcessorOptions) -> Result<Box<dyn Processor>> {
        Ok(Box::new(NoopProcessor::new()))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Factory for [`ThrowExceptionProcessor`]
///
/// Option `message` (string, default `"thrown"`).
pub struct ThrowExceptionFactory;

impl ProcessorFactory for ThrowExceptionFactory {
    fn create(&self, options: &ProcessorOptions) -> Result<Box<dyn Processor>> {
        let message = match options.get("message") {
            None => "thrown",
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(ProcessorError::config(format!(
                    "throw_exception: 'message' must be a string, got {other}"
                )));
            }
        };
        Ok(Box::new(ThrowExceptionProcessor::message(message)))
    }

    fn name(&self) -> &'static str {
        "throw_exception"
    }
}

/// Factory for [`ConvertBodyProcessor`]
///
/// Option `to` (required): `text`, `bytes` or `json`.
pub struct ConvertBodyFactory;

impl ProcessorFactory for ConvertBodyFactory {
    fn create(&self, options: &ProcessorOptions) -> Result<Box<dyn Processor>> {
        let target = options
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| ProcessorError::config("convert_body: missing string option 'to'"))?;
        Ok(Box::new(ConvertBodyProcessor::new(target.parse::<BodyType>()?)))
    }

    fn name(&self) -> &'static str {
        "convert_body"
    }
}

/// Create a registry with all built-in processors registered
///
/// Includes `noop`, `throw_exception` and `convert_body`.
pub fn default_registry() -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register("noop", NoopFactory);
    registry.register("throw_exception", ThrowExceptionFactory);
    registry.register("convert_body", ConvertBodyFactory);
    registry
}
