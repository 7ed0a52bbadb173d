//! Component and endpoint registries
//!
//! The component registry maps URI schemes to factories. The endpoint
//! registry caches created endpoints by normalized URI so that every route
//! referring to `seda:orders` shares one queue.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{Component, Endpoint, EndpointError, EndpointUri, Result};

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;

/// Registry of components keyed by scheme
#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component for a scheme
    ///
    /// # Panics
    ///
    /// Panics if a component is already registered for this scheme.
    /// Use `try_register` for fallible registration.
    pub fn register(&mut self, scheme: &str, component: Arc<dyn Component>) {
        if !self.try_register(scheme, component) {
            panic!("component for scheme '{}' already registered", scheme);
        }
    }

    /// Try to register a component
    ///
    /// Returns `false` if the scheme is taken.
    pub fn try_register(&mut self, scheme: &str, component: Arc<dyn Component>) -> bool {
        let scheme = scheme.to_ascii_lowercase();
        if self.components.contains_key(&scheme) {
            return false;
        }
        self.components.insert(scheme, component);
        true
    }

    /// Look up the component for a scheme
    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn Component>> {
        self.components.get(scheme)
    }

    /// Check if a scheme is registered
    pub fn contains(&self, scheme: &str) -> bool {
        self.components.contains_key(scheme)
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.components.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Create an endpoint without caching it
    ///
    /// # Errors
    ///
    /// Fails on an unknown scheme, a component error or unconsumed
    /// parameters.
    pub fn create_endpoint(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>> {
        let component = self
            .get(uri.scheme())
            .ok_or_else(|| EndpointError::UnknownScheme {
                scheme: uri.scheme().to_string(),
                available: self.schemes().join(", "),
            })?;

        let mut parameters = uri.parameters();
        let endpoint = component.create_endpoint(uri, &mut parameters)?;
        parameters.ensure_consumed()?;

        debug!(
            endpoint = %uri,
            component = component.name(),
            "endpoint created"
        );
        Ok(endpoint)
    }
}

/// Cache of endpoints keyed by normalized URI
///
/// Owned by one context. Lookups and creation are serialized by an internal
/// lock, so concurrent resolution of the same URI yields one endpoint.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: Mutex<HashMap<String, Arc<dyn Endpoint>>>,
}

impl EndpointRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the endpoint for `uri`, creating it on first use
    ///
    /// # Errors
    ///
    /// Returns an `EndpointError` if the URI is malformed or the component
    /// rejects it. Nothing is cached on failure.
    pub fn resolve(&self, components: &ComponentRegistry, uri: &str) -> Result<Arc<dyn Endpoint>> {
        let parsed = EndpointUri::parse(uri)?;
        let key = parsed.normalized();

        let mut endpoints = self.endpoints.lock();
        if let Some(endpoint) = endpoints.get(&key) {
            return Ok(Arc::clone(endpoint));
        }

        let endpoint = components.create_endpoint(&parsed)?;
        endpoints.insert(key, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Get a cached endpoint without creating it
    pub fn get(&self, uri: &str) -> Option<Arc<dyn Endpoint>> {
        let key = EndpointUri::parse(uri).ok()?.normalized();
        self.endpoints.lock().get(&key).cloned()
    }

    /// Normalized URIs of all cached endpoints, sorted
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.endpoints.lock().keys().cloned().collect();
        uris.sort_unstable();
        uris
    }

    /// Number of cached endpoints
    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    /// Check if no endpoint has been created yet
    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }
}
