//! Per-route build context

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use switchyard_endpoint::{ComponentRegistry, Endpoint, EndpointRegistry, Producer};
use switchyard_exchange::Processor;
use switchyard_processor::ProcessorRegistry;
use switchyard_processor::error_handler::RedeliveryChannel;

use crate::{BuildError, BuildResult, ErrorHandlerDefinition};

/// Resolves endpoint URIs while routes are built
pub trait EndpointResolver: Send + Sync {
    /// Get or create the endpoint for a URI
    fn resolve_endpoint(&self, uri: &str) -> switchyard_endpoint::Result<Arc<dyn Endpoint>>;
}

/// Resolver backed by a component registry and an endpoint cache
pub struct RegistryResolver<'a> {
    components: &'a ComponentRegistry,
    endpoints: &'a EndpointRegistry,
}

impl<'a> RegistryResolver<'a> {
    /// Create a resolver over the given registries
    pub fn new(components: &'a ComponentRegistry, endpoints: &'a EndpointRegistry) -> Self {
        Self {
            components,
            endpoints,
        }
    }
}

impl EndpointResolver for RegistryResolver<'_> {
    fn resolve_endpoint(&self, uri: &str) -> switchyard_endpoint::Result<Arc<dyn Endpoint>> {
        self.endpoints.resolve(self.components, uri)
    }
}

/// Everything a definition needs to compile into processors
///
/// Holds the endpoint resolver, the processor registry and the route's
/// error handler. Leaf processors are wrapped with the handler's redelivery
/// policy through [`wrap_leaf`](Self::wrap_leaf).
pub struct RouteContext<'a> {
    route_id: String,
    resolver: &'a dyn EndpointResolver,
    processors: &'a ProcessorRegistry,
    error_handler: ErrorHandlerDefinition,
    redeliveries: Arc<AtomicU64>,
}

impl<'a> RouteContext<'a> {
    /// Create a context with the default error handler
    pub fn new(
        route_id: impl Into<String>,
        resolver: &'a dyn EndpointResolver,
        processors: &'a ProcessorRegistry,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            resolver,
            processors,
            error_handler: ErrorHandlerDefinition::default(),
            redeliveries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use a specific error handler
    pub fn with_error_handler(mut self, error_handler: ErrorHandlerDefinition) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Count redeliveries into a shared counter
    pub fn with_redelivery_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.redeliveries = counter;
        self
    }

    /// Id of the route being built
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// The route's error handler
    pub fn error_handler(&self) -> &ErrorHandlerDefinition {
        &self.error_handler
    }

    /// The processor registry
    pub fn processors(&self) -> &ProcessorRegistry {
        self.processors
    }

    /// Resolve an endpoint
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Endpoint` for malformed URIs, unknown schemes and
    /// rejected parameters.
    pub fn endpoint(&self, uri: &str) -> BuildResult<Arc<dyn Endpoint>> {
        self.resolver
            .resolve_endpoint(uri)
            .map_err(|source| BuildError::endpoint(uri, source))
    }

    /// Resolve an endpoint and create a producer for it
    pub fn producer(&self, uri: &str) -> BuildResult<Box<dyn Producer>> {
        self.endpoint(uri)?
            .create_producer()
            .map_err(|source| BuildError::endpoint(uri, source))
    }

    /// Apply the error handler's redelivery policy to a leaf processor
    pub fn wrap_leaf(&self, processor: Box<dyn Processor>) -> Box<dyn Processor> {
        match self.error_handler.redelivery_policy() {
            Some(policy) => Box::new(
                RedeliveryChannel::new(policy.clone(), processor)
                    .with_counter(Arc::clone(&self.redeliveries)),
            ),
            None => processor,
        }
    }
}
