//! The routing context
//!
//! One `Context` per application. It owns the registries, compiles route
//! definitions into routes and drives their lifecycle. There is no global
//! state: everything a route needs is reachable from its context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use switchyard_endpoint::{Component, ComponentRegistry, Endpoint, EndpointRegistry};
use switchyard_model::{
    EndpointResolver, ErrorHandlerDefinition, RouteBuilder, RouteContext, RouteDefinition,
};
use switchyard_processor::{ProcessorRegistry, default_registry};
use tracing::{debug, info, warn};

use crate::{
    EngineError, ProducerTemplate, Result, Route, RouteDispatcher, RouteMetrics,
    RouteMetricsSnapshot, RouteStatus,
};

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;

/// Default time a stopping route waits for in-flight exchanges
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Registries, routes and their lifecycle
///
/// Configuration methods (`add_component`, `add_routes`, ...) take
/// `&mut self`; lifecycle methods take `&self` so a started context can be
/// shared with producer templates.
pub struct Context {
    name: String,
    components: ComponentRegistry,
    endpoints: EndpointRegistry,
    processors: ProcessorRegistry,
    error_handler: ErrorHandlerDefinition,
    shutdown_timeout: Duration,
    routes: Vec<Route>,
    started: AtomicBool,
}

impl Context {
    /// Create a context with no components and the built-in processors
    pub fn new() -> Self {
        Self {
            name: "switchyard".to_string(),
            components: ComponentRegistry::new(),
            endpoints: EndpointRegistry::new(),
            processors: default_registry(),
            error_handler: ErrorHandlerDefinition::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            routes: Vec::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Use the given component registry
    pub fn with_components(mut self, components: ComponentRegistry) -> Self {
        self.components = components;
        self
    }

    /// Set the context name (for logging)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the error handler for routes that do not define one
    pub fn with_error_handler(mut self, error_handler: ErrorHandlerDefinition) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Set how long stopping routes wait for in-flight exchanges
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    // ========================================================================
    // Registries
    // ========================================================================

    /// Context name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a component
    ///
    /// # Panics
    ///
    /// Panics if the scheme is already registered.
    pub fn add_component(&mut self, scheme: &str, component: Arc<dyn Component>) {
        self.components.register(scheme, component);
    }

    /// The component registry
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// The processor (bean) registry
    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    /// Mutable processor registry, for registering beans before routes
    pub fn processors_mut(&mut self) -> &mut ProcessorRegistry {
        &mut self.processors
    }

    /// The default error handler
    pub fn error_handler(&self) -> &ErrorHandlerDefinition {
        &self.error_handler
    }

    /// Shutdown timeout per route
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Get or create an endpoint
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Endpoint` for malformed URIs, unknown schemes
    /// and rejected parameters.
    pub fn endpoint(&self, uri: &str) -> Result<Arc<dyn Endpoint>> {
        Ok(self.endpoints.resolve(&self.components, uri)?)
    }

    /// Normalized URIs of every endpoint created so far
    pub fn endpoint_uris(&self) -> Vec<String> {
        self.endpoints.uris()
    }

    /// A template for sending exchanges into this context
    pub fn producer_template(&self) -> ProducerTemplate<'_> {
        ProducerTemplate::new(self)
    }

    // ========================================================================
    // Routes
    // ========================================================================

    /// Build the builder's routes and add them
    ///
    /// Returns the ids of the added routes. Routes added after
    /// [`start`](Self::start) stay stopped until
    /// [`start_route`](Self::start_route).
    ///
    /// # Errors
    ///
    /// Fails on builder misuse, duplicate ids or a route that does not
    /// compile. Nothing is added on failure.
    pub fn add_routes(&mut self, builder: RouteBuilder) -> Result<Vec<String>> {
        let definitions = builder.build()?;
        self.add_route_definitions(definitions)
    }

    /// Compile definitions into routes and add them
    ///
    /// # Errors
    ///
    /// Same as [`add_routes`](Self::add_routes).
    pub fn add_route_definitions(&mut self, definitions: Vec<RouteDefinition>) -> Result<Vec<String>> {
        let mut ids: Vec<&str> = self.routes.iter().map(Route::id).collect();
        for definition in &definitions {
            if ids.contains(&definition.id.as_str()) {
                return Err(EngineError::DuplicateRoute(definition.id.clone()));
            }
            ids.push(&definition.id);
        }

        let built = definitions
            .into_iter()
            .map(|definition| self.build_route(definition))
            .collect::<Result<Vec<Route>>>()?;

        let added: Vec<String> = built.iter().map(|route| route.id().to_string()).collect();
        self.routes.extend(built);
        Ok(added)
    }

    fn build_route(&self, definition: RouteDefinition) -> Result<Route> {
        let metrics = Arc::new(RouteMetrics::new());
        let error_handler = definition
            .error_handler
            .clone()
            .unwrap_or_else(|| self.error_handler.clone());

        let ctx = RouteContext::new(definition.id.as_str(), self, &self.processors)
            .with_error_handler(error_handler.clone())
            .with_redelivery_counter(metrics.redelivery_counter());

        let pipeline = definition.create_pipeline(&ctx)?;
        let handler = error_handler
            .create_handler(&ctx)
            .map_err(|e| e.in_route(&definition.id))?;

        let dispatcher = Arc::new(
            RouteDispatcher::new(definition.id.as_str(), pipeline, handler, metrics)
                .with_remember_original(error_handler.needs_original_message()),
        );

        let consumer = self
            .endpoint(&definition.from)
            .and_then(|endpoint| {
                endpoint
                    .create_consumer(dispatcher.clone())
                    .map_err(EngineError::from)
            })
            .map_err(|e| match e {
                EngineError::Endpoint(source) => EngineError::Consumer {
                    route_id: definition.id.clone(),
                    source,
                },
                other => other,
            })?;

        debug!(
            route_id = %definition.id,
            from = %definition.from,
            error_handler = error_handler.kind(),
            "route built"
        );
        Ok(Route::new(definition, dispatcher, consumer))
    }

    /// Ids of all routes, in the order they were added
    pub fn route_ids(&self) -> Vec<&str> {
        self.routes.iter().map(Route::id).collect()
    }

    /// Look up a route
    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.id() == id)
    }

    /// All routes
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Status of a route
    pub fn route_status(&self, id: &str) -> Option<RouteStatus> {
        self.route(id).map(Route::status)
    }

    /// Metrics of a route
    pub fn metrics(&self, id: &str) -> Option<RouteMetricsSnapshot> {
        self.route(id).map(Route::metrics)
    }

    fn require(&self, id: &str) -> Result<&Route> {
        self.route(id)
            .ok_or_else(|| EngineError::unknown_route(id, self.route_ids()))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Whether `start` has been called without a matching `stop`
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Start every route marked for auto-startup, in order
    ///
    /// # Errors
    ///
    /// If a route fails to start, the routes started by this call are
    /// stopped again and the error is returned.
    pub async fn start(&self) -> Result<()> {
        info!(context = %self.name, routes = self.routes.len(), "starting context");

        let mut started: Vec<&Route> = Vec::new();
        for route in self.routes.iter().filter(|r| r.definition().auto_startup) {
            if let Err(e) = route.start().await {
                for route in started.iter().rev() {
                    if let Err(stop_err) = route.stop(self.shutdown_timeout).await {
                        warn!(route_id = %route.id(), error = %stop_err, "rollback stop failed");
                    }
                }
                return Err(e);
            }
            started.push(route);
        }

        self.started.store(true, Ordering::Release);
        info!(
            context = %self.name,
            started = started.len(),
            "context started"
        );
        Ok(())
    }

    /// Stop every route in reverse order
    ///
    /// Each route drains for up to the shutdown timeout. All routes are
    /// stopped even if one fails; the first error is returned.
    pub async fn stop(&self) -> Result<()> {
        info!(context = %self.name, "stopping context");

        let mut first_error = None;
        for route in self.routes.iter().rev() {
            if let Err(e) = route.stop(self.shutdown_timeout).await {
                warn!(route_id = %route.id(), error = %e, "route failed to stop");
                first_error.get_or_insert(e);
            }
        }

        self.started.store(false, Ordering::Release);
        info!(context = %self.name, "context stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Start one route
    pub async fn start_route(&self, id: &str) -> Result<()> {
        self.require(id)?.start().await
    }

    /// Stop one route, draining for up to the shutdown timeout
    pub async fn stop_route(&self, id: &str) -> Result<()> {
        self.require(id)?.stop(self.shutdown_timeout).await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointResolver for Context {
    fn resolve_endpoint(&self, uri: &str) -> switchyard_endpoint::Result<Arc<dyn Endpoint>> {
        self.endpoints.resolve(&self.components, uri)
    }
}
