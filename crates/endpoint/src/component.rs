//! Component, endpoint, producer and consumer contracts

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use switchyard_exchange::Processor;

use crate::{EndpointError, EndpointParameters, EndpointUri, Result};

/// Factory of endpoints for one URI scheme
///
/// Implementations read the parameters they understand from `parameters`;
/// the registry rejects the endpoint if any are left over.
pub trait Component: Send + Sync {
    /// Create an endpoint for a parsed URI
    ///
    /// # Errors
    ///
    /// Returns an `EndpointError` if the path or a parameter is invalid.
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>>;

    /// Human-readable component name (for logging)
    fn name(&self) -> &'static str;
}

/// A resolved, configured endpoint
///
/// Endpoints are shared: one instance per normalized URI, used by every
/// route that sends to or consumes from it.
pub trait Endpoint: Send + Sync {
    /// Normalized URI of this endpoint
    fn uri(&self) -> &str;

    /// Expose the concrete endpoint for downcasting (e.g. to inspect a mock)
    fn as_any(&self) -> &dyn Any;

    /// Create a producer that sends exchanges to this endpoint
    fn create_producer(&self) -> Result<Box<dyn Producer>> {
        Err(EndpointError::producer_not_supported(self.uri()))
    }

    /// Create a consumer that feeds received exchanges into `processor`
    fn create_consumer(&self, processor: Arc<dyn Processor>) -> Result<Box<dyn Consumer>> {
        let _ = processor;
        Err(EndpointError::consumer_not_supported(self.uri()))
    }
}

/// Send side of an endpoint
///
/// A producer is an ordinary processor: sending is processing the exchange.
pub trait Producer: Processor {
    /// URI of the endpoint this producer sends to
    fn endpoint_uri(&self) -> &str;
}

/// Receive side of an endpoint
///
/// Start and stop take `&self`; consumers own whatever locking they need
/// so the engine can share them across route lifecycle calls.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Begin delivering exchanges to the route
    async fn start(&self) -> Result<()>;

    /// Stop accepting new exchanges
    ///
    /// Exchanges already handed to the route keep running; draining them is
    /// the engine's job.
    async fn stop(&self) -> Result<()>;

    /// URI of the consumed endpoint
    fn endpoint_uri(&self) -> &str;
}
