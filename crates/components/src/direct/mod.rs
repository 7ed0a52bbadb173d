//! Direct component - synchronous in-process hand-off between routes
//!
//! `direct:name` calls straight into the consuming route on the caller's
//! task. There is no queue: the sender waits for the whole downstream route
//! and sees its result on the same exchange.
//!
//! A name has at most one consumer. Sending to a name nobody consumes fails
//! the exchange with `ExchangeError::NoConsumer`.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use switchyard_endpoint::{
    Component, Consumer, Endpoint, EndpointError, EndpointParameters, EndpointUri, Producer, Result,
};
use switchyard_exchange::{Exchange, ExchangeError, ProcessFuture, Processor};
use tracing::debug;

#[cfg(test)]
#[path = "direct_test.rs"]
mod tests;

/// Factory for `direct:` endpoints
#[derive(Debug, Default)]
pub struct DirectComponent;

impl DirectComponent {
    /// Create the component
    pub fn new() -> Self {
        Self
    }
}

impl Component for DirectComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        _parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>> {
        Ok(Arc::new(DirectEndpoint::new(uri.normalized(), uri.path())))
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Consumer slot shared by an endpoint, its producers and its consumer
#[derive(Default)]
struct Slot {
    claimed: bool,
    processor: Option<Arc<dyn Processor>>,
}

/// A `direct:` endpoint
pub struct DirectEndpoint {
    uri: String,
    name: String,
    slot: Arc<Mutex<Slot>>,
}

impl DirectEndpoint {
    fn new(uri: String, name: &str) -> Self {
        Self {
            uri,
            name: name.to_string(),
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Endpoint name (the URI path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a started consumer is attached
    pub fn has_consumer(&self) -> bool {
        self.slot.lock().processor.is_some()
    }
}

impl Endpoint for DirectEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_producer(&self) -> Result<Box<dyn Producer>> {
        Ok(Box::new(DirectProducer {
            uri: self.uri.clone(),
            slot: Arc::clone(&self.slot),
        }))
    }

    fn create_consumer(&self, processor: Arc<dyn Processor>) -> Result<Box<dyn Consumer>> {
        let mut slot = self.slot.lock();
        if slot.claimed {
            return Err(EndpointError::consumer_exists(&self.uri));
        }
        slot.claimed = true;
        Ok(Box::new(DirectConsumer {
            uri: self.uri.clone(),
            slot: Arc::clone(&self.slot),
            processor,
        }))
    }
}

/// Calls the consuming route in place
struct DirectProducer {
    uri: String,
    slot: Arc<Mutex<Slot>>,
}

impl Processor for DirectProducer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            // Clone out of the lock: the route may send here again.
            let processor = self.slot.lock().processor.clone();
            match processor {
                Some(processor) => processor.process(exchange).await,
                None => Err(ExchangeError::no_consumer(&self.uri)),
            }
        })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

impl Producer for DirectProducer {
    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

/// Attaches a route to the slot while started
struct DirectConsumer {
    uri: String,
    slot: Arc<Mutex<Slot>>,
    processor: Arc<dyn Processor>,
}

#[async_trait]
impl Consumer for DirectConsumer {
    async fn start(&self) -> Result<()> {
        self.slot.lock().processor = Some(Arc::clone(&self.processor));
        debug!(endpoint = %self.uri, "direct consumer started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.slot.lock().processor = None;
        debug!(endpoint = %self.uri, "direct consumer stopped");
        Ok(())
    }

    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

impl Drop for DirectConsumer {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        slot.claimed = false;
        slot.processor = None;
    }
}
