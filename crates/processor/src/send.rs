//! SendTo - Hand the exchange to an endpoint's producer

use switchyard_endpoint::Producer;
use switchyard_exchange::properties::TO_ENDPOINT;
use switchyard_exchange::{Exchange, ProcessFuture, Processor};
use tracing::trace;

/// Sends the exchange to an endpoint
///
/// Records the endpoint URI in the `ToEndpoint` property before sending.
pub struct SendToProcessor {
    uri: String,
    producer: Box<dyn Producer>,
}

impl SendToProcessor {
    /// Create a sender for a resolved producer
    pub fn new(producer: Box<dyn Producer>) -> Self {
        Self {
            uri: producer.endpoint_uri().to_string(),
            producer,
        }
    }

    /// Target endpoint URI
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Processor for SendToProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            exchange.set_property(TO_ENDPOINT, self.uri.as_str());
            trace!(exchange_id = %exchange.id(), endpoint = %self.uri, "sending");
            self.producer.process(exchange).await
        })
    }

    fn name(&self) -> &'static str {
        "to"
    }
}
