//! Producer template - send exchanges into a context from application code

use std::collections::HashMap;

use switchyard_exchange::{Body, Exchange, ExchangePattern, ExchangeState, Message, Value};
use switchyard_processor::invoke;
use tracing::trace;

use crate::{Context, EngineError, Result};

/// Sends exchanges to endpoints of a [`Context`]
///
/// ```no_run
/// # async fn demo(ctx: &switchyard_engine::Context) -> switchyard_engine::Result<()> {
/// let template = ctx.producer_template();
/// template.send_body("direct:orders", "order-1").await?;
/// let reply = template.request_body("direct:quote", "AAPL").await?;
/// # let _ = reply;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy)]
pub struct ProducerTemplate<'a> {
    context: &'a Context,
}

impl<'a> ProducerTemplate<'a> {
    pub(crate) fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Send an exchange and return it after processing
    ///
    /// A failure recorded on the exchange is left on the returned exchange;
    /// only endpoint resolution errors are returned as `Err`. An exchange no
    /// route claimed is completed here.
    pub async fn send(&self, uri: &str, mut exchange: Exchange) -> Result<Exchange> {
        let endpoint = self.context.endpoint(uri)?;
        let producer = endpoint.create_producer()?;
        trace!(uri = %endpoint.uri(), exchange_id = %exchange.id(), "template send");

        invoke(producer.as_ref(), &mut exchange).await;

        if exchange.state() == ExchangeState::Created {
            exchange.set_state(ExchangeState::Completing);
            exchange.complete();
            exchange.set_state(ExchangeState::Done);
        }
        Ok(exchange)
    }

    /// Send an InOnly message with the given body
    ///
    /// # Errors
    ///
    /// A failed exchange is returned as `EngineError::Exchange`.
    pub async fn send_body(&self, uri: &str, body: impl Into<Body>) -> Result<()> {
        self.send_body_and_headers(uri, body, HashMap::new()).await
    }

    /// Send an InOnly message with a body and headers
    pub async fn send_body_and_headers(
        &self,
        uri: &str,
        body: impl Into<Body>,
        headers: HashMap<String, Value>,
    ) -> Result<()> {
        let exchange = exchange(ExchangePattern::InOnly, body, headers);
        let exchange = self.send(uri, exchange).await?;
        into_result(exchange).map(|_| ())
    }

    /// Send an InOut message and return the reply body
    pub async fn request_body(&self, uri: &str, body: impl Into<Body>) -> Result<Body> {
        self.request_body_and_headers(uri, body, HashMap::new()).await
    }

    /// Send an InOut message with headers and return the reply body
    pub async fn request_body_and_headers(
        &self,
        uri: &str,
        body: impl Into<Body>,
        headers: HashMap<String, Value>,
    ) -> Result<Body> {
        let exchange = exchange(ExchangePattern::InOut, body, headers);
        let exchange = self.send(uri, exchange).await?;
        let mut exchange = into_result(exchange)?;
        Ok(exchange.message_mut().take_body())
    }
}

fn exchange(pattern: ExchangePattern, body: impl Into<Body>, headers: HashMap<String, Value>) -> Exchange {
    let mut message = Message::with_body(body);
    *message.headers_mut() = headers;
    Exchange::with_message(pattern, message)
}

fn into_result(mut exchange: Exchange) -> Result<Exchange> {
    match exchange.take_exception() {
        Some(source) => Err(EngineError::Exchange {
            exchange_id: exchange.id().to_string(),
            source,
        }),
        None => Ok(exchange),
    }
}
