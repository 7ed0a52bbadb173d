//! Error handling
//!
//! Two layers cooperate on a failed exchange:
//!
//! - [`RedeliveryChannel`] wraps each leaf step and retries it in place
//!   according to a [`RedeliveryPolicy`]
//! - the route-level handler ([`DefaultErrorHandler`], [`DeadLetterChannel`]
//!   or [`NoErrorHandler`]) runs once, after the route's pipeline stopped on
//!   the failure
//!
//! Route-level handlers are ordinary [`Processor`]s that only act on failed
//! exchanges.

mod dead_letter;
mod redelivery;

pub use dead_letter::DeadLetterChannel;
pub use redelivery::{RedeliveryChannel, RedeliveryPolicy};

use switchyard_exchange::{Exchange, ProcessFuture, Processor};
use tracing::{debug, error};

/// Leaves the failure on the exchange for the consumer to see
#[derive(Debug, Clone, Copy, Default)]
pub struct NoErrorHandler;

impl Processor for NoErrorHandler {
    fn process<'a>(&'a self, _exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move { Ok(()) })
    }

    fn name(&self) -> &'static str {
        "no_error_handler"
    }
}

/// Logs the failure and propagates it
#[derive(Debug, Clone, Default)]
pub struct DefaultErrorHandler {
    log_exhausted: bool,
}

impl DefaultErrorHandler {
    /// Create a handler that logs every failure
    pub fn new() -> Self {
        Self {
            log_exhausted: true,
        }
    }

    /// Only log at debug level
    pub fn quiet(mut self) -> Self {
        self.log_exhausted = false;
        self
    }
}

impl Processor for DefaultErrorHandler {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let Some(cause) = exchange.exception() else {
                return Ok(());
            };
            if self.log_exhausted {
                error!(
                    exchange_id = %exchange.id(),
                    route_id = exchange.from_route_id().unwrap_or_default(),
                    error = %cause,
                    "failed delivery"
                );
            } else {
                debug!(exchange_id = %exchange.id(), error = %cause, "failed delivery");
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "default_error_handler"
    }
}
