//! Control-flow leaves: stop, throw, noop

use switchyard_exchange::{Exchange, ExchangeError, ProcessFuture, Processor};

/// Marks the route stopped; the rest of the route is skipped without failure
#[derive(Debug, Clone, Copy, Default)]
pub struct StopProcessor;

impl Processor for StopProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            exchange.stop_route();
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

/// Sets a fixed exception on every exchange
#[derive(Debug, Clone)]
pub struct ThrowExceptionProcessor {
    error: ExchangeError,
}

impl ThrowExceptionProcessor {
    /// Throw the given error
    pub fn new(error: ExchangeError) -> Self {
        Self { error }
    }

    /// Throw a generic failure with a message
    pub fn message(msg: impl Into<String>) -> Self {
        Self::new(ExchangeError::failed(msg))
    }
}

impl Processor for ThrowExceptionProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            exchange.set_exception(self.error.clone());
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "throw_exception"
    }
}

/// Pass-through processor
///
/// Leaves the exchange unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProcessor;

impl NoopProcessor {
    /// Create a new noop processor
    pub const fn new() -> Self {
        Self
    }
}

impl Processor for NoopProcessor {
    fn process<'a>(&'a self, _exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_marks_route() {
        let mut exchange = Exchange::default();
        StopProcessor.process(&mut exchange).await.unwrap();
        assert!(exchange.is_route_stopped());
        assert!(!exchange.is_failed());
    }

    #[tokio::test]
    async fn test_throw_sets_exception() {
        let mut exchange = Exchange::default();
        ThrowExceptionProcessor::message("forced")
            .process(&mut exchange)
            .await
            .unwrap();
        assert_eq!(exchange.exception(), Some(&ExchangeError::failed("forced")));
    }

    #[tokio::test]
    async fn test_noop_leaves_exchange() {
        let mut exchange = Exchange::with_body("same");
        NoopProcessor::new().process(&mut exchange).await.unwrap();
        assert_eq!(exchange.message().body().as_str(), Some("same"));
        assert_eq!(NoopProcessor.name(), "noop");
    }
}
