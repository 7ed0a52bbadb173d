//! Route dispatcher - the per-exchange unit of work
//!
//! The dispatcher is the processor a route hands to its consumer. For each
//! exchange it drives `Created -> Routing -> Completing -> Done`:
//!
//! ```text
//! consumer ──→ claim unit of work ──→ pipeline ──┬──→ complete() ──→ Done
//!                                                 │
//!                                      failed? ──→ error handler (once)
//! ```
//!
//! An exchange that arrives already `Routing` belongs to another route's
//! unit of work (a `direct:` call). It is routed and error-handled here,
//! but its callbacks fire when the owning route completes it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use switchyard_exchange::{Exchange, ExchangeError, ExchangeState, ProcessFuture, Processor};
use switchyard_processor::{Pipeline, invoke};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::RouteMetrics;

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod tests;

/// Runs a compiled route for every exchange its consumer delivers
pub struct RouteDispatcher {
    route_id: String,
    pipeline: Pipeline,
    error_handler: Box<dyn Processor>,
    remember_original: bool,
    metrics: Arc<RouteMetrics>,
    drained: Notify,
    cancel: Mutex<CancellationToken>,
}

impl RouteDispatcher {
    /// Create a dispatcher for a compiled route
    pub fn new(
        route_id: impl Into<String>,
        pipeline: Pipeline,
        error_handler: Box<dyn Processor>,
        metrics: Arc<RouteMetrics>,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            pipeline,
            error_handler,
            remember_original: false,
            metrics,
            drained: Notify::new(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Snapshot the incoming message before routing
    pub fn with_remember_original(mut self, remember: bool) -> Self {
        self.remember_original = remember;
        self
    }

    /// Route id
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    /// The route's metrics
    pub fn metrics(&self) -> &Arc<RouteMetrics> {
        &self.metrics
    }

    /// Number of top-level steps
    pub fn steps(&self) -> usize {
        self.pipeline.len()
    }

    /// Exchanges currently being routed
    pub fn in_flight(&self) -> u64 {
        self.metrics.in_flight()
    }

    /// Wait until no exchange is in flight
    ///
    /// Returns `false` if exchanges remain after `timeout`.
    pub async fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.metrics.in_flight() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                return self.metrics.in_flight() == 0;
            }
        }
    }

    /// Interrupt every in-flight exchange
    ///
    /// Interrupted exchanges fail with `ExchangeError::Cancelled` and still
    /// pass through the error handler and completion.
    pub fn cancel_in_flight(&self) {
        self.cancel.lock().cancel();
    }

    /// Arm a fresh cancellation token, used when the route starts again
    pub fn reset_cancellation(&self) {
        let mut cancel = self.cancel.lock();
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
    }

    async fn dispatch(&self, exchange: &mut Exchange) {
        let owner = exchange.state() == ExchangeState::Created;
        if owner {
            exchange.set_state(ExchangeState::Routing);
        }
        exchange.set_from_route_id(&self.route_id);
        if self.remember_original {
            exchange.remember_original();
        }

        let _in_flight = InFlight::enter(self);
        let started = Instant::now();
        trace!(route_id = %self.route_id, exchange_id = %exchange.id(), owner, "routing");

        let cancel = self.cancel.lock().clone();
        let routed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.pipeline.process(exchange) => Some(result),
        };
        match routed {
            Some(Ok(())) => {}
            Some(Err(error)) => exchange.set_exception(error),
            None => exchange.set_exception(ExchangeError::cancelled(format!(
                "route '{}' stopped before the exchange finished",
                self.route_id
            ))),
        }

        let mut handled = false;
        if exchange.is_failed() {
            invoke(self.error_handler.as_ref(), exchange).await;
            handled = !exchange.is_failed() && exchange.is_failure_handled();
        }

        let elapsed = started.elapsed();
        let failed = exchange.is_failed();
        self.metrics.record_outcome(failed, handled, elapsed);

        if owner {
            exchange.set_state(ExchangeState::Completing);
            exchange.complete();
            exchange.set_state(ExchangeState::Done);
        }

        debug!(
            route_id = %self.route_id,
            exchange_id = %exchange.id(),
            failed,
            handled,
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "exchange done"
        );
    }
}

impl Processor for RouteDispatcher {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            self.dispatch(exchange).await;
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "route"
    }
}

/// Keeps the in-flight count right even if the dispatch future is dropped
struct InFlight<'a> {
    dispatcher: &'a RouteDispatcher,
}

impl<'a> InFlight<'a> {
    fn enter(dispatcher: &'a RouteDispatcher) -> Self {
        dispatcher.metrics.record_started();
        Self { dispatcher }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.dispatcher.metrics.record_left() == 0 {
            self.dispatcher.drained.notify_waiters();
        }
    }
}
