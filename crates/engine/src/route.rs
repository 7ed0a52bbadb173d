//! A built route: definition, dispatcher, consumer and status

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchyard_endpoint::Consumer;
use switchyard_model::RouteDefinition;
use tracing::{info, warn};

use crate::{EngineError, Result, RouteDispatcher, RouteMetricsSnapshot};

/// Grace period for cancelled exchanges to run their error handling
const CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle status of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    /// Built, consumer not running
    Stopped,
    /// Consumer starting
    Starting,
    /// Consumer running
    Started,
    /// Consumer stopped, draining in-flight exchanges
    Stopping,
}

impl RouteStatus {
    /// Get as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Starting => "Starting",
            Self::Started => "Started",
            Self::Stopping => "Stopping",
        }
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled route owned by a context
pub struct Route {
    definition: RouteDefinition,
    dispatcher: Arc<RouteDispatcher>,
    consumer: Box<dyn Consumer>,
    status: Mutex<RouteStatus>,
}

impl Route {
    pub(crate) fn new(
        definition: RouteDefinition,
        dispatcher: Arc<RouteDispatcher>,
        consumer: Box<dyn Consumer>,
    ) -> Self {
        Self {
            definition,
            dispatcher,
            consumer,
            status: Mutex::new(RouteStatus::Stopped),
        }
    }

    /// Route id
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    /// Source endpoint URI
    pub fn from_uri(&self) -> &str {
        self.consumer.endpoint_uri()
    }

    /// The definition the route was built from
    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    /// Current status
    pub fn status(&self) -> RouteStatus {
        *self.status.lock()
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> RouteMetricsSnapshot {
        self.dispatcher.metrics().snapshot()
    }

    /// The processor fed by the consumer
    pub fn dispatcher(&self) -> &Arc<RouteDispatcher> {
        &self.dispatcher
    }

    fn transition(&self, from: RouteStatus, to: RouteStatus, operation: &'static str) -> Result<()> {
        let mut status = self.status.lock();
        if *status != from {
            return Err(EngineError::InvalidState {
                route_id: self.id().to_string(),
                status: *status,
                operation,
            });
        }
        *status = to;
        Ok(())
    }

    /// Start the consumer
    ///
    /// Starting a started route is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.status() == RouteStatus::Started {
            return Ok(());
        }
        self.transition(RouteStatus::Stopped, RouteStatus::Starting, "start")?;

        self.dispatcher.reset_cancellation();
        if let Err(source) = self.consumer.start().await {
            *self.status.lock() = RouteStatus::Stopped;
            return Err(EngineError::Consumer {
                route_id: self.id().to_string(),
                source,
            });
        }

        *self.status.lock() = RouteStatus::Started;
        info!(route_id = %self.id(), from = %self.from_uri(), "route started");
        Ok(())
    }

    /// Stop the consumer and drain in-flight exchanges
    ///
    /// Exchanges still running after `timeout` are cancelled. Stopping a
    /// stopped route is a no-op.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        if self.status() == RouteStatus::Stopped {
            return Ok(());
        }
        self.transition(RouteStatus::Started, RouteStatus::Stopping, "stop")?;

        let stopped = self.consumer.stop().await;

        if !self.dispatcher.wait_drained(timeout).await {
            warn!(
                route_id = %self.id(),
                in_flight = self.dispatcher.in_flight(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "shutdown timeout reached, cancelling in-flight exchanges"
            );
            self.dispatcher.cancel_in_flight();
            if !self.dispatcher.wait_drained(CANCEL_GRACE).await {
                warn!(
                    route_id = %self.id(),
                    in_flight = self.dispatcher.in_flight(),
                    "exchanges still in flight after cancellation"
                );
            }
        }

        *self.status.lock() = RouteStatus::Stopped;
        stopped.map_err(|source| EngineError::Consumer {
            route_id: self.id().to_string(),
            source,
        })?;
        info!(route_id = %self.id(), "route stopped");
        Ok(())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id())
            .field("from", &self.from_uri())
            .field("status", &self.status())
            .field("steps", &self.dispatcher.steps())
            .finish()
    }
}
