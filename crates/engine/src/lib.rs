//! Switchyard - Engine
//!
//! The runtime that owns routes and drives them.
//!
//! # Overview
//!
//! ```text
//!                    ┌──────────────────── Context ─────────────────────┐
//!                    │ components   endpoints   processors   routes    │
//!                    └──────────────────────────────────────────────────┘
//!                                              │ add_routes / start
//!                                              ↓
//! endpoint consumer ──→ RouteDispatcher ──→ Pipeline ──→ producers
//!                         │  unit of work, error handler, metrics
//! ProducerTemplate ───────┘  (via direct:/seda:/mock: producers)
//! ```
//!
//! A [`Context`] compiles [`RouteDefinition`](switchyard_model::RouteDefinition)s
//! into [`Route`]s. Each route pairs its source endpoint's consumer with a
//! [`RouteDispatcher`], the processor that owns the unit of work of every
//! exchange the consumer delivers.
//!
//! # Lifecycle
//!
//! Routes move `Stopped -> Starting -> Started -> Stopping -> Stopped`.
//! Stopping halts the consumer first, then waits for in-flight exchanges up
//! to the shutdown timeout before cancelling them.

mod context;
mod dispatcher;
mod error;
mod metrics;
mod route;
mod template;

pub use context::{Context, DEFAULT_SHUTDOWN_TIMEOUT};
pub use dispatcher::RouteDispatcher;
pub use error::{EngineError, Result};
pub use metrics::{RouteMetrics, RouteMetricsSnapshot};
pub use route::{Route, RouteStatus};
pub use template::ProducerTemplate;
