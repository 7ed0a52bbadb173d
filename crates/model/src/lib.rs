//! Switchyard - Model
//!
//! Route definitions and the compiler that turns them into processors.
//!
//! # Overview
//!
//! Routes are described as data, either with the fluent [`RouteBuilder`] or
//! from configuration, and compiled once per route:
//!
//! ```text
//! RouteBuilder / config ─→ RouteDefinition { from, steps: [ProcessorDefinition] }
//!                                    │ create_pipeline(&RouteContext)
//!                                    ↓
//!                          Pipeline [Box<dyn Processor>, ...]
//! ```
//!
//! Compilation is bottom-up: composite nodes build their children first.
//! Endpoints are resolved through the [`RouteContext`], which also wraps
//! every leaf step with the error handler's redelivery policy.
//!
//! # Failure policy
//!
//! Missing expressions, loops without (or with both) count and while,
//! choices without `when`, empty multicasts, bad or unknown endpoint URIs,
//! producer-less endpoints and unknown processor references all fail with a
//! [`BuildError`] when the route is built.

mod builder;
mod compile;
mod context;
mod definition;
mod error;
mod error_handler;

pub use builder::RouteBuilder;
pub use compile::{build_each, build_steps};
pub use context::{EndpointResolver, RegistryResolver, RouteContext};
pub use definition::{
    AggregateDefinition, IdempotentDefinition, LoopDefinition, MulticastDefinition,
    ProcessorDefinition, RouteDefinition, SplitDefinition, WhenDefinition,
};
pub use error::{BuildError, BuildResult};
pub use error_handler::ErrorHandlerDefinition;
