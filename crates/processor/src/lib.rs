//! Switchyard - Processor
//!
//! The building blocks of a route: enterprise integration patterns as
//! composable processors, the expression language they are configured with,
//! and the error handlers that run when a step fails.
//!
//! # Overview
//!
//! Every node of a built route is a [`Processor`]. Composite EIPs own their
//! child processors, so a route compiles into a tree:
//!
//! ```text
//! Pipeline
//!   ├─ FilterProcessor(header.type == 'order')
//!   │    └─ Pipeline [SetHeaderProcessor, SendToProcessor(seda:orders)]
//!   └─ Splitter(body)
//!        └─ Pipeline [LogProcessor, SendToProcessor(mock:items)]
//! ```
//!
//! # Design Principles
//!
//! - **Errors are data**: a failing step records an exception on the
//!   exchange; pipelines stop at the first one
//! - **Shared and concurrent**: processors are `Send + Sync` and used by
//!   every in-flight exchange; stateful ones own their locking
//! - **Built once**: expressions are parsed and endpoints resolved before the
//!   first message arrives
//!
//! # Modules
//!
//! - `language` - Expressions, predicates and the `simple` text syntax
//! - `registry` - Named processor factories and beans
//! - `error_handler` - Redelivery, dead letter channel, default handler
//!
//! # Example
//!
//! ```
//! use switchyard_processor::language::simple_predicate;
//! use switchyard_processor::{FilterProcessor, FnProcessor, Pipeline, Processor};
//!
//! let only_orders = simple_predicate("header.type == 'order'").unwrap();
//! let mark = FnProcessor::new(|exchange| {
//!     exchange.message_mut().set_header("seen", true);
//!     Ok(())
//! });
//! let filter: Box<dyn Processor> = Box::new(FilterProcessor::new(only_orders, Box::new(mark)));
//! let route = Pipeline::new(vec![filter]);
//! assert_eq!(route.names(), vec!["filter"]);
//! ```

mod aggregation;
mod aggregator;
mod choice;
mod control;
mod custom;
mod delay;
mod error;
pub mod error_handler;
mod fanout;
mod filter;
mod idempotent;
pub mod language;
mod load_balance;
mod log;
mod loops;
mod multicast;
mod pipeline;
mod registry;
mod send;
mod split;
mod transform;

pub use aggregation::{
    AggregationStrategy, GroupedBodies, StringConcat, UseLatest, UseOriginal, aggregate_all,
};
pub use aggregator::{Aggregator, AggregatorMetrics};
pub use choice::{ChoiceProcessor, WhenClause};
pub use control::{NoopProcessor, StopProcessor, ThrowExceptionProcessor};
pub use custom::FnProcessor;
pub use delay::DelayProcessor;
pub use error::{ProcessorError, Result};
pub use fanout::{DEFAULT_MAX_CONCURRENCY, FanOutOptions};
pub use filter::{FilterMetrics, FilterProcessor};
pub use idempotent::{
    DEFAULT_REPOSITORY_CAPACITY, IdempotentConsumer, IdempotentMetrics, IdempotentRepository,
    MemoryIdempotentRepository,
};
pub use load_balance::{LoadBalancePolicy, LoadBalancer};
pub use log::{LogProcessor, parse_level};
pub use loops::{LoopMode, LoopProcessor};
pub use multicast::Multicast;
pub use pipeline::{Pipeline, invoke, should_continue};
pub use registry::{
    ConvertBodyFactory, NoopFactory, ProcessorFactory, ProcessorOptions, ProcessorRegistry,
    ThrowExceptionFactory, default_registry,
};
pub use send::SendToProcessor;
pub use split::{DEFAULT_TOKEN, Splitter};
pub use transform::{
    BodyType, ConvertBodyProcessor, RemoveHeaderProcessor, SetBodyProcessor, SetHeaderProcessor,
    SetPropertyProcessor, value_to_body,
};

pub use switchyard_exchange::{Exchange, ProcessFuture, Processor};
