//! Switchyard - Exchange
//!
//! The unit of work that flows through a route, and the single capability
//! every routing step implements.
//!
//! # Overview
//!
//! An [`Exchange`] is created per inbound event by a consumer, mutated by
//! every processor on its path and completed once routing is finished.
//!
//! ```text
//! [Consumer] → Exchange { id, pattern, in, out?, exception?, properties } → [Processor]* → complete()
//! ```
//!
//! # Errors are data
//!
//! Processors never unwind across step boundaries. A failure is recorded on
//! the exchange with [`Exchange::set_exception`] and the dispatcher branches on
//! it. This keeps redelivery, dead-letter routing and compensation ordinary
//! processors instead of special control flow.
//!
//! # Example
//!
//! ```
//! use switchyard_exchange::{Body, Exchange, ExchangeError};
//!
//! let mut exchange = Exchange::with_body("hello");
//! exchange.message_mut().set_header("foo", "bar");
//! assert_eq!(exchange.message().body().as_str(), Some("hello"));
//!
//! exchange.set_exception(ExchangeError::failed("boom"));
//! assert!(exchange.is_failed());
//! ```

mod body;
mod error;
mod exchange;
mod id;
mod message;
mod processor;
pub mod properties;

pub use body::Body;
pub use error::{ExchangeError, ProcessResult};
pub use exchange::{Exchange, ExchangePattern, ExchangeState, OnCompletion};
pub use id::ExchangeId;
pub use message::Message;
pub use processor::{ProcessFuture, Processor};

/// Dynamic value type used for headers, properties and JSON bodies
pub use serde_json::Value;
