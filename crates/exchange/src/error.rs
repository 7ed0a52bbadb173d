//! Exchange error types
//!
//! Failures recorded on an exchange while it is in flight. They are data, not
//! control flow, so the type is `Clone`: copies of an exchange carry copies of
//! its exception.

use thiserror::Error;

/// Result type for processor operations
pub type ProcessResult<T> = std::result::Result<T, ExchangeError>;

/// Errors that can be attached to an exchange during routing
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExchangeError {
    /// Generic processing failure
    #[error("processing failed: {0}")]
    Failed(String),

    /// Failure reported by an endpoint's producer
    #[error("endpoint '{uri}' failed: {message}")]
    Endpoint {
        /// URI of the failing endpoint
        uri: String,
        /// Error message from the endpoint
        message: String,
    },

    /// Synchronous endpoint has no active consumer
    #[error("no consumers available on endpoint '{uri}'")]
    NoConsumer {
        /// URI of the endpoint without consumers
        uri: String,
    },

    /// Expression could not be evaluated against the exchange
    #[error("expression evaluation failed: {0}")]
    Expression(String),

    /// Body could not be converted to the requested type
    #[error("cannot convert body from {from} to {to}")]
    TypeConversion {
        /// Source representation
        from: &'static str,
        /// Requested representation
        to: &'static str,
    },

    /// Waiting for a reply exceeded its timeout
    #[error("timed out after {millis}ms waiting for {what}")]
    Timeout {
        /// What the exchange was waiting for
        what: String,
        /// Timeout that elapsed
        millis: u64,
    },

    /// Queue endpoint is full and does not block
    #[error("queue '{queue}' is full")]
    QueueFull {
        /// Queue name
        queue: String,
    },

    /// Exchange was interrupted (e.g. forced shutdown)
    #[error("exchange cancelled: {0}")]
    Cancelled(String),

    /// All redelivery attempts failed
    #[error("redelivery exhausted after {attempts} attempts: {cause}")]
    RedeliveryExhausted {
        /// Number of redelivery attempts made
        attempts: u32,
        /// The last failure
        cause: Box<ExchangeError>,
    },
}

impl ExchangeError {
    /// Create a generic processing failure
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Create an endpoint failure
    pub fn endpoint(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Endpoint {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Create a no-consumer error
    pub fn no_consumer(uri: impl Into<String>) -> Self {
        Self::NoConsumer { uri: uri.into() }
    }

    /// Create an expression error
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(what: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            what: what.into(),
            millis,
        }
    }

    /// Create a queue-full error
    pub fn queue_full(queue: impl Into<String>) -> Self {
        Self::QueueFull {
            queue: queue.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    /// Whether the failure came from interrupting the exchange
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Whether a redelivery channel already gave up on this failure
    #[inline]
    pub fn is_redelivery_exhausted(&self) -> bool {
        matches!(self, Self::RedeliveryExhausted { .. })
    }

    /// The innermost cause, looking through redelivery wrappers
    pub fn root_cause(&self) -> &ExchangeError {
        match self {
            Self::RedeliveryExhausted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}
