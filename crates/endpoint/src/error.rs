//! Endpoint error types

use thiserror::Error;

/// Result type for endpoint operations
pub type Result<T> = std::result::Result<T, EndpointError>;

/// Errors raised while resolving endpoints or managing consumers
#[derive(Debug, Error)]
pub enum EndpointError {
    /// URI does not follow `scheme:path?query`
    #[error("invalid endpoint uri '{uri}': {reason}")]
    InvalidUri {
        /// The offending URI
        uri: String,
        /// What is wrong with it
        reason: String,
    },

    /// No component registered for the scheme
    #[error("no component for scheme '{scheme}', available: [{available}]")]
    UnknownScheme {
        /// Requested scheme
        scheme: String,
        /// Comma-separated registered schemes
        available: String,
    },

    /// Query parameters the component did not recognize
    #[error("unknown parameters on '{uri}': {names}")]
    UnknownParameters {
        /// Endpoint URI
        uri: String,
        /// Comma-separated parameter names
        names: String,
    },

    /// Parameter value has the wrong type
    #[error("invalid value '{value}' for parameter '{name}' on '{uri}': expected {expected}")]
    InvalidParameter {
        /// Endpoint URI
        uri: String,
        /// Parameter name
        name: String,
        /// Raw value
        value: String,
        /// Expected type
        expected: &'static str,
    },

    /// Endpoint cannot be sent to
    #[error("endpoint '{uri}' does not support producers")]
    ProducerNotSupported {
        /// Endpoint URI
        uri: String,
    },

    /// Endpoint cannot be consumed from
    #[error("endpoint '{uri}' does not support consumers")]
    ConsumerNotSupported {
        /// Endpoint URI
        uri: String,
    },

    /// Endpoint allows a single consumer and already has one
    #[error("endpoint '{uri}' already has a consumer")]
    ConsumerExists {
        /// Endpoint URI
        uri: String,
    },

    /// Consumer failed to start or stop
    #[error("consumer for '{uri}' failed: {message}")]
    Consumer {
        /// Endpoint URI
        uri: String,
        /// Error message
        message: String,
    },
}

impl EndpointError {
    /// Create an InvalidUri error
    #[inline]
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a ProducerNotSupported error
    #[inline]
    pub fn producer_not_supported(uri: impl Into<String>) -> Self {
        Self::ProducerNotSupported { uri: uri.into() }
    }

    /// Create a ConsumerNotSupported error
    #[inline]
    pub fn consumer_not_supported(uri: impl Into<String>) -> Self {
        Self::ConsumerNotSupported { uri: uri.into() }
    }

    /// Create a ConsumerExists error
    #[inline]
    pub fn consumer_exists(uri: impl Into<String>) -> Self {
        Self::ConsumerExists { uri: uri.into() }
    }

    /// Create a Consumer error
    #[inline]
    pub fn consumer(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Consumer {
            uri: uri.into(),
            message: message.into(),
        }
    }
}
