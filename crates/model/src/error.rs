//! Route build error types
//!
//! Every malformed definition is rejected when the route is built, never
//! when a message arrives.

use switchyard_endpoint::EndpointError;
use switchyard_processor::ProcessorError;
use thiserror::Error;

/// Result type for route building
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Errors raised while compiling definitions into processors
#[derive(Debug, Error)]
pub enum BuildError {
    /// A required expression or predicate is absent
    #[error("{node}: missing {what}")]
    Missing {
        /// Node kind
        node: &'static str,
        /// What is missing
        what: &'static str,
    },

    /// A node is structurally invalid
    #[error("{node}: {reason}")]
    Invalid {
        /// Node kind
        node: &'static str,
        /// Why the node is rejected
        reason: String,
    },

    /// An endpoint could not be resolved or lacks the needed side
    #[error("endpoint '{uri}': {source}")]
    Endpoint {
        /// URI as written in the definition
        uri: String,
        /// Underlying endpoint error
        #[source]
        source: EndpointError,
    },

    /// Processor construction failed (unknown bean, bad options, bad expression)
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// The fluent builder was used out of order
    #[error("route builder: {0}")]
    Dsl(String),

    /// Failure inside a specific route
    #[error("route '{route_id}': {source}")]
    Route {
        /// Route being built
        route_id: String,
        /// Underlying failure
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Create a Missing error
    #[inline]
    pub fn missing(node: &'static str, what: &'static str) -> Self {
        Self::Missing { node, what }
    }

    /// Create an Invalid error
    #[inline]
    pub fn invalid(node: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            node,
            reason: reason.into(),
        }
    }

    /// Create an Endpoint error
    #[inline]
    pub fn endpoint(uri: impl Into<String>, source: EndpointError) -> Self {
        Self::Endpoint {
            uri: uri.into(),
            source,
        }
    }

    /// Create a Dsl error
    #[inline]
    pub fn dsl(msg: impl Into<String>) -> Self {
        Self::Dsl(msg.into())
    }

    /// Attach the route id
    pub fn in_route(self, route_id: impl Into<String>) -> Self {
        Self::Route {
            route_id: route_id.into(),
            source: Box::new(self),
        }
    }
}
