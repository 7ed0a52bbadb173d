//! Engine error types

use switchyard_endpoint::EndpointError;
use switchyard_exchange::ExchangeError;
use switchyard_model::BuildError;
use thiserror::Error;

use crate::RouteStatus;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while managing routes or sending through the template
#[derive(Debug, Error)]
pub enum EngineError {
    /// A route could not be built
    #[error(transparent)]
    Build(#[from] BuildError),

    /// An endpoint could not be resolved
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    /// Route id already taken
    #[error("duplicate route id '{0}'")]
    DuplicateRoute(String),

    /// No route with this id
    #[error("unknown route '{id}', available: [{available}]")]
    UnknownRoute {
        /// Requested id
        id: String,
        /// Comma-separated known ids
        available: String,
    },

    /// Lifecycle call not valid in the route's current status
    #[error("cannot {operation} route '{route_id}' while {status}")]
    InvalidState {
        /// Route id
        route_id: String,
        /// Current status
        status: RouteStatus,
        /// Attempted operation
        operation: &'static str,
    },

    /// The route's consumer failed to start or stop
    #[error("route '{route_id}': {source}")]
    Consumer {
        /// Route id
        route_id: String,
        /// Consumer failure
        #[source]
        source: EndpointError,
    },

    /// An exchange sent through the producer template failed
    #[error("exchange {exchange_id} failed: {source}")]
    Exchange {
        /// Exchange id
        exchange_id: String,
        /// Failure recorded on the exchange
        #[source]
        source: ExchangeError,
    },
}

impl EngineError {
    /// Create an UnknownRoute error listing the known ids
    pub fn unknown_route<'a>(id: impl Into<String>, known: impl IntoIterator<Item = &'a str>) -> Self {
        let known: Vec<&str> = known.into_iter().collect();
        Self::UnknownRoute {
            id: id.into(),
            available: known.join(", "),
        }
    }

    /// The exchange failure, if this error carries one
    pub fn exchange_error(&self) -> Option<&ExchangeError> {
        match self {
            Self::Exchange { source, .. } => Some(source),
            _ => None,
        }
    }
}
