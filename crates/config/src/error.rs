//! Configuration error types

use std::io;

use switchyard_endpoint::EndpointError;
use switchyard_processor::ProcessorError;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Two routes share an id
    #[error("route id '{id}' is used by more than one route")]
    DuplicateRoute {
        /// The conflicting id
        id: String,
    },

    /// Validation error - required field missing
    #[error("{component} in route '{route}' is missing required field '{field}'")]
    MissingField {
        /// Where the field belongs (e.g., "route", "step 'to'")
        component: String,
        /// Route id
        route: String,
        /// Missing field name
        field: &'static str,
    },

    /// Validation error - invalid value
    #[error("{component} in route '{route}' has invalid {field}: {message}")]
    InvalidValue {
        /// Where the field belongs
        component: String,
        /// Route id
        route: String,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// An expression or predicate does not parse
    #[error("route '{route}': invalid {field}: {source}")]
    Expression {
        /// Route id
        route: String,
        /// Field holding the expression
        field: &'static str,
        /// Parser error
        #[source]
        source: ProcessorError,
    },

    /// An endpoint URI is malformed
    #[error("route '{route}': {source}")]
    Endpoint {
        /// Route id
        route: String,
        /// URI error
        #[source]
        source: EndpointError,
    },
}

impl ConfigError {
    /// Create a DuplicateRoute error
    pub fn duplicate_route(id: impl Into<String>) -> Self {
        Self::DuplicateRoute { id: id.into() }
    }

    /// Create a MissingField error
    pub fn missing_field(
        component: impl Into<String>,
        route: impl Into<String>,
        field: &'static str,
    ) -> Self {
        Self::MissingField {
            component: component.into(),
            route: route.into(),
            field,
        }
    }

    /// Create an InvalidValue error
    pub fn invalid_value(
        component: impl Into<String>,
        route: impl Into<String>,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component: component.into(),
            route: route.into(),
            field,
            message: message.into(),
        }
    }

    /// Create an Expression error
    pub fn expression(route: impl Into<String>, field: &'static str, source: ProcessorError) -> Self {
        Self::Expression {
            route: route.into(),
            field,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_route_error() {
        let err = ConfigError::duplicate_route("orders");
        assert!(err.to_string().contains("'orders'"));
        assert!(err.to_string().contains("more than one route"));
    }

    #[test]
    fn test_missing_field_error() {
        let err = ConfigError::missing_field("step 'to'", "orders", "uri");
        assert_eq!(
            err.to_string(),
            "step 'to' in route 'orders' is missing required field 'uri'"
        );
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("step 'loop'", "r1", "count", "set count or while, not both");
        assert!(err.to_string().contains("r1"));
        assert!(err.to_string().contains("invalid count"));
    }

    #[test]
    fn test_expression_error_keeps_position() {
        let err = ConfigError::expression(
            "r1",
            "predicate",
            ProcessorError::parse("header.x ==", 11, "expected value"),
        );
        let text = err.to_string();
        assert!(text.contains("route 'r1'"));
        assert!(text.contains("position 11"));
    }
}
