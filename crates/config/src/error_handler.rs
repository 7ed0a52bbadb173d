//! Error handler configuration
//!
//! # Example
//!
//! ```toml
//! [error_handler]
//! kind = "dead_letter"
//! dead_letter_uri = "seda:failed"
//! use_original_message = true
//! maximum_redeliveries = 3
//! redelivery_delay = "500ms"
//! use_exponential_backoff = true
//! ```

use std::time::Duration;

use serde::Deserialize;
use switchyard_model::ErrorHandlerDefinition;
use switchyard_processor::error_handler::RedeliveryPolicy;
use switchyard_processor::language::simple_predicate;

use crate::error::{ConfigError, Result};

/// Which error handler a route uses
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlerKind {
    /// Log the failure and leave it on the exchange (default)
    #[default]
    Default,
    /// Move failed exchanges to an endpoint
    DeadLetter,
    /// Leave failures untouched
    None,
}

/// Error handler and redelivery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorHandlerConfig {
    /// Handler kind
    pub kind: ErrorHandlerKind,

    /// Dead letter endpoint (required for `dead_letter`)
    pub dead_letter_uri: Option<String>,

    /// Send the message as it entered the route to the dead letter endpoint
    pub use_original_message: bool,

    /// Retries of a failed step before the handler takes over
    /// Default: 0
    pub maximum_redeliveries: u32,

    /// Delay before the first retry
    /// Default: 1s
    #[serde(with = "humantime_serde")]
    pub redelivery_delay: Duration,

    /// Grow the delay for every further retry
    pub use_exponential_backoff: bool,

    /// Backoff factor
    /// Default: 2.0
    pub backoff_multiplier: f64,

    /// Upper bound for the backoff delay
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub maximum_redelivery_delay: Duration,

    /// Only retry while this predicate holds
    pub retry_while: Option<String>,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        let policy = RedeliveryPolicy::default();
        Self {
            kind: ErrorHandlerKind::Default,
            dead_letter_uri: None,
            use_original_message: false,
            maximum_redeliveries: policy.maximum_redeliveries,
            redelivery_delay: policy.redelivery_delay,
            use_exponential_backoff: policy.use_exponential_backoff,
            backoff_multiplier: policy.backoff_multiplier,
            maximum_redelivery_delay: policy.maximum_redelivery_delay,
            retry_while: None,
        }
    }
}

impl ErrorHandlerConfig {
    /// Build the handler definition
    ///
    /// `owner` names the route (or "context") in error messages.
    ///
    /// # Errors
    ///
    /// Fails when `dead_letter` has no URI, the backoff settings are out of
    /// range or `retry_while` does not parse.
    pub fn to_definition(&self, owner: &str) -> Result<ErrorHandlerDefinition> {
        let mut policy = RedeliveryPolicy::new(self.maximum_redeliveries, self.redelivery_delay);
        if self.use_exponential_backoff {
            if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
                return Err(ConfigError::invalid_value(
                    "error_handler",
                    owner,
                    "backoff_multiplier",
                    format!("must be at least 1.0, got {}", self.backoff_multiplier),
                ));
            }
            policy = policy
                .with_exponential_backoff(self.backoff_multiplier, self.maximum_redelivery_delay);
        }
        if let Some(text) = &self.retry_while {
            let predicate = simple_predicate(text)
                .map_err(|e| ConfigError::expression(owner, "retry_while", e))?;
            policy = policy.with_retry_while(predicate);
        }

        let definition = match self.kind {
            ErrorHandlerKind::None => ErrorHandlerDefinition::NoErrorHandler,
            ErrorHandlerKind::Default => ErrorHandlerDefinition::Default { redelivery: policy },
            ErrorHandlerKind::DeadLetter => {
                let uri = self
                    .dead_letter_uri
                    .as_deref()
                    .filter(|uri| !uri.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::missing_field("error_handler", owner, "dead_letter_uri")
                    })?;
                ErrorHandlerDefinition::DeadLetterChannel {
                    uri: uri.to_string(),
                    redelivery: policy,
                    use_original_message: self.use_original_message,
                }
            }
        };
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_default_handler_without_retries() {
        let config: ErrorHandlerConfig = toml::from_str("").unwrap();
        let definition = config.to_definition("context").unwrap();
        assert_eq!(definition.kind(), "default");
        assert_eq!(
            definition.redelivery_policy().map(|p| p.maximum_redeliveries),
            Some(0)
        );
    }

    #[test]
    fn test_dead_letter() {
        let config: ErrorHandlerConfig = toml::from_str(
            r#"
kind = "dead_letter"
dead_letter_uri = "mock:dlq"
use_original_message = true
maximum_redeliveries = 2
redelivery_delay = "10ms"
"#,
        )
        .unwrap();
        let definition = config.to_definition("r1").unwrap();
        assert!(definition.needs_original_message());
        let ErrorHandlerDefinition::DeadLetterChannel { uri, redelivery, .. } = definition else {
            panic!("expected dead letter channel");
        };
        assert_eq!(uri, "mock:dlq");
        assert_eq!(redelivery.maximum_redeliveries, 2);
        assert_eq!(redelivery.redelivery_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_dead_letter_requires_uri() {
        let config: ErrorHandlerConfig = toml::from_str(r#"kind = "dead_letter""#).unwrap();
        let err = config.to_definition("r1").unwrap_err();
        assert!(err.to_string().contains("dead_letter_uri"));
    }

    #[test]
    fn test_backoff_and_retry_while() {
        let config: ErrorHandlerConfig = toml::from_str(
            r#"
maximum_redeliveries = 5
use_exponential_backoff = true
backoff_multiplier = 3.0
maximum_redelivery_delay = "2s"
retry_while = "header.retryable == true"
"#,
        )
        .unwrap();
        let definition = config.to_definition("r1").unwrap();
        let policy = definition.redelivery_policy().unwrap();
        assert!(policy.use_exponential_backoff);
        assert_eq!(policy.backoff_multiplier, 3.0);
        assert!(policy.retry_while.is_some());
    }

    #[test]
    fn test_invalid_settings() {
        let config: ErrorHandlerConfig =
            toml::from_str("use_exponential_backoff = true\nbackoff_multiplier = 0.5").unwrap();
        assert!(config.to_definition("r1").is_err());

        let config: ErrorHandlerConfig = toml::from_str(r#"retry_while = "header.x ==""#).unwrap();
        let err = config.to_definition("r1").unwrap_err();
        assert!(matches!(err, ConfigError::Expression { field: "retry_while", .. }));
    }

    #[test]
    fn test_none() {
        let config: ErrorHandlerConfig = toml::from_str(r#"kind = "none""#).unwrap();
        assert_eq!(config.to_definition("r1").unwrap().kind(), "none");
    }
}
