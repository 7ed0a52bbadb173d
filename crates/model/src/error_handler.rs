//! Error handler definitions

use std::time::Duration;

use switchyard_exchange::Processor;
use switchyard_processor::error_handler::{
    DeadLetterChannel, DefaultErrorHandler, NoErrorHandler, RedeliveryPolicy,
};

use crate::{BuildError, BuildResult, RouteContext};

/// How a route reacts to a failed exchange
#[derive(Debug, Clone)]
pub enum ErrorHandlerDefinition {
    /// Leave the failure for the consumer
    NoErrorHandler,
    /// Retry leaf steps, then log and propagate
    Default {
        /// Redelivery policy for leaf steps
        redelivery: RedeliveryPolicy,
    },
    /// Retry leaf steps, then park the exchange on an endpoint
    DeadLetterChannel {
        /// Dead letter endpoint URI
        uri: String,
        /// Redelivery policy for leaf steps
        redelivery: RedeliveryPolicy,
        /// Park the message as it entered the route
        use_original_message: bool,
    },
}

impl Default for ErrorHandlerDefinition {
    fn default() -> Self {
        Self::Default {
            redelivery: RedeliveryPolicy::default(),
        }
    }
}

impl ErrorHandlerDefinition {
    /// Default handler with `maximum_redeliveries` fixed-delay retries
    pub fn default_with_retries(maximum_redeliveries: u32, delay: Duration) -> Self {
        Self::Default {
            redelivery: RedeliveryPolicy::new(maximum_redeliveries, delay),
        }
    }

    /// Dead letter channel without redelivery
    pub fn dead_letter_channel(uri: impl Into<String>) -> Self {
        Self::DeadLetterChannel {
            uri: uri.into(),
            redelivery: RedeliveryPolicy::default(),
            use_original_message: false,
        }
    }

    /// Replace the redelivery policy (no-op for `NoErrorHandler`)
    pub fn with_redelivery(mut self, policy: RedeliveryPolicy) -> Self {
        match &mut self {
            Self::NoErrorHandler => {}
            Self::Default { redelivery } | Self::DeadLetterChannel { redelivery, .. } => {
                *redelivery = policy;
            }
        }
        self
    }

    /// Handler kind, as used in configuration
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoErrorHandler => "none",
            Self::Default { .. } => "default",
            Self::DeadLetterChannel { .. } => "dead_letter",
        }
    }

    /// Redelivery policy applied to leaf steps, if enabled
    pub fn redelivery_policy(&self) -> Option<&RedeliveryPolicy> {
        match self {
            Self::NoErrorHandler => None,
            Self::Default { redelivery } | Self::DeadLetterChannel { redelivery, .. } => {
                Some(redelivery).filter(|p| p.is_enabled())
            }
        }
    }

    /// Whether the dispatcher must snapshot the incoming message
    pub fn needs_original_message(&self) -> bool {
        matches!(
            self,
            Self::DeadLetterChannel {
                use_original_message: true,
                ..
            }
        )
    }

    /// Build the route-level handler
    ///
    /// # Errors
    ///
    /// Returns `BuildError::Endpoint` if the dead letter endpoint cannot be
    /// resolved or cannot produce.
    pub fn create_handler(&self, ctx: &RouteContext<'_>) -> BuildResult<Box<dyn Processor>> {
        match self {
            Self::NoErrorHandler => Ok(Box::new(NoErrorHandler)),
            Self::Default { .. } => Ok(Box::new(DefaultErrorHandler::new())),
            Self::DeadLetterChannel {
                uri,
                use_original_message,
                ..
            } => {
                if uri.trim().is_empty() {
                    return Err(BuildError::invalid("dead_letter", "empty endpoint uri"));
                }
                let producer = ctx.producer(uri)?;
                Ok(Box::new(
                    DeadLetterChannel::new(producer)
                        .with_use_original_message(*use_original_message),
                ))
            }
        }
    }
}
