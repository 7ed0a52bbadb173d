//! Processor error types
//!
//! Build-time failures: bad expressions and processor factory
//! configuration. Failures while an exchange is in flight are
//! `ExchangeError`s recorded on the exchange instead.

use thiserror::Error;

/// Result type for processor construction
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Errors raised while constructing processors
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Expression text could not be parsed
    #[error("cannot parse expression '{input}' at position {position}: {message}")]
    Parse {
        /// Expression text
        input: String,
        /// Byte offset of the error
        position: usize,
        /// What went wrong
        message: String,
    },

    /// Invalid processor configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// No factory registered under the name
    #[error("unknown processor '{name}', available: [{available}]")]
    UnknownProcessor {
        /// Requested name
        name: String,
        /// Comma-separated registered names
        available: String,
    },
}

impl ProcessorError {
    /// Create a parse error
    pub fn parse(input: impl Into<String>, position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            position,
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = ProcessorError::parse("header.foo ==", 13, "expected operand");
        let msg = err.to_string();
        assert!(msg.contains("header.foo =="));
        assert!(msg.contains("position 13"));
        assert!(msg.contains("expected operand"));
    }

    #[test]
    fn test_config_error() {
        let err = ProcessorError::config("missing 'message'");
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_unknown_processor_error() {
        let err = ProcessorError::UnknownProcessor {
            name: "audit".into(),
            available: "noop".into(),
        };
        assert!(err.to_string().contains("audit"));
        assert!(err.to_string().contains("[noop]"));
    }
}
