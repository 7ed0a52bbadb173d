//! Log - Emit a tracing event per exchange

use std::str::FromStr;

use switchyard_exchange::{Exchange, ProcessFuture, Processor};
use tracing::{Level, debug, error, info, trace, warn};

use crate::ProcessorError;
use crate::language::Expression;

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`)
pub fn parse_level(level: &str) -> Result<Level, ProcessorError> {
    Level::from_str(level).map_err(|_| ProcessorError::config(format!("unknown log level '{level}'")))
}

/// Renders a message template and logs it
///
/// The category is recorded as a structured field so it can be filtered
/// alongside the route and exchange ids.
#[derive(Debug, Clone)]
pub struct LogProcessor {
    message: Expression,
    level: Level,
    category: String,
}

impl LogProcessor {
    /// Create a logger at `info` level
    pub fn new(message: Expression) -> Self {
        Self {
            message,
            level: Level::INFO,
            category: "switchyard.route".to_string(),
        }
    }

    /// Set the level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

impl Processor for LogProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let text = self.message.evaluate_string(exchange)?;
            let category = self.category.as_str();
            let exchange_id = exchange.id();
            match self.level {
                Level::TRACE => trace!(category, %exchange_id, "{text}"),
                Level::DEBUG => debug!(category, %exchange_id, "{text}"),
                Level::INFO => info!(category, %exchange_id, "{text}"),
                Level::WARN => warn!(category, %exchange_id, "{text}"),
                _ => error!(category, %exchange_id, "{text}"),
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::simple;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert!(parse_level("loud").is_err());
    }

    #[tokio::test]
    async fn test_log_does_not_touch_exchange() {
        let log = LogProcessor::new(simple("got ${body}").unwrap())
            .with_level(Level::DEBUG)
            .with_category("audit");
        let mut exchange = Exchange::with_body("x");
        log.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.message().body().as_str(), Some("x"));
        assert!(!exchange.is_failed());
    }
}
