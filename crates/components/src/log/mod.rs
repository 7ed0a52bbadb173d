//! Log component - one tracing event per exchange
//!
//! `log:category?level=info&showHeaders=true&showBody=true&showProperties=false`
//!
//! The category is recorded as a structured field. The rendered line looks
//! like `Exchange[ExchangePattern: InOnly, Headers: {a=1}, Body: hello]`.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use switchyard_endpoint::{
    Component, Endpoint, EndpointError, EndpointParameters, EndpointUri, Producer, Result,
};
use switchyard_exchange::{Exchange, ProcessFuture, Processor};
use switchyard_processor::parse_level;
use tracing::{Level, debug, error, info, trace, warn};

/// Factory for `log:` endpoints
#[derive(Debug, Default)]
pub struct LogComponent;

impl LogComponent {
    /// Create the component
    pub fn new() -> Self {
        Self
    }
}

impl Component for LogComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>> {
        let normalized = uri.normalized();
        let level = match parameters.take_str("level") {
            Some(raw) => parse_level(&raw).map_err(|_| EndpointError::InvalidParameter {
                uri: normalized.clone(),
                name: "level".to_string(),
                value: raw.clone(),
                expected: "trace, debug, info, warn or error",
            })?,
            None => Level::INFO,
        };

        let format = LogFormat {
            show_exchange_pattern: parameters.take_bool("showExchangePattern")?.unwrap_or(true),
            show_headers: parameters.take_bool("showHeaders")?.unwrap_or(false),
            show_properties: parameters.take_bool("showProperties")?.unwrap_or(false),
            show_body: parameters.take_bool("showBody")?.unwrap_or(true),
        };

        Ok(Arc::new(LogEndpoint {
            uri: normalized,
            category: uri.path().to_string(),
            level,
            format,
            logged: Arc::new(AtomicU64::new(0)),
        }))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Which parts of the exchange end up in the log line
#[derive(Debug, Clone, Copy)]
struct LogFormat {
    show_exchange_pattern: bool,
    show_headers: bool,
    show_properties: bool,
    show_body: bool,
}

impl LogFormat {
    fn render(&self, exchange: &Exchange) -> String {
        let mut parts = Vec::with_capacity(4);
        if self.show_exchange_pattern {
            parts.push(format!("ExchangePattern: {}", exchange.pattern()));
        }
        if self.show_properties {
            let sorted: BTreeMap<_, _> = exchange.properties().iter().collect();
            parts.push(format!("Properties: {}", render_map(sorted)));
        }
        if self.show_headers {
            let sorted: BTreeMap<_, _> = exchange.message().headers().iter().collect();
            parts.push(format!("Headers: {}", render_map(sorted)));
        }
        if self.show_body {
            let body = exchange.message().body();
            let text = match body.to_text() {
                Ok(text) => text.into_owned(),
                Err(_) => format!("<{} bytes>", body.to_bytes().len()),
            };
            parts.push(format!("Body: {text}"));
        }
        format!("Exchange[{}]", parts.join(", "))
    }
}

fn render_map(map: BTreeMap<&String, &switchyard_exchange::Value>) -> String {
    let entries: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", entries.join(", "))
}

/// A `log:` endpoint
pub struct LogEndpoint {
    uri: String,
    category: String,
    level: Level,
    format: LogFormat,
    logged: Arc<AtomicU64>,
}

impl LogEndpoint {
    /// Log category (the URI path)
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Level of emitted events
    pub fn level(&self) -> Level {
        self.level
    }

    /// Exchanges logged so far
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }

    /// The line this endpoint would log for `exchange`
    pub fn render(&self, exchange: &Exchange) -> String {
        self.format.render(exchange)
    }
}

impl Endpoint for LogEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_producer(&self) -> Result<Box<dyn Producer>> {
        Ok(Box::new(LogProducer {
            uri: self.uri.clone(),
            category: self.category.clone(),
            level: self.level,
            format: self.format,
            logged: Arc::clone(&self.logged),
        }))
    }
}

struct LogProducer {
    uri: String,
    category: String,
    level: Level,
    format: LogFormat,
    logged: Arc<AtomicU64>,
}

impl Processor for LogProducer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let line = self.format.render(exchange);
            let category = self.category.as_str();
            let exchange_id = exchange.id();
            match self.level {
                Level::TRACE => trace!(category, %exchange_id, "{line}"),
                Level::DEBUG => debug!(category, %exchange_id, "{line}"),
                Level::INFO => info!(category, %exchange_id, "{line}"),
                Level::WARN => warn!(category, %exchange_id, "{line}"),
                _ => error!(category, %exchange_id, "{line}"),
            }
            self.logged.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

impl Producer for LogProducer {
    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_endpoint::ComponentRegistry;

    fn endpoint(uri: &str) -> Arc<dyn Endpoint> {
        let mut registry = ComponentRegistry::new();
        registry.register("log", Arc::new(LogComponent::new()));
        registry
            .create_endpoint(&EndpointUri::parse(uri).unwrap())
            .unwrap()
    }

    fn log(endpoint: &Arc<dyn Endpoint>) -> &LogEndpoint {
        endpoint.as_any().downcast_ref::<LogEndpoint>().unwrap()
    }

    #[test]
    fn test_defaults() {
        let endpoint = endpoint("log:orders");
        let log = log(&endpoint);
        assert_eq!(log.category(), "orders");
        assert_eq!(log.level(), Level::INFO);

        let mut exchange = Exchange::with_body("hello");
        exchange.message_mut().set_header("h", 1);
        assert_eq!(log.render(&exchange), "Exchange[ExchangePattern: InOnly, Body: hello]");
    }

    #[test]
    fn test_show_headers_sorted() {
        let endpoint = endpoint("log:x?showHeaders=true&showExchangePattern=false&level=debug");
        let log = log(&endpoint);
        assert_eq!(log.level(), Level::DEBUG);

        let mut exchange = Exchange::with_body("b");
        exchange.message_mut().set_header("z", "last");
        exchange.message_mut().set_header("a", 1);
        assert_eq!(
            log.render(&exchange),
            "Exchange[Headers: {a=1, z=\"last\"}, Body: b]"
        );
    }

    #[test]
    fn test_show_properties_without_body() {
        let endpoint = endpoint("log:x?showProperties&showBody=false&showExchangePattern=false");
        let mut exchange = Exchange::with_body("b");
        exchange.set_property("p", true);
        assert_eq!(log(&endpoint).render(&exchange), "Exchange[Properties: {p=true}]");
    }

    #[test]
    fn test_invalid_level() {
        let mut registry = ComponentRegistry::new();
        registry.register("log", Arc::new(LogComponent::new()));
        let err = registry
            .create_endpoint(&EndpointUri::parse("log:x?level=loud").unwrap())
            .err()
            .unwrap();
        assert!(err.to_string().contains("loud"));
    }

    #[tokio::test]
    async fn test_producer_counts_and_leaves_exchange() {
        let endpoint = endpoint("log:x?level=trace");
        let producer = endpoint.create_producer().unwrap();
        let mut exchange = Exchange::with_body("b");
        producer.process(&mut exchange).await.unwrap();
        producer.process(&mut exchange).await.unwrap();

        assert_eq!(log(&endpoint).logged(), 2);
        assert_eq!(exchange.message().body().as_str(), Some("b"));
    }
}
