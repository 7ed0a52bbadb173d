//! Tests for component and endpoint registries

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use switchyard_exchange::{Exchange, ProcessFuture, Processor};

use crate::{EndpointParameters, Producer};

struct TestEndpoint {
    uri: String,
}

impl Endpoint for TestEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn create_producer(&self) -> Result<Box<dyn Producer>> {
        Ok(Box::new(TestProducer {
            uri: self.uri.clone(),
        }))
    }
}

struct TestProducer {
    uri: String,
}

impl Processor for TestProducer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            exchange.message_mut().set_header("visited", self.uri.clone());
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

impl Producer for TestProducer {
    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

#[derive(Default)]
struct TestComponent {
    created: AtomicUsize,
}

impl Component for TestComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>> {
        let _ = parameters.take_u64("size")?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TestEndpoint {
            uri: uri.normalized(),
        }))
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

fn registry_with(component: Arc<TestComponent>) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register("test", component);
    registry
}

#[test]
fn test_register_and_lookup() {
    let registry = registry_with(Arc::new(TestComponent::default()));
    assert!(registry.contains("test"));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.schemes(), vec!["test"]);
}

#[test]
#[should_panic(expected = "already registered")]
fn test_duplicate_register_panics() {
    let mut registry = registry_with(Arc::new(TestComponent::default()));
    registry.register("test", Arc::new(TestComponent::default()));
}

#[test]
fn test_try_register_duplicate() {
    let mut registry = registry_with(Arc::new(TestComponent::default()));
    assert!(!registry.try_register("TEST", Arc::new(TestComponent::default())));
    assert!(registry.try_register("other", Arc::new(TestComponent::default())));
}

#[test]
fn test_resolve_caches_by_normalized_uri() {
    let component = Arc::new(TestComponent::default());
    let components = registry_with(Arc::clone(&component));
    let endpoints = EndpointRegistry::new();

    let a = endpoints.resolve(&components, "test:x?size=1").unwrap();
    let b = endpoints.resolve(&components, "test://x?size=1").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(component.created.load(Ordering::SeqCst), 1);
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints.uris(), vec!["test:x?size=1".to_string()]);
    assert!(endpoints.get("test:x?size=1").is_some());
}

#[test]
fn test_resolve_unknown_scheme() {
    let components = registry_with(Arc::new(TestComponent::default()));
    let endpoints = EndpointRegistry::new();
    let err = endpoints.resolve(&components, "kafka:topic").err().unwrap();
    assert!(matches!(err, EndpointError::UnknownScheme { .. }));
    assert!(err.to_string().contains("available: [test]"));
    assert!(endpoints.is_empty());
}

#[test]
fn test_resolve_unknown_parameter_not_cached() {
    let components = registry_with(Arc::new(TestComponent::default()));
    let endpoints = EndpointRegistry::new();
    let err = endpoints.resolve(&components, "test:x?bogus=1").err().unwrap();
    assert!(matches!(err, EndpointError::UnknownParameters { .. }));
    assert!(endpoints.is_empty());
}

#[test]
fn test_default_consumer_not_supported() {
    let components = registry_with(Arc::new(TestComponent::default()));
    let endpoints = EndpointRegistry::new();
    let endpoint = endpoints.resolve(&components, "test:x").unwrap();
    let processor: Arc<dyn Processor> = Arc::new(TestProducer { uri: "p".into() });
    let err = endpoint.create_consumer(processor).err().unwrap();
    assert!(matches!(err, EndpointError::ConsumerNotSupported { .. }));
}

#[tokio::test]
async fn test_producer_processes_exchange() {
    let components = registry_with(Arc::new(TestComponent::default()));
    let endpoints = EndpointRegistry::new();
    let producer = endpoints
        .resolve(&components, "test:x")
        .unwrap()
        .create_producer()
        .unwrap();

    let mut exchange = Exchange::with_body("b");
    producer.process(&mut exchange).await.unwrap();
    assert_eq!(producer.endpoint_uri(), "test:x");
    assert_eq!(
        exchange.message().header("visited").and_then(|v| v.as_str()),
        Some("test:x")
    );
}
