//! Tests for the direct component

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use switchyard_endpoint::ComponentRegistry;

struct Counter(Arc<AtomicUsize>);

impl Processor for Counter {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
            exchange.message_mut().set_body("handled");
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "counter"
    }
}

fn endpoint(uri: &str) -> Arc<dyn Endpoint> {
    let mut registry = ComponentRegistry::new();
    registry.register("direct", Arc::new(DirectComponent::new()));
    registry
        .create_endpoint(&EndpointUri::parse(uri).unwrap())
        .unwrap()
}

#[tokio::test]
async fn test_send_without_consumer_fails() {
    let endpoint = endpoint("direct:a");
    let producer = endpoint.create_producer().unwrap();
    let mut exchange = Exchange::with_body("x");

    let err = producer.process(&mut exchange).await.unwrap_err();
    assert_eq!(err, ExchangeError::no_consumer("direct:a"));
}

#[tokio::test]
async fn test_send_runs_consumer_in_place() {
    let endpoint = endpoint("direct:a");
    let calls = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(Counter(Arc::clone(&calls))))
        .unwrap();
    consumer.start().await.unwrap();

    let producer = endpoint.create_producer().unwrap();
    let mut exchange = Exchange::with_body("x");
    producer.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(exchange.message().body().as_str(), Some("handled"));
}

#[tokio::test]
async fn test_stopped_consumer_is_detached() {
    let endpoint = endpoint("direct:a");
    let consumer = endpoint
        .create_consumer(Arc::new(Counter(Arc::new(AtomicUsize::new(0)))))
        .unwrap();
    consumer.start().await.unwrap();
    consumer.stop().await.unwrap();

    let direct = endpoint.as_any().downcast_ref::<DirectEndpoint>().unwrap();
    assert!(!direct.has_consumer());

    let producer = endpoint.create_producer().unwrap();
    let mut exchange = Exchange::default();
    assert!(producer.process(&mut exchange).await.is_err());
}

#[test]
fn test_single_consumer_per_name() {
    let endpoint = endpoint("direct:a");
    let first = endpoint
        .create_consumer(Arc::new(Counter(Arc::new(AtomicUsize::new(0)))))
        .unwrap();

    let err = endpoint
        .create_consumer(Arc::new(Counter(Arc::new(AtomicUsize::new(0)))))
        .err()
        .unwrap();
    assert!(err.to_string().contains("already has a consumer"));

    // Dropping the consumer frees the name
    drop(first);
    assert!(
        endpoint
            .create_consumer(Arc::new(Counter(Arc::new(AtomicUsize::new(0)))))
            .is_ok()
    );
}

#[test]
fn test_endpoint_name() {
    let endpoint = endpoint("direct://orders");
    let direct = endpoint.as_any().downcast_ref::<DirectEndpoint>().unwrap();
    assert_eq!(direct.name(), "orders");
    assert_eq!(endpoint.uri(), "direct:orders");
}
