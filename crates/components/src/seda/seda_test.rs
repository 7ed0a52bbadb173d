//! Tests for the seda component

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use switchyard_endpoint::ComponentRegistry;
use switchyard_exchange::ExchangePattern;

/// Upper-cases the body and counts calls
struct Upper(Arc<AtomicUsize>);

impl Processor for Upper {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            self.0.fetch_add(1, Ordering::SeqCst);
            let text = exchange.message().body().to_text()?.to_uppercase();
            exchange.message_mut().set_body(text);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "upper"
    }
}

/// Never finishes
struct Stall;

impl Processor for Stall {
    fn process<'a>(&'a self, _exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(std::future::pending())
    }

    fn name(&self) -> &'static str {
        "stall"
    }
}

/// Stands in for a consuming route: counts, then completes the exchange
struct SlowRoute(Arc<AtomicUsize>);

impl Processor for SlowRoute {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
            exchange.complete();
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "slow-route"
    }
}

fn registry(component: SedaComponent) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register("seda", Arc::new(component));
    registry
}

fn endpoint(registry: &ComponentRegistry, uri: &str) -> Arc<dyn Endpoint> {
    registry
        .create_endpoint(&EndpointUri::parse(uri).unwrap())
        .unwrap()
}

fn seda(endpoint: &Arc<dyn Endpoint>) -> &SedaEndpoint {
    endpoint.as_any().downcast_ref::<SedaEndpoint>().unwrap()
}

async fn wait_for(counter: &AtomicUsize, expected: usize) {
    for _ in 0..200 {
        if counter.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("counter stuck at {}", counter.load(Ordering::SeqCst));
}

#[test]
fn test_parameters() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(
        &registry,
        "seda:orders?size=10&concurrentConsumers=3&blockWhenFull=true&timeout=250&waitForTaskToComplete=Always",
    );
    let seda = seda(&endpoint);
    assert_eq!(seda.queue_name(), "orders");
    assert_eq!(seda.size(), 10);
    assert_eq!(seda.concurrent_consumers(), 3);
    assert!(seda.block_when_full());
    assert_eq!(seda.timeout(), Duration::from_millis(250));
    assert_eq!(seda.wait_for_task_to_complete(), WaitForTaskToComplete::Always);
}

#[test]
fn test_defaults_follow_component() {
    let registry = registry(SedaComponent::with_default_size(7));
    let endpoint = endpoint(&registry, "seda:a");
    let seda = seda(&endpoint);
    assert_eq!(seda.size(), 7);
    assert_eq!(seda.concurrent_consumers(), 1);
    assert_eq!(seda.timeout(), DEFAULT_REPLY_TIMEOUT);
    assert_eq!(seda.wait_for_task_to_complete(), WaitForTaskToComplete::IfReplyExpected);
}

#[test]
fn test_invalid_parameters() {
    let registry = registry(SedaComponent::new());
    for uri in [
        "seda:a?size=0",
        "seda:a?concurrentConsumers=0",
        "seda:a?waitForTaskToComplete=Sometimes",
        "seda:a?sise=10",
    ] {
        assert!(
            registry.create_endpoint(&EndpointUri::parse(uri).unwrap()).is_err(),
            "{uri} should be rejected"
        );
    }
}

#[test]
fn test_queue_shared_by_name() {
    let component = SedaComponent::new();
    let registry = registry(component);
    let a = endpoint(&registry, "seda:q?size=5");
    let b = endpoint(&registry, "seda:q?concurrentConsumers=2");
    assert!(Arc::ptr_eq(&seda(&a).queue, &seda(&b).queue));

    let err = registry
        .create_endpoint(&EndpointUri::parse("seda:q?size=6").unwrap())
        .err()
        .unwrap();
    assert!(err.to_string().contains("already exists with size 5"));
}

#[tokio::test]
async fn test_in_only_returns_immediately() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:a");
    let calls = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(Upper(Arc::clone(&calls))))
        .unwrap();
    consumer.start().await.unwrap();

    let producer = endpoint.create_producer().unwrap();
    let mut exchange = Exchange::with_body("hello");
    producer.process(&mut exchange).await.unwrap();

    // The sender keeps its own copy untouched
    assert_eq!(exchange.message().body().as_str(), Some("hello"));
    wait_for(&calls, 1).await;
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_in_only_callbacks_follow_the_queued_copy() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:a");
    let processed = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(SlowRoute(Arc::clone(&processed))))
        .unwrap();
    consumer.start().await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let (f, s, p) = (Arc::clone(&fired), Arc::clone(&seen), Arc::clone(&processed));
    let mut exchange = Exchange::with_body("hello");
    exchange.add_on_completion(move |_| {
        s.store(p.load(Ordering::SeqCst), Ordering::SeqCst);
        f.fetch_add(1, Ordering::SeqCst);
    });

    let producer = endpoint.create_producer().unwrap();
    producer.process(&mut exchange).await.unwrap();
    assert_eq!(exchange.pending_completions(), 0);
    // Completing the sender now must not fire anything
    exchange.complete();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    wait_for(&fired, 1).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_in_out_waits_for_reply() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:a");
    let calls = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(Upper(Arc::clone(&calls))))
        .unwrap();
    consumer.start().await.unwrap();

    let producer = endpoint.create_producer().unwrap();
    let mut exchange = Exchange::with_message(
        ExchangePattern::InOut,
        switchyard_exchange::Message::with_body("hello"),
    );
    let id = exchange.id().clone();
    producer.process(&mut exchange).await.unwrap();

    assert_eq!(exchange.message().body().as_str(), Some("HELLO"));
    assert_eq!(exchange.id(), &id);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_reply_timeout() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:slow?timeout=20&waitForTaskToComplete=Always");
    let consumer = endpoint.create_consumer(Arc::new(Stall)).unwrap();
    consumer.start().await.unwrap();

    let producer = endpoint.create_producer().unwrap();
    let mut exchange = Exchange::with_body("x");
    let err = producer.process(&mut exchange).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Timeout { millis: 20, .. }));
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_full_queue_rejects() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:tiny?size=2");
    let producer = endpoint.create_producer().unwrap();

    for _ in 0..2 {
        producer.process(&mut Exchange::with_body("x")).await.unwrap();
    }
    assert_eq!(seda(&endpoint).queue_len(), 2);

    let err = producer
        .process(&mut Exchange::with_body("x"))
        .await
        .unwrap_err();
    assert_eq!(err, ExchangeError::queue_full("tiny"));
}

#[tokio::test]
async fn test_rejected_send_keeps_callbacks() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:tiny?size=1");
    let producer = endpoint.create_producer().unwrap();
    producer.process(&mut Exchange::with_body("x")).await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&fired);
    let mut exchange = Exchange::with_body("y");
    exchange.add_on_completion(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let err = producer.process(&mut exchange).await.unwrap_err();
    assert_eq!(err, ExchangeError::queue_full("tiny"));
    assert_eq!(exchange.pending_completions(), 1);

    exchange.complete();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_block_when_full_waits_for_room() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:tiny?size=1&blockWhenFull=true");
    let producer = endpoint.create_producer().unwrap();
    producer.process(&mut Exchange::with_body("1")).await.unwrap();

    let blocked = tokio::time::timeout(
        Duration::from_millis(20),
        producer.process(&mut Exchange::with_body("2")),
    )
    .await;
    assert!(blocked.is_err(), "send should wait while the queue is full");

    let calls = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(Upper(Arc::clone(&calls))))
        .unwrap();
    consumer.start().await.unwrap();
    producer.process(&mut Exchange::with_body("3")).await.unwrap();
    wait_for(&calls, 2).await;
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_consumers_share_queue() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:work?concurrentConsumers=4");
    let calls = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(Upper(Arc::clone(&calls))))
        .unwrap();
    consumer.start().await.unwrap();

    let producer = endpoint.create_producer().unwrap();
    for i in 0..20 {
        producer
            .process(&mut Exchange::with_body(format!("m{i}")))
            .await
            .unwrap();
    }
    wait_for(&calls, 20).await;
    assert_eq!(calls.load(Ordering::SeqCst), 20);
    consumer.stop().await.unwrap();
}

#[tokio::test]
async fn test_stopped_consumer_leaves_messages_queued() {
    let registry = registry(SedaComponent::new());
    let endpoint = endpoint(&registry, "seda:a");
    let calls = Arc::new(AtomicUsize::new(0));
    let consumer = endpoint
        .create_consumer(Arc::new(Upper(Arc::clone(&calls))))
        .unwrap();
    consumer.start().await.unwrap();
    consumer.stop().await.unwrap();
    tokio::task::yield_now().await;

    let producer = endpoint.create_producer().unwrap();
    producer.process(&mut Exchange::with_body("x")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(seda(&endpoint).queue_len(), 1);

    // Restart drains it
    consumer.start().await.unwrap();
    wait_for(&calls, 1).await;
    consumer.stop().await.unwrap();
}

#[test]
fn test_wait_for_task_to_complete_parse() {
    assert_eq!(
        "always".parse::<WaitForTaskToComplete>().unwrap(),
        WaitForTaskToComplete::Always
    );
    assert_eq!(
        "Never".parse::<WaitForTaskToComplete>().unwrap(),
        WaitForTaskToComplete::Never
    );
    assert!("maybe".parse::<WaitForTaskToComplete>().is_err());
    assert_eq!(WaitForTaskToComplete::IfReplyExpected.to_string(), "IfReplyExpected");
}
