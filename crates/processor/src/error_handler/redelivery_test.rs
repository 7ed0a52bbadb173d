//! Tests for redelivery

use super::*;
use std::sync::atomic::AtomicUsize;

use serde_json::Value;

use crate::FnProcessor;
use crate::language::header;

/// Fails the first `failures` calls, then succeeds
fn flaky(calls: Arc<AtomicUsize>, failures: usize) -> Box<dyn Processor> {
    Box::new(FnProcessor::new(move |_| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            Err(ExchangeError::failed(format!("attempt {n}")))
        } else {
            Ok(())
        }
    }))
}

fn fast(max: u32) -> RedeliveryPolicy {
    RedeliveryPolicy::new(max, Duration::ZERO)
}

#[test]
fn test_fixed_delay() {
    let policy = RedeliveryPolicy::new(3, Duration::from_millis(100));
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(3), Duration::from_millis(100));
}

#[test]
fn test_exponential_backoff_is_capped() {
    let policy = RedeliveryPolicy::new(10, Duration::from_millis(100))
        .with_exponential_backoff(2.0, Duration::from_millis(500));
    assert_eq!(policy.delay_for(1), Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    assert_eq!(policy.delay_for(40), Duration::from_millis(500));
}

#[test]
fn test_default_policy_disabled() {
    let policy = RedeliveryPolicy::default();
    assert!(!policy.is_enabled());
    let mut exchange = Exchange::default();
    exchange.set_exception(ExchangeError::failed("x"));
    assert!(!policy.should_redeliver(&exchange, 1));
}

#[tokio::test]
async fn test_recovers_within_budget() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::new(AtomicU64::new(0));
    let channel = RedeliveryChannel::new(fast(3), flaky(Arc::clone(&calls), 2))
        .with_counter(Arc::clone(&counter));
    let mut exchange = Exchange::default();
    channel.process(&mut exchange).await.unwrap();

    assert!(!exchange.is_failed());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(counter.load(Ordering::Relaxed), 2);
    assert_eq!(exchange.message().header(REDELIVERY_COUNTER), Some(&Value::from(2)));
    assert_eq!(exchange.message().header(REDELIVERED), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_exhausted_wraps_last_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let channel = RedeliveryChannel::new(fast(2), flaky(Arc::clone(&calls), usize::MAX));
    let mut exchange = Exchange::default();
    channel.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match exchange.exception() {
        Some(ExchangeError::RedeliveryExhausted { attempts, cause }) => {
            assert_eq!(*attempts, 2);
            assert_eq!(**cause, ExchangeError::failed("attempt 2"));
        }
        other => panic!("unexpected exception: {other:?}"),
    }
}

#[tokio::test]
async fn test_no_redelivery_keeps_plain_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let channel = RedeliveryChannel::new(fast(0), flaky(Arc::clone(&calls), 1));
    let mut exchange = Exchange::default();
    channel.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(exchange.exception(), Some(&ExchangeError::failed("attempt 0")));
    assert!(!exchange.message().has_header(REDELIVERED));
}

#[tokio::test]
async fn test_retry_while_limits_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let policy = fast(5).with_retry_while(header(REDELIVERY_COUNTER).is_less_than(2).or(
        header(REDELIVERY_COUNTER).exists().negate(),
    ));
    let channel = RedeliveryChannel::new(policy, flaky(Arc::clone(&calls), usize::MAX));
    let mut exchange = Exchange::default();
    channel.process(&mut exchange).await.unwrap();

    // First attempt plus redeliveries 1 and 2
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(exchange.is_failed());
}

#[tokio::test]
async fn test_cancelled_is_not_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let child = FnProcessor::new(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Err(ExchangeError::cancelled("shutdown"))
    });
    let channel = RedeliveryChannel::new(fast(3), Box::new(child));
    let mut exchange = Exchange::default();
    channel.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(exchange.exception().is_some_and(ExchangeError::is_cancelled));
}

#[tokio::test]
async fn test_nested_channels_do_not_multiply_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = RedeliveryChannel::new(fast(2), flaky(Arc::clone(&calls), usize::MAX));
    let outer = RedeliveryChannel::new(fast(2), Box::new(inner));
    let mut exchange = Exchange::default();
    outer.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let Some(ExchangeError::RedeliveryExhausted { attempts, cause }) = exchange.exception() else {
        panic!("expected exhausted redelivery");
    };
    assert_eq!(*attempts, 2);
    assert!(!cause.is_redelivery_exhausted());
}

#[tokio::test]
async fn test_name_is_child_name() {
    let channel = RedeliveryChannel::new(fast(1), Box::new(crate::control::NoopProcessor::new()));
    assert_eq!(channel.name(), "noop");
}
