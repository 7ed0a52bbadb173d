//! Tests for the loop processor

use super::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use switchyard_exchange::{ExchangeError, Value};

use crate::FnProcessor;
use crate::language::{constant, header, property};

/// Appends "x" to the body and counts invocations
fn appender(calls: Arc<AtomicUsize>) -> Box<dyn Processor> {
    Box::new(FnProcessor::new(move |ex| {
        calls.fetch_add(1, Ordering::SeqCst);
        let text = format!("{}x", ex.message().body().to_text()?);
        ex.message_mut().set_body(text);
        Ok(())
    }))
}

#[tokio::test]
async fn test_count_without_copy_accumulates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lp = LoopProcessor::count(constant(3), appender(Arc::clone(&calls)));
    let mut exchange = Exchange::with_body("");
    lp.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(exchange.message().body().as_str(), Some("xxx"));
    assert_eq!(exchange.property(LOOP_SIZE), Some(&Value::from(3)));
    assert_eq!(exchange.property(LOOP_INDEX), Some(&Value::from(2)));
}

#[tokio::test]
async fn test_count_with_copy_isolates_iterations() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lp = LoopProcessor::count(constant(3), appender(Arc::clone(&calls))).with_copy(true);
    let mut exchange = Exchange::with_body("");
    let id = exchange.id().clone();
    lp.process(&mut exchange).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Each iteration started from the pre-loop body
    assert_eq!(exchange.message().body().as_str(), Some("x"));
    assert_eq!(exchange.property(LOOP_INDEX), Some(&Value::from(2)));
    assert_eq!(exchange.id(), &id);
}

#[tokio::test]
async fn test_count_from_header() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lp = LoopProcessor::count(header("times"), appender(Arc::clone(&calls)));
    let mut exchange = Exchange::with_body("");
    exchange.message_mut().set_header("times", "2");
    lp.process(&mut exchange).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_count_runs_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lp = LoopProcessor::count(constant(0), appender(Arc::clone(&calls)));
    let mut exchange = Exchange::with_body("");
    lp.process(&mut exchange).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_count_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lp = LoopProcessor::count(constant("many"), appender(calls));
    let mut exchange = Exchange::default();
    let err = lp.process(&mut exchange).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Expression(_)));
}

#[tokio::test]
async fn test_do_while() {
    let calls = Arc::new(AtomicUsize::new(0));
    let predicate = Predicate::custom(|ex| Ok(ex.message().body().to_text()?.len() < 4));
    let lp = LoopProcessor::do_while(predicate, appender(Arc::clone(&calls)));
    let mut exchange = Exchange::with_body("");
    lp.process(&mut exchange).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(exchange.message().body().as_str(), Some("xxxx"));
}

#[tokio::test]
async fn test_do_while_with_copy_sees_latest_result() {
    let calls = Arc::new(AtomicUsize::new(0));
    let predicate = property(LOOP_INDEX).is_less_than(2).or(property(LOOP_INDEX).exists().negate());
    let lp = LoopProcessor::do_while(predicate, appender(Arc::clone(&calls))).with_copy(true);
    let mut exchange = Exchange::with_body("");
    lp.process(&mut exchange).await.unwrap();
    // Runs for index 0, 1, 2; the result of index 2 fails the predicate
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(exchange.message().body().as_str(), Some("x"));
}

#[tokio::test]
async fn test_stops_on_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let failing = FnProcessor::new(move |_| {
        if c.fetch_add(1, Ordering::SeqCst) == 1 {
            Err(ExchangeError::failed("second iteration"))
        } else {
            Ok(())
        }
    });
    let lp = LoopProcessor::count(constant(5), Box::new(failing));
    let mut exchange = Exchange::default();
    lp.process(&mut exchange).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(exchange.exception(), Some(&ExchangeError::failed("second iteration")));
}

#[tokio::test]
async fn test_copy_mode_keeps_iteration_callbacks() {
    let fired = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&fired);
    let registering = FnProcessor::new(move |ex| {
        let f = Arc::clone(&f);
        ex.add_on_completion(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        Ok(())
    });
    let lp = LoopProcessor::count(constant(3), Box::new(registering)).with_copy(true);
    let mut exchange = Exchange::default();
    lp.process(&mut exchange).await.unwrap();
    assert_eq!(exchange.pending_completions(), 3);
    exchange.complete();
    assert_eq!(fired.load(Ordering::SeqCst), 3);
}
