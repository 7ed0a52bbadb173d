//! Aggregator - Correlate exchanges and emit them as one
//!
//! Exchanges are grouped by a correlation expression. Each group is folded
//! with an [`AggregationStrategy`]; when the group reaches the completion
//! size or the completion predicate matches the aggregate, the aggregate is
//! sent through the output processor and the group is dropped.
//!
//! The incoming exchange continues the route unchanged. A failure of the
//! output processor is recorded on the exchange that completed the group.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use switchyard_exchange::properties::{AGGREGATED_CORRELATION_KEY, AGGREGATED_SIZE};
use switchyard_exchange::{Exchange, ExchangeError, ProcessFuture, ProcessResult, Processor};
use tracing::debug;

use crate::aggregation::AggregationStrategy;
use crate::language::{Expression, Predicate, value_to_string};
use crate::pipeline::invoke;

/// Aggregator counters
#[derive(Debug, Default)]
pub struct AggregatorMetrics {
    /// Exchanges folded into a group
    pub received: AtomicU64,
    /// Groups completed and emitted
    pub completed: AtomicU64,
}

struct Group {
    aggregate: Exchange,
    size: usize,
}

/// Stateful correlating aggregator
pub struct Aggregator {
    correlation: Expression,
    strategy: Arc<dyn AggregationStrategy>,
    completion_size: Option<usize>,
    completion_predicate: Option<Predicate>,
    output: Box<dyn Processor>,
    groups: Mutex<HashMap<String, Group>>,
    metrics: AggregatorMetrics,
}

impl Aggregator {
    /// Create an aggregator without completion conditions
    ///
    /// Set at least one of [`with_completion_size`](Self::with_completion_size)
    /// or [`with_completion_predicate`](Self::with_completion_predicate).
    pub fn new(
        correlation: Expression,
        strategy: Arc<dyn AggregationStrategy>,
        output: Box<dyn Processor>,
    ) -> Self {
        Self {
            correlation,
            strategy,
            completion_size: None,
            completion_predicate: None,
            output,
            groups: Mutex::new(HashMap::new()),
            metrics: AggregatorMetrics::default(),
        }
    }

    /// Complete a group after `size` exchanges
    pub fn with_completion_size(mut self, size: usize) -> Self {
        self.completion_size = Some(size.max(1));
        self
    }

    /// Complete a group when the aggregate matches
    pub fn with_completion_predicate(mut self, predicate: Predicate) -> Self {
        self.completion_predicate = Some(predicate);
        self
    }

    /// Number of groups waiting for completion
    pub fn pending_groups(&self) -> usize {
        self.groups.lock().len()
    }

    /// Get metrics
    pub fn metrics(&self) -> &AggregatorMetrics {
        &self.metrics
    }

    /// Fold the exchange into its group, returning the aggregate on completion
    fn fold(&self, key: &str, exchange: &Exchange) -> ProcessResult<Option<(Exchange, usize)>> {
        let mut groups = self.groups.lock();
        let (old, size) = match groups.remove(key) {
            Some(group) => (Some(group.aggregate), group.size),
            None => (None, 0),
        };
        let aggregate = self.strategy.aggregate(old, exchange.copy());
        let size = size + 1;

        let by_size = self.completion_size.is_some_and(|limit| size >= limit);
        let complete = match &self.completion_predicate {
            Some(predicate) if !by_size => predicate.matches(&aggregate),
            _ => Ok(by_size),
        };

        match complete {
            Ok(true) => Ok(Some((aggregate, size))),
            Ok(false) => {
                groups.insert(key.to_string(), Group { aggregate, size });
                Ok(None)
            }
            Err(error) => {
                groups.insert(key.to_string(), Group { aggregate, size });
                Err(error)
            }
        }
    }
}

impl Processor for Aggregator {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let value = self.correlation.evaluate(exchange)?;
            if value.is_null() {
                return Err(ExchangeError::expression(format!(
                    "no correlation key for aggregator: {:?}",
                    self.correlation
                )));
            }
            let key = value_to_string(&value);
            self.metrics.received.fetch_add(1, Ordering::Relaxed);

            let Some((mut aggregate, size)) = self.fold(&key, exchange)? else {
                return Ok(());
            };

            self.metrics.completed.fetch_add(1, Ordering::Relaxed);
            aggregate.set_property(AGGREGATED_SIZE, size as u64);
            aggregate.set_property(AGGREGATED_CORRELATION_KEY, key.as_str());
            debug!(
                exchange_id = %exchange.id(),
                correlation_key = %key,
                size,
                strategy = self.strategy.name(),
                "aggregation complete"
            );

            invoke(self.output.as_ref(), &mut aggregate).await;
            aggregate.handover_completions(exchange);
            if let Some(error) = aggregate.take_exception() {
                exchange.set_exception(error);
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "aggregate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use switchyard_exchange::Body;

    use crate::FnProcessor;
    use crate::aggregation::{GroupedBodies, StringConcat};
    use crate::language::{body, header};

    fn collector(out: Arc<Mutex<Vec<Exchange>>>) -> Box<dyn Processor> {
        Box::new(FnProcessor::new(move |ex| {
            out.lock().push(ex.copy());
            Ok(())
        }))
    }

    fn keyed(key: &str, body: &str) -> Exchange {
        let mut exchange = Exchange::with_body(body);
        exchange.message_mut().set_header("key", key);
        exchange
    }

    #[tokio::test]
    async fn test_completion_size_per_key() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let aggregator = Aggregator::new(
            header("key"),
            Arc::new(GroupedBodies),
            collector(Arc::clone(&out)),
        )
        .with_completion_size(2);

        for (key, text) in [("a", "1"), ("b", "2"), ("a", "3")] {
            aggregator.process(&mut keyed(key, text)).await.unwrap();
        }

        let emitted = out.lock();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].message().body(), &Body::Json(json!(["1", "3"])));
        assert_eq!(emitted[0].property(AGGREGATED_SIZE), Some(&json!(2)));
        assert_eq!(emitted[0].property(AGGREGATED_CORRELATION_KEY), Some(&json!("a")));
        assert_eq!(aggregator.pending_groups(), 1);
    }

    #[tokio::test]
    async fn test_completion_predicate() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let aggregator = Aggregator::new(
            header("key"),
            Arc::new(StringConcat::new("+")),
            collector(Arc::clone(&out)),
        )
        .with_completion_predicate(body().contains("end"));

        for text in ["a", "b", "end"] {
            aggregator.process(&mut keyed("k", text)).await.unwrap();
        }
        assert_eq!(out.lock()[0].message().body().as_str(), Some("a+b+end"));
        assert_eq!(aggregator.pending_groups(), 0);
        assert_eq!(aggregator.metrics().completed.load(Ordering::Relaxed), 1);
        assert_eq!(aggregator.metrics().received.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_incoming_exchange_continues_unchanged() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let aggregator = Aggregator::new(
            header("key"),
            Arc::new(GroupedBodies),
            collector(Arc::clone(&out)),
        )
        .with_completion_size(1);
        let mut exchange = keyed("k", "payload");
        aggregator.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.message().body().as_str(), Some("payload"));
        assert_eq!(out.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_output_failure_reaches_trigger() {
        let aggregator = Aggregator::new(
            header("key"),
            Arc::new(GroupedBodies),
            Box::new(FnProcessor::new(|_| Err(ExchangeError::failed("sink down")))),
        )
        .with_completion_size(1);
        let mut exchange = keyed("k", "x");
        aggregator.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.exception(), Some(&ExchangeError::failed("sink down")));
    }

    #[tokio::test]
    async fn test_missing_correlation_key() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let aggregator = Aggregator::new(
            header("key"),
            Arc::new(GroupedBodies),
            collector(Arc::clone(&out)),
        )
        .with_completion_size(2);
        let err = aggregator
            .process(&mut Exchange::with_body("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no correlation key"));
    }
}
