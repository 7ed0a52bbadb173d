//! Filter - Continue only when a predicate holds

use std::sync::atomic::{AtomicU64, Ordering};

use switchyard_exchange::properties::FILTER_MATCHED;
use switchyard_exchange::{Exchange, ProcessFuture, Processor};

use crate::language::Predicate;

/// Counters for the filter
#[derive(Debug, Default)]
pub struct FilterMetrics {
    /// Exchanges that matched
    pub matched: AtomicU64,
    /// Exchanges that did not match
    pub rejected: AtomicU64,
}

/// Runs its child pipeline only for exchanges matching the predicate
///
/// Sets the `FilterMatched` property either way. Non-matching exchanges
/// continue after the filter block untouched.
pub struct FilterProcessor {
    predicate: Predicate,
    child: Box<dyn Processor>,
    metrics: FilterMetrics,
}

impl FilterProcessor {
    /// Create a filter around a child pipeline
    pub fn new(predicate: Predicate, child: Box<dyn Processor>) -> Self {
        Self {
            predicate,
            child,
            metrics: FilterMetrics::default(),
        }
    }

    /// Get filter metrics
    pub fn metrics(&self) -> &FilterMetrics {
        &self.metrics
    }
}

impl Processor for FilterProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let matched = self.predicate.matches(exchange)?;
            exchange.set_property(FILTER_MATCHED, matched);
            if matched {
                self.metrics.matched.fetch_add(1, Ordering::Relaxed);
                self.child.process(exchange).await
            } else {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        })
    }

    fn name(&self) -> &'static str {
        "filter"
    }
}
