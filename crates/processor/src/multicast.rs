//! Multicast - Same exchange to several branches
//!
//! Every branch receives its own correlated copy. Results are aggregated in
//! branch order; the default keeps the latest reply.

use std::sync::Arc;

use switchyard_exchange::properties::MULTICAST_INDEX;
use switchyard_exchange::{Exchange, ProcessFuture, Processor};
use tracing::debug;

use crate::aggregation::{AggregationStrategy, UseLatest};
use crate::fanout::{FanOutOptions, merge_results, run_each};

/// Sends copies of the exchange to every branch
pub struct Multicast {
    branches: Vec<Box<dyn Processor>>,
    strategy: Arc<dyn AggregationStrategy>,
    options: FanOutOptions,
}

impl Multicast {
    /// Create a multicast over branches
    pub fn new(branches: Vec<Box<dyn Processor>>) -> Self {
        Self {
            branches,
            strategy: Arc::new(UseLatest),
            options: FanOutOptions::default(),
        }
    }

    /// Aggregation strategy for the replies
    pub fn with_strategy(mut self, strategy: Arc<dyn AggregationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Execution options
    pub fn with_options(mut self, options: FanOutOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of branches
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Check if there are no branches
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

impl Processor for Multicast {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let jobs: Vec<(&dyn Processor, Exchange)> = self
                .branches
                .iter()
                .enumerate()
                .map(|(index, branch)| {
                    let mut copy = exchange.correlated_copy();
                    copy.set_property(MULTICAST_INDEX, index);
                    (branch.as_ref(), copy)
                })
                .collect();

            let results = run_each(jobs, self.options).await;
            debug!(
                exchange_id = %exchange.id(),
                branches = self.branches.len(),
                completed = results.len(),
                "multicast finished"
            );
            merge_results(exchange, results, self.strategy.as_ref());
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "multicast"
    }
}
