//! Shared fan-out machinery for the splitter and multicast
//!
//! Runs a batch of sub-exchanges sequentially or with bounded concurrency,
//! then folds the results back into the parent.

use futures_util::future::BoxFuture;
use futures_util::{StreamExt, stream};
use switchyard_exchange::{Exchange, Processor};

use crate::aggregation::{AggregationStrategy, aggregate_all};
use crate::pipeline::invoke;

/// Default bound on concurrent sub-exchanges in parallel mode
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Execution options shared by splitter and multicast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutOptions {
    /// Run sub-exchanges concurrently
    pub parallel_processing: bool,
    /// Concurrency bound when parallel
    pub max_concurrency: usize,
    /// Stop launching sub-exchanges after the first failure
    pub stop_on_exception: bool,
}

impl Default for FanOutOptions {
    fn default() -> Self {
        Self {
            parallel_processing: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            stop_on_exception: false,
        }
    }
}

impl FanOutOptions {
    /// Enable parallel processing
    pub fn parallel(mut self, max_concurrency: usize) -> Self {
        self.parallel_processing = true;
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Enable stop-on-exception
    pub fn stop_on_exception(mut self) -> Self {
        self.stop_on_exception = true;
        self
    }
}

/// Run every job, returning results in job order
///
/// With `stop_on_exception` the result list ends at the first failed
/// sub-exchange; in parallel mode jobs still in flight are dropped.
pub(crate) async fn run_each(
    jobs: Vec<(&dyn Processor, Exchange)>,
    options: FanOutOptions,
) -> Vec<Exchange> {
    let mut results = Vec::with_capacity(jobs.len());

    if !options.parallel_processing {
        for (processor, mut sub) in jobs {
            invoke(processor, &mut sub).await;
            let failed = sub.is_failed();
            results.push(sub);
            if failed && options.stop_on_exception {
                break;
            }
        }
        return results;
    }

    // Futures are lazy: `buffered` still polls at most `max_concurrency` at once
    let pending: Vec<BoxFuture<'_, Exchange>> = jobs
        .into_iter()
        .map(|(processor, sub)| run_job(processor, sub))
        .collect();
    let mut running = stream::iter(pending).buffered(options.max_concurrency);

    while let Some(sub) = running.next().await {
        let failed = sub.is_failed();
        results.push(sub);
        if failed && options.stop_on_exception {
            break;
        }
    }
    results
}

/// One sub-exchange through its processor, boxed so the future's lifetime
/// is tied to the processor borrow
fn run_job<'p>(processor: &'p dyn Processor, mut sub: Exchange) -> BoxFuture<'p, Exchange> {
    Box::pin(async move {
        invoke(processor, &mut sub).await;
        sub
    })
}

/// Fold sub-exchange results into the parent
///
/// Callbacks of every sub-exchange move to the parent. Unless the strategy
/// keeps the original, the aggregate replaces the parent's result. The
/// first sub-exchange failure is propagated to the parent.
pub(crate) fn merge_results(
    parent: &mut Exchange,
    mut results: Vec<Exchange>,
    strategy: &dyn AggregationStrategy,
) {
    for sub in &mut results {
        sub.handover_completions(parent);
    }
    let first_failure = results.iter().find_map(|sub| sub.exception().cloned());

    if !strategy.keeps_original()
        && let Some(aggregated) = aggregate_all(strategy, results)
    {
        parent.merge_result(aggregated);
    }

    if let Some(error) = first_failure
        && !parent.is_failed()
    {
        parent.set_exception(error);
    }
}
