//! Load balancer - Pick one branch per exchange
//!
//! | Policy | Behavior |
//! |--------|----------|
//! | `round_robin` | Branches in turn |
//! | `random` | Uniformly random branch |
//! | `failover` | First branch; on failure the next one, up to a cap |

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use switchyard_exchange::{Exchange, ProcessFuture, Processor};
use tracing::debug;

use crate::pipeline::invoke;

/// Branch selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancePolicy {
    /// Branches in turn
    RoundRobin,
    /// Uniformly random branch
    Random,
    /// Try branches in order until one succeeds
    Failover {
        /// Maximum number of attempts (defaults to the branch count)
        max_attempts: Option<usize>,
        /// Start at the next branch in turn instead of the first
        round_robin: bool,
    },
}

/// Distributes exchanges over branches
pub struct LoadBalancer {
    policy: LoadBalancePolicy,
    branches: Vec<Box<dyn Processor>>,
    counter: AtomicUsize,
}

impl LoadBalancer {
    /// Create a balancer
    pub fn new(policy: LoadBalancePolicy, branches: Vec<Box<dyn Processor>>) -> Self {
        Self {
            policy,
            branches,
            counter: AtomicUsize::new(0),
        }
    }

    /// Selection policy
    pub fn policy(&self) -> LoadBalancePolicy {
        self.policy
    }

    fn next_index(&self) -> usize {
        self.counter.fetch_add(1, Ordering::Relaxed) % self.branches.len()
    }

    async fn failover(&self, exchange: &mut Exchange, max_attempts: Option<usize>, round_robin: bool) {
        let count = self.branches.len();
        let attempts = max_attempts.unwrap_or(count).max(1);
        let start = if round_robin { self.next_index() } else { 0 };
        let snapshot = exchange.copy();

        for attempt in 0..attempts {
            let index = (start + attempt) % count;
            let mut candidate = snapshot.copy();
            invoke(self.branches[index].as_ref(), &mut candidate).await;

            let failed = candidate.is_failed();
            let last = attempt + 1 == attempts;
            if !failed || last {
                exchange.merge_result(candidate);
                return;
            }
            debug!(
                exchange_id = %exchange.id(),
                branch = index,
                error = ?candidate.exception(),
                "failing over to next branch"
            );
            candidate.handover_completions(exchange);
        }
    }
}

impl Processor for LoadBalancer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            if self.branches.is_empty() {
                return Ok(());
            }
            match self.policy {
                LoadBalancePolicy::RoundRobin => {
                    let index = self.next_index();
                    self.branches[index].process(exchange).await
                }
                LoadBalancePolicy::Random => {
                    let index = rand::rng().random_range(0..self.branches.len());
                    self.branches[index].process(exchange).await
                }
                LoadBalancePolicy::Failover {
                    max_attempts,
                    round_robin,
                } => {
                    self.failover(exchange, max_attempts, round_robin).await;
                    Ok(())
                }
            }
        })
    }

    fn name(&self) -> &'static str {
        "load_balance"
    }
}
