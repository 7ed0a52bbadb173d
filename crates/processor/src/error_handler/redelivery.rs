//! Redelivery - Retry a failed step in place

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use switchyard_exchange::properties::{REDELIVERED, REDELIVERY_COUNTER};
use switchyard_exchange::{Exchange, ExchangeError, ProcessFuture, Processor};
use tracing::{debug, warn};

use crate::language::Predicate;
use crate::pipeline::invoke;

#[cfg(test)]
#[path = "redelivery_test.rs"]
mod tests;

/// Default delay between redeliveries
pub const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(1000);

/// Default cap for exponential backoff
pub const DEFAULT_MAXIMUM_REDELIVERY_DELAY: Duration = Duration::from_secs(60);

/// Default backoff multiplier
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How often and how fast a failed step is retried
#[derive(Debug, Clone)]
pub struct RedeliveryPolicy {
    /// Retries after the first attempt (0 disables redelivery)
    pub maximum_redeliveries: u32,
    /// Delay before the first retry
    pub redelivery_delay: Duration,
    /// Multiply the delay for each further retry
    pub use_exponential_backoff: bool,
    /// Backoff factor
    pub backoff_multiplier: f64,
    /// Upper bound for the backoff delay
    pub maximum_redelivery_delay: Duration,
    /// Only retry while this holds for the failed exchange
    pub retry_while: Option<Predicate>,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            maximum_redeliveries: 0,
            redelivery_delay: DEFAULT_REDELIVERY_DELAY,
            use_exponential_backoff: false,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            maximum_redelivery_delay: DEFAULT_MAXIMUM_REDELIVERY_DELAY,
            retry_while: None,
        }
    }
}

impl RedeliveryPolicy {
    /// Policy retrying `maximum_redeliveries` times with a fixed delay
    pub fn new(maximum_redeliveries: u32, redelivery_delay: Duration) -> Self {
        Self {
            maximum_redeliveries,
            redelivery_delay,
            ..Self::default()
        }
    }

    /// Enable exponential backoff
    pub fn with_exponential_backoff(mut self, multiplier: f64, maximum: Duration) -> Self {
        self.use_exponential_backoff = true;
        self.backoff_multiplier = multiplier;
        self.maximum_redelivery_delay = maximum;
        self
    }

    /// Only retry while the predicate holds
    pub fn with_retry_while(mut self, predicate: Predicate) -> Self {
        self.retry_while = Some(predicate);
        self
    }

    /// Whether redelivery is enabled at all
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.maximum_redeliveries > 0
    }

    /// Delay before redelivery attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff || attempt <= 1 {
            return self.redelivery_delay.min(self.cap());
        }
        let exponent = (attempt - 1).min(32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let millis = self.redelivery_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis.min(self.cap().as_millis() as f64) as u64)
    }

    fn cap(&self) -> Duration {
        if self.use_exponential_backoff {
            self.maximum_redelivery_delay
        } else {
            Duration::MAX
        }
    }

    /// Whether attempt `attempt` (1-based) should be made for this failure
    pub fn should_redeliver(&self, exchange: &Exchange, attempt: u32) -> bool {
        if attempt > self.maximum_redeliveries {
            return false;
        }
        // A nested route already spent its own redeliveries on this failure
        if exchange
            .exception()
            .is_some_and(|e| e.is_cancelled() || e.is_redelivery_exhausted())
        {
            return false;
        }
        match &self.retry_while {
            None => true,
            Some(predicate) => match predicate.matches(exchange) {
                Ok(retry) => retry,
                Err(error) => {
                    warn!(exchange_id = %exchange.id(), %error, "retry_while evaluation failed");
                    false
                }
            },
        }
    }
}

/// Retries its child according to a policy
///
/// Between attempts the exception is cleared and the `RedeliveryCounter`
/// and `Redelivered` headers are set. When retries run out the last failure
/// is wrapped in [`ExchangeError::RedeliveryExhausted`].
pub struct RedeliveryChannel {
    policy: RedeliveryPolicy,
    child: Box<dyn Processor>,
    counter: Option<Arc<AtomicU64>>,
}

impl RedeliveryChannel {
    /// Wrap a processor
    pub fn new(policy: RedeliveryPolicy, child: Box<dyn Processor>) -> Self {
        Self {
            policy,
            child,
            counter: None,
        }
    }

    /// Count every redelivery attempt into a shared counter
    pub fn with_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Get the policy
    pub fn policy(&self) -> &RedeliveryPolicy {
        &self.policy
    }
}

impl Processor for RedeliveryChannel {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let mut attempt = 0u32;
            loop {
                invoke(self.child.as_ref(), exchange).await;
                if !exchange.is_failed() || !self.policy.should_redeliver(exchange, attempt + 1) {
                    break;
                }

                attempt += 1;
                let delay = self.policy.delay_for(attempt);
                if let Some(counter) = &self.counter {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                debug!(
                    exchange_id = %exchange.id(),
                    step = self.child.name(),
                    attempt,
                    max = self.policy.maximum_redeliveries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = ?exchange.exception(),
                    "redelivering"
                );

                exchange.take_exception();
                let message = exchange.message_mut();
                message.set_header(REDELIVERY_COUNTER, attempt);
                message.set_header(REDELIVERED, true);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            if attempt > 0
                && let Some(cause) = exchange.take_exception()
            {
                exchange.set_exception(match cause {
                    ExchangeError::Cancelled(_) => cause,
                    cause => ExchangeError::RedeliveryExhausted {
                        attempts: attempt,
                        cause: Box::new(cause),
                    },
                });
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        self.child.name()
    }
}
