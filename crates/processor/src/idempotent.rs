//! Idempotent consumer - Drop messages already seen
//!
//! The message id comes from an expression. An id is added to the
//! repository before the child runs and removed again if the child fails,
//! so a failed exchange can be retried.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use switchyard_exchange::properties::DUPLICATE_MESSAGE;
use switchyard_exchange::{Exchange, ExchangeError, ProcessFuture, Processor};
use tracing::debug;

use crate::language::{Expression, value_to_string};
use crate::pipeline::invoke;

/// Default capacity of [`MemoryIdempotentRepository`]
pub const DEFAULT_REPOSITORY_CAPACITY: usize = 1000;

/// Store of processed message ids
pub trait IdempotentRepository: Send + Sync {
    /// Add an id; returns false if it was already present
    fn add(&self, key: &str) -> bool;

    /// Check for an id
    fn contains(&self, key: &str) -> bool;

    /// Remove an id; returns true if it was present
    fn remove(&self, key: &str) -> bool;

    /// Forget every id
    fn clear(&self);
}

/// In-memory repository evicting the least recently used id
pub struct MemoryIdempotentRepository {
    cache: Mutex<LruCache<String, ()>>,
}

impl MemoryIdempotentRepository {
    /// Create a repository holding at most `capacity` ids
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of ids held
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether the repository is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for MemoryIdempotentRepository {
    fn default() -> Self {
        Self::new(DEFAULT_REPOSITORY_CAPACITY)
    }
}

impl IdempotentRepository for MemoryIdempotentRepository {
    fn add(&self, key: &str) -> bool {
        let mut cache = self.cache.lock();
        if cache.contains(key) {
            cache.promote(key);
            return false;
        }
        cache.put(key.to_string(), ());
        true
    }

    fn contains(&self, key: &str) -> bool {
        self.cache.lock().contains(key)
    }

    fn remove(&self, key: &str) -> bool {
        self.cache.lock().pop(key).is_some()
    }

    fn clear(&self) {
        self.cache.lock().clear();
    }
}

/// Idempotent consumer metrics
#[derive(Debug, Default)]
pub struct IdempotentMetrics {
    /// Exchanges passed to the child
    pub accepted: AtomicU64,
    /// Exchanges dropped as duplicates
    pub duplicates: AtomicU64,
}

/// Runs the child once per distinct message id
pub struct IdempotentConsumer {
    message_id: Expression,
    repository: Arc<dyn IdempotentRepository>,
    child: Box<dyn Processor>,
    skip_duplicate: bool,
    remove_on_failure: bool,
    metrics: IdempotentMetrics,
}

impl IdempotentConsumer {
    /// Create an idempotent consumer
    pub fn new(
        message_id: Expression,
        repository: Arc<dyn IdempotentRepository>,
        child: Box<dyn Processor>,
    ) -> Self {
        Self {
            message_id,
            repository,
            child,
            skip_duplicate: true,
            remove_on_failure: true,
            metrics: IdempotentMetrics::default(),
        }
    }

    /// Pass duplicates to the child (flagged with `DuplicateMessage`)
    pub fn with_skip_duplicate(mut self, skip: bool) -> Self {
        self.skip_duplicate = skip;
        self
    }

    /// Keep the id of a failed exchange
    pub fn with_remove_on_failure(mut self, remove: bool) -> Self {
        self.remove_on_failure = remove;
        self
    }

    /// Get metrics
    pub fn metrics(&self) -> &IdempotentMetrics {
        &self.metrics
    }
}

impl Processor for IdempotentConsumer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let value = self.message_id.evaluate(exchange)?;
            if value.is_null() {
                return Err(ExchangeError::expression(format!(
                    "no message id for idempotent consumer: {:?}",
                    self.message_id
                )));
            }
            let key = value_to_string(&value);

            if !self.repository.add(&key) {
                self.metrics.duplicates.fetch_add(1, Ordering::Relaxed);
                exchange.set_property(DUPLICATE_MESSAGE, true);
                debug!(exchange_id = %exchange.id(), message_id = %key, "duplicate message");
                if self.skip_duplicate {
                    return Ok(());
                }
                invoke(self.child.as_ref(), exchange).await;
                return Ok(());
            }

            self.metrics.accepted.fetch_add(1, Ordering::Relaxed);
            invoke(self.child.as_ref(), exchange).await;
            if exchange.is_failed() && self.remove_on_failure {
                self.repository.remove(&key);
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "idempotent_consumer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::FnProcessor;
    use crate::language::header;

    fn counting(calls: Arc<AtomicUsize>, fail: bool) -> Box<dyn Processor> {
        Box::new(FnProcessor::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(ExchangeError::failed("child failed"))
            } else {
                Ok(())
            }
        }))
    }

    fn with_id(id: &str) -> Exchange {
        let mut exchange = Exchange::with_body("x");
        exchange.message_mut().set_header("id", id);
        exchange
    }

    #[test]
    fn test_memory_repository_evicts_oldest() {
        let repo = MemoryIdempotentRepository::new(2);
        assert!(repo.add("a"));
        assert!(repo.add("b"));
        assert!(!repo.add("a"));
        assert!(repo.add("c"));
        // "b" was least recently used
        assert!(!repo.contains("b"));
        assert!(repo.contains("a"));
        assert_eq!(repo.len(), 2);
        assert!(repo.remove("a"));
        assert!(!repo.remove("a"));
        repo.clear();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let consumer = IdempotentConsumer::new(
            header("id"),
            Arc::new(MemoryIdempotentRepository::default()),
            counting(Arc::clone(&calls), false),
        );

        let mut first = with_id("1");
        consumer.process(&mut first).await.unwrap();
        let mut second = with_id("1");
        consumer.process(&mut second).await.unwrap();
        consumer.process(&mut with_id("2")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(first.property(DUPLICATE_MESSAGE).is_none());
        assert_eq!(second.property(DUPLICATE_MESSAGE), Some(&serde_json::Value::Bool(true)));
        assert_eq!(consumer.metrics().duplicates.load(Ordering::Relaxed), 1);
        assert_eq!(consumer.metrics().accepted.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_failed_exchange_can_be_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let repo = Arc::new(MemoryIdempotentRepository::default());
        let consumer = IdempotentConsumer::new(
            header("id"),
            Arc::clone(&repo) as Arc<dyn IdempotentRepository>,
            counting(Arc::clone(&calls), true),
        );

        let mut exchange = with_id("1");
        consumer.process(&mut exchange).await.unwrap();
        assert!(exchange.is_failed());
        assert!(!repo.contains("1"));

        consumer.process(&mut with_id("1")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_id_is_an_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let consumer = IdempotentConsumer::new(
            header("id"),
            Arc::new(MemoryIdempotentRepository::default()),
            counting(Arc::clone(&calls), false),
        );
        let err = consumer.process(&mut Exchange::default()).await.unwrap_err();
        assert!(err.to_string().contains("no message id"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicates_passed_through_when_not_skipping() {
        let calls = Arc::new(AtomicUsize::new(0));
        let consumer = IdempotentConsumer::new(
            header("id"),
            Arc::new(MemoryIdempotentRepository::default()),
            counting(Arc::clone(&calls), false),
        )
        .with_skip_duplicate(false);
        consumer.process(&mut with_id("1")).await.unwrap();
        consumer.process(&mut with_id("1")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
