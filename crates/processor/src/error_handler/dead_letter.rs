//! Dead letter channel - Park failed exchanges on an endpoint

use std::sync::atomic::{AtomicU64, Ordering};

use switchyard_endpoint::Producer;
use switchyard_exchange::properties::{FAILURE_ENDPOINT, FAILURE_ROUTE_ID, TO_ENDPOINT};
use switchyard_exchange::{Exchange, ProcessFuture, Processor, Value};
use tracing::{debug, warn};

/// Sends failed exchanges to a dead letter endpoint
///
/// On success the failure is marked handled: the exception moves to the
/// caught exception and the consumer sees a completed exchange. If the dead
/// letter endpoint itself fails, the original failure stays on the exchange.
///
/// The exchange sent to the dead letter endpoint carries the failure as its
/// caught exception, plus the `FailureEndpoint` and `FailureRouteId`
/// properties.
pub struct DeadLetterChannel {
    uri: String,
    producer: Box<dyn Producer>,
    use_original_message: bool,
    delivered: AtomicU64,
}

impl DeadLetterChannel {
    /// Create a channel sending to the given producer
    pub fn new(producer: Box<dyn Producer>) -> Self {
        Self {
            uri: producer.endpoint_uri().to_string(),
            producer,
            use_original_message: false,
            delivered: AtomicU64::new(0),
        }
    }

    /// Send the message as it entered the route instead of its current state
    pub fn with_use_original_message(mut self, use_original: bool) -> Self {
        self.use_original_message = use_original;
        self
    }

    /// Whether the original input message is sent
    pub fn use_original_message(&self) -> bool {
        self.use_original_message
    }

    /// Dead letter endpoint URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Number of exchanges parked so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn dead_letter(&self, exchange: &Exchange) -> Exchange {
        let mut dead = exchange.copy();
        if self.use_original_message
            && let Some(original) = exchange.original_message()
        {
            dead.promote_out();
            dead.set_in(original.clone());
        }
        let failed_endpoint = exchange.property(TO_ENDPOINT).cloned().unwrap_or(Value::Null);
        dead.set_property(FAILURE_ENDPOINT, failed_endpoint);
        if let Some(route_id) = exchange.from_route_id() {
            dead.set_property(FAILURE_ROUTE_ID, route_id);
        }
        dead.mark_failure_handled();
        dead
    }
}

impl Processor for DeadLetterChannel {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            if !exchange.is_failed() {
                return Ok(());
            }
            let mut dead = self.dead_letter(exchange);
            if let Err(error) = self.producer.process(&mut dead).await {
                dead.set_exception(error);
            }
            dead.handover_completions(exchange);

            if let Some(error) = dead.exception() {
                warn!(
                    exchange_id = %exchange.id(),
                    dead_letter = %self.uri,
                    %error,
                    cause = ?exchange.exception(),
                    "dead letter delivery failed"
                );
                return Ok(());
            }

            self.delivered.fetch_add(1, Ordering::Relaxed);
            debug!(
                exchange_id = %exchange.id(),
                dead_letter = %self.uri,
                cause = ?exchange.exception(),
                "moved to dead letter channel"
            );
            if let Some(endpoint) = dead.property(FAILURE_ENDPOINT).cloned() {
                exchange.set_property(FAILURE_ENDPOINT, endpoint);
            }
            if let Some(route_id) = dead.property(FAILURE_ROUTE_ID).cloned() {
                exchange.set_property(FAILURE_ROUTE_ID, route_id);
            }
            exchange.mark_failure_handled();
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "dead_letter_channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use switchyard_exchange::ExchangeError;

    /// Producer recording what it receives
    struct Capture {
        seen: Arc<Mutex<Vec<Exchange>>>,
        fail: bool,
    }

    impl Processor for Capture {
        fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
            Box::pin(async move {
                self.seen.lock().push(exchange.copy());
                if self.fail {
                    return Err(ExchangeError::endpoint("mock:dlq", "down"));
                }
                Ok(())
            })
        }

        fn name(&self) -> &'static str {
            "capture"
        }
    }

    impl Producer for Capture {
        fn endpoint_uri(&self) -> &str {
            "mock:dlq"
        }
    }

    fn channel(fail: bool) -> (DeadLetterChannel, Arc<Mutex<Vec<Exchange>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let capture = Capture {
            seen: Arc::clone(&seen),
            fail,
        };
        (DeadLetterChannel::new(Box::new(capture)), seen)
    }

    fn failed_exchange() -> Exchange {
        let mut exchange = Exchange::with_body("original");
        exchange.set_from_route_id("orders");
        exchange.remember_original();
        exchange.message_mut().set_body("changed");
        exchange.set_property(TO_ENDPOINT, "seda:backend");
        exchange.set_exception(ExchangeError::failed("backend down"));
        exchange
    }

    #[tokio::test]
    async fn test_failure_is_parked_and_handled() {
        let (dlc, seen) = channel(false);
        let mut exchange = failed_exchange();
        dlc.process(&mut exchange).await.unwrap();

        assert!(!exchange.is_failed());
        assert!(exchange.is_failure_handled());
        assert_eq!(exchange.caught_exception(), Some(&ExchangeError::failed("backend down")));
        assert_eq!(exchange.property(FAILURE_ROUTE_ID), Some(&Value::from("orders")));
        assert_eq!(dlc.delivered(), 1);

        let parked = seen.lock();
        assert_eq!(parked[0].message().body().as_str(), Some("changed"));
        assert_eq!(parked[0].property(FAILURE_ENDPOINT), Some(&Value::from("seda:backend")));
        assert_eq!(parked[0].caught_exception(), Some(&ExchangeError::failed("backend down")));
    }

    #[tokio::test]
    async fn test_use_original_message() {
        let (dlc, seen) = channel(false);
        let dlc = dlc.with_use_original_message(true);
        let mut exchange = failed_exchange();
        dlc.process(&mut exchange).await.unwrap();
        assert_eq!(seen.lock()[0].message().body().as_str(), Some("original"));
        // The exchange itself keeps its current message
        assert_eq!(exchange.message().body().as_str(), Some("changed"));
    }

    #[tokio::test]
    async fn test_dead_letter_failure_keeps_original_error() {
        let (dlc, _seen) = channel(true);
        let mut exchange = failed_exchange();
        dlc.process(&mut exchange).await.unwrap();
        assert_eq!(exchange.exception(), Some(&ExchangeError::failed("backend down")));
        assert!(!exchange.is_failure_handled());
        assert_eq!(dlc.delivered(), 0);
    }

    #[tokio::test]
    async fn test_successful_exchange_untouched() {
        let (dlc, seen) = channel(false);
        let mut exchange = Exchange::with_body("ok");
        dlc.process(&mut exchange).await.unwrap();
        assert!(seen.lock().is_empty());
        assert!(!exchange.is_failure_handled());
    }
}
