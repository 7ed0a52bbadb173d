//! Mock component - records what arrives and checks expectations
//!
//! `mock:name` is the assertion tool for route tests. Every exchange sent to
//! it is recorded; expectations are set up front and verified with
//! [`MockEndpoint::assert_is_satisfied`], which waits for late arrivals
//! from asynchronous routes.
//!
//! # Example
//!
//! ```ignore
//! let mock = MockEndpoint::from_endpoint(context.endpoint("mock:out")?.as_ref()).unwrap();
//! mock.expected_bodies_received(["a", "b"]);
//! template.send_body("direct:in", "a").await?;
//! template.send_body("direct:in", "b").await?;
//! mock.assert_is_satisfied(Duration::from_secs(1)).await?;
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use switchyard_endpoint::{Component, Endpoint, EndpointParameters, EndpointUri, Producer, Result};
use switchyard_exchange::{
    Body, Exchange, ExchangeError, Message, ProcessFuture, Processor, Value,
};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::trace;

#[cfg(test)]
#[path = "mock_test.rs"]
mod tests;

/// An expectation that did not hold
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssertionError {
    /// Exact message count differs
    #[error("mock '{uri}': expected {expected} messages, received {actual}")]
    MessageCount {
        /// Endpoint URI
        uri: String,
        /// Expected count
        expected: usize,
        /// Received count
        actual: usize,
    },

    /// Fewer messages than the minimum
    #[error("mock '{uri}': expected at least {expected} messages, received {actual}")]
    MinimumMessageCount {
        /// Endpoint URI
        uri: String,
        /// Minimum count
        expected: usize,
        /// Received count
        actual: usize,
    },

    /// A body differs from the expected one at the same position
    #[error("mock '{uri}': message {index} has body {actual:?}, expected {expected:?}")]
    Body {
        /// Endpoint URI
        uri: String,
        /// Zero-based message index
        index: usize,
        /// Expected body
        expected: Body,
        /// Received body, `None` if the message never arrived
        actual: Option<Body>,
    },

    /// No received message carries the header value
    #[error("mock '{uri}': no message with header '{name}' = {value}")]
    Header {
        /// Endpoint URI
        uri: String,
        /// Header name
        name: String,
        /// Expected value
        value: Value,
    },
}

#[derive(Default)]
struct Expectations {
    count: Option<usize>,
    minimum: Option<usize>,
    bodies: Option<Vec<Body>>,
    headers: Vec<(String, Value)>,
}

impl Expectations {
    /// Number of messages to wait for before checking
    fn target(&self) -> usize {
        self.count
            .into_iter()
            .chain(self.minimum)
            .chain(self.bodies.as_ref().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}

/// Failure injection: fail the next `remaining` exchanges with `error`
struct InjectedFailure {
    remaining: usize,
    error: ExchangeError,
}

#[derive(Default)]
struct MockState {
    received: Mutex<Vec<Exchange>>,
    expectations: Mutex<Expectations>,
    failures: Mutex<VecDeque<InjectedFailure>>,
    arrived: Notify,
}

/// Factory for `mock:` endpoints
#[derive(Debug, Default)]
pub struct MockComponent;

impl MockComponent {
    /// Create the component
    pub fn new() -> Self {
        Self
    }
}

impl Component for MockComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        _parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>> {
        Ok(Arc::new(MockEndpoint {
            uri: uri.normalized(),
            state: Arc::new(MockState::default()),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A `mock:` endpoint
pub struct MockEndpoint {
    uri: String,
    state: Arc<MockState>,
}

impl MockEndpoint {
    /// Downcast a resolved endpoint to a mock
    pub fn from_endpoint(endpoint: &dyn Endpoint) -> Option<&MockEndpoint> {
        endpoint.as_any().downcast_ref::<MockEndpoint>()
    }

    // ========================================================================
    // Expectations
    // ========================================================================

    /// Expect exactly `count` messages
    pub fn expected_message_count(&self, count: usize) {
        self.state.expectations.lock().count = Some(count);
    }

    /// Expect at least `count` messages
    pub fn expected_minimum_message_count(&self, count: usize) {
        self.state.expectations.lock().minimum = Some(count);
    }

    /// Expect these bodies, in order
    ///
    /// Implies the message count.
    pub fn expected_bodies_received<I, B>(&self, bodies: I)
    where
        I: IntoIterator<Item = B>,
        B: Into<Body>,
    {
        let bodies: Vec<Body> = bodies.into_iter().map(Into::into).collect();
        let mut expectations = self.state.expectations.lock();
        expectations.count = Some(bodies.len());
        expectations.bodies = Some(bodies);
    }

    /// Expect at least one message with the header value
    pub fn expected_header_received(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.state
            .expectations
            .lock()
            .headers
            .push((name.into(), value.into()));
    }

    /// Wait up to `timeout` for the expected messages, then check everything
    ///
    /// # Errors
    ///
    /// Returns the first expectation that does not hold.
    pub async fn assert_is_satisfied(
        &self,
        timeout: Duration,
    ) -> std::result::Result<(), AssertionError> {
        let target = self.state.expectations.lock().target();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let arrived = self.state.arrived.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            if self.received_count() >= target {
                break;
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                break;
            }
        }

        self.check()
    }

    fn check(&self) -> std::result::Result<(), AssertionError> {
        let expectations = self.state.expectations.lock();
        let received = self.state.received.lock();
        let actual = received.len();

        if let Some(expected) = expectations.count
            && actual != expected
        {
            return Err(AssertionError::MessageCount {
                uri: self.uri.clone(),
                expected,
                actual,
            });
        }
        if let Some(expected) = expectations.minimum
            && actual < expected
        {
            return Err(AssertionError::MinimumMessageCount {
                uri: self.uri.clone(),
                expected,
                actual,
            });
        }
        if let Some(bodies) = &expectations.bodies {
            for (index, expected) in bodies.iter().enumerate() {
                let body = received.get(index).map(|ex| ex.message().body());
                if body != Some(expected) {
                    return Err(AssertionError::Body {
                        uri: self.uri.clone(),
                        index,
                        expected: expected.clone(),
                        actual: body.cloned(),
                    });
                }
            }
        }
        for (name, value) in &expectations.headers {
            let found = received
                .iter()
                .any(|ex| ex.message().header(name) == Some(value));
            if !found {
                return Err(AssertionError::Header {
                    uri: self.uri.clone(),
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Failure injection
    // ========================================================================

    /// Fail the next `count` exchanges with `error`
    ///
    /// Failing exchanges are still recorded. Calls queue up: a second
    /// `fail_next` applies after the first one is used up.
    pub fn fail_next(&self, count: usize, error: ExchangeError) {
        if count > 0 {
            self.state.failures.lock().push_back(InjectedFailure {
                remaining: count,
                error,
            });
        }
    }

    // ========================================================================
    // Received messages
    // ========================================================================

    /// Number of exchanges received
    pub fn received_count(&self) -> usize {
        self.state.received.lock().len()
    }

    /// Current messages of the received exchanges, in arrival order
    pub fn received_messages(&self) -> Vec<Message> {
        self.state
            .received
            .lock()
            .iter()
            .map(|ex| ex.message().clone())
            .collect()
    }

    /// Bodies of the received exchanges, in arrival order
    pub fn received_bodies(&self) -> Vec<Body> {
        self.state
            .received
            .lock()
            .iter()
            .map(|ex| ex.message().body().clone())
            .collect()
    }

    /// Copies of the received exchanges
    pub fn received_exchanges(&self) -> Vec<Exchange> {
        self.state.received.lock().iter().map(Exchange::copy).collect()
    }

    /// Forget received messages, expectations and pending failures
    pub fn reset(&self) {
        self.state.received.lock().clear();
        *self.state.expectations.lock() = Expectations::default();
        self.state.failures.lock().clear();
    }
}

impl Endpoint for MockEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_producer(&self) -> Result<Box<dyn Producer>> {
        Ok(Box::new(MockProducer {
            uri: self.uri.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockProducer {
    uri: String,
    state: Arc<MockState>,
}

impl MockProducer {
    fn next_failure(&self) -> Option<ExchangeError> {
        let mut failures = self.state.failures.lock();
        let front = failures.front_mut()?;
        front.remaining -= 1;
        let error = front.error.clone();
        if front.remaining == 0 {
            failures.pop_front();
        }
        Some(error)
    }
}

impl Processor for MockProducer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            self.state.received.lock().push(exchange.copy());
            self.state.arrived.notify_waiters();
            trace!(endpoint = %self.uri, exchange_id = %exchange.id(), "mock received");

            match self.next_failure() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl Producer for MockProducer {
    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}
