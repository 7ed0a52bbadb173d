//! SEDA component - bounded asynchronous queue between routes
//!
//! `seda:name` decouples the sender from the consuming route with a tokio
//! channel. Queues are shared by name inside one component instance, so
//! `seda:orders` and `seda:orders?concurrentConsumers=4` feed the same queue.
//!
//! # Parameters
//!
//! | Name                    | Default           | Meaning |
//! |-------------------------|-------------------|---------|
//! | `size`                  | component default | Queue capacity (fixed when the queue is created) |
//! | `concurrentConsumers`   | 1                 | Worker tasks per consumer |
//! | `blockWhenFull`         | false             | Wait for room instead of failing with `QueueFull` |
//! | `timeout`               | 30000             | Reply wait in milliseconds |
//! | `waitForTaskToComplete` | `IfReplyExpected` | `Always`, `Never` or `IfReplyExpected` |
//!
//! The queued exchange is a copy reset to `Created`, so the consuming route
//! owns its own unit of work. A waiting sender merges the routed copy back
//! into its exchange.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use switchyard_endpoint::{
    Component, Consumer, Endpoint, EndpointError, EndpointParameters, EndpointUri, Producer, Result,
};
use switchyard_exchange::{
    Exchange, ExchangeError, ExchangeState, ProcessFuture, Processor,
};
use switchyard_processor::invoke;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

#[cfg(test)]
#[path = "seda_test.rs"]
mod tests;

/// Default queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 1000;

/// Default time a sender waits for the reply
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// When a sender waits for the consuming route to finish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitForTaskToComplete {
    /// Wait only for InOut exchanges
    #[default]
    IfReplyExpected,
    /// Always wait
    Always,
    /// Never wait, even for InOut
    Never,
}

impl WaitForTaskToComplete {
    /// Whether a sender of `exchange` waits
    pub fn waits_for(&self, exchange: &Exchange) -> bool {
        match self {
            Self::IfReplyExpected => exchange.is_in_out(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

impl FromStr for WaitForTaskToComplete {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ifreplyexpected" => Ok(Self::IfReplyExpected),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err(format!("unknown waitForTaskToComplete '{s}'")),
        }
    }
}

impl fmt::Display for WaitForTaskToComplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IfReplyExpected => "IfReplyExpected",
            Self::Always => "Always",
            Self::Never => "Never",
        })
    }
}

/// One queued exchange, with the reply channel of a waiting sender
struct QueuedExchange {
    exchange: Exchange,
    reply: Option<oneshot::Sender<Exchange>>,
}

/// A named queue shared by every endpoint with the same name
struct SedaQueue {
    name: String,
    size: usize,
    sender: mpsc::Sender<QueuedExchange>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<QueuedExchange>>>,
}

impl SedaQueue {
    fn new(name: &str, size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(size);
        Self {
            name: name.to_string(),
            size,
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }

    fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

/// Factory for `seda:` endpoints
pub struct SedaComponent {
    default_size: usize,
    queues: Mutex<HashMap<String, Arc<SedaQueue>>>,
}

impl SedaComponent {
    /// Create a component with the default queue size
    pub fn new() -> Self {
        Self::with_default_size(DEFAULT_QUEUE_SIZE)
    }

    /// Create a component whose queues default to `size` slots
    pub fn with_default_size(size: usize) -> Self {
        Self {
            default_size: size.max(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Default capacity for queues created without `size`
    pub fn default_size(&self) -> usize {
        self.default_size
    }

    /// Names of the queues created so far, sorted
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.lock().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn queue(&self, uri: &str, name: &str, size: Option<usize>) -> Result<Arc<SedaQueue>> {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get(name) {
            if let Some(size) = size
                && size != queue.size
            {
                return Err(EndpointError::invalid_uri(
                    uri,
                    format!("queue '{name}' already exists with size {}", queue.size),
                ));
            }
            return Ok(Arc::clone(queue));
        }

        let size = size.unwrap_or(self.default_size);
        let queue = Arc::new(SedaQueue::new(name, size));
        queues.insert(name.to_string(), Arc::clone(&queue));
        debug!(queue = name, size, "seda queue created");
        Ok(queue)
    }
}

impl Default for SedaComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SedaComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>> {
        let normalized = uri.normalized();

        let size = parameters.take_usize("size")?;
        if size == Some(0) {
            return Err(invalid_parameter(&normalized, "size", "0", "positive integer"));
        }
        let concurrent_consumers = parameters.take_usize("concurrentConsumers")?.unwrap_or(1);
        if concurrent_consumers == 0 {
            return Err(invalid_parameter(
                &normalized,
                "concurrentConsumers",
                "0",
                "positive integer",
            ));
        }
        let block_when_full = parameters.take_bool("blockWhenFull")?.unwrap_or(false);
        let timeout = parameters
            .take_duration_ms("timeout")?
            .unwrap_or(DEFAULT_REPLY_TIMEOUT);
        let wait = match parameters.take_str("waitForTaskToComplete") {
            Some(raw) => raw.parse().map_err(|_| {
                invalid_parameter(
                    &normalized,
                    "waitForTaskToComplete",
                    &raw,
                    "Always, Never or IfReplyExpected",
                )
            })?,
            None => WaitForTaskToComplete::default(),
        };

        let queue = self.queue(&normalized, uri.path(), size)?;
        Ok(Arc::new(SedaEndpoint {
            uri: normalized,
            queue,
            concurrent_consumers,
            block_when_full,
            timeout,
            wait,
        }))
    }

    fn name(&self) -> &'static str {
        "seda"
    }
}

fn invalid_parameter(uri: &str, name: &str, value: &str, expected: &'static str) -> EndpointError {
    EndpointError::InvalidParameter {
        uri: uri.to_string(),
        name: name.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// A `seda:` endpoint
pub struct SedaEndpoint {
    uri: String,
    queue: Arc<SedaQueue>,
    concurrent_consumers: usize,
    block_when_full: bool,
    timeout: Duration,
    wait: WaitForTaskToComplete,
}

impl SedaEndpoint {
    /// Queue name
    pub fn queue_name(&self) -> &str {
        &self.queue.name
    }

    /// Queue capacity
    pub fn size(&self) -> usize {
        self.queue.size
    }

    /// Exchanges waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Worker tasks per consumer
    pub fn concurrent_consumers(&self) -> usize {
        self.concurrent_consumers
    }

    /// Whether senders wait for room in a full queue
    pub fn block_when_full(&self) -> bool {
        self.block_when_full
    }

    /// Reply timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reply policy
    pub fn wait_for_task_to_complete(&self) -> WaitForTaskToComplete {
        self.wait
    }
}

impl Endpoint for SedaEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_producer(&self) -> Result<Box<dyn Producer>> {
        Ok(Box::new(SedaProducer {
            uri: self.uri.clone(),
            queue: Arc::clone(&self.queue),
            block_when_full: self.block_when_full,
            timeout: self.timeout,
            wait: self.wait,
        }))
    }

    fn create_consumer(&self, processor: Arc<dyn Processor>) -> Result<Box<dyn Consumer>> {
        Ok(Box::new(SedaConsumer {
            uri: self.uri.clone(),
            queue: Arc::clone(&self.queue),
            processor,
            concurrent_consumers: self.concurrent_consumers,
            running: Mutex::new(None),
        }))
    }
}

struct SedaProducer {
    uri: String,
    queue: Arc<SedaQueue>,
    block_when_full: bool,
    timeout: Duration,
    wait: WaitForTaskToComplete,
}

impl SedaProducer {
    /// Put an item on the queue, handing it back when it was not accepted
    async fn enqueue(&self, item: QueuedExchange) -> std::result::Result<(), (ExchangeError, QueuedExchange)> {
        if self.block_when_full {
            return self
                .queue
                .sender
                .send(item)
                .await
                .map_err(|e| (ExchangeError::endpoint(&self.uri, "queue closed"), e.0));
        }
        self.queue.sender.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) => {
                (ExchangeError::queue_full(&self.queue.name), item)
            }
            mpsc::error::TrySendError::Closed(item) => {
                (ExchangeError::endpoint(&self.uri, "queue closed"), item)
            }
        })
    }
}

impl Processor for SedaProducer {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let mut copy = exchange.copy();
            copy.set_state(ExchangeState::Created);

            if !self.wait.waits_for(exchange) {
                // The consuming route completes the copy, so it fires the callbacks
                exchange.handover_completions(&mut copy);
                trace!(exchange_id = %exchange.id(), queue = %self.queue.name, "enqueued");
                return self
                    .enqueue(QueuedExchange { exchange: copy, reply: None })
                    .await
                    .map_err(|(error, mut item)| {
                        item.exchange.handover_completions(exchange);
                        error
                    });
            }

            let (reply_tx, reply_rx) = oneshot::channel();
            self.enqueue(QueuedExchange {
                exchange: copy,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|(error, _)| error)?;

            match tokio::time::timeout(self.timeout, reply_rx).await {
                Ok(Ok(reply)) => {
                    exchange.merge_result(reply);
                    Ok(())
                }
                Ok(Err(_)) => Err(ExchangeError::cancelled(format!(
                    "queue '{}' dropped the exchange before replying",
                    self.queue.name
                ))),
                Err(_) => Err(ExchangeError::timeout(
                    format!("reply from '{}'", self.uri),
                    u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            }
        })
    }

    fn name(&self) -> &'static str {
        "seda"
    }
}

impl Producer for SedaProducer {
    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

/// Worker tasks polling the queue while started
struct SedaConsumer {
    uri: String,
    queue: Arc<SedaQueue>,
    processor: Arc<dyn Processor>,
    concurrent_consumers: usize,
    running: Mutex<Option<(CancellationToken, Vec<JoinHandle<()>>)>>,
}

#[async_trait]
impl Consumer for SedaConsumer {
    async fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let workers = (0..self.concurrent_consumers)
            .map(|worker_id| {
                let worker = SedaWorker {
                    id: worker_id,
                    queue: Arc::clone(&self.queue),
                    processor: Arc::clone(&self.processor),
                    cancel: cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        *running = Some((cancel, workers));

        debug!(
            endpoint = %self.uri,
            workers = self.concurrent_consumers,
            "seda consumer started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        // Workers finish the exchange in hand and then exit
        if let Some((cancel, _workers)) = self.running.lock().take() {
            cancel.cancel();
            debug!(endpoint = %self.uri, "seda consumer stopped");
        }
        Ok(())
    }

    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

impl Drop for SedaConsumer {
    fn drop(&mut self) {
        if let Some((cancel, _)) = self.running.lock().take() {
            cancel.cancel();
        }
    }
}

struct SedaWorker {
    id: usize,
    queue: Arc<SedaQueue>,
    processor: Arc<dyn Processor>,
    cancel: CancellationToken,
}

impl SedaWorker {
    async fn run(self) {
        let receiver = Arc::clone(&self.queue.receiver);
        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                item = async { receiver.lock().await.recv().await } => item,
            };
            let Some(QueuedExchange { mut exchange, reply }) = item else {
                break;
            };

            invoke(self.processor.as_ref(), &mut exchange).await;

            if let Some(reply) = reply
                && reply.send(exchange).is_err()
            {
                warn!(
                    queue = %self.queue.name,
                    worker = self.id,
                    "sender stopped waiting before the reply was ready"
                );
            }
        }
        trace!(queue = %self.queue.name, worker = self.id, "seda worker exited");
    }
}
