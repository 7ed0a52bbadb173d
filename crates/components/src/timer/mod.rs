//! Timer component - fires empty exchanges on a schedule
//!
//! `timer:name?period=1000&delay=1000&repeatCount=0`
//!
//! Consumer only. Each firing creates an InOnly exchange with an empty body
//! and the `TimerName`, `TimerCounter` and `TimerFiredTime` properties.
//! `repeatCount=0` fires until the consumer stops. Times are milliseconds.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use switchyard_endpoint::{
    Component, Consumer, Endpoint, EndpointError, EndpointParameters, EndpointUri, Result,
};
use switchyard_exchange::properties::{TIMER_COUNTER, TIMER_FIRED_TIME, TIMER_NAME};
use switchyard_exchange::{Exchange, ExchangePattern, Processor};
use switchyard_processor::invoke;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[cfg(test)]
#[path = "timer_test.rs"]
mod tests;

/// Default time between firings
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

/// Default time before the first firing
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Factory for `timer:` endpoints
#[derive(Debug, Default)]
pub struct TimerComponent;

impl TimerComponent {
    /// Create the component
    pub fn new() -> Self {
        Self
    }
}

impl Component for TimerComponent {
    fn create_endpoint(
        &self,
        uri: &EndpointUri,
        parameters: &mut EndpointParameters,
    ) -> Result<Arc<dyn Endpoint>> {
        let normalized = uri.normalized();
        let period = parameters.take_duration_ms("period")?.unwrap_or(DEFAULT_PERIOD);
        if period.is_zero() {
            return Err(EndpointError::InvalidParameter {
                uri: normalized,
                name: "period".to_string(),
                value: "0".to_string(),
                expected: "positive milliseconds",
            });
        }

        Ok(Arc::new(TimerEndpoint {
            settings: TimerSettings {
                name: uri.path().to_string(),
                period,
                delay: parameters.take_duration_ms("delay")?.unwrap_or(DEFAULT_DELAY),
                repeat_count: parameters.take_u64("repeatCount")?.unwrap_or(0),
            },
            uri: normalized,
        }))
    }

    fn name(&self) -> &'static str {
        "timer"
    }
}

#[derive(Debug, Clone)]
struct TimerSettings {
    name: String,
    period: Duration,
    delay: Duration,
    repeat_count: u64,
}

/// A `timer:` endpoint
pub struct TimerEndpoint {
    uri: String,
    settings: TimerSettings,
}

impl TimerEndpoint {
    /// Timer name
    pub fn timer_name(&self) -> &str {
        &self.settings.name
    }

    /// Time between firings
    pub fn period(&self) -> Duration {
        self.settings.period
    }

    /// Time before the first firing
    pub fn delay(&self) -> Duration {
        self.settings.delay
    }

    /// Number of firings, 0 for unlimited
    pub fn repeat_count(&self) -> u64 {
        self.settings.repeat_count
    }
}

impl Endpoint for TimerEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn create_consumer(&self, processor: Arc<dyn Processor>) -> Result<Box<dyn Consumer>> {
        Ok(Box::new(TimerConsumer {
            uri: self.uri.clone(),
            settings: self.settings.clone(),
            processor,
            cancel: Mutex::new(None),
        }))
    }
}

struct TimerConsumer {
    uri: String,
    settings: TimerSettings,
    processor: Arc<dyn Processor>,
    cancel: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl Consumer for TimerConsumer {
    async fn start(&self) -> Result<()> {
        let mut running = self.cancel.lock();
        if running.is_some() {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        tokio::spawn(fire(
            self.settings.clone(),
            Arc::clone(&self.processor),
            cancel.clone(),
        ));
        *running = Some(cancel);

        debug!(
            endpoint = %self.uri,
            period_ms = u64::try_from(self.settings.period.as_millis()).unwrap_or(u64::MAX),
            "timer started"
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
            debug!(endpoint = %self.uri, "timer stopped");
        }
        Ok(())
    }

    fn endpoint_uri(&self) -> &str {
        &self.uri
    }
}

impl Drop for TimerConsumer {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel.cancel();
        }
    }
}

async fn fire(settings: TimerSettings, processor: Arc<dyn Processor>, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(settings.delay) => {}
    }

    let mut ticker = interval(settings.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut counter: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        counter += 1;
        let mut exchange = Exchange::new(ExchangePattern::InOnly);
        exchange.set_property(TIMER_NAME, settings.name.as_str());
        exchange.set_property(TIMER_COUNTER, counter);
        exchange.set_property(TIMER_FIRED_TIME, Utc::now().to_rfc3339());
        trace!(timer = %settings.name, counter, "timer fired");

        invoke(processor.as_ref(), &mut exchange).await;

        if settings.repeat_count > 0 && counter >= settings.repeat_count {
            debug!(timer = %settings.name, counter, "timer reached repeat count");
            break;
        }
    }
}
