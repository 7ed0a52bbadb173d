//! Per-route metrics
//!
//! Atomic counters updated by the route dispatcher. All operations use
//! relaxed ordering; values are eventually consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for one route
#[derive(Debug, Default)]
pub struct RouteMetrics {
    /// Exchanges that entered the route
    exchanges_total: AtomicU64,

    /// Exchanges that left the route without failure
    exchanges_completed: AtomicU64,

    /// Exchanges that left the route failed
    exchanges_failed: AtomicU64,

    /// Failures absorbed by the error handler (dead letter channel)
    failures_handled: AtomicU64,

    /// Exchanges currently inside the route
    in_flight: AtomicU64,

    /// Leaf redelivery attempts (shared with the redelivery channels)
    redeliveries: Arc<AtomicU64>,

    /// Total processing time in nanoseconds
    processing_time_ns: AtomicU64,
}

impl RouteMetrics {
    /// Create metrics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter handed to redelivery channels at build time
    pub fn redelivery_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.redeliveries)
    }

    /// Record an exchange entering the route
    #[inline]
    pub fn record_started(&self) {
        self.exchanges_total.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an exchange leaving the route, returning the remaining in-flight count
    #[inline]
    pub fn record_left(&self) -> u64 {
        self.in_flight.fetch_sub(1, Ordering::Relaxed) - 1
    }

    /// Record the outcome of a routed exchange
    #[inline]
    pub fn record_outcome(&self, failed: bool, handled: bool, elapsed: Duration) {
        if failed {
            self.exchanges_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.exchanges_completed.fetch_add(1, Ordering::Relaxed);
        }
        if handled {
            self.failures_handled.fetch_add(1, Ordering::Relaxed);
        }
        self.processing_time_ns
            .fetch_add(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Exchanges currently inside the route
    #[inline]
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> RouteMetricsSnapshot {
        RouteMetricsSnapshot {
            exchanges_total: self.exchanges_total.load(Ordering::Relaxed),
            exchanges_completed: self.exchanges_completed.load(Ordering::Relaxed),
            exchanges_failed: self.exchanges_failed.load(Ordering::Relaxed),
            failures_handled: self.failures_handled.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            redeliveries: self.redeliveries.load(Ordering::Relaxed),
            processing_time_ns: self.processing_time_ns.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters except in-flight
    pub fn reset(&self) {
        self.exchanges_total.store(0, Ordering::Relaxed);
        self.exchanges_completed.store(0, Ordering::Relaxed);
        self.exchanges_failed.store(0, Ordering::Relaxed);
        self.failures_handled.store(0, Ordering::Relaxed);
        self.redeliveries.store(0, Ordering::Relaxed);
        self.processing_time_ns.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of route metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteMetricsSnapshot {
    /// Exchanges that entered the route
    pub exchanges_total: u64,
    /// Exchanges that left without failure
    pub exchanges_completed: u64,
    /// Exchanges that left failed
    pub exchanges_failed: u64,
    /// Failures absorbed by the error handler
    pub failures_handled: u64,
    /// Exchanges inside the route
    pub in_flight: u64,
    /// Leaf redelivery attempts
    pub redeliveries: u64,
    /// Total processing time in nanoseconds
    pub processing_time_ns: u64,
}

impl RouteMetricsSnapshot {
    /// Mean processing time of finished exchanges
    ///
    /// Returns None if nothing has finished.
    pub fn mean_processing_time(&self) -> Option<Duration> {
        let finished = self.exchanges_completed + self.exchanges_failed;
        if finished == 0 {
            None
        } else {
            Some(Duration::from_nanos(self.processing_time_ns / finished))
        }
    }

    /// Share of finished exchanges that failed (0.0 - 1.0)
    pub fn failure_rate(&self) -> Option<f64> {
        let finished = self.exchanges_completed + self.exchanges_failed;
        if finished == 0 {
            None
        } else {
            Some(self.exchanges_failed as f64 / finished as f64)
        }
    }
}
