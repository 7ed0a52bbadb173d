//! Delay - Asynchronously pause the exchange

use std::time::Duration;

use switchyard_exchange::{Exchange, ProcessFuture, Processor};

use crate::language::Expression;

/// Sleeps for an evaluated number of milliseconds
#[derive(Debug, Clone)]
pub struct DelayProcessor {
    millis: Expression,
}

impl DelayProcessor {
    /// Create a delay from a millisecond expression
    pub fn new(millis: Expression) -> Self {
        Self { millis }
    }
}

impl Processor for DelayProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let millis = self.millis.evaluate_u64(exchange)?;
            if millis > 0 {
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "delay"
    }
}
