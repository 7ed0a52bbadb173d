//! Pipeline - Sequential processor execution
//!
//! The `Pipeline` runs its steps in order, each receiving the output of the
//! previous one.
//!
//! # Design
//!
//! - **No-op when empty**: an empty pipeline returns immediately
//! - **Stop at first failure**: a step that leaves an exception (or stops
//!   the route) ends the pipeline; later steps never run
//! - **Errors are data**: a step returning `Err` is recorded on the exchange,
//!   so callers only ever inspect the exchange

use switchyard_exchange::{Exchange, ProcessFuture, Processor};

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;

/// Run one processor, recording a returned error on the exchange
pub async fn invoke(processor: &dyn Processor, exchange: &mut Exchange) {
    if let Err(error) = processor.process(exchange).await {
        exchange.set_exception(error);
    }
}

/// Whether a pipeline should continue with the next step
#[inline]
pub fn should_continue(exchange: &Exchange) -> bool {
    !exchange.is_failed() && !exchange.is_route_stopped()
}

/// Processors applied sequentially
pub struct Pipeline {
    steps: Vec<Box<dyn Processor>>,
}

impl Pipeline {
    /// Create a pipeline from ordered steps
    pub fn new(steps: Vec<Box<dyn Processor>>) -> Self {
        Self { steps }
    }

    /// Create an empty pipeline (no-op)
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Get the number of steps
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the pipeline is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the names of all steps
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::empty()
    }
}

impl Processor for Pipeline {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            for (index, step) in self.steps.iter().enumerate() {
                if !should_continue(exchange) {
                    break;
                }
                if index > 0 {
                    exchange.promote_out();
                }
                invoke(step.as_ref(), exchange).await;
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.names())
            .finish()
    }
}
