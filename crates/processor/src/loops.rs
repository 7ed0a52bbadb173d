//! Loop - Repeat a child pipeline
//!
//! Counted (`loop(n)`) or conditional (`loop_do_while(predicate)`).
//!
//! # Copy mode
//!
//! - `copy = false`: every iteration sees the same exchange, including the
//!   previous iteration's mutations
//! - `copy = true`: every iteration starts from a fresh copy of the
//!   exchange as it entered the loop; the last iteration's result becomes
//!   the exchange result

use switchyard_exchange::properties::{LOOP_INDEX, LOOP_SIZE};
use switchyard_exchange::{Exchange, ProcessFuture, ProcessResult, Processor};
use tracing::trace;

use crate::language::{Expression, Predicate};
use crate::pipeline::{invoke, should_continue};

#[cfg(test)]
#[path = "loops_test.rs"]
mod tests;

/// How the loop decides to run another iteration
#[derive(Debug, Clone)]
pub enum LoopMode {
    /// Evaluate once to an iteration count
    Count(Expression),
    /// Re-evaluate before every iteration
    While(Predicate),
}

/// Runs its child pipeline repeatedly
pub struct LoopProcessor {
    mode: LoopMode,
    copy: bool,
    child: Box<dyn Processor>,
}

impl LoopProcessor {
    /// Create a counted loop
    pub fn count(count: Expression, child: Box<dyn Processor>) -> Self {
        Self {
            mode: LoopMode::Count(count),
            copy: false,
            child,
        }
    }

    /// Create a do-while loop
    pub fn do_while(predicate: Predicate, child: Box<dyn Processor>) -> Self {
        Self {
            mode: LoopMode::While(predicate),
            copy: false,
            child,
        }
    }

    /// Run each iteration on a copy of the pre-loop exchange
    pub fn with_copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    async fn run_in_place(&self, exchange: &mut Exchange, size: Option<u64>) -> ProcessResult<()> {
        let mut index = 0u64;
        loop {
            if !self.has_next(exchange, index, size)? {
                break;
            }
            exchange.promote_out();
            exchange.set_property(LOOP_INDEX, index);
            invoke(self.child.as_ref(), exchange).await;
            index += 1;
            if !should_continue(exchange) {
                break;
            }
        }
        trace!(exchange_id = %exchange.id(), iterations = index, "loop finished");
        Ok(())
    }

    async fn run_copies(&self, exchange: &mut Exchange, size: Option<u64>) -> ProcessResult<()> {
        let original = exchange.copy();
        let mut last: Option<Exchange> = None;
        let mut index = 0u64;
        loop {
            let current = last.as_ref().unwrap_or(&original);
            if !self.has_next(current, index, size)? {
                break;
            }
            let mut iteration = original.copy();
            iteration.set_property(LOOP_INDEX, index);
            invoke(self.child.as_ref(), &mut iteration).await;
            index += 1;
            let stop = !should_continue(&iteration);
            if let Some(mut previous) = last.replace(iteration) {
                previous.handover_completions(exchange);
            }
            if stop {
                break;
            }
        }
        if let Some(result) = last {
            exchange.merge_result(result);
        }
        trace!(exchange_id = %exchange.id(), iterations = index, "loop finished");
        Ok(())
    }

    fn has_next(&self, exchange: &Exchange, index: u64, size: Option<u64>) -> ProcessResult<bool> {
        match (&self.mode, size) {
            (_, Some(size)) => Ok(index < size),
            (LoopMode::While(predicate), None) => predicate.matches(exchange),
            (LoopMode::Count(_), None) => Ok(false),
        }
    }
}

impl Processor for LoopProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let size = match &self.mode {
                LoopMode::Count(expr) => {
                    let size = expr.evaluate_u64(exchange)?;
                    exchange.set_property(LOOP_SIZE, size);
                    Some(size)
                }
                LoopMode::While(_) => None,
            };

            if self.copy {
                self.run_copies(exchange, size).await
            } else {
                self.run_in_place(exchange, size).await
            }
        })
    }

    fn name(&self) -> &'static str {
        "loop"
    }
}
