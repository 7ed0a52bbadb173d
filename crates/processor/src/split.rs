//! Splitter - One sub-exchange per item
//!
//! Evaluates an expression into items, routes each item through the child
//! pipeline as a correlated sub-exchange, then aggregates.
//!
//! # Items
//!
//! | Value | Items |
//! |-------|-------|
//! | JSON array | One per element |
//! | String | Split by the token (default `,`); empty string gives none |
//! | `null` | None |
//! | Anything else | The value itself |
//!
//! # Result
//!
//! By default the parent keeps its original input ([`UseOriginal`]). With
//! another strategy the aggregate becomes the parent's result. The first
//! sub-exchange failure is set on the parent either way.

use std::sync::Arc;

use serde_json::Value;
use switchyard_exchange::properties::{SPLIT_COMPLETE, SPLIT_INDEX, SPLIT_SIZE};
use switchyard_exchange::{Body, Exchange, ProcessFuture, Processor};
use tracing::debug;

use crate::aggregation::{AggregationStrategy, UseOriginal};
use crate::fanout::{FanOutOptions, merge_results, run_each};
use crate::language::Expression;
use crate::transform::value_to_body;

#[cfg(test)]
#[path = "split_test.rs"]
mod tests;

/// Default token for splitting text
pub const DEFAULT_TOKEN: &str = ",";

/// Splits an exchange into sub-exchanges
pub struct Splitter {
    expression: Expression,
    token: String,
    child: Box<dyn Processor>,
    strategy: Arc<dyn AggregationStrategy>,
    options: FanOutOptions,
}

impl Splitter {
    /// Create a splitter
    pub fn new(expression: Expression, child: Box<dyn Processor>) -> Self {
        Self {
            expression,
            token: DEFAULT_TOKEN.to_string(),
            child,
            strategy: Arc::new(UseOriginal),
            options: FanOutOptions::default(),
        }
    }

    /// Token used to split text values
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Aggregation strategy for the results
    pub fn with_strategy(mut self, strategy: Arc<dyn AggregationStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Execution options
    pub fn with_options(mut self, options: FanOutOptions) -> Self {
        self.options = options;
        self
    }

    fn items(&self, value: Value) -> Vec<Body> {
        match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items.into_iter().map(value_to_body).collect(),
            Value::String(s) if s.is_empty() => Vec::new(),
            Value::String(s) if self.token.is_empty() => vec![Body::Text(s)],
            Value::String(s) => s.split(self.token.as_str()).map(|p| Body::Text(p.to_string())).collect(),
            other => vec![value_to_body(other)],
        }
    }
}

impl Processor for Splitter {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            let items = self.items(self.expression.evaluate(exchange)?);
            let size = items.len();

            let jobs: Vec<(&dyn Processor, Exchange)> = items
                .into_iter()
                .enumerate()
                .map(|(index, body)| {
                    let mut sub = exchange.correlated_copy();
                    sub.message_mut().set_body(body);
                    sub.set_property(SPLIT_INDEX, index);
                    sub.set_property(SPLIT_SIZE, size);
                    sub.set_property(SPLIT_COMPLETE, index + 1 == size);
                    (self.child.as_ref(), sub)
                })
                .collect();

            let results = run_each(jobs, self.options).await;
            debug!(
                exchange_id = %exchange.id(),
                items = size,
                processed = results.len(),
                "split finished"
            );
            merge_results(exchange, results, self.strategy.as_ref());
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "split"
    }
}
