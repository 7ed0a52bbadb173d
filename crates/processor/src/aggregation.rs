//! Aggregation strategies
//!
//! Combine exchanges pairwise: `aggregate(old, new)` is called once per
//! incoming exchange, with `old = None` for the first one.

use serde_json::Value;
use switchyard_exchange::{Body, Exchange};

/// Pairwise combination of exchanges
pub trait AggregationStrategy: Send + Sync {
    /// Combine the accumulated exchange with a new one
    fn aggregate(&self, old: Option<Exchange>, new: Exchange) -> Exchange;

    /// Whether the strategy keeps the original input untouched
    ///
    /// The splitter skips aggregation entirely for such strategies.
    fn keeps_original(&self) -> bool {
        false
    }

    /// Strategy name (for logging)
    fn name(&self) -> &'static str;
}

/// The newest exchange wins
#[derive(Debug, Clone, Copy, Default)]
pub struct UseLatest;

impl AggregationStrategy for UseLatest {
    fn aggregate(&self, _old: Option<Exchange>, new: Exchange) -> Exchange {
        new
    }

    fn name(&self) -> &'static str {
        "use_latest"
    }
}

/// The first exchange wins; marks "keep the original input"
#[derive(Debug, Clone, Copy, Default)]
pub struct UseOriginal;

impl AggregationStrategy for UseOriginal {
    fn aggregate(&self, old: Option<Exchange>, new: Exchange) -> Exchange {
        old.unwrap_or(new)
    }

    fn keeps_original(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "use_original"
    }
}

/// Collects bodies into a JSON array, in arrival order
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupedBodies;

impl AggregationStrategy for GroupedBodies {
    fn aggregate(&self, old: Option<Exchange>, new: Exchange) -> Exchange {
        let item = new.message().body().to_value();
        match old {
            None => {
                let mut first = new;
                first.message_mut().set_body(Body::Json(Value::Array(vec![item])));
                first
            }
            Some(mut acc) => {
                let mut items = match acc.message_mut().take_body() {
                    Body::Json(Value::Array(items)) => items,
                    other => vec![other.to_value()],
                };
                items.push(item);
                acc.message_mut().set_body(Body::Json(Value::Array(items)));
                if let Some(error) = new.exception() {
                    acc.set_exception(error.clone());
                }
                acc
            }
        }
    }

    fn name(&self) -> &'static str {
        "grouped_bodies"
    }
}

/// Concatenates text bodies with a delimiter
#[derive(Debug, Clone, Default)]
pub struct StringConcat {
    delimiter: String,
}

impl StringConcat {
    /// Create a concatenation with a delimiter
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }
}

impl AggregationStrategy for StringConcat {
    fn aggregate(&self, old: Option<Exchange>, new: Exchange) -> Exchange {
        let Some(mut acc) = old else {
            let mut first = new;
            let text = first.message().body().to_string();
            first.message_mut().set_body(Body::Text(text));
            return first;
        };
        let mut text = acc.message().body().to_string();
        text.push_str(&self.delimiter);
        text.push_str(&new.message().body().to_string());
        acc.message_mut().set_body(Body::Text(text));
        if let Some(error) = new.exception() {
            acc.set_exception(error.clone());
        }
        acc
    }

    fn name(&self) -> &'static str {
        "string_concat"
    }
}

/// Fold exchanges with a strategy, in order
pub fn aggregate_all(
    strategy: &dyn AggregationStrategy,
    exchanges: impl IntoIterator<Item = Exchange>,
) -> Option<Exchange> {
    exchanges
        .into_iter()
        .fold(None, |acc, next| Some(strategy.aggregate(acc, next)))
}
