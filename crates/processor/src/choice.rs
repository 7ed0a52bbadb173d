//! Choice - Content-based router

use switchyard_exchange::{Exchange, ProcessFuture, Processor};

use crate::language::Predicate;

/// One `when` branch
pub struct WhenClause {
    predicate: Predicate,
    child: Box<dyn Processor>,
}

impl WhenClause {
    /// Create a branch
    pub fn new(predicate: Predicate, child: Box<dyn Processor>) -> Self {
        Self { predicate, child }
    }
}

/// Runs the first matching `when` branch, else `otherwise` if present
pub struct ChoiceProcessor {
    whens: Vec<WhenClause>,
    otherwise: Option<Box<dyn Processor>>,
}

impl ChoiceProcessor {
    /// Create a choice
    pub fn new(whens: Vec<WhenClause>, otherwise: Option<Box<dyn Processor>>) -> Self {
        Self { whens, otherwise }
    }

    /// Number of `when` branches
    pub fn len(&self) -> usize {
        self.whens.len()
    }

    /// Check if there are no `when` branches
    pub fn is_empty(&self) -> bool {
        self.whens.is_empty()
    }
}

impl Processor for ChoiceProcessor {
    fn process<'a>(&'a self, exchange: &'a mut Exchange) -> ProcessFuture<'a> {
        Box::pin(async move {
            for when in &self.whens {
                if when.predicate.matches(exchange)? {
                    return when.child.process(exchange).await;
                }
            }
            match &self.otherwise {
                Some(otherwise) => otherwise.process(exchange).await,
                None => Ok(()),
            }
        })
    }

    fn name(&self) -> &'static str {
        "choice"
    }
}
