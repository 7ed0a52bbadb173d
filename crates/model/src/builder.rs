//! Fluent route builder
//!
//! ```text
//! from("direct:orders")
//!     .filter(header("type") == "order")     ┐ open block
//!         .to("mock:orders")                 │ nested step
//!     .end()                                 ┘ close block
//!     .to("log:done")
//! ```
//!
//! Composite steps open a block; the steps that follow nest into the
//! innermost open block until `end()`. Starting another route with `from`
//! closes every open block. Misuse (a `when` outside a choice, an `end`
//! with nothing open, steps before `from`) is reported by [`build`].
//!
//! [`build`]: RouteBuilder::build

use std::sync::Arc;

use switchyard_exchange::Processor;
use switchyard_processor::language::{Expression, Predicate};
use switchyard_processor::{
    AggregationStrategy, BodyType, IdempotentRepository, LoadBalancePolicy, ProcessorOptions,
};
use tracing::Level;

use crate::definition::{
    AggregateDefinition, IdempotentDefinition, LoopDefinition, MulticastDefinition,
    ProcessorDefinition, RouteDefinition, SplitDefinition, WhenDefinition,
};
use crate::{BuildError, BuildResult, ErrorHandlerDefinition};

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;

/// Builds route definitions with a fluent DSL
///
/// # Example
///
/// ```
/// use switchyard_model::RouteBuilder;
/// use switchyard_processor::language::header;
///
/// let routes = RouteBuilder::new()
///     .from("direct:a")
///     .route_id("orders")
///     .filter(header("foo").is_equal_to("bar"))
///     .to("mock:b")
///     .end()
///     .build()
///     .unwrap();
/// assert_eq!(routes[0].id, "orders");
/// assert_eq!(routes[0].steps.len(), 1);
/// ```
#[derive(Default)]
pub struct RouteBuilder {
    routes: Vec<RouteDefinition>,
    current: Option<RouteDefinition>,
    blocks: Vec<ProcessorDefinition>,
    error: Option<BuildError>,
    next_id: usize,
}

impl RouteBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Routes
    // ========================================================================

    /// Start a new route consuming from `uri`
    pub fn from(mut self, uri: impl Into<String>) -> Self {
        self.finish_route();
        self.next_id += 1;
        let id = format!("route{}", self.next_id);
        self.current = Some(RouteDefinition::new(id, uri));
        self
    }

    /// Set the current route's id
    pub fn route_id(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.with_route("route_id", |route| route.id = id)
    }

    /// Set the current route's description
    pub fn description(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_route("description", |route| route.description = Some(text))
    }

    /// Whether the current route starts with the context
    pub fn auto_startup(self, auto: bool) -> Self {
        self.with_route("auto_startup", |route| route.auto_startup = auto)
    }

    /// Set the current route's error handler
    pub fn error_handler(self, handler: ErrorHandlerDefinition) -> Self {
        self.with_route("error_handler", |route| route.error_handler = Some(handler))
    }

    /// Finish and return all route definitions
    ///
    /// # Errors
    ///
    /// Returns the first misuse of the builder as `BuildError::Dsl`.
    pub fn build(mut self) -> BuildResult<Vec<RouteDefinition>> {
        self.finish_route();
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.routes),
        }
    }

    // ========================================================================
    // Leaves
    // ========================================================================

    /// Send to an endpoint
    pub fn to(self, uri: impl Into<String>) -> Self {
        self.step(ProcessorDefinition::To { uri: uri.into() })
    }

    /// Set a header
    pub fn set_header(self, name: impl Into<String>, value: impl Into<Expression>) -> Self {
        self.step(ProcessorDefinition::SetHeader {
            name: name.into(),
            value: Some(value.into()),
        })
    }

    /// Set a property
    pub fn set_property(self, name: impl Into<String>, value: impl Into<Expression>) -> Self {
        self.step(ProcessorDefinition::SetProperty {
            name: name.into(),
            value: Some(value.into()),
        })
    }

    /// Replace the body
    pub fn set_body(self, value: impl Into<Expression>) -> Self {
        self.step(ProcessorDefinition::SetBody {
            value: Some(value.into()),
        })
    }

    /// Remove headers by name or `prefix*`
    pub fn remove_header(self, pattern: impl Into<String>) -> Self {
        self.step(ProcessorDefinition::RemoveHeader {
            pattern: pattern.into(),
        })
    }

    /// Convert the body
    pub fn convert_body_to(self, target: BodyType) -> Self {
        self.step(ProcessorDefinition::ConvertBodyTo { target })
    }

    /// Log at INFO
    pub fn log(self, message: impl Into<Expression>) -> Self {
        self.log_at(Level::INFO, message)
    }

    /// Log at a given level
    pub fn log_at(self, level: Level, message: impl Into<Expression>) -> Self {
        self.step(ProcessorDefinition::Log {
            message: message.into(),
            level,
            category: None,
        })
    }

    /// Pause for the evaluated number of milliseconds
    pub fn delay(self, millis: impl Into<Expression>) -> Self {
        self.step(ProcessorDefinition::Delay {
            millis: millis.into(),
        })
    }

    /// Stop routing the exchange
    pub fn stop(self) -> Self {
        self.step(ProcessorDefinition::Stop)
    }

    /// Fail the exchange
    pub fn throw_exception(self, message: impl Into<String>) -> Self {
        self.step(ProcessorDefinition::ThrowException {
            message: message.into(),
        })
    }

    /// Run a user processor
    pub fn process<P: Processor + 'static>(self, processor: P) -> Self {
        self.step(ProcessorDefinition::Process(Arc::new(processor)))
    }

    /// Run a processor from the registry
    pub fn process_ref(self, name: impl Into<String>) -> Self {
        self.step(ProcessorDefinition::ProcessRef {
            name: name.into(),
            options: ProcessorOptions::new(),
        })
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Open a filter block
    pub fn filter(self, predicate: Predicate) -> Self {
        self.open(ProcessorDefinition::Filter {
            predicate: Some(predicate),
            steps: Vec::new(),
        })
    }

    /// Open a choice block; add branches with `when` and `otherwise`
    pub fn choice(self) -> Self {
        self.open(ProcessorDefinition::Choice {
            whens: Vec::new(),
            otherwise: None,
        })
    }

    /// Start a branch of the innermost choice
    pub fn when(mut self, predicate: Predicate) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Choice { whens, otherwise }) if otherwise.is_none() => {
                whens.push(WhenDefinition {
                    predicate: Some(predicate),
                    steps: Vec::new(),
                });
            }
            Some(ProcessorDefinition::Choice { .. }) => self.fail("when() after otherwise()"),
            _ => self.fail("when() outside of choice()"),
        }
        self
    }

    /// Start the fallback branch of the innermost choice
    pub fn otherwise(mut self) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Choice { whens, otherwise })
                if otherwise.is_none() && !whens.is_empty() =>
            {
                *otherwise = Some(Vec::new());
            }
            Some(ProcessorDefinition::Choice { .. }) => {
                self.fail("otherwise() requires a preceding when() and may appear once")
            }
            _ => self.fail("otherwise() outside of choice()"),
        }
        self
    }

    /// Open a loop running `count` times
    pub fn loop_count(self, count: impl Into<Expression>) -> Self {
        self.open(ProcessorDefinition::Loop(LoopDefinition {
            count: Some(count.into()),
            ..LoopDefinition::default()
        }))
    }

    /// Open a loop running while the predicate holds
    pub fn loop_while(self, predicate: Predicate) -> Self {
        self.open(ProcessorDefinition::Loop(LoopDefinition {
            while_predicate: Some(predicate),
            ..LoopDefinition::default()
        }))
    }

    /// Give each iteration of the innermost loop a fresh copy
    pub fn copy(mut self) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Loop(def)) => def.copy = true,
            _ => self.fail("copy() outside of a loop"),
        }
        self
    }

    /// Open a splitter block
    pub fn split(self, expression: impl Into<Expression>) -> Self {
        self.open(ProcessorDefinition::Split(SplitDefinition {
            expression: Some(expression.into()),
            ..SplitDefinition::default()
        }))
    }

    /// Set the text separator of the innermost splitter
    pub fn token(mut self, token: impl Into<String>) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Split(def)) => def.token = Some(token.into()),
            _ => self.fail("token() outside of split()"),
        }
        self
    }

    /// Open a multicast block; each following step is a branch
    pub fn multicast(self) -> Self {
        self.open(ProcessorDefinition::Multicast(MulticastDefinition::default()))
    }

    /// Set the aggregation strategy of the innermost split, multicast or aggregate
    pub fn aggregation_strategy(mut self, strategy: Arc<dyn AggregationStrategy>) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Split(def)) => def.strategy = Some(strategy),
            Some(ProcessorDefinition::Multicast(def)) => def.strategy = Some(strategy),
            Some(ProcessorDefinition::Aggregate(def)) => def.strategy = Some(strategy),
            _ => self.fail("aggregation_strategy() outside of split(), multicast() or aggregate()"),
        }
        self
    }

    /// Run the innermost split or multicast in parallel
    pub fn parallel_processing(mut self, max_concurrency: usize) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Split(def)) => {
                def.options = def.options.parallel(max_concurrency);
            }
            Some(ProcessorDefinition::Multicast(def)) => {
                def.options = def.options.parallel(max_concurrency);
            }
            _ => self.fail("parallel_processing() outside of split() or multicast()"),
        }
        self
    }

    /// Stop the innermost split or multicast at the first failure
    pub fn stop_on_exception(mut self) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Split(def)) => {
                def.options = def.options.stop_on_exception();
            }
            Some(ProcessorDefinition::Multicast(def)) => {
                def.options = def.options.stop_on_exception();
            }
            _ => self.fail("stop_on_exception() outside of split() or multicast()"),
        }
        self
    }

    /// Open a nested pipeline
    pub fn pipeline(self) -> Self {
        self.open(ProcessorDefinition::Pipeline { steps: Vec::new() })
    }

    /// Open a load balancer; each following step is a branch
    pub fn load_balance(self, policy: LoadBalancePolicy) -> Self {
        self.open(ProcessorDefinition::LoadBalance {
            policy,
            branches: Vec::new(),
        })
    }

    /// Open an idempotent consumer block
    pub fn idempotent_consumer(self, message_id: impl Into<Expression>) -> Self {
        self.open(ProcessorDefinition::Idempotent(IdempotentDefinition {
            message_id: Some(message_id.into()),
            ..IdempotentDefinition::default()
        }))
    }

    /// Use a shared repository for the innermost idempotent consumer
    pub fn repository(mut self, repository: Arc<dyn IdempotentRepository>) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Idempotent(def)) => def.repository = Some(repository),
            _ => self.fail("repository() outside of idempotent_consumer()"),
        }
        self
    }

    /// Open an aggregator block; nested steps receive completed aggregates
    pub fn aggregate(self, correlation: impl Into<Expression>) -> Self {
        self.open(ProcessorDefinition::Aggregate(AggregateDefinition {
            correlation: Some(correlation.into()),
            ..AggregateDefinition::default()
        }))
    }

    /// Complete groups of the innermost aggregator after `size` exchanges
    pub fn completion_size(mut self, size: usize) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Aggregate(def)) => def.completion_size = Some(size),
            _ => self.fail("completion_size() outside of aggregate()"),
        }
        self
    }

    /// Complete groups of the innermost aggregator when the aggregate matches
    pub fn completion_predicate(mut self, predicate: Predicate) -> Self {
        match self.blocks.last_mut() {
            Some(ProcessorDefinition::Aggregate(def)) => {
                def.completion_predicate = Some(predicate);
            }
            _ => self.fail("completion_predicate() outside of aggregate()"),
        }
        self
    }

    /// Close the innermost open block
    pub fn end(mut self) -> Self {
        match self.blocks.pop() {
            Some(block) => self.attach(block),
            None => self.fail("end() without an open block"),
        }
        self
    }

    /// Close the innermost choice, and any block opened inside it
    pub fn end_choice(mut self) -> Self {
        let Some(depth) = self
            .blocks
            .iter()
            .rposition(|b| matches!(b, ProcessorDefinition::Choice { .. }))
        else {
            self.fail("end_choice() outside of choice()");
            return self;
        };
        while self.blocks.len() > depth {
            self = self.end();
        }
        self
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn step(mut self, step: ProcessorDefinition) -> Self {
        self.attach(step);
        self
    }

    fn open(mut self, block: ProcessorDefinition) -> Self {
        if self.current.is_none() {
            self.fail(format!("{}() before from()", block.kind()));
            return self;
        }
        self.blocks.push(block);
        self
    }

    /// Add a finished node to the innermost block, or to the route
    fn attach(&mut self, node: ProcessorDefinition) {
        let kind = node.kind();
        if let Some(parent) = self.blocks.last_mut() {
            if !parent.push_child(node) {
                let parent = parent.kind();
                self.fail(format!("{kind}() inside {parent}() needs a when() first"));
            }
            return;
        }
        match self.current.as_mut() {
            Some(route) => route.steps.push(node),
            None => self.fail(format!("{kind}() before from()")),
        }
    }

    fn with_route(mut self, what: &str, f: impl FnOnce(&mut RouteDefinition)) -> Self {
        match self.current.as_mut() {
            Some(route) => f(route),
            None => self.fail(format!("{what}() before from()")),
        }
        self
    }

    fn finish_route(&mut self) {
        while let Some(block) = self.blocks.pop() {
            self.attach(block);
        }
        if let Some(route) = self.current.take() {
            self.routes.push(route);
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(BuildError::dsl(message));
        }
    }
}
