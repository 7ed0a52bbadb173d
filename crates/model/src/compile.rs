//! Route compiler
//!
//! Turns definitions into processors, children first. All validation
//! happens here so a route that builds never fails on structure at
//! message time.

use std::sync::Arc;

use switchyard_exchange::Processor;
use switchyard_processor::{
    Aggregator, ChoiceProcessor, ConvertBodyProcessor, DelayProcessor, FilterProcessor,
    GroupedBodies, IdempotentConsumer, LoadBalancer, LogProcessor, LoopProcessor,
    MemoryIdempotentRepository, Multicast, Pipeline, RemoveHeaderProcessor, SendToProcessor,
    SetBodyProcessor, SetHeaderProcessor, SetPropertyProcessor, Splitter, StopProcessor,
    ThrowExceptionProcessor, WhenClause,
};
use tracing::debug;

use crate::definition::{
    AggregateDefinition, IdempotentDefinition, LoopDefinition, MulticastDefinition,
    ProcessorDefinition, RouteDefinition, SplitDefinition,
};
use crate::{BuildError, BuildResult, RouteContext};

#[cfg(test)]
#[path = "compile_test.rs"]
mod tests;

impl ProcessorDefinition {
    /// Compile this node (and everything nested in it) into a processor
    ///
    /// # Errors
    ///
    /// Returns a `BuildError` for missing expressions, structurally invalid
    /// nodes, unresolvable endpoints and unknown processor references.
    pub fn create_processor(&self, ctx: &RouteContext<'_>) -> BuildResult<Box<dyn Processor>> {
        let processor: Box<dyn Processor> = match self {
            Self::To { uri } => {
                if uri.trim().is_empty() {
                    return Err(BuildError::invalid("to", "empty endpoint uri"));
                }
                return Ok(ctx.wrap_leaf(Box::new(SendToProcessor::new(ctx.producer(uri)?))));
            }
            Self::Filter { predicate, steps } => {
                let predicate = predicate
                    .clone()
                    .ok_or(BuildError::missing("filter", "predicate"))?;
                Box::new(FilterProcessor::new(predicate, build_steps(steps, ctx)?))
            }
            Self::Choice { whens, otherwise } => {
                if whens.is_empty() {
                    return Err(BuildError::invalid("choice", "at least one when is required"));
                }
                let clauses = whens
                    .iter()
                    .map(|when| {
                        let predicate = when
                            .predicate
                            .clone()
                            .ok_or(BuildError::missing("when", "predicate"))?;
                        Ok(WhenClause::new(predicate, build_steps(&when.steps, ctx)?))
                    })
                    .collect::<BuildResult<Vec<_>>>()?;
                let otherwise = otherwise
                    .as_deref()
                    .map(|steps| build_steps(steps, ctx))
                    .transpose()?;
                Box::new(ChoiceProcessor::new(clauses, otherwise))
            }
            Self::Loop(def) => build_loop(def, ctx)?,
            Self::Split(def) => build_split(def, ctx)?,
            Self::Multicast(def) => build_multicast(def, ctx)?,
            Self::Pipeline { steps } => build_steps(steps, ctx)?,
            Self::SetHeader { name, value } => {
                let value = value.clone().ok_or(BuildError::missing("set_header", "value"))?;
                return Ok(ctx.wrap_leaf(Box::new(SetHeaderProcessor::new(name.clone(), value))));
            }
            Self::SetProperty { name, value } => {
                let value = value
                    .clone()
                    .ok_or(BuildError::missing("set_property", "value"))?;
                return Ok(ctx.wrap_leaf(Box::new(SetPropertyProcessor::new(name.clone(), value))));
            }
            Self::SetBody { value } => {
                let value = value.clone().ok_or(BuildError::missing("set_body", "value"))?;
                return Ok(ctx.wrap_leaf(Box::new(SetBodyProcessor::new(value))));
            }
            Self::RemoveHeader { pattern } => {
                if pattern.is_empty() {
                    return Err(BuildError::missing("remove_header", "name"));
                }
                Box::new(RemoveHeaderProcessor::new(pattern.clone()))
            }
            Self::ConvertBodyTo { target } => {
                return Ok(ctx.wrap_leaf(Box::new(ConvertBodyProcessor::new(*target))));
            }
            Self::Log {
                message,
                level,
                category,
            } => {
                let mut log = LogProcessor::new(message.clone()).with_level(*level);
                if let Some(category) = category {
                    log = log.with_category(category.clone());
                }
                Box::new(log)
            }
            Self::Delay { millis } => Box::new(DelayProcessor::new(millis.clone())),
            Self::Stop => Box::new(StopProcessor),
            Self::ThrowException { message } => {
                return Ok(ctx.wrap_leaf(Box::new(ThrowExceptionProcessor::message(message.clone()))));
            }
            Self::LoadBalance { policy, branches } => {
                if branches.is_empty() {
                    return Err(BuildError::invalid("load_balance", "at least one branch is required"));
                }
                Box::new(LoadBalancer::new(*policy, build_each(branches, ctx)?))
            }
            Self::Idempotent(def) => build_idempotent(def, ctx)?,
            Self::Aggregate(def) => build_aggregate(def, ctx)?,
            Self::Process(processor) => {
                return Ok(ctx.wrap_leaf(Box::new(Arc::clone(processor))));
            }
            Self::ProcessRef { name, options } => {
                return Ok(ctx.wrap_leaf(ctx.processors().create(name, options)?));
            }
        };
        Ok(processor)
    }
}

impl RouteDefinition {
    /// Compile the route's steps into its pipeline
    ///
    /// Errors are tagged with the route id.
    pub fn create_pipeline(&self, ctx: &RouteContext<'_>) -> BuildResult<Pipeline> {
        if self.from.trim().is_empty() {
            return Err(BuildError::invalid("from", "empty endpoint uri").in_route(&self.id));
        }
        let steps = build_each(&self.steps, ctx).map_err(|e| e.in_route(&self.id))?;
        debug!(
            route_id = %self.id,
            steps = steps.len(),
            nodes = self.node_count(),
            "route compiled"
        );
        Ok(Pipeline::new(steps))
    }
}

/// Compile every definition, keeping order
pub fn build_each(
    steps: &[ProcessorDefinition],
    ctx: &RouteContext<'_>,
) -> BuildResult<Vec<Box<dyn Processor>>> {
    steps.iter().map(|step| step.create_processor(ctx)).collect()
}

/// Compile nested steps into one processor
///
/// A single step is used as is; several are wrapped in a [`Pipeline`].
pub fn build_steps(
    steps: &[ProcessorDefinition],
    ctx: &RouteContext<'_>,
) -> BuildResult<Box<dyn Processor>> {
    let mut processors = build_each(steps, ctx)?;
    if processors.len() == 1 {
        return Ok(processors.remove(0));
    }
    Ok(Box::new(Pipeline::new(processors)))
}

fn build_loop(def: &LoopDefinition, ctx: &RouteContext<'_>) -> BuildResult<Box<dyn Processor>> {
    let child = build_steps(&def.steps, ctx)?;
    let lp = match (&def.count, &def.while_predicate) {
        (Some(count), None) => LoopProcessor::count(count.clone(), child),
        (None, Some(predicate)) => LoopProcessor::do_while(predicate.clone(), child),
        (Some(_), Some(_)) => {
            return Err(BuildError::invalid("loop", "count and while are mutually exclusive"));
        }
        (None, None) => return Err(BuildError::missing("loop", "count or while predicate")),
    };
    Ok(Box::new(lp.with_copy(def.copy)))
}

fn build_split(def: &SplitDefinition, ctx: &RouteContext<'_>) -> BuildResult<Box<dyn Processor>> {
    let expression = def
        .expression
        .clone()
        .ok_or(BuildError::missing("split", "expression"))?;
    let mut splitter =
        Splitter::new(expression, build_steps(&def.steps, ctx)?).with_options(def.options);
    if let Some(token) = &def.token {
        if token.is_empty() {
            return Err(BuildError::invalid("split", "empty token"));
        }
        splitter = splitter.with_token(token.clone());
    }
    if let Some(strategy) = &def.strategy {
        splitter = splitter.with_strategy(Arc::clone(strategy));
    }
    Ok(Box::new(splitter))
}

fn build_multicast(
    def: &MulticastDefinition,
    ctx: &RouteContext<'_>,
) -> BuildResult<Box<dyn Processor>> {
    if def.branches.is_empty() {
        return Err(BuildError::invalid("multicast", "at least one branch is required"));
    }
    let mut multicast = Multicast::new(build_each(&def.branches, ctx)?).with_options(def.options);
    if let Some(strategy) = &def.strategy {
        multicast = multicast.with_strategy(Arc::clone(strategy));
    }
    Ok(Box::new(multicast))
}

fn build_idempotent(
    def: &IdempotentDefinition,
    ctx: &RouteContext<'_>,
) -> BuildResult<Box<dyn Processor>> {
    let message_id = def
        .message_id
        .clone()
        .ok_or(BuildError::missing("idempotent", "message id expression"))?;
    let repository = match &def.repository {
        Some(repository) => Arc::clone(repository),
        None => Arc::new(MemoryIdempotentRepository::new(def.capacity)),
    };
    let consumer = IdempotentConsumer::new(message_id, repository, build_steps(&def.steps, ctx)?)
        .with_skip_duplicate(def.skip_duplicate);
    Ok(Box::new(consumer))
}

fn build_aggregate(
    def: &AggregateDefinition,
    ctx: &RouteContext<'_>,
) -> BuildResult<Box<dyn Processor>> {
    let correlation = def
        .correlation
        .clone()
        .ok_or(BuildError::missing("aggregate", "correlation expression"))?;
    if def.completion_size.is_none() && def.completion_predicate.is_none() {
        return Err(BuildError::invalid(
            "aggregate",
            "completion size or completion predicate is required",
        ));
    }
    let strategy = def
        .strategy
        .clone()
        .unwrap_or_else(|| Arc::new(GroupedBodies));
    let mut aggregator = Aggregator::new(correlation, strategy, build_steps(&def.steps, ctx)?);
    if let Some(size) = def.completion_size {
        aggregator = aggregator.with_completion_size(size);
    }
    if let Some(predicate) = &def.completion_predicate {
        aggregator = aggregator.with_completion_predicate(predicate.clone());
    }
    Ok(Box::new(aggregator))
}

