//! Route configuration
//!
//! Routes are listed in order; each has a source URI and a list of steps
//! tagged by `type`. Composite steps nest their own `steps`.
//!
//! # Example
//!
//! ```toml
//! [[routes]]
//! id = "orders"
//! from = "seda:orders?concurrentConsumers=4"
//!
//! [[routes.steps]]
//! type = "filter"
//! predicate = "header.priority == 'high'"
//! steps = [
//!     { type = "set_header", name = "lane", value = "express" },
//!     { type = "to", uri = "direct:express" },
//! ]
//!
//! [[routes.steps]]
//! type = "log"
//! message = "order ${header.orderId} done"
//! ```
//!
//! String values of `value`, `count`, `millis` and friends are parsed as
//! simple expressions; numbers and booleans are constants.

use std::sync::Arc;

use serde::Deserialize;
use switchyard_endpoint::EndpointUri;
use switchyard_exchange::Value;
use switchyard_model::{
    AggregateDefinition, IdempotentDefinition, LoopDefinition, MulticastDefinition,
    ProcessorDefinition, RouteDefinition, SplitDefinition, WhenDefinition,
};
use switchyard_processor::language::{Expression, Predicate, constant, simple, simple_predicate};
use switchyard_processor::{
    AggregationStrategy, BodyType, DEFAULT_MAX_CONCURRENCY, DEFAULT_REPOSITORY_CAPACITY,
    FanOutOptions, GroupedBodies, LoadBalancePolicy, ProcessorOptions, StringConcat, UseLatest,
    UseOriginal, parse_level,
};

use crate::error::{ConfigError, Result};
use crate::error_handler::ErrorHandlerConfig;

fn default_true() -> bool {
    true
}

fn default_split_expression() -> String {
    "${body}".to_string()
}

/// One route
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    /// Route id (defaults to `route<N>` by position)
    #[serde(default)]
    pub id: Option<String>,

    /// Source endpoint URI
    #[serde(default)]
    pub from: String,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Start with the context (default: true)
    #[serde(default = "default_true")]
    pub auto_startup: bool,

    /// Route-specific error handler
    #[serde(default)]
    pub error_handler: Option<ErrorHandlerConfig>,

    /// Steps in order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl RouteConfig {
    /// Effective id of the route at `index` (0-based)
    pub fn route_id(&self, index: usize) -> String {
        self.id.clone().unwrap_or_else(|| format!("route{}", index + 1))
    }

    /// Convert into a route definition
    ///
    /// # Errors
    ///
    /// Fails on missing or invalid fields and on expressions that do not
    /// parse.
    pub fn to_definition(&self, index: usize) -> Result<RouteDefinition> {
        let id = self.route_id(index);
        if self.from.trim().is_empty() {
            return Err(ConfigError::missing_field("route", &id, "from"));
        }
        check_uri(&id, &self.from)?;

        let mut definition = RouteDefinition::new(id.as_str(), self.from.trim());
        definition.description = self.description.clone();
        definition.auto_startup = self.auto_startup;
        definition.error_handler = self
            .error_handler
            .as_ref()
            .map(|handler| handler.to_definition(&id))
            .transpose()?;
        definition.steps = convert_steps(&id, &self.steps)?;
        Ok(definition)
    }
}

/// One branch of a `choice` step
#[derive(Debug, Clone, Deserialize)]
pub struct WhenConfig {
    /// Branch condition
    pub predicate: String,

    /// Branch steps
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Built-in aggregation strategies
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    /// Keep the newest exchange
    UseLatest,
    /// Keep the incoming exchange
    UseOriginal,
    /// Collect bodies into a JSON array
    GroupedBodies,
    /// Join text bodies with `delimiter`
    StringConcat,
}

impl StrategyName {
    fn create(self, delimiter: Option<&str>) -> Arc<dyn AggregationStrategy> {
        match self {
            Self::UseLatest => Arc::new(UseLatest),
            Self::UseOriginal => Arc::new(UseOriginal),
            Self::GroupedBodies => Arc::new(GroupedBodies),
            Self::StringConcat => Arc::new(StringConcat::new(delimiter.unwrap_or(","))),
        }
    }
}

/// Load balancer policies
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicyName {
    /// Branches in turn (default)
    #[default]
    RoundRobin,
    /// Uniformly random branch
    Random,
    /// Next branch on failure
    Failover,
}

/// A route step, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepConfig {
    /// Send to an endpoint
    To {
        /// Endpoint URI
        uri: String,
    },
    /// Run nested steps when the predicate holds
    Filter {
        /// Condition
        predicate: String,
        /// Nested steps
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// First matching branch wins
    Choice {
        /// Branches
        #[serde(default)]
        when: Vec<WhenConfig>,
        /// Fallback steps
        #[serde(default)]
        otherwise: Option<Vec<StepConfig>>,
    },
    /// Repeat nested steps
    Loop {
        /// Iteration count
        #[serde(default)]
        count: Option<Value>,
        /// Iterate while this holds
        #[serde(default, rename = "while")]
        while_predicate: Option<String>,
        /// Fresh copy per iteration
        #[serde(default)]
        copy: bool,
        /// Nested steps
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Split the message and route each part
    Split {
        /// What to split (default: the body)
        #[serde(default = "default_split_expression")]
        expression: String,
        /// Text separator
        #[serde(default)]
        token: Option<String>,
        /// How to combine the parts
        #[serde(default)]
        strategy: Option<StrategyName>,
        /// Delimiter for `string_concat`
        #[serde(default)]
        delimiter: Option<String>,
        /// Process parts concurrently
        #[serde(default)]
        parallel: bool,
        /// Concurrency bound when parallel
        #[serde(default)]
        max_concurrency: Option<usize>,
        /// Stop after the first failed part
        #[serde(default)]
        stop_on_exception: bool,
        /// Steps per part
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Send a copy to every step (each step is a branch)
    Multicast {
        /// How to combine the replies
        #[serde(default)]
        strategy: Option<StrategyName>,
        /// Delimiter for `string_concat`
        #[serde(default)]
        delimiter: Option<String>,
        /// Run branches concurrently
        #[serde(default)]
        parallel: bool,
        /// Concurrency bound when parallel
        #[serde(default)]
        max_concurrency: Option<usize>,
        /// Stop after the first failed branch
        #[serde(default)]
        stop_on_exception: bool,
        /// Branches
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Group steps, e.g. as one multicast branch
    Pipeline {
        /// Nested steps
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Set a header
    SetHeader {
        /// Header name
        name: String,
        /// Value
        value: Value,
    },
    /// Set an exchange property
    SetProperty {
        /// Property name
        name: String,
        /// Value
        value: Value,
    },
    /// Replace the body
    SetBody {
        /// Value
        value: Value,
    },
    /// Remove headers by name or `prefix*`
    RemoveHeader {
        /// Name or pattern
        pattern: String,
    },
    /// Convert the body (text, bytes or json)
    ConvertBody {
        /// Target representation
        to: String,
    },
    /// Log a message
    Log {
        /// Message template
        message: String,
        /// Level (default: info)
        #[serde(default)]
        level: Option<String>,
        /// Category field
        #[serde(default)]
        category: Option<String>,
    },
    /// Pause the exchange
    Delay {
        /// Milliseconds
        millis: Value,
    },
    /// Stop routing the exchange
    Stop,
    /// Fail the exchange
    ThrowException {
        /// Failure message
        message: String,
    },
    /// Send to one of the steps (each step is a branch)
    LoadBalance {
        /// Selection policy
        #[serde(default)]
        policy: BalancePolicyName,
        /// Failover attempt limit
        #[serde(default)]
        max_attempts: Option<usize>,
        /// Failover starting at the next branch in turn
        #[serde(default)]
        round_robin: bool,
        /// Branches
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Skip messages already seen
    Idempotent {
        /// Message id expression
        message_id: String,
        /// In-memory repository capacity
        #[serde(default)]
        capacity: Option<usize>,
        /// Drop duplicates (default: true)
        #[serde(default = "default_true")]
        skip_duplicate: bool,
        /// Guarded steps
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Correlate and aggregate messages
    Aggregate {
        /// Correlation expression
        correlation: String,
        /// How to combine (default: grouped bodies)
        #[serde(default)]
        strategy: Option<StrategyName>,
        /// Delimiter for `string_concat`
        #[serde(default)]
        delimiter: Option<String>,
        /// Complete after this many exchanges
        #[serde(default)]
        completion_size: Option<usize>,
        /// Complete when the aggregate matches
        #[serde(default)]
        completion_predicate: Option<String>,
        /// Steps receiving completed aggregates
        #[serde(default)]
        steps: Vec<StepConfig>,
    },
    /// Registered processor
    Process {
        /// Registered name
        #[serde(rename = "ref")]
        name: String,
        /// Factory options
        #[serde(default)]
        options: ProcessorOptions,
    },
}

impl StepConfig {
    /// Step type as written in configuration
    pub fn kind(&self) -> &'static str {
        match self {
            Self::To { .. } => "to",
            Self::Filter { .. } => "filter",
            Self::Choice { .. } => "choice",
            Self::Loop { .. } => "loop",
            Self::Split { .. } => "split",
            Self::Multicast { .. } => "multicast",
            Self::Pipeline { .. } => "pipeline",
            Self::SetHeader { .. } => "set_header",
            Self::SetProperty { .. } => "set_property",
            Self::SetBody { .. } => "set_body",
            Self::RemoveHeader { .. } => "remove_header",
            Self::ConvertBody { .. } => "convert_body",
            Self::Log { .. } => "log",
            Self::Delay { .. } => "delay",
            Self::Stop => "stop",
            Self::ThrowException { .. } => "throw_exception",
            Self::LoadBalance { .. } => "load_balance",
            Self::Idempotent { .. } => "idempotent",
            Self::Aggregate { .. } => "aggregate",
            Self::Process { .. } => "process",
        }
    }

    /// Convert into a processor definition for route `route`
    ///
    /// # Errors
    ///
    /// Fails on empty required fields, malformed URIs, unknown levels or
    /// body types and expressions that do not parse.
    pub fn to_definition(&self, route: &str) -> Result<ProcessorDefinition> {
        let component = || format!("step '{}'", self.kind());
        let required = |value: &str, field: &'static str| -> Result<()> {
            if value.trim().is_empty() {
                return Err(ConfigError::missing_field(component(), route, field));
            }
            Ok(())
        };
        let non_empty = |steps: &[StepConfig], field: &'static str| -> Result<()> {
            if steps.is_empty() {
                return Err(ConfigError::invalid_value(
                    component(),
                    route,
                    field,
                    "at least one step is required",
                ));
            }
            Ok(())
        };

        let definition = match self {
            Self::To { uri } => {
                required(uri, "uri")?;
                check_uri(route, uri)?;
                ProcessorDefinition::To {
                    uri: uri.trim().to_string(),
                }
            }
            Self::Filter { predicate, steps } => ProcessorDefinition::Filter {
                predicate: Some(parse_predicate(route, "predicate", predicate)?),
                steps: convert_steps(route, steps)?,
            },
            Self::Choice { when, otherwise } => {
                if when.is_empty() {
                    return Err(ConfigError::invalid_value(
                        component(),
                        route,
                        "when",
                        "at least one branch is required",
                    ));
                }
                let whens = when
                    .iter()
                    .map(|branch| {
                        Ok(WhenDefinition {
                            predicate: Some(parse_predicate(route, "when.predicate", &branch.predicate)?),
                            steps: convert_steps(route, &branch.steps)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let otherwise = otherwise
                    .as_deref()
                    .map(|steps| convert_steps(route, steps))
                    .transpose()?;
                ProcessorDefinition::Choice { whens, otherwise }
            }
            Self::Loop {
                count,
                while_predicate,
                copy,
                steps,
            } => {
                if count.is_some() == while_predicate.is_some() {
                    return Err(ConfigError::invalid_value(
                        component(),
                        route,
                        "count",
                        "set exactly one of count and while",
                    ));
                }
                ProcessorDefinition::Loop(LoopDefinition {
                    count: count
                        .as_ref()
                        .map(|value| parse_value(route, "count", value))
                        .transpose()?,
                    while_predicate: while_predicate
                        .as_deref()
                        .map(|text| parse_predicate(route, "while", text))
                        .transpose()?,
                    copy: *copy,
                    steps: convert_steps(route, steps)?,
                })
            }
            Self::Split {
                expression,
                token,
                strategy,
                delimiter,
                parallel,
                max_concurrency,
                stop_on_exception,
                steps,
            } => {
                if token.as_deref() == Some("") {
                    return Err(ConfigError::invalid_value(
                        component(),
                        route,
                        "token",
                        "must not be empty",
                    ));
                }
                ProcessorDefinition::Split(SplitDefinition {
                    expression: Some(parse_expression(route, "expression", expression)?),
                    token: token.clone(),
                    strategy: strategy.map(|s| s.create(delimiter.as_deref())),
                    options: fan_out(route, component, *parallel, *max_concurrency, *stop_on_exception)?,
                    steps: convert_steps(route, steps)?,
                })
            }
            Self::Multicast {
                strategy,
                delimiter,
                parallel,
                max_concurrency,
                stop_on_exception,
                steps,
            } => {
                non_empty(steps, "steps")?;
                ProcessorDefinition::Multicast(MulticastDefinition {
                    branches: convert_steps(route, steps)?,
                    strategy: strategy.map(|s| s.create(delimiter.as_deref())),
                    options: fan_out(route, component, *parallel, *max_concurrency, *stop_on_exception)?,
                })
            }
            Self::Pipeline { steps } => ProcessorDefinition::Pipeline {
                steps: convert_steps(route, steps)?,
            },
            Self::SetHeader { name, value } => {
                required(name, "name")?;
                ProcessorDefinition::SetHeader {
                    name: name.clone(),
                    value: Some(parse_value(route, "value", value)?),
                }
            }
            Self::SetProperty { name, value } => {
                required(name, "name")?;
                ProcessorDefinition::SetProperty {
                    name: name.clone(),
                    value: Some(parse_value(route, "value", value)?),
                }
            }
            Self::SetBody { value } => ProcessorDefinition::SetBody {
                value: Some(parse_value(route, "value", value)?),
            },
            Self::RemoveHeader { pattern } => {
                required(pattern, "pattern")?;
                ProcessorDefinition::RemoveHeader {
                    pattern: pattern.clone(),
                }
            }
            Self::ConvertBody { to } => {
                let target = to.parse::<BodyType>().map_err(|e| {
                    ConfigError::invalid_value(component(), route, "to", e.to_string())
                })?;
                ProcessorDefinition::ConvertBodyTo { target }
            }
            Self::Log {
                message,
                level,
                category,
            } => {
                let level = parse_level(level.as_deref().unwrap_or("info")).map_err(|e| {
                    ConfigError::invalid_value(component(), route, "level", e.to_string())
                })?;
                ProcessorDefinition::Log {
                    message: parse_expression(route, "message", message)?,
                    level,
                    category: category.clone(),
                }
            }
            Self::Delay { millis } => ProcessorDefinition::Delay {
                millis: parse_value(route, "millis", millis)?,
            },
            Self::Stop => ProcessorDefinition::Stop,
            Self::ThrowException { message } => ProcessorDefinition::ThrowException {
                message: message.clone(),
            },
            Self::LoadBalance {
                policy,
                max_attempts,
                round_robin,
                steps,
            } => {
                non_empty(steps, "steps")?;
                let policy = match policy {
                    BalancePolicyName::RoundRobin => LoadBalancePolicy::RoundRobin,
                    BalancePolicyName::Random => LoadBalancePolicy::Random,
                    BalancePolicyName::Failover => LoadBalancePolicy::Failover {
                        max_attempts: *max_attempts,
                        round_robin: *round_robin,
                    },
                };
                ProcessorDefinition::LoadBalance {
                    policy,
                    branches: convert_steps(route, steps)?,
                }
            }
            Self::Idempotent {
                message_id,
                capacity,
                skip_duplicate,
                steps,
            } => {
                if *capacity == Some(0) {
                    return Err(ConfigError::invalid_value(
                        component(),
                        route,
                        "capacity",
                        "must be greater than 0",
                    ));
                }
                ProcessorDefinition::Idempotent(IdempotentDefinition {
                    message_id: Some(parse_expression(route, "message_id", message_id)?),
                    repository: None,
                    capacity: capacity.unwrap_or(DEFAULT_REPOSITORY_CAPACITY),
                    skip_duplicate: *skip_duplicate,
                    steps: convert_steps(route, steps)?,
                })
            }
            Self::Aggregate {
                correlation,
                strategy,
                delimiter,
                completion_size,
                completion_predicate,
                steps,
            } => {
                if completion_size.is_none() && completion_predicate.is_none() {
                    return Err(ConfigError::missing_field(
                        component(),
                        route,
                        "completion_size",
                    ));
                }
                ProcessorDefinition::Aggregate(AggregateDefinition {
                    correlation: Some(parse_expression(route, "correlation", correlation)?),
                    strategy: strategy.map(|s| s.create(delimiter.as_deref())),
                    completion_size: *completion_size,
                    completion_predicate: completion_predicate
                        .as_deref()
                        .map(|text| parse_predicate(route, "completion_predicate", text))
                        .transpose()?,
                    steps: convert_steps(route, steps)?,
                })
            }
            Self::Process { name, options } => {
                required(name, "ref")?;
                ProcessorDefinition::ProcessRef {
                    name: name.clone(),
                    options: options.clone(),
                }
            }
        };
        Ok(definition)
    }
}

fn convert_steps(route: &str, steps: &[StepConfig]) -> Result<Vec<ProcessorDefinition>> {
    steps.iter().map(|step| step.to_definition(route)).collect()
}

fn check_uri(route: &str, uri: &str) -> Result<()> {
    EndpointUri::parse(uri.trim())
        .map(|_| ())
        .map_err(|source| ConfigError::Endpoint {
            route: route.to_string(),
            source,
        })
}

fn parse_expression(route: &str, field: &'static str, text: &str) -> Result<Expression> {
    simple(text).map_err(|e| ConfigError::expression(route, field, e))
}

fn parse_predicate(route: &str, field: &'static str, text: &str) -> Result<Predicate> {
    simple_predicate(text).map_err(|e| ConfigError::expression(route, field, e))
}

/// Strings are simple expressions, anything else a constant
fn parse_value(route: &str, field: &'static str, value: &Value) -> Result<Expression> {
    match value {
        Value::String(text) => parse_expression(route, field, text),
        other => Ok(constant(other.clone())),
    }
}

fn fan_out(
    route: &str,
    component: impl Fn() -> String,
    parallel: bool,
    max_concurrency: Option<usize>,
    stop_on_exception: bool,
) -> Result<FanOutOptions> {
    if max_concurrency == Some(0) {
        return Err(ConfigError::invalid_value(
            component(),
            route,
            "max_concurrency",
            "must be greater than 0",
        ));
    }
    Ok(FanOutOptions {
        parallel_processing: parallel,
        max_concurrency: max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
        stop_on_exception,
    })
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
