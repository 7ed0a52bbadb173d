//! Route definitions
//!
//! Declarative description of a route: a source URI and a tree of
//! [`ProcessorDefinition`] nodes. Definitions are plain data; compiling them
//! into processors happens in [`ProcessorDefinition::create_processor`].

use std::fmt;
use std::sync::Arc;

use switchyard_exchange::Processor;
use switchyard_processor::language::{Expression, Predicate};
use switchyard_processor::{
    AggregationStrategy, BodyType, FanOutOptions, IdempotentRepository, LoadBalancePolicy,
    ProcessorOptions,
};
use tracing::Level;

use crate::ErrorHandlerDefinition;

/// A node of the route graph
///
/// The set of node kinds is closed; user behavior plugs in through
/// [`Process`](Self::Process) and [`ProcessRef`](Self::ProcessRef).
#[derive(Clone)]
pub enum ProcessorDefinition {
    /// Send to an endpoint
    To {
        /// Endpoint URI
        uri: String,
    },
    /// Run the nested steps only when the predicate holds
    Filter {
        /// Condition
        predicate: Option<Predicate>,
        /// Nested steps
        steps: Vec<ProcessorDefinition>,
    },
    /// First matching branch wins
    Choice {
        /// Branches in order
        whens: Vec<WhenDefinition>,
        /// Fallback branch
        otherwise: Option<Vec<ProcessorDefinition>>,
    },
    /// Repeat the nested steps
    Loop(LoopDefinition),
    /// Split the message and route each part
    Split(SplitDefinition),
    /// Send a copy to every branch
    Multicast(MulticastDefinition),
    /// Nested sequential steps
    Pipeline {
        /// Nested steps
        steps: Vec<ProcessorDefinition>,
    },
    /// Set a message header
    SetHeader {
        /// Header name
        name: String,
        /// Value
        value: Option<Expression>,
    },
    /// Set an exchange property
    SetProperty {
        /// Property name
        name: String,
        /// Value
        value: Option<Expression>,
    },
    /// Replace the message body
    SetBody {
        /// Value
        value: Option<Expression>,
    },
    /// Remove headers by name or `prefix*`
    RemoveHeader {
        /// Name or pattern
        pattern: String,
    },
    /// Convert the body representation
    ConvertBodyTo {
        /// Target representation
        target: BodyType,
    },
    /// Emit a log event
    Log {
        /// Message template
        message: Expression,
        /// Event level
        level: Level,
        /// Category field
        category: Option<String>,
    },
    /// Pause the exchange
    Delay {
        /// Milliseconds
        millis: Expression,
    },
    /// Stop routing the exchange without failure
    Stop,
    /// Fail the exchange
    ThrowException {
        /// Failure message
        message: String,
    },
    /// Send to one of several branches
    LoadBalance {
        /// Selection policy
        policy: LoadBalancePolicy,
        /// Branches
        branches: Vec<ProcessorDefinition>,
    },
    /// Skip messages already seen
    Idempotent(IdempotentDefinition),
    /// Correlate and aggregate messages
    Aggregate(AggregateDefinition),
    /// User processor instance
    Process(Arc<dyn Processor>),
    /// Processor looked up by name in the processor registry
    ProcessRef {
        /// Registered name
        name: String,
        /// Factory options
        options: ProcessorOptions,
    },
}

/// One branch of a choice
#[derive(Clone)]
pub struct WhenDefinition {
    /// Branch condition
    pub predicate: Option<Predicate>,
    /// Branch steps
    pub steps: Vec<ProcessorDefinition>,
}

/// Loop node; exactly one of `count` and `while_predicate` must be set
#[derive(Clone, Default)]
pub struct LoopDefinition {
    /// Number of iterations
    pub count: Option<Expression>,
    /// Iterate while this holds
    pub while_predicate: Option<Predicate>,
    /// Give each iteration a copy of the pre-loop exchange
    pub copy: bool,
    /// Nested steps
    pub steps: Vec<ProcessorDefinition>,
}

/// Splitter node
#[derive(Clone, Default)]
pub struct SplitDefinition {
    /// What to split
    pub expression: Option<Expression>,
    /// Text separator (splitter default when unset)
    pub token: Option<String>,
    /// How to combine the parts (splitter default when unset)
    pub strategy: Option<Arc<dyn AggregationStrategy>>,
    /// Sequential or parallel execution
    pub options: FanOutOptions,
    /// Steps applied to each part
    pub steps: Vec<ProcessorDefinition>,
}

/// Multicast node; each branch receives its own copy
#[derive(Clone, Default)]
pub struct MulticastDefinition {
    /// Branches
    pub branches: Vec<ProcessorDefinition>,
    /// How to combine the replies (multicast default when unset)
    pub strategy: Option<Arc<dyn AggregationStrategy>>,
    /// Sequential or parallel execution
    pub options: FanOutOptions,
}

/// Idempotent consumer node
#[derive(Clone)]
pub struct IdempotentDefinition {
    /// Message id
    pub message_id: Option<Expression>,
    /// Shared repository; a fresh in-memory one is created when unset
    pub repository: Option<Arc<dyn IdempotentRepository>>,
    /// Capacity of the in-memory repository
    pub capacity: usize,
    /// Drop duplicates instead of flagging them
    pub skip_duplicate: bool,
    /// Guarded steps
    pub steps: Vec<ProcessorDefinition>,
}

impl Default for IdempotentDefinition {
    fn default() -> Self {
        Self {
            message_id: None,
            repository: None,
            capacity: switchyard_processor::DEFAULT_REPOSITORY_CAPACITY,
            skip_duplicate: true,
            steps: Vec::new(),
        }
    }
}

/// Aggregator node
#[derive(Clone, Default)]
pub struct AggregateDefinition {
    /// Correlation key
    pub correlation: Option<Expression>,
    /// How to combine (grouped bodies when unset)
    pub strategy: Option<Arc<dyn AggregationStrategy>>,
    /// Complete after this many exchanges
    pub completion_size: Option<usize>,
    /// Complete when the aggregate matches
    pub completion_predicate: Option<Predicate>,
    /// Steps receiving completed aggregates
    pub steps: Vec<ProcessorDefinition>,
}

impl ProcessorDefinition {
    /// Node kind, as used in configuration and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::To { .. } => "to",
            Self::Filter { .. } => "filter",
            Self::Choice { .. } => "choice",
            Self::Loop(_) => "loop",
            Self::Split(_) => "split",
            Self::Multicast(_) => "multicast",
            Self::Pipeline { .. } => "pipeline",
            Self::SetHeader { .. } => "set_header",
            Self::SetProperty { .. } => "set_property",
            Self::SetBody { .. } => "set_body",
            Self::RemoveHeader { .. } => "remove_header",
            Self::ConvertBodyTo { .. } => "convert_body",
            Self::Log { .. } => "log",
            Self::Delay { .. } => "delay",
            Self::Stop => "stop",
            Self::ThrowException { .. } => "throw_exception",
            Self::LoadBalance { .. } => "load_balance",
            Self::Idempotent(_) => "idempotent",
            Self::Aggregate(_) => "aggregate",
            Self::Process(_) => "process",
            Self::ProcessRef { .. } => "process",
        }
    }

    /// Whether the node holds nested steps or branches
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::Filter { .. }
                | Self::Choice { .. }
                | Self::Loop(_)
                | Self::Split(_)
                | Self::Multicast(_)
                | Self::Pipeline { .. }
                | Self::LoadBalance { .. }
                | Self::Idempotent(_)
                | Self::Aggregate(_)
        )
    }

    /// Count this node and every node nested in it
    pub fn node_count(&self) -> usize {
        1 + self.children().map(ProcessorDefinition::node_count).sum::<usize>()
    }

    /// Nested steps and branches, in definition order
    pub fn children(&self) -> Box<dyn Iterator<Item = &ProcessorDefinition> + '_> {
        match self {
            Self::Filter { steps, .. }
            | Self::Pipeline { steps }
            | Self::Loop(LoopDefinition { steps, .. })
            | Self::Split(SplitDefinition { steps, .. })
            | Self::Idempotent(IdempotentDefinition { steps, .. })
            | Self::Aggregate(AggregateDefinition { steps, .. }) => Box::new(steps.iter()),
            Self::Multicast(MulticastDefinition { branches, .. })
            | Self::LoadBalance { branches, .. } => Box::new(branches.iter()),
            Self::Choice { whens, otherwise } => Box::new(
                whens
                    .iter()
                    .flat_map(|w| w.steps.iter())
                    .chain(otherwise.iter().flatten()),
            ),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Append a nested step (or branch, for multicast and load balance)
    ///
    /// Returns `false` for leaf nodes and for a choice without a `when`.
    pub(crate) fn push_child(&mut self, step: ProcessorDefinition) -> bool {
        match self {
            Self::Filter { steps, .. }
            | Self::Pipeline { steps }
            | Self::Loop(LoopDefinition { steps, .. })
            | Self::Split(SplitDefinition { steps, .. })
            | Self::Idempotent(IdempotentDefinition { steps, .. })
            | Self::Aggregate(AggregateDefinition { steps, .. }) => steps.push(step),
            Self::Multicast(MulticastDefinition { branches, .. })
            | Self::LoadBalance { branches, .. } => branches.push(step),
            Self::Choice { whens, otherwise } => match (otherwise, whens.last_mut()) {
                (Some(steps), _) => steps.push(step),
                (None, Some(when)) => when.steps.push(step),
                (None, None) => return false,
            },
            _ => return false,
        }
        true
    }
}

impl fmt::Debug for ProcessorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::To { uri } => write!(f, "To({uri})"),
            Self::ProcessRef { name, .. } => write!(f, "ProcessRef({name})"),
            Self::Process(p) => write!(f, "Process({})", p.name()),
            other if other.is_composite() => {
                f.write_str(other.kind())?;
                f.debug_list().entries(other.children()).finish()
            }
            other => f.write_str(other.kind()),
        }
    }
}

/// A route: one source endpoint and the steps every exchange passes through
#[derive(Clone, Debug)]
pub struct RouteDefinition {
    /// Unique route id
    pub id: String,
    /// Source endpoint URI
    pub from: String,
    /// Top-level steps
    pub steps: Vec<ProcessorDefinition>,
    /// Route-specific error handler (context default when unset)
    pub error_handler: Option<ErrorHandlerDefinition>,
    /// Start with the context
    pub auto_startup: bool,
    /// Free-form description
    pub description: Option<String>,
}

impl RouteDefinition {
    /// Create a route with no steps
    pub fn new(id: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            steps: Vec::new(),
            error_handler: None,
            auto_startup: true,
            description: None,
        }
    }

    /// Append a step
    pub fn step(mut self, step: ProcessorDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Total number of nodes in the route
    pub fn node_count(&self) -> usize {
        self.steps.iter().map(ProcessorDefinition::node_count).sum()
    }
}
