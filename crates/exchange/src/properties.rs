//! Well-known exchange property and header keys
//!
//! Properties are set by EIPs on the exchange; headers are set on the message
//! where downstream endpoints are expected to see them.

/// Id of the parent exchange on split/multicast sub-exchanges
pub const CORRELATION_ID: &str = "CorrelationId";

/// Zero-based index of the current loop iteration
pub const LOOP_INDEX: &str = "LoopIndex";

/// Total iterations for a counted loop
pub const LOOP_SIZE: &str = "LoopSize";

/// Zero-based index of the current split item
pub const SPLIT_INDEX: &str = "SplitIndex";

/// Total number of split items
pub const SPLIT_SIZE: &str = "SplitSize";

/// Whether this is the last split item
pub const SPLIT_COMPLETE: &str = "SplitComplete";

/// Zero-based index of the multicast branch
pub const MULTICAST_INDEX: &str = "MulticastIndex";

/// Result of the last filter predicate
pub const FILTER_MATCHED: &str = "FilterMatched";

/// URI of the last endpoint the exchange was sent to
pub const TO_ENDPOINT: &str = "ToEndpoint";

/// URI of the endpoint that failed, set by the dead letter channel
pub const FAILURE_ENDPOINT: &str = "FailureEndpoint";

/// Id of the route where a failure was handled
pub const FAILURE_ROUTE_ID: &str = "FailureRouteId";

/// Number of exchanges aggregated into this one
pub const AGGREGATED_SIZE: &str = "AggregatedSize";

/// Correlation key of an aggregated exchange
pub const AGGREGATED_CORRELATION_KEY: &str = "AggregatedCorrelationKey";

/// Whether the idempotent consumer saw this message before
pub const DUPLICATE_MESSAGE: &str = "DuplicateMessage";

/// Timer endpoint name
pub const TIMER_NAME: &str = "TimerName";

/// One-based count of timer firings
pub const TIMER_COUNTER: &str = "TimerCounter";

/// RFC 3339 time of the timer firing
pub const TIMER_FIRED_TIME: &str = "TimerFiredTime";

/// Header: redelivery attempt number (1-based)
pub const REDELIVERY_COUNTER: &str = "RedeliveryCounter";

/// Header: whether the message is being redelivered
pub const REDELIVERED: &str = "Redelivered";
