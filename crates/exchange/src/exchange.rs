//! The exchange: one unit of work moving through a route

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::properties::CORRELATION_ID;
use crate::{Body, ExchangeError, ExchangeId, Message};

#[cfg(test)]
#[path = "exchange_test.rs"]
mod tests;

/// Callback fired once when the exchange's unit of work completes
pub type OnCompletion = Box<dyn FnOnce(&Exchange) + Send + Sync>;

/// Message exchange pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExchangePattern {
    /// Fire-and-forget
    #[default]
    InOnly,
    /// Request-reply: the caller waits for the routed message
    InOut,
}

impl ExchangePattern {
    /// Get as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InOnly => "InOnly",
            Self::InOut => "InOut",
        }
    }
}

impl fmt::Display for ExchangePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state, driven by the route dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExchangeState {
    /// Created by a consumer or producer template, not yet routed
    #[default]
    Created,
    /// Owned by a dispatcher and flowing through processors
    Routing,
    /// Routing finished; completion callbacks are firing
    Completing,
    /// Unit of work finished
    Done,
}

/// A message exchange
///
/// Owns its input message, an optional output message, an optional
/// exception and a property bag. Completion callbacks are owned as well and
/// are never cloned: [`Exchange::copy`] starts with an empty list.
pub struct Exchange {
    id: ExchangeId,
    pattern: ExchangePattern,
    in_message: Message,
    out_message: Option<Message>,
    original_message: Option<Message>,
    exception: Option<ExchangeError>,
    caught_exception: Option<ExchangeError>,
    failure_handled: bool,
    properties: HashMap<String, Value>,
    completions: Vec<OnCompletion>,
    state: ExchangeState,
    route_stop: bool,
    created: DateTime<Utc>,
    from_route_id: Option<String>,
}

impl Exchange {
    /// Create an exchange with an empty input message
    pub fn new(pattern: ExchangePattern) -> Self {
        Self {
            id: ExchangeId::generate(),
            pattern,
            in_message: Message::new(),
            out_message: None,
            original_message: None,
            exception: None,
            caught_exception: None,
            failure_handled: false,
            properties: HashMap::new(),
            completions: Vec::new(),
            state: ExchangeState::Created,
            route_stop: false,
            created: Utc::now(),
            from_route_id: None,
        }
    }

    /// Create an InOnly exchange carrying the given body
    pub fn with_body(body: impl Into<Body>) -> Self {
        let mut exchange = Self::new(ExchangePattern::InOnly);
        exchange.in_message.set_body(body);
        exchange
    }

    /// Create an exchange around an existing message
    pub fn with_message(pattern: ExchangePattern, message: Message) -> Self {
        let mut exchange = Self::new(pattern);
        exchange.in_message = message;
        exchange
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Exchange id
    #[inline]
    pub fn id(&self) -> &ExchangeId {
        &self.id
    }

    /// Exchange pattern
    #[inline]
    pub fn pattern(&self) -> ExchangePattern {
        self.pattern
    }

    /// Change the exchange pattern
    #[inline]
    pub fn set_pattern(&mut self, pattern: ExchangePattern) {
        self.pattern = pattern;
    }

    /// Whether a reply is expected
    #[inline]
    pub fn is_in_out(&self) -> bool {
        self.pattern == ExchangePattern::InOut
    }

    /// When the exchange was created
    #[inline]
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Id of the route whose consumer created the exchange
    #[inline]
    pub fn from_route_id(&self) -> Option<&str> {
        self.from_route_id.as_deref()
    }

    /// Record the originating route; later calls do not overwrite it
    pub fn set_from_route_id(&mut self, route_id: impl Into<String>) {
        if self.from_route_id.is_none() {
            self.from_route_id = Some(route_id.into());
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// The input message
    #[inline]
    pub fn in_message(&self) -> &Message {
        &self.in_message
    }

    /// Mutable input message
    #[inline]
    pub fn in_message_mut(&mut self) -> &mut Message {
        &mut self.in_message
    }

    /// Replace the input message
    #[inline]
    pub fn set_in(&mut self, message: Message) {
        self.in_message = message;
    }

    /// The current message: the output if one was set, else the input
    #[inline]
    pub fn message(&self) -> &Message {
        self.out_message.as_ref().unwrap_or(&self.in_message)
    }

    /// Mutable current message
    #[inline]
    pub fn message_mut(&mut self) -> &mut Message {
        match self.out_message {
            Some(ref mut out) => out,
            None => &mut self.in_message,
        }
    }

    /// Set the output message
    #[inline]
    pub fn set_out(&mut self, message: Message) {
        self.out_message = Some(message);
    }

    /// The output message, if any
    #[inline]
    pub fn out(&self) -> Option<&Message> {
        self.out_message.as_ref()
    }

    /// Whether an output message was set
    #[inline]
    pub fn has_out(&self) -> bool {
        self.out_message.is_some()
    }

    /// Snapshot the input message as it entered the route
    ///
    /// Only the first snapshot is kept.
    pub fn remember_original(&mut self) {
        if self.original_message.is_none() {
            self.original_message = Some(self.in_message.clone());
        }
    }

    /// The input message as it entered the route, if remembered
    #[inline]
    pub fn original_message(&self) -> Option<&Message> {
        self.original_message.as_ref()
    }

    /// Make the output message the input for the next step
    pub fn promote_out(&mut self) {
        if let Some(out) = self.out_message.take() {
            self.in_message = out;
        }
    }

    // ========================================================================
    // Failure
    // ========================================================================

    /// Record a failure on the exchange
    #[inline]
    pub fn set_exception(&mut self, error: ExchangeError) {
        self.exception = Some(error);
    }

    /// The current failure, if any
    #[inline]
    pub fn exception(&self) -> Option<&ExchangeError> {
        self.exception.as_ref()
    }

    /// Remove and return the current failure
    #[inline]
    pub fn take_exception(&mut self) -> Option<ExchangeError> {
        self.exception.take()
    }

    /// Whether a failure is recorded
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.exception.is_some()
    }

    /// Clear the failure and remember it as handled
    ///
    /// Used by handlers that absorb a failure (dead letter channel): the
    /// consumer then sees success while the cause stays inspectable.
    pub fn mark_failure_handled(&mut self) {
        if let Some(error) = self.exception.take() {
            self.caught_exception = Some(error);
        }
        self.failure_handled = true;
    }

    /// The failure absorbed by an error handler
    #[inline]
    pub fn caught_exception(&self) -> Option<&ExchangeError> {
        self.caught_exception.as_ref()
    }

    /// Whether an error handler absorbed a failure
    #[inline]
    pub fn is_failure_handled(&self) -> bool {
        self.failure_handled
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Get a property
    #[inline]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Set a property, returning the previous value
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    /// Remove a property
    #[inline]
    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// All properties
    #[inline]
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    // ========================================================================
    // Routing state
    // ========================================================================

    /// Lifecycle state
    #[inline]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Move to a lifecycle state
    #[inline]
    pub fn set_state(&mut self, state: ExchangeState) {
        self.state = state;
    }

    /// Ask the current route to stop routing this exchange, without failure
    #[inline]
    pub fn stop_route(&mut self) {
        self.route_stop = true;
    }

    /// Whether routing was stopped
    #[inline]
    pub fn is_route_stopped(&self) -> bool {
        self.route_stop
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Register a callback fired when the unit of work completes
    pub fn add_on_completion<F>(&mut self, callback: F)
    where
        F: FnOnce(&Exchange) + Send + Sync + 'static,
    {
        self.completions.push(Box::new(callback));
    }

    /// Number of pending completion callbacks
    #[inline]
    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }

    /// Fire all pending callbacks in registration order
    ///
    /// The list is drained first, so a second call fires nothing.
    pub fn complete(&mut self) {
        let callbacks = std::mem::take(&mut self.completions);
        for callback in callbacks {
            callback(self);
        }
    }

    /// Move this exchange's callbacks onto `parent`
    pub fn handover_completions(&mut self, parent: &mut Exchange) {
        parent.completions.append(&mut self.completions);
    }

    /// Take over the routing result of `other`
    ///
    /// Messages, exception, properties and the stop flag are moved from
    /// `other`; its callbacks are appended to this exchange's. Identity,
    /// pattern, state and creation time stay as they are.
    pub fn merge_result(&mut self, mut other: Exchange) {
        self.in_message = other.in_message;
        self.out_message = other.out_message;
        self.exception = other.exception;
        self.caught_exception = other.caught_exception;
        self.failure_handled = other.failure_handled;
        self.properties = other.properties;
        self.route_stop = other.route_stop;
        self.completions.append(&mut other.completions);
    }

    // ========================================================================
    // Copies
    // ========================================================================

    /// Copy with the same id and an empty callback list
    pub fn copy(&self) -> Self {
        Self {
            id: self.id.clone(),
            pattern: self.pattern,
            in_message: self.in_message.clone(),
            out_message: self.out_message.clone(),
            original_message: self.original_message.clone(),
            exception: self.exception.clone(),
            caught_exception: self.caught_exception.clone(),
            failure_handled: self.failure_handled,
            properties: self.properties.clone(),
            completions: Vec::new(),
            state: self.state,
            route_stop: self.route_stop,
            created: self.created,
            from_route_id: self.from_route_id.clone(),
        }
    }

    /// Copy with a fresh id, correlated to this exchange
    ///
    /// The copy starts without output, exception or stop flag and carries
    /// the parent id in the `CorrelationId` property.
    pub fn correlated_copy(&self) -> Self {
        let mut copy = self.copy();
        copy.id = ExchangeId::generate();
        copy.created = Utc::now();
        copy.promote_out();
        copy.exception = None;
        copy.caught_exception = None;
        copy.failure_handled = false;
        copy.route_stop = false;
        copy.properties
            .insert(CORRELATION_ID.to_string(), Value::String(self.id.to_string()));
        copy
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new(ExchangePattern::InOnly)
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("state", &self.state)
            .field("in", &self.in_message)
            .field("out", &self.out_message)
            .field("exception", &self.exception)
            .field("properties", &self.properties)
            .field("completions", &self.completions.len())
            .finish()
    }
}
