//! Switchyard - Components
//!
//! In-memory components that ship with the routing core.
//!
//! | Scheme   | Producer | Consumer | Purpose |
//! |----------|----------|----------|---------|
//! | `direct` | yes      | one      | Synchronous call into another route |
//! | `seda`   | yes      | many     | Bounded asynchronous queue hop |
//! | `mock`   | yes      | no       | Records messages for test assertions |
//! | `log`    | yes      | no       | One tracing event per exchange |
//! | `timer`  | no       | yes      | Fires empty exchanges on a schedule |
//!
//! # Example
//!
//! ```
//! use switchyard_components::default_components;
//!
//! let components = default_components();
//! assert_eq!(components.schemes(), vec!["direct", "log", "mock", "seda", "timer"]);
//! ```

pub mod direct;
pub mod log;
pub mod mock;
pub mod seda;
pub mod timer;

use std::sync::Arc;

use switchyard_endpoint::ComponentRegistry;

pub use direct::{DirectComponent, DirectEndpoint};
pub use log::{LogComponent, LogEndpoint};
pub use mock::{AssertionError, MockComponent, MockEndpoint};
pub use seda::{DEFAULT_QUEUE_SIZE, SedaComponent, SedaEndpoint, WaitForTaskToComplete};
pub use timer::{TimerComponent, TimerEndpoint};

/// Registry with every built-in component
pub fn default_components() -> ComponentRegistry {
    components_with_queue_size(DEFAULT_QUEUE_SIZE)
}

/// Registry with every built-in component, seda queues defaulting to `size`
pub fn components_with_queue_size(size: usize) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    register_defaults(&mut registry, size);
    registry
}

/// Register the built-in components into an existing registry
///
/// Schemes that are already taken keep their component.
pub fn register_defaults(registry: &mut ComponentRegistry, queue_size: usize) {
    registry.try_register("direct", Arc::new(DirectComponent::new()));
    registry.try_register("seda", Arc::new(SedaComponent::with_default_size(queue_size)));
    registry.try_register("mock", Arc::new(MockComponent::new()));
    registry.try_register("log", Arc::new(LogComponent::new()));
    registry.try_register("timer", Arc::new(TimerComponent::new()));
}
