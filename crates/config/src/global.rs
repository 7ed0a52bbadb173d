//! Global configuration settings
//!
//! Context-wide settings with sensible defaults.

use std::time::Duration;

use serde::Deserialize;

/// Settings that apply to the whole context
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Context name, used in log events
    /// Default: "switchyard"
    pub name: String,

    /// How long a stopping route waits for in-flight exchanges
    /// Default: 30s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Capacity of `seda:` queues that do not set `size`
    /// Default: 1000
    pub seda_queue_size: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            name: "switchyard".into(),
            shutdown_timeout: Duration::from_secs(30),
            seda_queue_size: 1000,
        }
    }
}
