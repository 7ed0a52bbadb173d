//! Switchyard Configuration
//!
//! TOML-based route and context configuration with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use switchyard_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[[routes]]\nfrom = \"timer:tick\"\nsteps = [{ type = \"to\", uri = \"log:ticks\" }]").unwrap();
//! assert_eq!(config.routes.len(), 1);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [global]
//! name = "orders"
//! shutdown_timeout = "10s"
//!
//! [log]
//! level = "info"
//!
//! [error_handler]
//! kind = "dead_letter"
//! dead_letter_uri = "seda:failed"
//! maximum_redeliveries = 2
//!
//! [[routes]]
//! id = "intake"
//! from = "seda:orders?concurrentConsumers=4"
//! steps = [
//!     { type = "filter", predicate = "header.valid == true", steps = [
//!         { type = "to", uri = "direct:ship" },
//!     ] },
//! ]
//! ```

mod error;
mod error_handler;
mod global;
mod logging;
mod routes;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use error_handler::{ErrorHandlerConfig, ErrorHandlerKind};
pub use global::GlobalConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use routes::{BalancePolicyName, RouteConfig, StepConfig, StrategyName, WhenConfig};

use serde::Deserialize;
use switchyard_model::{ErrorHandlerDefinition, RouteDefinition};

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Context settings (name, shutdown timeout, queue sizes)
    pub global: GlobalConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Error handler for routes that do not set their own
    pub error_handler: ErrorHandlerConfig,

    /// Route definitions, in start order
    pub routes: Vec<RouteConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML or
    /// describes invalid routes.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Context-wide error handler definition
    pub fn error_handler_definition(&self) -> Result<ErrorHandlerDefinition> {
        self.error_handler.to_definition("context")
    }

    /// Route definitions in configuration order
    pub fn route_definitions(&self) -> Result<Vec<RouteDefinition>> {
        self.routes
            .iter()
            .enumerate()
            .map(|(index, route)| route.to_definition(index))
            .collect()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
