//! Configuration validation
//!
//! Validates config consistency:
//! - Route ids are unique (explicit and generated)
//! - Every route has a parseable `from` URI
//! - Required step fields are present and expressions parse
//! - Error handlers are complete
//! - Global settings are in range

use std::collections::HashSet;

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_global(config)?;
    validate_route_ids(config)?;
    config.error_handler.to_definition("context")?;
    for (index, route) in config.routes.iter().enumerate() {
        route.to_definition(index)?;
    }
    Ok(())
}

fn validate_global(config: &Config) -> Result<()> {
    if config.global.seda_queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "global",
            "-",
            "seda_queue_size",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_route_ids(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        let id = route.route_id(index);
        if id.trim().is_empty() {
            return Err(ConfigError::missing_field("route", format!("#{}", index + 1), "id"));
        }
        if !seen.insert(id.clone()) {
            return Err(ConfigError::duplicate_route(id));
        }
    }
    Ok(())
}
