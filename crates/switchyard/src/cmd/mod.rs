//! CLI commands

pub mod routes;
pub mod run;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use switchyard_components::components_with_queue_size;
use switchyard_config::Config;
use switchyard_engine::Context;

/// Config files tried when `--config` is not given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["configs/switchyard.toml", "switchyard.toml"];

/// Load the configuration
///
/// An explicit path must exist. Without one the default paths are tried,
/// falling back to an empty configuration.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    for candidate in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if candidate.exists() {
            return Config::from_file(&candidate).context("failed to load configuration");
        }
    }
    Ok(Config::default())
}

/// Build a context holding every configured route
///
/// Routes are compiled and their consumers created; nothing is started.
pub fn build_context(config: &Config) -> Result<Context> {
    let error_handler = config
        .error_handler_definition()
        .context("invalid error handler")?;

    let mut context = Context::new()
        .with_components(components_with_queue_size(config.global.seda_queue_size))
        .with_name(config.global.name.as_str())
        .with_shutdown_timeout(config.global.shutdown_timeout)
        .with_error_handler(error_handler);

    let definitions = config.route_definitions().context("invalid route")?;
    context
        .add_route_definitions(definitions)
        .context("failed to build routes")?;
    Ok(context)
}
