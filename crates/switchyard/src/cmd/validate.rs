//! Validate command - build every route without starting it

use anyhow::Result;
use switchyard_config::Config;

use super::build_context;

/// Build the context and report what would run
pub fn run(config: &Config) -> Result<()> {
    let context = build_context(config)?;
    println!(
        "config OK: context '{}' with {} route(s)",
        context.name(),
        context.routes().len()
    );
    Ok(())
}
