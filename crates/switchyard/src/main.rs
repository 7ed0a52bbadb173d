//! Switchyard - message routing engine
//!
//! # Usage
//!
//! ```bash
//! # Run the routes (default)
//! switchyard
//! switchyard --config configs/example.toml
//!
//! # Check a config without starting anything
//! switchyard validate --config configs/example.toml
//!
//! # List the configured routes
//! switchyard routes --config configs/example.toml
//! ```

mod cmd;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use switchyard_config::{LogConfig, LogFormat, LogLevel, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Switchyard - message routing engine
#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Start the routes and run until interrupted
    Run,

    /// Load the config and build every route without starting them
    Validate,

    /// Print the configured routes
    Routes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cmd::load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            init_logging(&config.log, cli.log_level)?;
            cmd::run::run(config).await
        }
        // Validate and Routes only print to stdout
        Command::Validate => cmd::validate::run(&config),
        Command::Routes => cmd::routes::run(&config),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(config: &LogConfig, level: Option<LogLevel>) -> Result<()> {
    let filter = EnvFilter::try_new(config.directive(level))
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (writer, ansi) = match &config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{path}'"))?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
    };

    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(ansi)
        .with_writer(writer);

    match config.format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json())
            .with(filter)
            .init(),
    }

    Ok(())
}
