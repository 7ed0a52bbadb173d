//! Logging configuration
//!
//! Drives the subscriber the binary installs. Library crates only emit
//! `tracing` events.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Very verbose, every exchange hop
    Trace,
    /// Per-exchange outcomes
    Debug,
    /// Lifecycle events (default)
    #[default]
    Info,
    /// Warnings only
    Warn,
    /// Errors only
    Error,
}

impl LogLevel {
    /// Level as a filter directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unknown log level '{other}' (expected trace, debug, info, warn or error)"
            )),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Console,
    /// One JSON object per event
    Json,
}

/// Log output destination
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Write to stdout (default)
    #[default]
    Stdout,
    /// Write to stderr
    Stderr,
    /// Append to a file
    #[serde(untagged)]
    File(String),
}

/// Logging configuration
///
/// # Example
///
/// ```toml
/// [log]
/// level = "info"
/// format = "json"
/// output = "stderr"
///
/// [log.targets]
/// switchyard_components = "debug"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default level
    pub level: LogLevel,

    /// Output format (console, json)
    pub format: LogFormat,

    /// Output destination (stdout, stderr, or file path)
    pub output: LogOutput,

    /// Per-target level overrides
    pub targets: BTreeMap<String, LogLevel>,
}

impl LogConfig {
    /// Filter directive for `EnvFilter`, e.g. `info,switchyard_engine=debug`
    ///
    /// `level` replaces the configured default level when given.
    pub fn directive(&self, level: Option<LogLevel>) -> String {
        let mut directive = level.unwrap_or(self.level).as_str().to_string();
        for (target, level) in &self.targets {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(level.as_str());
        }
        directive
    }
}
