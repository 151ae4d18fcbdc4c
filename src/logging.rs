//! Structured logging setup.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `ROUTEGATE_LOG_LEVEL` | `info` | `EnvFilter` directive (`debug`, `routegate=trace,info`, ...) |
//! | `ROUTEGATE_LOG_FORMAT` | `json` | `json` or `pretty` |
//!
//! `RUST_LOG` directives, when set, are added on top of the configured level.
//! Records go to stderr so command output on stdout stays clean.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or filter directive.
    pub level: String,
    pub format: LogFormat,
    /// Include file and line in each record.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Ok(level) = env::var("ROUTEGATE_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("ROUTEGATE_LOG_FORMAT") {
            self.format = LogFormat::parse(&format);
        }
    }
}

/// Install the global subscriber.
///
/// Returns an error for an unparsable level. Calling it again once a
/// subscriber is installed is a no-op.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log level '{}'", config.level))?;
    if let Ok(extra) = env::var("RUST_LOG") {
        for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
            }
        }
    }

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    if tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialised, keeping existing subscriber");
    }
    Ok(())
}
