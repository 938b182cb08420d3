//! Courier Logging
//!
//! Installs a `tracing` subscriber for Courier services, configured from
//! `COURIER_*` environment variables. Library crates in this workspace only
//! emit events through `tracing`; binaries and test harnesses call [`init`]
//! (or [`try_init`]) once at startup.
//!
//! # Usage
//!
//! ```rust,no_run
//! courier_log::init();
//! tracing::info!(tenant_id = "t-1", "webhook worker started");
//! ```
//!
//! # Environment Variables
//!
//! - `COURIER_DEBUG=1` - Enable debug logging
//! - `COURIER_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `COURIER_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `COURIER_LOG_COLOR=1|0` - Enable/disable ANSI colors
//! - `COURIER_LOG_TIMESTAMPS=1|0` - Include timestamps
//!
//! `RUST_LOG`, when set, takes precedence over the configured level.

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level for emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Directive understood by [`EnvFilter`].
    pub fn directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            other => Err(LogError::UnknownLevel(other.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human oriented
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON lines for log shippers
    Json,
}

impl FromStr for Format {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            other => Err(LogError::UnknownFormat(other.to_string())),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while configuring logging.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("unknown log level: {0}")]
    UnknownLevel(String),

    #[error("unknown log format: {0}")]
    UnknownFormat(String),

    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the event target (module path)
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false, // JSON output doesn't use colors
            timestamps: true,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Create config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    ///
    /// Unknown or malformed values fall back to defaults rather than failing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("COURIER_DEBUG").unwrap_or(false);

        let level = lookup("COURIER_LOG_LEVEL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("COURIER_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        let color = flag("COURIER_LOG_COLOR")
            .unwrap_or_else(|| format != Format::Json && lookup("NO_COLOR").is_none());

        Self {
            debug,
            level,
            format,
            color,
            timestamps: flag("COURIER_LOG_TIMESTAMPS").unwrap_or(true),
            module_path: flag("COURIER_LOG_MODULE").unwrap_or(true),
        }
    }

    /// Filter used when `RUST_LOG` is absent.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.directive()))
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Install the global subscriber from the environment, ignoring a subscriber
/// that is already installed.
pub fn init() {
    let _ = try_init();
}

/// Install the global subscriber from the environment.
pub fn try_init() -> Result<(), LogError> {
    try_init_with(&LogConfig::from_env())
}

/// Install the global subscriber with an explicit configuration.
pub fn try_init_with(config: &LogConfig) -> Result<(), LogError> {
    tracing_subscriber::registry()
        .with(fmt_layer(config))
        .with(config.filter())
        .try_init()
        .map_err(|e| LogError::Install(e.to_string()))
}

fn fmt_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.module_path)
        .with_ansi(config.color);

    match (config.format, config.timestamps) {
        #[cfg(feature = "json")]
        (Format::Json, true) => layer.json().boxed(),
        #[cfg(feature = "json")]
        (Format::Json, false) => layer.json().without_time().boxed(),
        (Format::Pretty, true) => layer.pretty().boxed(),
        (Format::Pretty, false) => layer.pretty().without_time().boxed(),
        (_, true) => layer.compact().boxed(),
        (_, false) => layer.compact().without_time().boxed(),
    }
}

// ============================================================================
// Tests
// ============================================================================
