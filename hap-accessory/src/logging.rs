//! Logging infrastructure for the accessory bridge
//!
//! This module provides a centralized logging system that can be configured
//! for different environments: silent when embedded, readable on a console,
//! or machine-readable when shipped to a log collector.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output - the embedding application owns logging
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics for debugging
    Debug,
    /// One JSON object per line
    Json,
}

impl LoggingMode {
    /// Parse a `HAPSYNC_LOG_MODE` value
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "silent" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            "json" => Some(LoggingMode::Json),
            _ => None,
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// Call this early, before adding accessories, so priming is logged too.
///
/// # Examples
///
/// ```rust,ignore
/// // Embedded in a host that already logs
/// hap_accessory::logging::init_logging(LoggingMode::Silent)?;
///
/// // Console output while developing
/// hap_accessory::logging::init_logging(LoggingMode::Development)?;
///
/// // Every characteristic publish and command, with source locations
/// hap_accessory::logging::init_logging(LoggingMode::Debug)?;
/// ```
///
/// # Environment Variables
///
/// - `HAPSYNC_LOG_LEVEL`: Override log level or filter (e.g. "hap_accessory=debug")
/// - `RUST_LOG`: Used when `HAPSYNC_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(fmt::layer().json().with_current_span(false))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from environment variables
///
/// Reads `HAPSYNC_LOG_MODE` ("silent", "development", "debug", "json").
/// Unset means Silent; an unrecognised value is an error.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("HAPSYNC_LOG_MODE") {
        Ok(value) => LoggingMode::from_env_value(&value)
            .ok_or_else(|| LoggingError::InvalidEnv(format!("HAPSYNC_LOG_MODE={}", value)))?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("HAPSYNC_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{}: {}", directives, e)))
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
