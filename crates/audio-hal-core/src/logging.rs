//! Logging setup for hosts embedding the engine
//!
//! Engine events go to stderr so a host printing results on stdout, like the
//! scenario simulator, keeps its output machine-readable.

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{HalError, Result};

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` has no directive of its own
    pub level: Level,
    pub format: LogFormat,
    /// Tag events with their source file and line
    pub source_location: bool,
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            format: LogFormat::Text,
            source_location: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn with_source_location(mut self) -> Self {
        self.source_location = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(Level::WARN)
    }
}

/// Install a global subscriber; fails if one is already set
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(config.filter())
        .with_writer(std::io::stderr)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| HalError::invalid_argument(format!("logging setup failed: {}", e)))?;

    tracing::debug!("Audio HAL engine v{} logging at {}", crate::VERSION, config.level);
    Ok(())
}

/// Parse a level name as given on a command line or in an environment variable
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(HalError::invalid_argument(format!(
            "unknown log level '{}', expected trace, debug, info, warn or error",
            other
        ))),
    }
}
