//! Logging setup for the finalize node.
//!
//! Installs the global `tracing` subscriber. The level comes from the
//! configuration or the command line unless `RUST_LOG` is set, in which case
//! `RUST_LOG` wins.
//!
//! Two output formats are supported:
//!
//! - **Text** ([`LogFormat::Text`]): human-readable, with optional ANSI colors
//! - **JSON** ([`LogFormat::Json`]): one JSON object per event, for log
//!   aggregation
//!
//! ```ignore
//! use finalize_common::LogLevel;
//!
//! let config = LogConfig::default().with_level(LogLevel::Debug);
//! logging::init(&config)?;
//! ```

use finalize_common::{LogFormat, LogLevel, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Noisy dependency targets capped at `warn`.
const QUIET_TARGETS: &[&str] = &["r2d2=warn"];

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Enable ANSI color codes (text format only).
    pub ansi_colors: bool,
    /// Include file/line source locations in output.
    pub with_source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            ansi_colors: true,
            with_source_location: false,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level,
            format: config.format,
            ansi_colors: config.format == LogFormat::Text,
            with_source_location: config.level == LogLevel::Trace,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self.ansi_colors = format == LogFormat::Text;
        self
    }
}

/// Builds the filter for `level`, with dependency noise capped.
pub fn build_filter(level: LogLevel) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::new(level.as_str());
    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Initializes the global subscriber. Call once, at startup.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(config.level)?,
    };

    match config.format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(config.ansi_colors)
                .with_target(true)
                .with_file(config.with_source_location)
                .with_line_number(config.with_source_location);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(true)
                .with_current_span(true);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }
    Ok(())
}
