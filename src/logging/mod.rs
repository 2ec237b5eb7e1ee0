//! Logging infrastructure - structured tracing for the bridge
//!
//! Design: `tracing` events with an `event` field naming what happened, so that
//! bind/unbind, instance lifecycle and dropped messages can be filtered in
//! JSON output. The subscriber is optional; a host that installs its own
//! keeps it.

use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::{debug, info, warn, Level};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::errors::{BridgeError, InvocationError};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rotated files
    File { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. "scriptbridge::channel=trace"
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // SCRIPTBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("SCRIPTBRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // SCRIPTBRIDGE_LOG_FORMAT: pretty, compact, json
        if let Ok(format) = std::env::var("SCRIPTBRIDGE_LOG_FORMAT") {
            config.format = match format.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            };
        }

        // SCRIPTBRIDGE_LOG_DIR: write rotated files there instead of stderr
        if let Ok(directory) = std::env::var("SCRIPTBRIDGE_LOG_DIR") {
            config.output = LogOutput::File { directory, prefix: "scriptbridge".to_string() };
        }

        config
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber.
///
/// Only the first call does anything. Returns the appender guard, which must be kept
/// alive until shutdown so buffered lines are flushed. If the host already installed a
/// subscriber it stays in place and no guard is returned.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    if LOGGER_INITIALIZED.get().is_some() {
        return None;
    }

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events_config(config.span_events))
        .with_target(true);
    let layer = match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    };

    let installed = tracing_subscriber::registry()
        .with(layer)
        .with(build_filter(&config))
        .try_init()
        .is_ok();
    if !installed {
        return None;
    }

    let _ = LOGGER_INITIALIZED.set(());
    Some(guard)
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_logging(LogConfig::from_env())
}

/// Verbose stderr logging for development
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(
        LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Pretty)
            .with_span_events(true),
    )
}

/// JSON files under `log_dir`, info and above
pub fn init_prod_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig::new().with_format(LogFormat::Json).with_output(LogOutput::File {
        directory: log_dir.as_ref().to_string_lossy().to_string(),
        prefix: "scriptbridge".to_string(),
    }))
}

pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(directives) => directives.split(',').fold(base, |filter, directive| {
            match directive.trim().parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(_) => {
                    warn!("Invalid filter directive: {}", directive);
                    filter
                }
            }
        }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

// ============================================================================
// Bridge-specific logging functions
// ============================================================================

pub fn log_bind(identifier: &str, namespace: &str, class: &str) {
    info!(
        event = "bind",
        channel = identifier,
        namespace,
        class,
        "Plugin object bound"
    );
}

pub fn log_unbind(identifier: &str, namespace: &str) {
    info!(event = "unbind", channel = identifier, namespace, "Plugin object unbound");
}

pub fn log_instance_bound(target: i64, namespace: &str) {
    debug!(event = "instance_bound", target, namespace, "Instance bound");
}

pub fn log_instance_unbound(target: i64, namespace: &str) {
    debug!(event = "instance_unbound", target, namespace, "Instance unbound");
}

/// A message that could not be routed; the channel keeps going
pub fn log_message_dropped(error: &BridgeError, body: &serde_json::Value) {
    warn!(
        event = "message_dropped",
        kind = error.kind(),
        error = %error,
        body = %body,
        "Message dropped"
    );
}

pub fn log_construction_failed(class: &str, error: &BridgeError) {
    warn!(event = "construction_failed", class, error = %error, "Failed to create instance");
}

#[inline]
pub fn log_invocation_error(error: &InvocationError) {
    warn!(event = "invocation_error", error = %error, "Native call abandoned");
}
