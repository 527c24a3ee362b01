//! Logging setup on top of `tracing-subscriber`
//!
//! Settings come from `RUST_LOG` / `LOG_LEVEL` / `LOG_FORMAT`, and may be
//! overridden by the `logging.*` keys of an [`Environment`].

use crate::config::Environment;
use crate::constants::{LOGGING_FILTER_KEY, LOGGING_FORMAT_KEY, LOGGING_LEVEL_KEY};
use crate::error::{ContainerError, ContainerResult};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Minimum level of emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

const LEVEL_NAMES: &[(&str, LogLevel)] = &[
    ("trace", LogLevel::Trace),
    ("debug", LogLevel::Debug),
    ("info", LogLevel::Info),
    ("information", LogLevel::Info),
    ("warn", LogLevel::Warn),
    ("warning", LogLevel::Warn),
    ("error", LogLevel::Error),
    ("fatal", LogLevel::Error),
    ("critical", LogLevel::Error),
];

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ContainerError;

    fn from_str(s: &str) -> ContainerResult<Self> {
        let wanted = s.trim().to_lowercase();
        LEVEL_NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, level)| *level)
            .ok_or_else(|| ContainerError::Config(format!("unknown log level '{}'", s)))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the `fmt` layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, the default
    #[default]
    Compact,
    Full,
    Json,
    /// Multi-line, for development
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Full => "full",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = ContainerError;

    fn from_str(s: &str) -> ContainerResult<Self> {
        [LogFormat::Compact, LogFormat::Full, LogFormat::Json, LogFormat::Pretty]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ContainerError::Config(format!("unknown log format '{}'", s)))
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Print the module path of each event
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// Directive list such as `weave_core=debug,gateway=trace`; wins over `level`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::default(),
            show_target: false,
            show_thread_ids: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Read `RUST_LOG`, `LOG_LEVEL` and `LOG_FORMAT`
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|value| !value.is_empty());

        Self {
            level: read("LOG_LEVEL")
                .and_then(|value| value.parse().ok())
                .unwrap_or(LogLevel::Info),
            format: read("LOG_FORMAT")
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            filter: read("RUST_LOG"),
            ..Self::default()
        }
    }

    /// Override settings with `logging.*` keys of the environment
    ///
    /// Unparseable values are reported and ignored.
    pub fn with_environment(mut self, environment: &Environment) -> Self {
        fn parsed<T: FromStr<Err = ContainerError>>(environment: &Environment, key: &str) -> Option<T> {
            let value = environment.get_string(key)?;
            value
                .parse()
                .map_err(|e| tracing::warn!("Ignoring {}: {}", key, e))
                .ok()
        }

        if let Some(level) = parsed(environment, LOGGING_LEVEL_KEY) {
            self.level = level;
        }

        if let Some(format) = parsed(environment, LOGGING_FORMAT_KEY) {
            self.format = format;
        }

        if let Some(filter) = environment.get_string(LOGGING_FILTER_KEY) {
            self.filter = Some(filter);
        }

        self
    }

    fn env_filter(&self) -> EnvFilter {
        self.filter
            .as_deref()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str()))
    }

    fn format_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
        }
    }

    /// Install the global subscriber
    ///
    /// Fails when a global subscriber is already installed.
    pub fn init(self) -> ContainerResult<()> {
        tracing_subscriber::registry()
            .with(self.format_layer())
            .with(self.env_filter())
            .try_init()
            .map_err(|e| ContainerError::Config(format!("failed to initialize logging: {}", e)))
    }
}
