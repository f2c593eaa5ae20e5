//! Tracing Initialisation

use std::fmt;
use std::str::FromStr;

use kernel::error::app_error::AppResult;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Env, FromEnv};

/// Log verbosity
///
/// Unknown names fall back to [`LogLevel::Debug`]. The zap-style levels
/// above `error` (`dpanic`, `panic`, `fatal`) collapse into `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" | "dpanic" | "panic" | "fatal" => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }

    pub const fn as_str(&self) -> &'static str {
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
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LogLevel::parse(s))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logger configuration (`LOGGER_*` keys)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level: LogLevel,
    /// Include source file and line in every event
    pub caller: bool,
}

impl FromEnv for LoggerConfig {
    fn from_env(env: &Env<'_>) -> AppResult<Self> {
        Ok(Self {
            level: LogLevel::parse(&env.string("LOGGER_LEVEL", "debug")),
            caller: env.bool("LOGGER_CALLER", false)?,
        })
    }
}

/// Directive used when `RUST_LOG` is not set
pub fn default_directive(app_name: &str, level: LogLevel) -> String {
    format!("{app_name}={level},pow={level},platform={level}")
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(app_name: &str, config: &LoggerConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(app_name, config.level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(config.caller)
                .with_line_number(config.caller),
        )
        .init();
}
