//! Tracing subscriber setup for the command-line tools.

use anyhow::{Context, Result};
use std::env;
use std::io::IsTerminal;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// Where log events go and which of them are kept.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    log_filter: String,
    include_thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "warn".to_string(),
            include_thread_names: false,
        }
    }
}

impl TracingConfig {
    /// Read the configuration from the environment.
    ///
    /// - `CPUTRACE_LOG_FORMAT`: "json", "pretty", or "compact"; defaults to
    ///   pretty on a terminal and compact otherwise
    /// - `CPUTRACE_LOG` or `RUST_LOG`: filter directives, default `warn`
    /// - `CPUTRACE_LOG_THREAD_NAMES`: "true" or "1" to tag packing workers
    pub fn from_env() -> Self {
        let log_format = env::var("CPUTRACE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_else(|| {
                if std::io::stderr().is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Compact
                }
            });

        let log_filter = env::var("CPUTRACE_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "warn".to_string());

        Self {
            log_format,
            log_filter,
            include_thread_names: env::var("CPUTRACE_LOG_THREAD_NAMES")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Replace the filter with a level picked by `-v` count, unless the
    /// environment already set one.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        let env_filter =
            env::var_os("CPUTRACE_LOG").is_some() || env::var_os("RUST_LOG").is_some();
        if verbosity == 0 || env_filter {
            return self;
        }
        self.log_filter = match verbosity {
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string();
        self
    }

    /// Output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Filter directives.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }
}

/// Install the global subscriber. Events go to stderr so command output on
/// stdout stays parseable.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let threads = config.include_thread_names;

    match config.log_format() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_thread_names(threads)
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_thread_names(threads),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_thread_names(threads),
            )
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")
}
