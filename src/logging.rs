//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! [`init`] picks the mode from [`LoggingConfig`]:
//! - **File** ([`init_production`]): JSON file layer (daily rotation) + console layer
//! - **Console** ([`init_cli`]): stderr only
//!
//! Both honour `RUST_LOG` first and the configured level otherwise. JSON
//! lines carry the fields of the enclosing span, so every event logged
//! while parsing a request shows its `request_id`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Prefix of the daily log files (`bondprompt.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "bondprompt.log";

/// Holds the non-blocking writer guard for file logging.
///
/// The [`WorkerGuard`] must be kept alive for the duration of the process.
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    dir: PathBuf,
}

impl LoggingGuard {
    /// Directory the log files are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Build the event filter.
///
/// A non-empty `rust_log` wins; otherwise `level` from the config applies.
///
/// # Errors
///
/// Returns an error if the chosen directive does not parse.
pub fn resolve_filter(rust_log: Option<&str>, level: &str) -> anyhow::Result<EnvFilter> {
    let (directive, source) = match rust_log.map(str::trim) {
        Some(env) if !env.is_empty() => (env, EnvFilter::DEFAULT_ENV),
        _ => (level, "logging.level"),
    };
    EnvFilter::try_new(directive)
        .with_context(|| format!("invalid log filter in {source}: {directive:?}"))
}

/// JSON line layer: one object per event, with the current span's fields
/// under `span` and no span list.
pub fn json_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(writer)
}

/// Install the subscriber described by `config`.
///
/// Returns a guard only in file mode.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the logs directory cannot be
/// created, or a global subscriber is already installed in file mode.
pub fn init(config: &LoggingConfig) -> anyhow::Result<Option<LoggingGuard>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(rust_log.as_deref(), &config.level)?;
    match &config.dir {
        Some(dir) => init_production(dir, filter).map(Some),
        None => {
            init_cli(filter);
            Ok(None)
        }
    }
}

/// Initialise file logging.
///
/// Writes JSON logs to `{logs_dir}/bondprompt.log.YYYY-MM-DD` with daily
/// rotation, including the current span's fields on each line. Also emits
/// human-readable output to stderr.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init_production(logs_dir: &Path, filter: EnvFilter) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer(non_blocking))
        .with(console_layer)
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(LoggingGuard {
        _guard: guard,
        dir: logs_dir.to_path_buf(),
    })
}

/// Initialise console-only logging to stderr. A second call is a no-op.
pub fn init_cli(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
