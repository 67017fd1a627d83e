//! Logging Infrastructure
//!
//! Provides:
//! - Per-request context and spans for the access log middleware
//! - Tracing subscriber setup (console + daily rotating file)

mod request_context;

pub use request_context::{RequestContext, RequestSpan};

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;

/// Options for `init_tracing`
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for rotated log files; `None` logs to the console only
    pub logs_dir: Option<PathBuf>,
    /// File name prefix (files look like `accesslog.2026-01-22.log`)
    pub file_prefix: String,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: dirs::data_local_dir().map(|dir| dir.join("accesslog").join("logs")),
            file_prefix: "accesslog".to_string(),
            default_filter: "info,accesslog_core=debug,accesslog_axum=debug,access_log=info"
                .to_string(),
        }
    }
}

/// Initialize tracing with a compact console layer and, when a logs
/// directory is configured, a daily rotating file layer.
///
/// The returned guard must be kept alive for file output to be flushed.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // RUST_LOG takes precedence over the configured default
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = match &config.logs_dir {
        Some(logs_dir) => {
            std::fs::create_dir_all(logs_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(logs_dir)?;
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
