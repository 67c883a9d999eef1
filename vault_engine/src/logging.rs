use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::VaultConfig;

/// Initialize tracing with both stdout and rolling file output.
/// Format: human-readable logfmt OR JSON if desired.
///
/// Keep the returned guard alive for the life of the process; dropping it flushes the file writer.
pub fn init_logging(log_dir: &Path, json_format: bool, filter: &str) -> anyhow::Result<WorkerGuard> {
    // Log file = {log_dir}/vault.log.{date}
    let file_appender = rolling::daily(log_dir, "vault.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_new(filter)?;

    // Console layer (stdout for dev visibility)
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_level(true);

    let file_layer = if json_format {
        fmt::layer()
            .json()
            .with_writer(non_blocking_file)
            .with_current_span(false)
            .with_span_list(false)
            .with_level(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking_file)
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// [`init_logging`] driven by a loaded [`VaultConfig`].
pub fn init_from_config(config: &VaultConfig) -> anyhow::Result<WorkerGuard> {
    init_logging(&config.log_dir, config.log_json, &config.log_filter)
}
