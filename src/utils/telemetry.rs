// src/utils/telemetry.rs

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: stdout plus a daily-rolling file under
/// `log_dir/<file_name>`.
///
/// Keep the returned guard alive for the life of the process, otherwise
/// buffered file output is lost on exit.
pub fn init_tracing(rust_log: &str, log_dir: &str, file_name: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
