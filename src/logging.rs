use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";

/// Console output plus a daily JSON log file under `logs/`.
///
/// `RUST_LOG` overrides the default `billogram_import=info` filter. Buffered
/// file lines are flushed when the returned guard is dropped, so hold it for
/// the whole run.
pub fn init_logging() -> WorkerGuard {
    let _ = fs::create_dir_all(LOG_DIR);
    let (file_writer, guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::daily(LOG_DIR, "billogram_import.log"),
    );

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("billogram_import=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(false).with_writer(std::io::stdout))
        .init();

    guard
}
