//! File logging.
//!
//! The terminal belongs to the sheet view, so log records go to
//! `<cache_dir>/logs/sheetstack.log` with daily rotation. Filtering follows
//! `SHEETSTACK_LOG`, then `RUST_LOG`, then `info` (`debug` when `--debug`).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::CacheManager;

const LOG_ENV: &str = "SHEETSTACK_LOG";

fn filter(debug: bool) -> EnvFilter {
    let default = if debug { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// life of the process so buffered records are flushed on exit.
pub fn init(cache: &CacheManager, debug: bool) -> Option<WorkerGuard> {
    let logs_dir = match cache.ensure_logs_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Warning: Could not initialize file logging: {}", e);
            return None;
        }
    };

    let appender = tracing_appender::rolling::daily(logs_dir, "sheetstack.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let installed = tracing_subscriber::registry()
        .with(filter(debug))
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        return None;
    }
    Some(guard)
}
