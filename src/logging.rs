use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::constants::{DEFAULT_LOG_DIR, LOG_DIR_ENV};

/// Installs the global subscriber: human-readable events on stderr plus a
/// daily-rotated JSON log under `$HOST_DEDUP_LOG_DIR` (default `logs/`).
///
/// Stdout is left alone so CSV output can be piped. If the log directory
/// cannot be created only the console layer is installed. Calling this more
/// than once is a no-op.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("host_dedup=info,warn"));
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let log_dir = std::env::var(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));

    let file_layer = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "host_dedup.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The writer flushes on drop of the guard; keep it for the process lifetime
            std::mem::forget(guard);
            Some(fmt::layer().json().with_writer(writer))
        }
        Err(e) => {
            eprintln!("host_dedup: file logging disabled ({}): {}", log_dir.display(), e);
            None
        }
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
}
