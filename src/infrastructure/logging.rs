use std::io;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::LoggingConfig, infrastructure::directories::ResolvedPaths};

/// Keeps the non-blocking file writer alive for the process lifetime; its
/// presence doubles as the init-once flag.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

const LOG_FILE_PREFIX: &str = "mailsweep.log";

/// Console plus daily-rolling file output. `RUST_LOG` wins over the
/// configured level. Safe to call more than once; only the first call
/// installs the subscriber.
pub fn init_tracing(logging: &LoggingConfig, paths: &ResolvedPaths) -> Result<()> {
    LOG_GUARD.get_or_try_init::<_, anyhow::Error>(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&logging.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(io::stdout)
                    .with_target(true)
                    .with_ansi(true),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_ansi(false),
            )
            .try_init();
        if installed.is_ok() {
            tracing::info!(
                level = %logging.level,
                logs = %paths.logs_dir.display(),
                "tracing initialized"
            );
        }

        Ok(guard)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::DirectoryConfig;
    use crate::infrastructure::directories::ensure_directories;

    use super::*;

    #[test]
    fn init_twice_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ensure_directories(&DirectoryConfig {
            logs_dir: dir.path().join("logs").display().to_string(),
            data_dir: dir.path().join("data").display().to_string(),
        })
        .unwrap();
        let logging = LoggingConfig {
            level: "debug".to_string(),
        };

        init_tracing(&logging, &paths).unwrap();
        init_tracing(&logging, &paths).unwrap();
        assert!(LOG_GUARD.get().is_some());
    }
}
