//! Logging and observability helpers.

pub mod sensitive;

pub use sensitive::Sensitive;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "schema-watch.log";
const LOG_RETENTION_DAYS: u64 = 14;

/// Installs the JSON file subscriber. Keep the returned guard alive until exit
/// so buffered lines are flushed.
pub fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    let _ = fs::create_dir_all(log_dir);

    // 1. Clean up old logs
    if let Err(e) = cleanup_old_logs(log_dir, LOG_RETENTION_DAYS) {
        eprintln!("Failed to clean up old logs: {}", e);
    }

    // 2. Setup file appender
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("schema_watch=info"));

    // 3. Setup subscriber
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .json()
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_current_span(true)
        .with_ansi(false)
        .try_init();
    if installed.is_err() {
        // A subscriber is already set (tests, embedding host); keep using it
        return None;
    }

    // 4. Register panic hook
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("PANIC: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("PANIC: {}", s)
        } else {
            "PANIC: unknown cause".to_string()
        };

        tracing::error!(target: "panic", location = %location, message = %msg, "Process panicked");

        previous_hook(panic_info);
    }));

    tracing::info!("Tracing initialized. Logs directory: {:?}", log_dir);
    Some(guard)
}

/// `<data_dir>/logs`
pub fn log_directory(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

fn cleanup_old_logs(log_dir: &Path, retention_days: u64) -> std::io::Result<()> {
    let entries = fs::read_dir(log_dir)?;
    let now = SystemTime::now();
    let retention_duration = Duration::from_secs(retention_days * 24 * 60 * 60);

    for entry in entries {
        let entry = entry?;
        let path = entry.path();

        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX))
            .unwrap_or(false);
        if !is_log {
            continue;
        }

        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            if let Ok(age) = now.duration_since(modified) {
                if age > retention_duration {
                    if let Err(e) = fs::remove_file(&path) {
                        eprintln!("Failed to remove old log file {:?}: {}", path, e);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_keeps_recent_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let recent = dir.path().join(format!("{}.2026-10-19", LOG_FILE_PREFIX));
        let foreign = dir.path().join("notes.txt");
        fs::write(&recent, "{}").unwrap();
        fs::write(&foreign, "keep").unwrap();

        cleanup_old_logs(dir.path(), LOG_RETENTION_DAYS).unwrap();
        assert!(recent.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn test_cleanup_removes_expired_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join(format!("{}.2020-01-01", LOG_FILE_PREFIX));
        fs::write(&old, "{}").unwrap();

        // Zero-day retention: anything already written counts as expired
        std::thread::sleep(Duration::from_millis(20));
        cleanup_old_logs(dir.path(), 0).unwrap();
        assert!(!old.exists());
    }

    #[test]
    fn test_log_directory() {
        assert_eq!(
            log_directory(Path::new("/var/lib/schema-watch")),
            PathBuf::from("/var/lib/schema-watch/logs")
        );
    }
}
