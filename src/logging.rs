//! Tracing setup for the binary.
//!
//! Three sinks share one [`EnvFilter`]:
//!
//! - the console
//! - `<log_dir>/scraper.<date>.log`, everything the filter lets through
//! - `<log_dir>/scraper_error.<date>.log`, `ERROR` only
//!
//! Both files roll daily and keep the five most recent files.

use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_appender::non_blocking;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};

const KEEP_FILES: usize = 5;

/// Keeps the background file writers alive. Dropping it flushes and closes
/// both log files, so hold it until the process exits.
#[must_use]
pub struct LogGuards {
    _all: WorkerGuard,
    _errors: WorkerGuard,
}

fn rolling(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(KEEP_FILES)
        .build(log_dir)
}

/// Build the console + file subscriber without installing it.
pub fn build_subscriber(
    log_dir: &Path,
    filter: EnvFilter,
) -> Result<(impl Subscriber + Send + Sync + 'static, LogGuards), InitError> {
    let (all_writer, all_guard) = non_blocking(rolling(log_dir, "scraper")?);
    let (error_writer, error_guard) = non_blocking(rolling(log_dir, "scraper_error")?);

    let console = fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let all_file = fmt::layer()
        .with_writer(all_writer)
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false);

    let error_file = fmt::layer()
        .with_writer(error_writer)
        .with_timer(UtcTime::rfc_3339())
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let subscriber = Registry::default()
        .with(filter)
        .with(console)
        .with(all_file)
        .with(error_file);

    Ok((
        subscriber,
        LogGuards {
            _all: all_guard,
            _errors: error_guard,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn read_logs(dir: &Path, prefix: &str) -> String {
        let mut out = String::new();
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                out.push_str(&fs::read_to_string(&path).unwrap());
            }
        }
        out
    }

    #[test]
    fn test_error_file_keeps_only_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (subscriber, guards) = build_subscriber(dir.path(), EnvFilter::new("info")).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("filtered out everywhere");
            tracing::info!(count = 3, "listing scanned");
            tracing::error!(url = "https://www.newtral.es/x/", "article skipped");
        });
        drop(guards);

        let all = read_logs(dir.path(), "scraper.");
        assert!(all.contains("listing scanned"));
        assert!(all.contains("article skipped"));
        assert!(!all.contains("filtered out everywhere"));

        let errors = read_logs(dir.path(), "scraper_error.");
        assert!(errors.contains("article skipped"));
        assert!(!errors.contains("listing scanned"));
    }

    #[test]
    fn test_creates_missing_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("run");
        let (_subscriber, guards) = build_subscriber(&nested, EnvFilter::new("info")).unwrap();
        drop(guards);

        assert!(nested.is_dir());
    }
}
