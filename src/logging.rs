//! Tracing setup for the indexer.
//!
//! Events go to stdout in compact form and to the log file named by
//! [`crate::config::Config::log_file`]. The file's directory is created on demand; if the
//! file cannot be opened the indexer keeps logging to stdout only.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` filters events and defaults to `info`.
pub fn init_tracing(log_file: &Path) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = file_writer(log_file).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();
}

/// Open `path` for appending behind a non-blocking writer.
///
/// The worker guard lives in [`LOG_GUARD`] so buffered lines flush at exit.
fn file_writer(path: &Path) -> Option<NonBlocking> {
    let appender = match open_appender(path) {
        Ok(appender) => appender,
        Err(reason) => {
            eprintln!("File logging disabled for {}: {reason}", path.display());
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}

fn open_appender(path: &Path) -> Result<RollingFileAppender, String> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| "path names no file".to_string())?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory).map_err(|err| err.to_string())?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appender_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("run.log");
        assert!(open_appender(&path).is_ok());
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn directory_paths_are_refused() {
        assert!(open_appender(Path::new("/")).is_err());
    }
}
