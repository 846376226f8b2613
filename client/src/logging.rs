//! Tracing subscriber setup.
//!
//! Headless runs and one-shot commands log human-readable lines to stderr.
//! While the TUI owns the terminal, logs go to `<log_dir>/brewdoro.log` as
//! JSON lines instead, so nothing is written over the screen.
//!
//! The filter comes from `RUST_LOG` and defaults to `info`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// File name of the TUI log inside the log directory.
pub const LOG_FILE_NAME: &str = "brewdoro.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a global subscriber writing to stderr.
pub fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr)
        .init();
}

/// Installs a global subscriber appending JSON lines to the log file.
///
/// Returns the path of the log file.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn init_file(log_dir: &Path) -> io::Result<PathBuf> {
    let (path, file) = open_log_file(log_dir)?;
    file_subscriber(file).init();
    Ok(path)
}

/// Creates `log_dir` if needed and opens the log file for appending.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn open_log_file(log_dir: &Path) -> io::Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Builds the JSON file subscriber without installing it.
pub fn file_subscriber(file: File) -> impl Subscriber + Send + Sync {
    let json_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_log_file_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("logs");

        let (path, _file) = open_log_file(&dir).unwrap();

        assert_eq!(path, dir.join(LOG_FILE_NAME));
        assert!(path.exists());
    }

    #[test]
    fn open_log_file_appends() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LOG_FILE_NAME), "earlier\n").unwrap();

        let (path, file) = open_log_file(temp.path()).unwrap();
        tracing::subscriber::with_default(file_subscriber(file), || {
            tracing::warn!(session_id = "s1", "Remote call failed");
        });

        let contents = fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("earlier"));

        let entry: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(entry["level"], "WARN");
        assert_eq!(entry["fields"]["message"], "Remote call failed");
        assert_eq!(entry["fields"]["session_id"], "s1");
    }
}
