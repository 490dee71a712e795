use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::util::unix_seconds;

/// Session log files kept besides `latest.log`.
pub const MAX_SESSION_LOGS: usize = 10;

/// Install the global tracing subscriber: stderr plus `<logs_dir>/latest.log`.
///
/// - Rotates the previous `latest.log` to `session-{timestamp}.log`
/// - Keeps at most [`MAX_SESSION_LOGS`] old sessions
/// - Falls back to stderr only if the log file cannot be opened
///
/// Returns the path of the log file in use, if any.
pub fn init_logging(logs_dir: &Path) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let (latest, file_layer) = match open_session_log(logs_dir) {
        Some((path, file)) => (
            Some(path),
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        ),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    latest
}

/// Rotate and open `latest.log` for a new session.
fn open_session_log(logs_dir: &Path) -> Option<(PathBuf, File)> {
    std::fs::create_dir_all(logs_dir).ok()?;

    let latest = logs_dir.join("latest.log");
    if latest.exists() {
        let rotated = logs_dir.join(format!("session-{}.log", unix_seconds()));
        let _ = std::fs::rename(&latest, &rotated);
    }
    cleanup_old_sessions(logs_dir);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&latest)
        .ok()?;
    Some((latest, file))
}

/// Keep only the [`MAX_SESSION_LOGS`] most recent `session-*.log` files.
fn cleanup_old_sessions(logs_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(logs_dir) else {
        return;
    };

    let mut session_files: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with("session-") && name.ends_with(".log")
        })
        .map(|entry| entry.path())
        .collect();

    // Timestamps are fixed-width for the foreseeable future, so name order is age order
    session_files.sort();

    while session_files.len() > MAX_SESSION_LOGS {
        let oldest = session_files.remove(0);
        let _ = std::fs::remove_file(oldest);
    }
}
