//! Logging setup for the admin station.
//!
//! Several stations may share one app root on a network drive, so every
//! station writes its own `pointsdesk_<station>_<timestamp>.log` and only
//! prunes files carrying its own station name.

use std::{fs, path::PathBuf, sync::OnceLock};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

/// Log files kept per station.
const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "pointsdesk";
const LOG_FILE_SUFFIX: &str = "log";
/// Filter variable checked before `RUST_LOG`.
const LOG_FILTER_ENV: &str = "POINTSDESK_LOG";

static ACTIVE_LOG: OnceLock<ActiveLog> = OnceLock::new();

struct ActiveLog {
    path: PathBuf,
    _guard: WorkerGuard,
}

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log directory could not be resolved or created.
    #[error(transparent)]
    LogDir(#[from] AppDirError),
    /// Failed to enumerate existing log files for pruning.
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log filename time: {0}")]
    FormatTime(#[from] time::error::Format),
    /// The file appender could not open this launch's log file.
    #[error("Failed to open log file {path}: {source}")]
    OpenLogFile { path: PathBuf, source: InitError },
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Log files of one station inside a shared log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationLogs {
    dir: PathBuf,
    /// `pointsdesk_<slug>_`; the launch timestamp follows.
    prefix: String,
}

impl StationLogs {
    pub fn new(dir: impl Into<PathBuf>, station: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("{LOG_FILE_PREFIX}_{}_", station_slug(station)),
        }
    }

    /// File name stem (no extension) for a launch at `now`.
    pub fn file_stem(&self, now: OffsetDateTime) -> Result<String, LoggingError> {
        const NAME_FORMAT: &[FormatItem<'_>] =
            format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
        Ok(format!("{}{}", self.prefix, now.format(NAME_FORMAT)?))
    }

    /// Whether `file_name` is a log file written by this station.
    pub fn owns(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix)
            && file_name
                .strip_suffix(LOG_FILE_SUFFIX)
                .is_some_and(|rest| rest.ends_with('.'))
    }

    /// Open the appender for a launch at `now`, creating the file.
    fn open_appender(
        &self,
        now: OffsetDateTime,
    ) -> Result<(RollingFileAppender, PathBuf), LoggingError> {
        let stem = self.file_stem(now)?;
        let path = self.dir.join(format!("{stem}.{LOG_FILE_SUFFIX}"));
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(stem)
            .filename_suffix(LOG_FILE_SUFFIX)
            .build(&self.dir)
            .map_err(|source| LoggingError::OpenLogFile {
                path: path.clone(),
                source,
            })?;
        Ok((appender, path))
    }

    /// Delete this station's oldest log files beyond `keep`.
    ///
    /// Names embed the launch time, so lexical order is launch order. A file
    /// that cannot be removed is skipped with a warning. Returns the removed
    /// paths.
    pub fn prune(&self, keep: usize) -> Result<Vec<PathBuf>, LoggingError> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .map_err(|source| LoggingError::ReadDir {
                path: self.dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| self.owns(name))
            .collect();
        names.sort();

        let excess = names.len().saturating_sub(keep);
        let mut removed = Vec::with_capacity(excess);
        for name in names.into_iter().take(excess) {
            let path = self.dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(err) => tracing::warn!("Failed to remove old log {}: {err}", path.display()),
            }
        }
        Ok(removed)
    }
}

/// Initialize tracing to stdout and a per-launch file for `station`.
///
/// Returns the log file path. Later calls return the first path unchanged.
/// Failures are returned so callers can keep running without file logging.
pub fn init(station: &str) -> Result<PathBuf, LoggingError> {
    if let Some(active) = ACTIVE_LOG.get() {
        return Ok(active.path.clone());
    }

    let logs = StationLogs::new(app_dirs::logs_dir()?, station);
    let (appender, path) = logs.open_appender(now_local_or_utc())?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let timer = build_timer();
    let stdout_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stdout);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(file_writer);
    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(stdout_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = ACTIVE_LOG.set(ActiveLog {
        path: path.clone(),
        _guard: guard,
    });

    let removed = logs.prune(MAX_LOG_FILES)?;
    tracing::info!(
        "Logging for station '{station}' to {} ({} old logs pruned)",
        path.display(),
        removed.len()
    );
    Ok(path)
}

/// Lowercase ASCII letters and digits; every other run becomes one `-`.
fn station_slug(station: &str) -> String {
    let mut slug = String::with_capacity(station.len());
    for ch in station.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "station".to_string()
    } else {
        slug.to_string()
    }
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn at(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn station_names_become_file_safe_slugs() {
        assert_eq!(station_slug("admin"), "admin");
        assert_eq!(station_slug("  Front Desk #2 "), "front-desk-2");
        assert_eq!(station_slug("../office"), "office");
        assert_eq!(station_slug("מזכירות"), "station");
        assert_eq!(station_slug(""), "station");
    }

    #[test]
    fn file_stem_carries_station_and_launch_time() {
        let logs = StationLogs::new("/logs", "Front Desk");
        assert_eq!(
            logs.file_stem(at(1_700_000_000)).unwrap(),
            "pointsdesk_front-desk_2023-11-14_22-13-20"
        );
        assert!(logs.owns("pointsdesk_front-desk_2023-11-14_22-13-20.log"));
        assert!(!logs.owns("pointsdesk_front-desk_2023-11-14_22-13-20.log.bak"));
        assert!(!logs.owns("pointsdesk_front-desk-2_2023-11-14_22-13-20.log"));
        assert!(!logs.owns("pointsdesk_office_2023-11-14_22-13-20.log"));
    }

    #[test]
    fn opening_creates_the_launch_file() {
        let dir = tempdir().unwrap();
        let logs = StationLogs::new(dir.path(), "admin");
        let (_appender, path) = logs.open_appender(at(1_700_000_000)).unwrap();
        assert!(path.is_file());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "pointsdesk_admin_2023-11-14_22-13-20.log"
        );
    }

    #[test]
    fn prune_only_touches_own_station_and_keeps_newest() {
        let dir = tempdir().unwrap();
        let logs = StationLogs::new(dir.path(), "admin");
        for day in 1..=4 {
            touch(dir.path(), &format!("pointsdesk_admin_2025-09-0{day}_08-00-00.log"));
        }
        touch(dir.path(), "pointsdesk_office_2025-08-01_08-00-00.log");
        touch(dir.path(), "pointsdesk_admin_notes.txt");

        let removed = logs.prune(2).unwrap();

        assert_eq!(removed.len(), 2);
        assert_eq!(
            file_names(dir.path()),
            vec![
                "pointsdesk_admin_2025-09-03_08-00-00.log".to_string(),
                "pointsdesk_admin_2025-09-04_08-00-00.log".to_string(),
                "pointsdesk_admin_notes.txt".to_string(),
                "pointsdesk_office_2025-08-01_08-00-00.log".to_string(),
            ]
        );
        assert!(logs.prune(2).unwrap().is_empty());
    }

    #[test]
    fn prune_reports_unreadable_directory() {
        let dir = tempdir().unwrap();
        let logs = StationLogs::new(dir.path().join("missing"), "admin");
        assert!(matches!(logs.prune(1), Err(LoggingError::ReadDir { .. })));
    }
}
