use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest debounce the scheduler accepts, in seconds.
pub const MIN_EXPORT_INTERVAL_SEC: f64 = 5.0;
/// Longest debounce or gap accepted, in seconds (one day).
pub const MAX_EXPORT_DELAY_SEC: f64 = 86_400.0;
const DEFAULT_EXPORT_INTERVAL_SEC: f64 = 300.0;
const DEFAULT_MIN_GAP_SEC: f64 = 3.0;
const DEFAULT_MAX_ACTIONS: usize = 100;
const DEFAULT_ACTOR_NAME: &str = "admin";

/// Errors that may occur while loading or saving station configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to create the config directory.
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        /// Directory path that failed to create.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to read the config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to write the config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Path that failed to write.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to serialize config to TOML.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML serialization error.
        source: toml::ser::Error,
    },
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Station settings persisted in `config.toml`.
///
/// Config keys: `database_path`, `roster_sheet_path`, `actor_name`,
/// `export`, `history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// SQLite database shared with the kiosk; defaults to the app root.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Roster sheet mirrored by the export scheduler.
    #[serde(default)]
    pub roster_sheet_path: Option<PathBuf>,
    /// Name recorded as the actor of point changes made on this station.
    #[serde(default = "default_actor_name")]
    pub actor_name: String,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub history: HistorySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            roster_sheet_path: None,
            actor_name: default_actor_name(),
            export: ExportSettings::default(),
            history: HistorySettings::default(),
        }
    }
}

impl AppSettings {
    pub(crate) fn normalized(mut self) -> Self {
        if self.actor_name.trim().is_empty() {
            self.actor_name = default_actor_name();
        }
        self.export = self.export.normalized();
        self.history = self.history.normalized();
        self
    }
}

/// Automatic roster export preferences.
///
/// Config keys: `enabled`, `interval_sec`, `min_gap_sec`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Debounce delay between the first change and the export.
    #[serde(default = "default_export_interval_sec")]
    pub interval_sec: f64,
    /// Minimum spacing between two consecutive successful exports.
    #[serde(default = "default_min_gap_sec")]
    pub min_gap_sec: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_sec: DEFAULT_EXPORT_INTERVAL_SEC,
            min_gap_sec: DEFAULT_MIN_GAP_SEC,
        }
    }
}

impl ExportSettings {
    /// Clamp values into the supported ranges.
    ///
    /// Both delays are capped at [`MAX_EXPORT_DELAY_SEC`] so they always fit
    /// a `Duration` and can be added to an `Instant`.
    pub fn normalized(mut self) -> Self {
        self.interval_sec = if self.interval_sec.is_finite() {
            self.interval_sec
                .clamp(MIN_EXPORT_INTERVAL_SEC, MAX_EXPORT_DELAY_SEC)
        } else {
            DEFAULT_EXPORT_INTERVAL_SEC
        };
        self.min_gap_sec = if self.min_gap_sec.is_finite() {
            self.min_gap_sec.clamp(0.0, MAX_EXPORT_DELAY_SEC)
        } else {
            DEFAULT_MIN_GAP_SEC
        };
        self
    }

    /// Apply the store-level `excel_auto_export_*` settings over these values.
    pub fn with_overrides(mut self, enabled: Option<bool>, interval_sec: Option<f64>) -> Self {
        if let Some(enabled) = enabled {
            self.enabled = enabled;
        }
        if let Some(interval_sec) = interval_sec {
            self.interval_sec = interval_sec;
        }
        self.normalized()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.normalized().interval_sec)
    }

    pub fn min_gap(&self) -> Duration {
        Duration::from_secs_f64(self.normalized().min_gap_sec)
    }
}

/// Undo history preferences.
///
/// Config keys: `max_actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_actions: DEFAULT_MAX_ACTIONS,
        }
    }
}

impl HistorySettings {
    fn normalized(mut self) -> Self {
        self.max_actions = self.max_actions.max(1);
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_actor_name() -> String {
    DEFAULT_ACTOR_NAME.to_string()
}

fn default_export_interval_sec() -> f64 {
    DEFAULT_EXPORT_INTERVAL_SEC
}

fn default_min_gap_sec() -> f64 {
    DEFAULT_MIN_GAP_SEC
}

fn default_max_actions() -> usize {
    DEFAULT_MAX_ACTIONS
}
