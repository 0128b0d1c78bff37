//! SQLite data store shared by the admin station and the kiosk.
//!
//! The store is the authoritative record of students, teachers, the points
//! log and key/value settings. Every point write is a single transaction that
//! updates the student row and appends an annotated points-log entry.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod points_log;
mod schema;
mod settings;
mod students;
mod util;

pub use points_log::{ActionKind, PointsLogEntry};
pub use settings::{
    SETTING_AUTO_EXPORT_ENABLED, SETTING_AUTO_EXPORT_INTERVAL_SEC, SETTING_MAX_POINTS_CONFIG,
};

/// A student row as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub serial_number: Option<i64>,
    pub last_name: String,
    pub first_name: String,
    pub id_number: String,
    pub class_name: String,
    pub photo_number: String,
    pub card_number: String,
    pub points: i64,
    pub private_message: String,
}

/// Fields accepted when inserting a student.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewStudent {
    pub serial_number: Option<i64>,
    pub last_name: String,
    pub first_name: String,
    pub id_number: String,
    pub class_name: String,
    pub photo_number: String,
    pub card_number: String,
    pub points: i64,
    pub private_message: String,
}

impl NewStudent {
    /// Minimal student with a name and starting balance.
    pub fn named(last_name: impl Into<String>, first_name: impl Into<String>, points: i64) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
            points,
            ..Self::default()
        }
    }
}

/// Result of a point write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsUpdate {
    /// The balance changed from `old_points` to `new_points` and was logged.
    Applied { old_points: i64, new_points: i64 },
    /// The max-points policy refused the new balance.
    Blocked { max_allowed: i64 },
}

impl PointsUpdate {
    /// True when the write reached the database.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Errors returned by the data store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite query failed.
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Failed to create the database directory.
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// No student row with this id.
    #[error("Student {0} not found")]
    StudentNotFound(i64),
    /// A stored setting could not be decoded.
    #[error("Setting {key} is malformed: {source}")]
    MalformedSetting {
        /// Settings key.
        key: String,
        /// JSON decode error.
        source: serde_json::Error,
    },
    /// Database is locked or busy.
    #[error("Database is busy, please retry")]
    Busy,
}

/// Connection wrapper exposing typed CRUD over the points database.
pub struct PointsStore {
    connection: Connection,
    path: Option<PathBuf>,
}

impl PointsStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        util::create_parent_if_needed(path)?;
        let connection = Connection::open(path)?;
        let store = Self {
            connection,
            path: Some(path.to_path_buf()),
        };
        store.apply_pragmas()?;
        schema::apply_schema(&store.connection)?;
        Ok(store)
    }

    /// Open an existing database without touching the schema.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        connection
            .execute_batch("PRAGMA busy_timeout=5000;")
            .map_err(util::map_sql_error)?;
        Ok(Self {
            connection,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        schema::apply_schema(&connection)?;
        Ok(Self {
            connection,
            path: None,
        })
    }

    /// Database file path, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn apply_pragmas(&self) -> Result<(), StoreError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
            )
            .map_err(util::map_sql_error)
    }
}
