//! Roster workbook mirror of the data store.
//!
//! The roster is an `.xlsx` workbook whose first worksheet holds a header row
//! and one row per student. Staff edit it by hand, so routine exports only
//! touch the card, points and message cells.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::StoreError;

mod roster;

pub use roster::RosterSheetExporter;

/// Header names in full-export column order.
pub const ROSTER_COLUMNS: [&str; 9] = [
    COL_SERIAL,
    COL_LAST_NAME,
    COL_FIRST_NAME,
    COL_ID_NUMBER,
    COL_CLASS_NAME,
    COL_PHOTO_NUMBER,
    COL_CARD_NUMBER,
    COL_POINTS,
    COL_PRIVATE_MESSAGE,
];

pub const COL_SERIAL: &str = "serial";
pub const COL_LAST_NAME: &str = "last_name";
pub const COL_FIRST_NAME: &str = "first_name";
pub const COL_ID_NUMBER: &str = "id_number";
pub const COL_CLASS_NAME: &str = "class_name";
pub const COL_PHOTO_NUMBER: &str = "photo_number";
pub const COL_CARD_NUMBER: &str = "card_number";
pub const COL_POINTS: &str = "points";
pub const COL_PRIVATE_MESSAGE: &str = "private_message";

/// Errors raised while reading or writing a roster workbook.
#[derive(Debug, Error)]
pub enum SheetError {
    /// The workbook could not be opened or parsed.
    #[error("Failed to read roster workbook {path}: {source}")]
    Read {
        path: PathBuf,
        source: umya_spreadsheet::XlsxError,
    },
    /// The workbook could not be serialized.
    #[error("Failed to encode roster workbook {path}: {source}")]
    Encode {
        path: PathBuf,
        source: umya_spreadsheet::XlsxError,
    },
    /// The encoded workbook could not be written.
    #[error("Failed to write roster workbook {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The workbook contains no worksheet.
    #[error("Roster workbook {0} has no worksheet")]
    NoWorksheet(PathBuf),
    /// The first worksheet has no header row.
    #[error("Roster workbook {0} has no header row")]
    MissingHeader(PathBuf),
    /// A required column is absent from the header row.
    #[error("Roster workbook {path} is missing column {column}")]
    MissingColumn { path: PathBuf, column: &'static str },
    /// Reading students from the data store failed.
    #[error("Failed to read students: {0}")]
    Store(#[from] StoreError),
}

/// Writes store state into a spreadsheet file.
///
/// Implementations run on a worker thread and may block.
pub trait SpreadsheetExporter: Send + Sync {
    /// Refresh only the card, points and message columns of the sheet at `path`.
    fn export_columns_only(&self, path: &Path) -> Result<(), SheetError>;
}

/// Canonical form of a header cell: no BOM, trimmed, lowercase, `_` for spaces.
pub(crate) fn normalize_header(value: &str) -> String {
    value
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
