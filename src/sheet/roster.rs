use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use umya_spreadsheet::{Spreadsheet, Worksheet};

use super::{
    COL_CARD_NUMBER, COL_FIRST_NAME, COL_LAST_NAME, COL_POINTS, COL_PRIVATE_MESSAGE,
    ROSTER_COLUMNS, SheetError, SpreadsheetExporter, normalize_header,
};
use crate::store::{PointsStore, Student};

const HEADER_ROW: u32 = 1;

/// Exporter that reads students from the database file at `db_path`.
///
/// Each export opens its own read-only connection, so the exporter can run on
/// a worker thread while the station keeps writing.
#[derive(Debug, Clone)]
pub struct RosterSheetExporter {
    db_path: PathBuf,
}

impl RosterSheetExporter {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Write every student to a fresh workbook at `path`. Returns the row count.
    pub fn export_full(&self, path: &Path) -> Result<usize, SheetError> {
        let students = self.load_students()?;
        let mut book = umya_spreadsheet::new_file();
        let sheet = first_sheet_mut(&mut book, path)?;
        for (idx, name) in ROSTER_COLUMNS.iter().enumerate() {
            sheet
                .get_cell_mut((idx as u32 + 1, HEADER_ROW))
                .set_value_string(*name);
        }
        for (offset, student) in students.iter().enumerate() {
            write_full_row(sheet, HEADER_ROW + 1 + offset as u32, student);
        }
        save_book(&book, path)?;
        Ok(students.len())
    }

    /// Rewrite the card, points and message cells of matching rows.
    ///
    /// Rows match on (last name, first name); the first student with that name
    /// wins. Every other cell, row and worksheet is saved back untouched.
    /// Returns the number of rows refreshed.
    pub fn update_columns(&self, path: &Path) -> Result<usize, SheetError> {
        let mut book =
            umya_spreadsheet::reader::xlsx::read(path).map_err(|source| SheetError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let sheet = first_sheet_mut(&mut book, path)?;
        let columns = RosterColumns::locate(sheet, path)?;

        let students = self.load_students()?;
        let mut by_name: HashMap<(String, String), &Student> = HashMap::new();
        for student in &students {
            by_name
                .entry((
                    student.last_name.trim().to_string(),
                    student.first_name.trim().to_string(),
                ))
                .or_insert(student);
        }

        let mut refreshed = 0usize;
        for row in HEADER_ROW + 1..=sheet.get_highest_row() {
            let last = sheet.get_value((columns.last_name, row)).trim().to_string();
            let first = sheet.get_value((columns.first_name, row)).trim().to_string();
            if last.is_empty() || first.is_empty() {
                continue;
            }
            let Some(student) = by_name.get(&(last, first)) else {
                continue;
            };
            sheet
                .get_cell_mut((columns.card_number, row))
                .set_value_string(student.card_number.as_str());
            sheet
                .get_cell_mut((columns.points, row))
                .set_value_number(student.points as f64);
            sheet
                .get_cell_mut((columns.private_message, row))
                .set_value_string(student.private_message.as_str());
            refreshed += 1;
        }
        save_book(&book, path)?;
        Ok(refreshed)
    }

    fn load_students(&self) -> Result<Vec<Student>, SheetError> {
        let store = PointsStore::open_read_only(&self.db_path)?;
        Ok(store.all_students()?)
    }
}

impl SpreadsheetExporter for RosterSheetExporter {
    fn export_columns_only(&self, path: &Path) -> Result<(), SheetError> {
        let refreshed = self.update_columns(path)?;
        tracing::debug!("Refreshed {refreshed} roster rows in {}", path.display());
        Ok(())
    }
}

/// 1-based column indexes of the cells a columns-only export needs.
struct RosterColumns {
    last_name: u32,
    first_name: u32,
    card_number: u32,
    points: u32,
    private_message: u32,
}

impl RosterColumns {
    fn locate(sheet: &Worksheet, path: &Path) -> Result<Self, SheetError> {
        let width = sheet.get_highest_column();
        let headers: Vec<(u32, String)> = (1..=width)
            .map(|col| (col, normalize_header(&sheet.get_value((col, HEADER_ROW)))))
            .filter(|(_, name)| !name.is_empty())
            .collect();
        if headers.is_empty() {
            return Err(SheetError::MissingHeader(path.to_path_buf()));
        }
        let find = |column: &'static str| {
            headers
                .iter()
                .find(|(_, name)| name == column)
                .map(|(col, _)| *col)
                .ok_or_else(|| SheetError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        Ok(Self {
            last_name: find(COL_LAST_NAME)?,
            first_name: find(COL_FIRST_NAME)?,
            card_number: find(COL_CARD_NUMBER)?,
            points: find(COL_POINTS)?,
            private_message: find(COL_PRIVATE_MESSAGE)?,
        })
    }
}

fn first_sheet_mut<'a>(
    book: &'a mut Spreadsheet,
    path: &Path,
) -> Result<&'a mut Worksheet, SheetError> {
    book.get_sheet_mut(&0)
        .ok_or_else(|| SheetError::NoWorksheet(path.to_path_buf()))
}

fn write_full_row(sheet: &mut Worksheet, row: u32, student: &Student) {
    if let Some(serial) = student.serial_number {
        sheet.get_cell_mut((1u32, row)).set_value_number(serial as f64);
    }
    let text_cells: [(u32, &String); 7] = [
        (2, &student.last_name),
        (3, &student.first_name),
        (4, &student.id_number),
        (5, &student.class_name),
        (6, &student.photo_number),
        (7, &student.card_number),
        (9, &student.private_message),
    ];
    for (col, value) in text_cells {
        sheet.get_cell_mut((col, row)).set_value_string(value.as_str());
    }
    sheet
        .get_cell_mut((8u32, row))
        .set_value_number(student.points as f64);
}

/// Encode in memory, then replace the file atomically.
fn save_book(book: &Spreadsheet, path: &Path) -> Result<(), SheetError> {
    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(book, &mut buffer).map_err(|source| {
        SheetError::Encode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    crate::atomic_file::atomic_write(path, buffer.get_ref()).map_err(|source| SheetError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewStudent;
    use tempfile::tempdir;

    fn seeded_db(dir: &Path) -> (PathBuf, PointsStore) {
        let db_path = dir.join("points.db");
        let store = PointsStore::open(&db_path).unwrap();
        store
            .add_student(&NewStudent {
                card_number: "0111".into(),
                class_name: "3A".into(),
                ..NewStudent::named("Cohen", "Avi", 12)
            })
            .unwrap();
        store
            .add_student(&NewStudent {
                class_name: "3B".into(),
                ..NewStudent::named("Levi", "Noa", 30)
            })
            .unwrap();
        (db_path, store)
    }

    fn write_book(path: &Path, rows: &[&[&str]]) {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                sheet
                    .get_cell_mut((c as u32 + 1, r as u32 + 1))
                    .set_value_string(*value);
            }
        }
        umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
    }

    fn read_cell(path: &Path, col: u32, row: u32) -> String {
        let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
        book.get_sheet(&0).unwrap().get_value((col, row))
    }

    #[test]
    fn full_export_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let (db_path, _store) = seeded_db(dir.path());
        let sheet = dir.path().join("roster.xlsx");

        let rows = RosterSheetExporter::new(&db_path).export_full(&sheet).unwrap();

        assert_eq!(rows, 2);
        for (idx, name) in ROSTER_COLUMNS.iter().enumerate() {
            assert_eq!(read_cell(&sheet, idx as u32 + 1, 1), *name);
        }
        assert_eq!(read_cell(&sheet, 2, 2), "Cohen");
        assert_eq!(read_cell(&sheet, 7, 2), "0111");
        assert_eq!(read_cell(&sheet, 8, 2), "12");
        assert_eq!(read_cell(&sheet, 2, 3), "Levi");
    }

    #[test]
    fn columns_only_preserves_other_cells_and_rows() {
        let dir = tempdir().unwrap();
        let (db_path, store) = seeded_db(dir.path());
        let sheet = dir.path().join("roster.xlsx");
        write_book(
            &sheet,
            &[
                &["Last Name", "First Name", "notes", "card_number", "Points", "private_message"],
                &["Levi", "Noa", "brings snacks", "", "0", ""],
                &["Stranger", "Sam", "new kid", "9", "5", "hi"],
                &[" Cohen ", "Avi"],
            ],
        );
        let noa = store.all_students().unwrap()[1].id;
        store.update_student_points(noa, 31, "", "admin").unwrap();
        store.update_private_message(noa, "well\tdone").unwrap();

        let refreshed = RosterSheetExporter::new(&db_path)
            .update_columns(&sheet)
            .unwrap();

        assert_eq!(refreshed, 2);
        assert_eq!(read_cell(&sheet, 3, 2), "brings snacks");
        assert_eq!(read_cell(&sheet, 5, 2), "31");
        assert_eq!(read_cell(&sheet, 6, 2), "well\tdone");
        assert_eq!(read_cell(&sheet, 4, 3), "9");
        assert_eq!(read_cell(&sheet, 5, 3), "5");
        assert_eq!(read_cell(&sheet, 6, 3), "hi");
        assert_eq!(read_cell(&sheet, 4, 4), "0111");
        assert_eq!(read_cell(&sheet, 5, 4), "12");
    }

    #[test]
    fn header_with_byte_order_mark_still_matches() {
        let dir = tempdir().unwrap();
        let (db_path, _store) = seeded_db(dir.path());
        let sheet = dir.path().join("roster.xlsx");
        write_book(
            &sheet,
            &[
                &["\u{feff}last_name", "first_name", "card_number", "points", "private_message"],
                &["Cohen", "Avi", "", "", ""],
            ],
        );

        let refreshed = RosterSheetExporter::new(&db_path)
            .update_columns(&sheet)
            .unwrap();

        assert_eq!(refreshed, 1);
        assert_eq!(read_cell(&sheet, 4, 2), "12");
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = tempdir().unwrap();
        let (db_path, _store) = seeded_db(dir.path());
        let sheet = dir.path().join("roster.xlsx");
        write_book(&sheet, &[&["last_name", "first_name", "points"]]);

        let err = RosterSheetExporter::new(&db_path)
            .export_columns_only(&sheet)
            .unwrap_err();

        assert!(matches!(
            err,
            SheetError::MissingColumn {
                column: COL_CARD_NUMBER,
                ..
            }
        ));
    }

    #[test]
    fn empty_worksheet_has_no_header() {
        let dir = tempdir().unwrap();
        let (db_path, _store) = seeded_db(dir.path());
        let sheet = dir.path().join("roster.xlsx");
        write_book(&sheet, &[]);

        let err = RosterSheetExporter::new(&db_path)
            .update_columns(&sheet)
            .unwrap_err();
        assert!(matches!(err, SheetError::MissingHeader(_)));
    }

    #[test]
    fn missing_workbook_is_a_read_error() {
        let dir = tempdir().unwrap();
        let (db_path, _store) = seeded_db(dir.path());
        let err = RosterSheetExporter::new(&db_path)
            .export_columns_only(&dir.path().join("absent.xlsx"))
            .unwrap_err();
        assert!(matches!(err, SheetError::Read { .. }));
    }
}
