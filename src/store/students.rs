use rusqlite::{OptionalExtension, Row, params};
use time::Date;

use super::points_log::append_entry;
use super::util::map_sql_error;
use super::{NewStudent, PointsStore, PointsUpdate, Student, StoreError};
use crate::points_cap;

const STUDENT_COLUMNS: &str = "id, serial_number, last_name, first_name, id_number, class_name,
     photo_number, card_number, points, private_message";

impl PointsStore {
    /// Insert a student and return its id.
    pub fn add_student(&self, student: &NewStudent) -> Result<i64, StoreError> {
        self.connection
            .execute(
                "INSERT INTO students (serial_number, last_name, first_name, id_number, class_name,
                                       photo_number, card_number, points, private_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    student.serial_number,
                    student.last_name.trim(),
                    student.first_name.trim(),
                    student.id_number.trim(),
                    student.class_name.trim(),
                    student.photo_number.trim(),
                    student.card_number.trim(),
                    student.points,
                    student.private_message,
                ],
            )
            .map_err(map_sql_error)?;
        Ok(self.connection.last_insert_rowid())
    }

    /// Register a teacher; admins are logged as such in the points log.
    pub fn add_teacher(&self, name: &str, is_admin: bool) -> Result<(), StoreError> {
        self.connection
            .execute(
                "INSERT INTO teachers (name, is_admin) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET is_admin = excluded.is_admin",
                params![name.trim(), is_admin as i64],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Look up one student by id.
    pub fn student_by_id(&self, student_id: i64) -> Result<Option<Student>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(&format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"))
            .map_err(map_sql_error)?;
        stmt.query_row(params![student_id], student_from_row)
            .optional()
            .map_err(map_sql_error)
    }

    /// Every student ordered by class, then name.
    pub fn all_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(&format!(
                "SELECT {STUDENT_COLUMNS} FROM students
                 ORDER BY class_name, last_name, first_name, id"
            ))
            .map_err(map_sql_error)?;
        let rows = stmt.query_map([], student_from_row).map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }

    /// Set a student's balance, enforcing the max-points policy for today.
    pub fn update_student_points(
        &self,
        student_id: i64,
        new_points: i64,
        reason: &str,
        actor: &str,
    ) -> Result<PointsUpdate, StoreError> {
        self.update_student_points_on(student_id, new_points, reason, actor, points_cap::today())
    }

    /// Set a student's balance, enforcing the max-points policy for `on`.
    ///
    /// The balance update and its points-log row commit together.
    pub fn update_student_points_on(
        &self,
        student_id: i64,
        new_points: i64,
        reason: &str,
        actor: &str,
        on: Date,
    ) -> Result<PointsUpdate, StoreError> {
        match self.evaluate_points_against_max(new_points, on) {
            Ok(evaluation) if evaluation.blocks() => {
                tracing::info!(
                    "Refused points update for student {student_id}: {new_points} exceeds {}",
                    evaluation.max_allowed
                );
                return Ok(PointsUpdate::Blocked {
                    max_allowed: evaluation.max_allowed,
                });
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("Max-points evaluation skipped: {err}"),
        }

        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        let old_points: i64 = tx
            .query_row(
                "SELECT points FROM students WHERE id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sql_error)?
            .ok_or(StoreError::StudentNotFound(student_id))?;
        tx.execute(
            "UPDATE students SET points = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![new_points, student_id],
        )
        .map_err(map_sql_error)?;
        append_entry(&tx, student_id, old_points, new_points, reason, actor)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(PointsUpdate::Applied {
            old_points,
            new_points,
        })
    }

    /// Add `delta` points to the current balance.
    pub fn add_points(
        &self,
        student_id: i64,
        delta: i64,
        reason: &str,
        actor: &str,
    ) -> Result<PointsUpdate, StoreError> {
        let current = self.current_points(student_id)?;
        self.update_student_points(student_id, current.saturating_add(delta), reason, actor)
    }

    /// Remove `amount` points, never going below zero.
    pub fn subtract_points(
        &self,
        student_id: i64,
        amount: i64,
        reason: &str,
        actor: &str,
    ) -> Result<PointsUpdate, StoreError> {
        let current = self.current_points(student_id)?;
        let next = current.saturating_sub(amount).max(0);
        self.update_student_points(student_id, next, reason, actor)
    }

    /// Replace a student's card number.
    pub fn update_card_number(&self, student_id: i64, card_number: &str) -> Result<(), StoreError> {
        self.update_text_column(student_id, "card_number", card_number.trim())
    }

    /// Replace a student's private kiosk message.
    pub fn update_private_message(
        &self,
        student_id: i64,
        message: &str,
    ) -> Result<(), StoreError> {
        self.update_text_column(student_id, "private_message", message)
    }

    /// Remove a student together with its points history.
    ///
    /// Returns false when no such student exists.
    pub fn delete_student(&self, student_id: i64) -> Result<bool, StoreError> {
        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        tx.execute(
            "DELETE FROM points_log WHERE student_id = ?1",
            params![student_id],
        )
        .map_err(map_sql_error)?;
        let removed = tx
            .execute("DELETE FROM students WHERE id = ?1", params![student_id])
            .map_err(map_sql_error)?;
        tx.commit().map_err(map_sql_error)?;
        Ok(removed > 0)
    }

    fn current_points(&self, student_id: i64) -> Result<i64, StoreError> {
        self.student_by_id(student_id)?
            .map(|student| student.points)
            .ok_or(StoreError::StudentNotFound(student_id))
    }

    fn update_text_column(
        &self,
        student_id: i64,
        column: &'static str,
        value: &str,
    ) -> Result<(), StoreError> {
        let changed = self
            .connection
            .execute(
                &format!(
                    "UPDATE students SET {column} = ?1, updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?2"
                ),
                params![value, student_id],
            )
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::StudentNotFound(student_id));
        }
        Ok(())
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        serial_number: row.get(1)?,
        last_name: row.get(2)?,
        first_name: row.get(3)?,
        id_number: row.get(4)?,
        class_name: row.get(5)?,
        photo_number: row.get(6)?,
        card_number: row.get(7)?,
        points: row.get(8)?,
        private_message: row.get(9)?,
    })
}
