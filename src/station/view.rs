use crate::store::Student;

/// Rows shown to the operator plus the selected student.
#[derive(Debug, Default)]
pub struct ViewState {
    rows: Vec<Student>,
    selected: Option<i64>,
}

impl ViewState {
    pub fn rows(&self) -> &[Student] {
        &self.rows
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.selected
    }

    pub fn selected_row(&self) -> Option<&Student> {
        let id = self.selected?;
        self.rows.iter().find(|row| row.id == id)
    }

    /// Select `student_id` if it is visible.
    pub fn select(&mut self, student_id: i64) -> bool {
        if self.rows.iter().any(|row| row.id == student_id) {
            self.selected = Some(student_id);
            true
        } else {
            false
        }
    }

    /// Swap in fresh rows, keeping the selection when the student is still listed.
    pub fn replace_rows(&mut self, rows: Vec<Student>) {
        self.rows = rows;
        if let Some(id) = self.selected
            && !self.rows.iter().any(|row| row.id == id)
        {
            self.selected = None;
        }
    }
}
