use rusqlite::{OptionalExtension, Transaction, params};
use serde::{Deserialize, Serialize};

use super::util::map_sql_error;
use super::{PointsStore, StoreError};

/// Actor name that always counts as an administrator.
pub(super) const ADMIN_ACTOR: &str = "admin";
/// Actor name used for unattended writes.
pub(super) const SYSTEM_ACTOR: &str = "system";

/// Category recorded with each points-log row, derived from reason and actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TimeBonus,
    TeacherBonus,
    AdminBonus,
    QuickUpdate,
    Spreadsheet,
    UndoRedo,
    Admin,
    System,
    Teacher,
    Unknown,
}

impl ActionKind {
    /// Classify a write from its free-text reason and the acting user.
    pub fn classify(reason: &str, actor: &str, actor_is_admin: bool) -> Self {
        let reason = reason.trim();
        let lowered = reason.to_lowercase();
        if reason.starts_with("UNDO") || reason.starts_with("REDO") {
            Self::UndoRedo
        } else if lowered.contains("time bonus") || reason.starts_with('⏰') {
            Self::TimeBonus
        } else if lowered.contains("teacher bonus") || reason.starts_with('🎁') {
            Self::TeacherBonus
        } else if lowered.contains("special bonus") || lowered.contains("master") {
            Self::AdminBonus
        } else if lowered.contains("bonus") && actor_is_admin {
            Self::AdminBonus
        } else if lowered.contains("quick update") {
            Self::QuickUpdate
        } else if lowered.contains("spreadsheet sync") || lowered.contains("spreadsheet import") {
            Self::Spreadsheet
        } else if actor_is_admin {
            Self::Admin
        } else if actor.trim() == SYSTEM_ACTOR {
            Self::System
        } else if !actor.trim().is_empty() {
            Self::Teacher
        } else {
            Self::Unknown
        }
    }

    /// Stable string stored in the `action_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimeBonus => "time_bonus",
            Self::TeacherBonus => "teacher_bonus",
            Self::AdminBonus => "admin_bonus",
            Self::QuickUpdate => "quick_update",
            Self::Spreadsheet => "spreadsheet",
            Self::UndoRedo => "undo_redo",
            Self::Admin => "admin",
            Self::System => "system",
            Self::Teacher => "teacher",
            Self::Unknown => "",
        }
    }

    /// Parse a stored `action_type`; unrecognized values map to `Unknown`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "time_bonus" => Self::TimeBonus,
            "teacher_bonus" => Self::TeacherBonus,
            "admin_bonus" => Self::AdminBonus,
            "quick_update" => Self::QuickUpdate,
            "spreadsheet" => Self::Spreadsheet,
            "undo_redo" => Self::UndoRedo,
            "admin" => Self::Admin,
            "system" => Self::System,
            "teacher" => Self::Teacher,
            _ => Self::Unknown,
        }
    }
}

/// One row of the detailed points history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsLogEntry {
    pub id: i64,
    pub student_id: i64,
    pub old_points: i64,
    pub new_points: i64,
    pub delta: i64,
    pub reason: String,
    pub actor_name: String,
    pub action: ActionKind,
    pub created_at: String,
}

impl PointsStore {
    /// Points history for one student, oldest first.
    pub fn points_log_for_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<PointsLogEntry>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT id, student_id, old_points, new_points, delta, reason, actor_name,
                        action_type, created_at
                 FROM points_log WHERE student_id = ?1 ORDER BY id",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![student_id], |row| {
                let action: String = row.get(7)?;
                Ok(PointsLogEntry {
                    id: row.get(0)?,
                    student_id: row.get(1)?,
                    old_points: row.get(2)?,
                    new_points: row.get(3)?,
                    delta: row.get(4)?,
                    reason: row.get(5)?,
                    actor_name: row.get(6)?,
                    action: ActionKind::from_stored(&action),
                    created_at: row.get(8)?,
                })
            })
            .map_err(map_sql_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sql_error)
    }
}

pub(super) fn actor_is_admin(tx: &Transaction<'_>, actor: &str) -> Result<bool, StoreError> {
    let actor = actor.trim();
    if actor.eq_ignore_ascii_case(ADMIN_ACTOR) {
        return Ok(true);
    }
    if actor.is_empty() {
        return Ok(false);
    }
    let flag: Option<i64> = tx
        .query_row(
            "SELECT is_admin FROM teachers WHERE name = ?1 LIMIT 1",
            params![actor],
            |row| row.get(0),
        )
        .optional()
        .map_err(map_sql_error)?;
    Ok(flag.unwrap_or(0) == 1)
}

pub(super) fn append_entry(
    tx: &Transaction<'_>,
    student_id: i64,
    old_points: i64,
    new_points: i64,
    reason: &str,
    actor: &str,
) -> Result<(), StoreError> {
    let is_admin = actor_is_admin(tx, actor)?;
    let action = ActionKind::classify(reason, actor, is_admin);
    tx.execute(
        "INSERT INTO points_log
            (student_id, old_points, new_points, delta, reason, actor_name, action_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            student_id,
            old_points,
            new_points,
            new_points - old_points,
            reason.trim(),
            actor.trim(),
            action.as_str()
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}
