//! Headless admin station: point edits, undo/redo and the roster mirror.
//!
//! Every operation runs on the caller's thread. Roster exports happen on a
//! worker owned by the [`ExportScheduler`]; [`AdminStation::tick`] must be
//! called regularly to collect them.

mod commands;
mod status;
mod view;

pub use commands::{Command, CommandError, CommandFlow};
pub use status::{STATUS_TTL, StatusMessage, StatusTone};
pub use view::ViewState;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::clock::Clock;
use crate::config::{AppSettings, ExportSettings};
use crate::export::ExportScheduler;
use crate::sheet::SpreadsheetExporter;
use crate::store::{
    PointsStore, PointsUpdate, SETTING_AUTO_EXPORT_ENABLED, SETTING_AUTO_EXPORT_INTERVAL_SEC,
    StoreError, Student,
};
use crate::undo::{PointChange, ReplayDirection, ReplayOutcome, UndoRedoStack};
use status::TransientStatus;

/// Points-log reason for single-student edits from the roster view.
pub const QUICK_UPDATE_REASON: &str = "quick update";
/// Points-log reason for typed-in balances.
pub const TABLE_EDIT_REASON: &str = "table edit";
/// Points-log reason for bulk edits.
pub const BULK_UPDATE_REASON: &str = "bulk update";

/// Per-student results of a batch of point writes.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub changes: Vec<PointChange>,
    pub unchanged: usize,
    pub blocked: Vec<(i64, i64)>,
    pub failed: Vec<(i64, StoreError)>,
}

impl BatchOutcome {
    /// Writes that reached the store, including ones that kept the balance.
    pub fn applied(&self) -> usize {
        self.changes.len() + self.unchanged
    }
}

/// The admin station session.
pub struct AdminStation {
    store: PointsStore,
    history: UndoRedoStack,
    export: ExportScheduler,
    view: ViewState,
    status: TransientStatus,
    actor: String,
    clock: Arc<dyn Clock>,
}

impl AdminStation {
    /// Build a station over `store`.
    ///
    /// Export settings stored in the database override the TOML values.
    pub fn new(
        store: PointsStore,
        settings: &AppSettings,
        exporter: Arc<dyn SpreadsheetExporter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let export_settings = effective_export_settings(&store, settings.export)?;
        let export = ExportScheduler::new(
            export_settings,
            settings.roster_sheet_path.clone(),
            exporter,
            Arc::clone(&clock),
        );
        let mut station = Self {
            store,
            history: UndoRedoStack::new(settings.history.max_actions),
            export,
            view: ViewState::default(),
            status: TransientStatus::default(),
            actor: settings.actor_name.clone(),
            clock,
        };
        station.refresh_rows()?;
        tracing::info!(
            "Admin station ready on {}: {} students, auto export {} every {:.0}s",
            station
                .store
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "in-memory database".to_string()),
            station.view.rows().len(),
            if export_settings.enabled { "on" } else { "off" },
            export_settings.interval_sec
        );
        Ok(station)
    }

    pub fn store(&self) -> &PointsStore {
        &self.store
    }

    pub fn history(&self) -> &UndoRedoStack {
        &self.history
    }

    pub fn export(&self) -> &ExportScheduler {
        &self.export
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Current transient status, if it has not expired.
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.get()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Add `delta` to a student's balance, flooring at zero.
    pub fn adjust_points(&mut self, student_id: i64, delta: i64) -> Result<PointsUpdate, StoreError> {
        let student = self.require_student(student_id)?;
        let target = student.points.saturating_add(delta).max(0);
        self.edit_single(&student, target, QUICK_UPDATE_REASON)
    }

    /// Overwrite a student's balance, flooring at zero.
    pub fn set_points(&mut self, student_id: i64, points: i64) -> Result<PointsUpdate, StoreError> {
        let student = self.require_student(student_id)?;
        self.edit_single(&student, points.max(0), TABLE_EDIT_REASON)
    }

    /// Apply `delta` to several students as one undoable action.
    ///
    /// Repeated ids count once.
    pub fn bulk_adjust(&mut self, student_ids: &[i64], delta: i64) -> BatchOutcome {
        let mut seen = HashSet::with_capacity(student_ids.len());
        let mut targets = Vec::with_capacity(student_ids.len());
        let mut missing = Vec::new();
        for &student_id in student_ids {
            if !seen.insert(student_id) {
                continue;
            }
            match self.require_student(student_id) {
                Ok(student) => targets.push((student_id, student.points.saturating_add(delta).max(0))),
                Err(err) => missing.push((student_id, err)),
            }
        }
        let label = format!("bulk {delta:+} ({} students)", targets.len());
        let mut outcome = self.write_batch(&label, BULK_UPDATE_REASON, &targets);
        outcome.failed.extend(missing);
        if !outcome.changes.is_empty() {
            self.after_mutation();
        }
        self.set_status(StatusMessage::BulkUpdated {
            applied: outcome.applied(),
            blocked: outcome.blocked.len(),
            failed: outcome.failed.len(),
        });
        outcome
    }

    /// Replace a student's card number.
    pub fn set_card(&mut self, student_id: i64, card_number: &str) -> Result<(), StoreError> {
        let student = self.require_student(student_id)?;
        self.store.update_card_number(student_id, card_number)?;
        self.after_mutation();
        self.set_status(StatusMessage::CardUpdated {
            name: display_name(&student),
        });
        Ok(())
    }

    /// Replace a student's private kiosk message.
    pub fn set_message(&mut self, student_id: i64, message: &str) -> Result<(), StoreError> {
        let student = self.require_student(student_id)?;
        self.store.update_private_message(student_id, message)?;
        self.after_mutation();
        self.set_status(StatusMessage::MessageUpdated {
            name: display_name(&student),
        });
        Ok(())
    }

    /// Select a visible student.
    pub fn select(&mut self, student_id: i64) -> bool {
        if !self.view.select(student_id) {
            return false;
        }
        if let Some(row) = self.view.selected_row() {
            let name = display_name(row);
            self.set_status(StatusMessage::Selected { name });
        }
        true
    }

    /// Revert the newest recorded action.
    pub fn undo(&mut self) -> Option<ReplayOutcome> {
        self.replay(ReplayDirection::Undo)
    }

    /// Reapply the newest undone action.
    pub fn redo(&mut self) -> Option<ReplayOutcome> {
        self.replay(ReplayDirection::Redo)
    }

    /// Export the roster sheet as soon as the minimum gap allows.
    pub fn sync_now(&mut self) {
        if self.export.target().is_none() {
            self.set_status(StatusMessage::NoRosterSheet);
            return;
        }
        self.export.mark_dirty(true);
        self.set_status(StatusMessage::SyncRequested);
    }

    /// One event-loop turn: collect exports, fire due timers, expire status.
    pub fn tick(&mut self) {
        self.export.poll();
        self.status.expire(self.clock.now());
    }

    /// Earliest instant the loop needs to wake for.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.export.next_deadline()
    }

    /// Stop scheduling exports. Returns true when changes were not exported.
    pub fn shutdown(&mut self) -> bool {
        let unflushed = self.export.shutdown();
        tracing::info!("Admin station shutting down");
        unflushed
    }

    /// Reload the visible rows from the store.
    pub fn refresh_rows(&mut self) -> Result<(), StoreError> {
        let rows = self.store.all_students()?;
        self.view.replace_rows(rows);
        Ok(())
    }

    fn edit_single(
        &mut self,
        student: &Student,
        target: i64,
        reason: &str,
    ) -> Result<PointsUpdate, StoreError> {
        let mut outcome = self.write_batch(reason, reason, &[(student.id, target)]);
        if let Some((_, err)) = outcome.failed.pop() {
            self.set_status(StatusMessage::Failed(err.to_string()));
            return Err(err);
        }
        if !outcome.changes.is_empty() {
            self.after_mutation();
        }
        let name = display_name(student);
        let update = if let Some(&(_, max_allowed)) = outcome.blocked.first() {
            self.set_status(StatusMessage::PointsBlocked { name, max_allowed });
            PointsUpdate::Blocked { max_allowed }
        } else if let Some(change) = outcome.changes.first() {
            self.set_status(StatusMessage::PointsUpdated {
                name,
                old_points: change.old_points,
                new_points: change.new_points,
            });
            PointsUpdate::Applied {
                old_points: change.old_points,
                new_points: change.new_points,
            }
        } else {
            self.set_status(StatusMessage::PointsUnchanged { name });
            PointsUpdate::Applied {
                old_points: target,
                new_points: target,
            }
        };
        Ok(update)
    }

    /// Write balances one by one and record the applied ones as one action.
    ///
    /// This is also the replay path; the history refuses the recording while
    /// a replay is in progress.
    fn write_batch(&mut self, label: &str, reason: &str, targets: &[(i64, i64)]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &(student_id, points) in targets {
            match self
                .store
                .update_student_points(student_id, points, reason, &self.actor)
            {
                Ok(PointsUpdate::Applied {
                    old_points,
                    new_points,
                }) if old_points != new_points => {
                    outcome
                        .changes
                        .push(PointChange::new(student_id, old_points, new_points));
                }
                Ok(PointsUpdate::Applied { .. }) => outcome.unchanged += 1,
                Ok(PointsUpdate::Blocked { max_allowed }) => {
                    outcome.blocked.push((student_id, max_allowed));
                }
                Err(err) => {
                    tracing::warn!("Points write for student {student_id} failed: {err}");
                    outcome.failed.push((student_id, err));
                }
            }
        }
        self.history.push_action(label, outcome.changes.clone());
        outcome
    }

    fn replay(&mut self, direction: ReplayDirection) -> Option<ReplayOutcome> {
        let replay = match direction {
            ReplayDirection::Undo => self.history.begin_undo(),
            ReplayDirection::Redo => self.history.begin_redo(),
        };
        let Some(replay) = replay else {
            self.set_status(match direction {
                ReplayDirection::Undo => StatusMessage::NothingToUndo,
                ReplayDirection::Redo => StatusMessage::NothingToRedo,
            });
            return None;
        };
        let targets: Vec<(i64, i64)> = replay.targets().collect();
        let reason = replay.reason();
        let label = replay.label().to_string();
        let batch = self.write_batch(&label, &reason, &targets);
        let outcome = self.history.finish(replay, batch.applied());
        self.after_mutation();
        tracing::info!(
            "{:?} '{}' applied to {} of {} students",
            direction,
            outcome.label,
            outcome.applied,
            outcome.total
        );
        let (label, applied, total) = (outcome.label.clone(), outcome.applied, outcome.total);
        self.set_status(match direction {
            ReplayDirection::Undo => StatusMessage::Undone {
                label,
                applied,
                total,
            },
            ReplayDirection::Redo => StatusMessage::Redone {
                label,
                applied,
                total,
            },
        });
        Some(outcome)
    }

    fn after_mutation(&mut self) {
        self.export.mark_dirty(false);
        if let Err(err) = self.refresh_rows() {
            tracing::warn!("Failed to refresh student rows: {err}");
        }
    }

    fn require_student(&self, student_id: i64) -> Result<Student, StoreError> {
        self.store
            .student_by_id(student_id)?
            .ok_or(StoreError::StudentNotFound(student_id))
    }

    fn set_status(&mut self, message: StatusMessage) {
        tracing::debug!("Status: {message}");
        self.status.set(message, self.clock.now());
    }
}

/// Export settings with the store-level overrides applied.
pub fn effective_export_settings(
    store: &PointsStore,
    base: ExportSettings,
) -> Result<ExportSettings, StoreError> {
    let enabled = store.bool_setting(SETTING_AUTO_EXPORT_ENABLED)?;
    let interval_sec = store.f64_setting(SETTING_AUTO_EXPORT_INTERVAL_SEC)?;
    Ok(base.with_overrides(enabled, interval_sec))
}

/// "First Last" for status lines.
pub fn display_name(student: &Student) -> String {
    format!("{} {}", student.first_name, student.last_name)
        .trim()
        .to_string()
}
