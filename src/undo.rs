//! Undo/redo history for point changes.
//!
//! Actions store old and new balances rather than deltas, so replaying one
//! overwrites whatever another station wrote in between.

use std::collections::VecDeque;

/// One student's balance before and after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointChange {
    pub student_id: i64,
    pub old_points: i64,
    pub new_points: i64,
}

impl PointChange {
    pub fn new(student_id: i64, old_points: i64, new_points: i64) -> Self {
        Self {
            student_id,
            old_points,
            new_points,
        }
    }

    fn is_recordable(&self) -> bool {
        self.student_id > 0 && self.old_points != self.new_points
    }
}

/// A labelled group of point changes undone and redone together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsAction {
    pub label: String,
    pub changes: Vec<PointChange>,
}

/// Which way a replay runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayDirection {
    Undo,
    Redo,
}

impl ReplayDirection {
    fn reason_prefix(self) -> &'static str {
        match self {
            Self::Undo => "UNDO",
            Self::Redo => "REDO",
        }
    }
}

/// An action taken off one stack and waiting to be applied.
///
/// Recording stays suppressed until it is handed back through
/// [`UndoRedoStack::finish`].
#[derive(Debug)]
pub struct Replay {
    direction: ReplayDirection,
    action: PointsAction,
}

impl Replay {
    pub fn direction(&self) -> ReplayDirection {
        self.direction
    }

    pub fn label(&self) -> &str {
        &self.action.label
    }

    /// Points-log reason for the writes this replay performs.
    pub fn reason(&self) -> String {
        format!("{}: {}", self.direction.reason_prefix(), self.action.label)
    }

    /// `(student_id, points)` pairs to write, clamped at zero.
    pub fn targets(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.action.changes.iter().map(|change| {
            let points = match self.direction {
                ReplayDirection::Undo => change.old_points,
                ReplayDirection::Redo => change.new_points,
            };
            (change.student_id, points.max(0))
        })
    }

    pub fn len(&self) -> usize {
        self.action.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action.changes.is_empty()
    }
}

/// Summary of a finished replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub direction: ReplayDirection,
    pub label: String,
    pub applied: usize,
    pub total: usize,
}

/// Bounded undo stack with a redo stack that any new action clears.
#[derive(Debug)]
pub struct UndoRedoStack {
    undo: VecDeque<PointsAction>,
    redo: VecDeque<PointsAction>,
    limit: usize,
    suppress_recording: bool,
    suppressed_pushes: u64,
}

impl UndoRedoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            limit: limit.max(1),
            suppress_recording: false,
            suppressed_pushes: 0,
        }
    }

    /// Record an action. No-op and malformed changes are dropped first.
    ///
    /// Returns false when nothing was recorded: every change was filtered
    /// out, or a replay is in progress.
    pub fn push_action(&mut self, label: impl Into<String>, changes: Vec<PointChange>) -> bool {
        if self.suppress_recording {
            self.suppressed_pushes += 1;
            return false;
        }
        let changes: Vec<PointChange> = changes
            .into_iter()
            .filter(PointChange::is_recordable)
            .collect();
        if changes.is_empty() {
            return false;
        }
        self.redo.clear();
        self.undo.push_back(PointsAction {
            label: label.into(),
            changes,
        });
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_replaying(&self) -> bool {
        self.suppress_recording
    }

    /// Pushes refused because they arrived during a replay.
    pub fn suppressed_pushes(&self) -> u64 {
        self.suppressed_pushes
    }

    /// Label of the action the next undo would revert.
    pub fn peek_undo(&self) -> Option<&str> {
        self.undo.back().map(|action| action.label.as_str())
    }

    pub fn peek_redo(&self) -> Option<&str> {
        self.redo.back().map(|action| action.label.as_str())
    }

    /// Take the newest action for undo and start suppressing recording.
    pub fn begin_undo(&mut self) -> Option<Replay> {
        self.begin(ReplayDirection::Undo)
    }

    /// Take the newest undone action for redo and start suppressing recording.
    pub fn begin_redo(&mut self) -> Option<Replay> {
        self.begin(ReplayDirection::Redo)
    }

    /// Move a replayed action onto the opposite stack and resume recording.
    ///
    /// The action moves even when only some of its writes succeeded.
    pub fn finish(&mut self, replay: Replay, applied: usize) -> ReplayOutcome {
        self.suppress_recording = false;
        let outcome = ReplayOutcome {
            direction: replay.direction,
            label: replay.action.label.clone(),
            applied,
            total: replay.action.changes.len(),
        };
        match replay.direction {
            ReplayDirection::Undo => self.redo.push_back(replay.action),
            ReplayDirection::Redo => self.undo.push_back(replay.action),
        }
        outcome
    }

    /// Run a whole replay through `apply`, counting successful writes.
    pub fn replay_with<F>(&mut self, direction: ReplayDirection, mut apply: F) -> Option<ReplayOutcome>
    where
        F: FnMut(i64, i64, &str) -> bool,
    {
        let replay = self.begin(direction)?;
        let reason = replay.reason();
        let applied = replay
            .targets()
            .filter(|&(student_id, points)| apply(student_id, points, &reason))
            .count();
        Some(self.finish(replay, applied))
    }

    fn begin(&mut self, direction: ReplayDirection) -> Option<Replay> {
        let action = match direction {
            ReplayDirection::Undo => self.undo.pop_back(),
            ReplayDirection::Redo => self.redo.pop_back(),
        }?;
        self.suppress_recording = true;
        Some(Replay { direction, action })
    }
}
