use std::fmt;
use std::time::{Duration, Instant};

/// How long a transient status stays visible.
pub const STATUS_TTL: Duration = Duration::from_secs(4);

/// Severity used when rendering a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Info,
    Warning,
    Error,
}

/// Operator-facing result of the last station operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    PointsUpdated {
        name: String,
        old_points: i64,
        new_points: i64,
    },
    PointsUnchanged {
        name: String,
    },
    PointsBlocked {
        name: String,
        max_allowed: i64,
    },
    BulkUpdated {
        applied: usize,
        blocked: usize,
        failed: usize,
    },
    CardUpdated {
        name: String,
    },
    MessageUpdated {
        name: String,
    },
    Undone {
        label: String,
        applied: usize,
        total: usize,
    },
    Redone {
        label: String,
        applied: usize,
        total: usize,
    },
    NothingToUndo,
    NothingToRedo,
    SyncRequested,
    NoRosterSheet,
    Selected {
        name: String,
    },
    Failed(String),
}

impl StatusMessage {
    pub fn tone(&self) -> StatusTone {
        match self {
            Self::PointsBlocked { .. } | Self::NothingToUndo | Self::NothingToRedo => {
                StatusTone::Warning
            }
            Self::NoRosterSheet => StatusTone::Warning,
            Self::BulkUpdated { blocked, failed, .. } if blocked + failed > 0 => {
                StatusTone::Warning
            }
            Self::Undone { applied, total, .. } | Self::Redone { applied, total, .. }
                if applied < total =>
            {
                StatusTone::Warning
            }
            Self::Failed(_) => StatusTone::Error,
            _ => StatusTone::Info,
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointsUpdated {
                name,
                old_points,
                new_points,
            } => write!(f, "{name}: {old_points} -> {new_points} points"),
            Self::PointsUnchanged { name } => write!(f, "{name}: points unchanged"),
            Self::PointsBlocked { name, max_allowed } => {
                write!(f, "{name}: above the allowed maximum of {max_allowed} points")
            }
            Self::BulkUpdated {
                applied,
                blocked,
                failed,
            } => {
                write!(f, "Updated {applied} students")?;
                if *blocked > 0 {
                    write!(f, ", {blocked} over the maximum")?;
                }
                if *failed > 0 {
                    write!(f, ", {failed} failed")?;
                }
                Ok(())
            }
            Self::CardUpdated { name } => write!(f, "{name}: card updated"),
            Self::MessageUpdated { name } => write!(f, "{name}: message updated"),
            Self::Undone {
                label,
                applied,
                total,
            } => write_replay(f, "Undid", label, *applied, *total),
            Self::Redone {
                label,
                applied,
                total,
            } => write_replay(f, "Redid", label, *applied, *total),
            Self::NothingToUndo => f.write_str("Nothing to undo"),
            Self::NothingToRedo => f.write_str("Nothing to redo"),
            Self::SyncRequested => f.write_str("Roster sheet sync requested"),
            Self::NoRosterSheet => f.write_str("No roster sheet configured"),
            Self::Selected { name } => write!(f, "Selected {name}"),
            Self::Failed(err) => f.write_str(err),
        }
    }
}

fn write_replay(
    f: &mut fmt::Formatter<'_>,
    verb: &str,
    label: &str,
    applied: usize,
    total: usize,
) -> fmt::Result {
    if applied == total {
        write!(f, "{verb}: {label}")
    } else {
        write!(f, "{verb}: {label} ({applied} of {total} students)")
    }
}

/// Status message that clears itself after [`STATUS_TTL`].
#[derive(Debug, Default)]
pub(crate) struct TransientStatus {
    current: Option<(StatusMessage, Instant)>,
}

impl TransientStatus {
    pub(crate) fn set(&mut self, message: StatusMessage, now: Instant) {
        self.current = Some((message, now + STATUS_TTL));
    }

    pub(crate) fn get(&self) -> Option<&StatusMessage> {
        self.current.as_ref().map(|(message, _)| message)
    }

    pub(crate) fn expire(&mut self, now: Instant) {
        if let Some((_, expires_at)) = &self.current
            && *expires_at <= now
        {
            self.current = None;
        }
    }
}
