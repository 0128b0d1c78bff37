//! Line commands accepted by the station binary.

use std::fmt::Write as _;
use std::str::FromStr;

use thiserror::Error;

use super::{AdminStation, display_name};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `add <student> <delta>`
    Add { student_id: i64, delta: i64 },
    /// `set <student> <points>`
    Set { student_id: i64, points: i64 },
    /// `bulk <delta> <student>...`
    Bulk { delta: i64, student_ids: Vec<i64> },
    /// `card <student> [number]`
    Card { student_id: i64, card_number: String },
    /// `message <student> [text...]`
    Message { student_id: i64, text: String },
    Select(i64),
    Undo,
    Redo,
    Sync,
    Status,
    List,
    Quit,
}

/// Errors raised while parsing a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("'{value}' is not a valid {argument}")]
    InvalidNumber {
        argument: &'static str,
        value: String,
    },
}

/// Whether the loop keeps running after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFlow {
    Continue(Vec<String>),
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();
        match name.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "add" => Ok(Self::Add {
                student_id: number(args.next(), "add", "student id")?,
                delta: number(args.next(), "add", "points delta")?,
            }),
            "set" => Ok(Self::Set {
                student_id: number(args.next(), "set", "student id")?,
                points: number(args.next(), "set", "points")?,
            }),
            "bulk" => {
                let delta = number(args.next(), "bulk", "points delta")?;
                let student_ids = args
                    .map(|value| number(Some(value), "bulk", "student id"))
                    .collect::<Result<Vec<_>, _>>()?;
                if student_ids.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "bulk",
                        argument: "student id",
                    });
                }
                Ok(Self::Bulk { delta, student_ids })
            }
            "card" => Ok(Self::Card {
                student_id: number(args.next(), "card", "student id")?,
                card_number: args.next().unwrap_or_default().to_string(),
            }),
            "message" | "msg" => {
                let (id, text) = match rest.split_once(char::is_whitespace) {
                    Some((id, text)) => (id, text.trim()),
                    None => (rest, ""),
                };
                Ok(Self::Message {
                    student_id: number(Some(id).filter(|id| !id.is_empty()), "message", "student id")?,
                    text: text.to_string(),
                })
            }
            "select" => Ok(Self::Select(number(args.next(), "select", "student id")?)),
            "undo" => Ok(Self::Undo),
            "redo" => Ok(Self::Redo),
            "sync" => Ok(Self::Sync),
            "status" => Ok(Self::Status),
            "list" | "ls" => Ok(Self::List),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn number(
    value: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<i64, CommandError> {
    let value = value.ok_or(CommandError::MissingArgument { command, argument })?;
    value.parse().map_err(|_| CommandError::InvalidNumber {
        argument,
        value: value.to_string(),
    })
}

impl AdminStation {
    /// Run one command and return the lines to show the operator.
    pub fn execute(&mut self, command: Command) -> CommandFlow {
        let mut lines = Vec::new();
        let reports_status = !matches!(command, Command::Status | Command::List);
        let result = match command {
            Command::Add { student_id, delta } => self.adjust_points(student_id, delta).map(drop),
            Command::Set { student_id, points } => self.set_points(student_id, points).map(drop),
            Command::Bulk { delta, student_ids } => {
                self.bulk_adjust(&student_ids, delta);
                Ok(())
            }
            Command::Card {
                student_id,
                card_number,
            } => self.set_card(student_id, &card_number),
            Command::Message { student_id, text } => self.set_message(student_id, &text),
            Command::Select(student_id) => {
                if !self.select(student_id) {
                    return CommandFlow::Continue(vec![format!(
                        "Student {student_id} is not listed"
                    )]);
                }
                Ok(())
            }
            Command::Undo => {
                self.undo();
                Ok(())
            }
            Command::Redo => {
                self.redo();
                Ok(())
            }
            Command::Sync => {
                self.sync_now();
                Ok(())
            }
            Command::Status => {
                lines.push(self.describe_state());
                Ok(())
            }
            Command::List => {
                lines.extend(self.list_lines());
                Ok(())
            }
            Command::Quit => return CommandFlow::Quit,
        };
        match result {
            Err(err) => lines.push(err.to_string()),
            Ok(()) if reports_status => lines.extend(self.status().map(ToString::to_string)),
            Ok(()) => {}
        }
        CommandFlow::Continue(lines)
    }

    fn describe_state(&self) -> String {
        let export = self.export();
        let stats = export.stats();
        let mut line = format!(
            "undo {} / redo {} | export ({}): {}{}",
            self.history().undo_len(),
            self.history().redo_len(),
            if export.settings().enabled {
                format!("auto every {:.0}s", export.settings().interval_sec)
            } else {
                "manual".to_string()
            },
            if export.is_dirty() { "pending" } else { "clean" },
            if export.worker_running() {
                ", writing"
            } else {
                ""
            },
        );
        if let Some(deadline) = export.next_deadline() {
            let wait = deadline.saturating_duration_since(self.clock.now());
            let _ = write!(line, ", next in {:.1}s", wait.as_secs_f64());
        }
        let _ = write!(
            line,
            " | {} written, {} failed",
            stats.succeeded, stats.failed
        );
        line
    }

    fn list_lines(&self) -> Vec<String> {
        let selected = self.view().selected_id();
        self.view()
            .rows()
            .iter()
            .map(|row| {
                format!(
                    "{} {:>5}  {:<24} {:<6} {:>6}  {}",
                    if Some(row.id) == selected { '>' } else { ' ' },
                    row.id,
                    display_name(row),
                    row.class_name,
                    row.points,
                    row.card_number
                )
            })
            .collect()
    }
}
