//! Debounced roster export.
//!
//! Point, card and message mutations call [`ExportScheduler::mark_dirty`];
//! the station loop calls [`ExportScheduler::poll`] on every tick. A single
//! one-shot timer coalesces bursts of marks into one export, a capacity-1
//! worker slot keeps writes from overlapping, and a minimum gap separates
//! consecutive successful writes.

mod timer;
mod worker;

pub use timer::OneShotTimer;
pub use worker::{WorkerCompletion, WorkerSlot};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::config::ExportSettings;
use crate::sheet::SpreadsheetExporter;

/// Delay used by forced exports so they still go through the timer path.
pub const FORCE_DELAY: Duration = Duration::from_millis(50);

/// In-memory export bookkeeping for one running station.
#[derive(Default)]
pub struct PendingExportState {
    dirty: bool,
    /// Bumped on every mark so a worker can tell whether it saw the latest data.
    dirty_generation: u64,
    timer: OneShotTimer,
    worker: WorkerSlot,
    last_success: Option<Instant>,
}

impl PendingExportState {
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn timer(&self) -> &OneShotTimer {
        &self.timer
    }

    pub fn worker_running(&self) -> bool {
        self.worker.is_occupied()
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }
}

/// Counters surfaced by the station status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Coalesces mutations into infrequent, non-blocking roster exports.
pub struct ExportScheduler {
    settings: ExportSettings,
    target: Option<PathBuf>,
    exporter: Arc<dyn SpreadsheetExporter>,
    clock: Arc<dyn Clock>,
    state: PendingExportState,
    stats: ExportStats,
}

impl ExportScheduler {
    pub fn new(
        settings: ExportSettings,
        target: Option<PathBuf>,
        exporter: Arc<dyn SpreadsheetExporter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: settings.normalized(),
            target,
            exporter,
            clock,
            state: PendingExportState::default(),
            stats: ExportStats::default(),
        }
    }

    pub fn settings(&self) -> ExportSettings {
        self.settings
    }

    pub fn target(&self) -> Option<&PathBuf> {
        self.target.as_ref()
    }

    pub fn state(&self) -> &PendingExportState {
        &self.state
    }

    pub fn stats(&self) -> ExportStats {
        self.stats
    }

    pub fn is_dirty(&self) -> bool {
        self.state.dirty
    }

    pub fn worker_running(&self) -> bool {
        self.state.worker.is_occupied()
    }

    /// Deadline of the pending export timer, if armed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.state.timer.deadline()
    }

    /// Record that the roster changed and make sure an export is scheduled.
    ///
    /// The first mark after a flush fixes the deadline; later marks do not
    /// push it back. `force` replaces any pending deadline with
    /// [`FORCE_DELAY`] and ignores the auto-export switch.
    pub fn mark_dirty(&mut self, force: bool) {
        self.state.dirty = true;
        self.state.dirty_generation += 1;

        if !force && !self.settings.enabled {
            tracing::debug!("Roster marked dirty; auto export disabled");
            return;
        }
        if self.target.is_none() {
            tracing::debug!("Roster marked dirty; no roster sheet configured");
            return;
        }

        let now = self.clock.now();
        if force {
            self.state.timer.rearm(now + FORCE_DELAY);
            tracing::debug!("Forced roster export scheduled");
        } else if self.state.timer.arm_if_idle(now + self.settings.interval()) {
            tracing::debug!(
                "Roster export scheduled in {:.0}s",
                self.settings.interval_sec
            );
        }
    }

    /// Collect a finished worker and run the flush if the timer is due.
    pub fn poll(&mut self) {
        if let Some(completion) = self.state.worker.poll() {
            self.handle_completion(completion);
        }
        let now = self.clock.now();
        if self.state.timer.fire_if_due(now) {
            self.flush(now);
        }
    }

    /// Report unflushed changes before the station exits.
    ///
    /// Returns true when changes would be lost. An in-flight worker is left
    /// to finish on its own.
    pub fn shutdown(&mut self) -> bool {
        self.state.timer.cancel();
        if self.state.dirty {
            tracing::warn!("Exiting with roster changes that were not exported");
        }
        self.state.dirty
    }

    fn flush(&mut self, now: Instant) {
        if !self.state.dirty {
            tracing::debug!("Export timer fired with nothing to write");
            return;
        }
        if self.state.worker.is_occupied() {
            tracing::debug!("Export still running; deferring next write");
            self.state.timer.arm_if_idle(now + self.settings.interval());
            return;
        }
        if let Some(last) = self.state.last_success {
            let since = now.saturating_duration_since(last);
            let gap = self.settings.min_gap();
            if since < gap {
                let wait = gap - since;
                tracing::debug!("Export deferred {wait:?} to respect minimum gap");
                self.state.timer.arm_if_idle(now + wait);
                return;
            }
        }
        let Some(path) = self.target.clone() else {
            return;
        };
        let generation = self.state.dirty_generation;
        if self
            .state
            .worker
            .try_dispatch(Arc::clone(&self.exporter), path, generation, now)
        {
            self.stats.dispatched += 1;
            tracing::debug!("Roster export dispatched");
        } else {
            self.stats.failed += 1;
        }
    }

    fn handle_completion(&mut self, completion: WorkerCompletion) {
        match completion {
            WorkerCompletion::Succeeded {
                generation,
                started_at,
            } => {
                let now = self.clock.now();
                self.stats.succeeded += 1;
                self.state.last_success = Some(now);
                if generation == self.state.dirty_generation {
                    self.state.dirty = false;
                }
                tracing::info!(
                    "Roster export finished in {:?}",
                    now.saturating_duration_since(started_at)
                );
            }
            WorkerCompletion::Failed { error, .. } => {
                self.stats.failed += 1;
                tracing::warn!("Roster export failed; will retry on next change: {error}");
            }
        }
    }
}
