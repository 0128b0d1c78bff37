use std::path::PathBuf;
use std::sync::{
    Arc,
    mpsc::{self, Receiver, TryRecvError},
};
use std::time::Instant;

use crate::sheet::SpreadsheetExporter;

/// How an export worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCompletion {
    /// The exporter returned success for the job started at `generation`.
    Succeeded { generation: u64, started_at: Instant },
    /// The exporter failed or the worker died.
    Failed { generation: u64, error: String },
}

struct InFlight {
    rx: Receiver<Result<(), String>>,
    generation: u64,
    started_at: Instant,
}

/// Capacity-1 worker queue: holds the completion channel of the single
/// in-flight export, if any.
#[derive(Default)]
pub struct WorkerSlot {
    in_flight: Option<InFlight>,
}

impl WorkerSlot {
    pub fn is_occupied(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start an export on a background thread unless one is already running.
    ///
    /// Returns false when the slot is occupied or the thread could not start.
    pub fn try_dispatch(
        &mut self,
        exporter: Arc<dyn SpreadsheetExporter>,
        path: PathBuf,
        generation: u64,
        now: Instant,
    ) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("roster-export".into())
            .spawn(move || {
                let result = exporter
                    .export_columns_only(&path)
                    .map_err(|err| err.to_string());
                let _ = tx.send(result);
            });
        if let Err(err) = spawned {
            tracing::warn!("Could not start roster export worker: {err}");
            return false;
        }
        self.in_flight = Some(InFlight {
            rx,
            generation,
            started_at: now,
        });
        true
    }

    /// Collect the in-flight result without blocking, freeing the slot.
    pub fn poll(&mut self) -> Option<WorkerCompletion> {
        let in_flight = self.in_flight.as_ref()?;
        let completion = match in_flight.rx.try_recv() {
            Ok(Ok(())) => WorkerCompletion::Succeeded {
                generation: in_flight.generation,
                started_at: in_flight.started_at,
            },
            Ok(Err(error)) => WorkerCompletion::Failed {
                generation: in_flight.generation,
                error,
            },
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => WorkerCompletion::Failed {
                generation: in_flight.generation,
                error: "export worker exited without reporting".to_string(),
            },
        };
        self.in_flight = None;
        Some(completion)
    }
}
