use std::path::Path;
use std::sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::time::Duration;

use pointsdesk::clock::ManualClock;
use pointsdesk::export::ExportScheduler;
use pointsdesk::sheet::{SheetError, SpreadsheetExporter};

/// Exporter that records when it ran and can be held open by the test.
pub struct RecordingExporter {
    clock: Arc<ManualClock>,
    calls: Mutex<Vec<Duration>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail: AtomicBool,
    held: Mutex<bool>,
    released: Condvar,
}

impl RecordingExporter {
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            held: Mutex::new(false),
            released: Condvar::new(),
        })
    }

    pub fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    pub fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.released.notify_all();
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Clock offsets at which the exporter was entered.
    pub fn call_times(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn wait_for_calls(&self, count: usize) {
        for _ in 0..400 {
            if self.call_count() >= count {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("exporter was not called {count} time(s)");
    }
}

impl SpreadsheetExporter for RecordingExporter {
    fn export_columns_only(&self, path: &Path) -> Result<(), SheetError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.lock().unwrap().push(self.clock.elapsed());

        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.released.wait(held).unwrap();
        }
        drop(held);

        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SheetError::MissingHeader(path.to_path_buf()));
        }
        Ok(())
    }
}

/// Poll until no export worker is in flight, without moving the clock.
pub fn settle(scheduler: &mut ExportScheduler) {
    for _ in 0..400 {
        scheduler.poll();
        if !scheduler.worker_running() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("export worker did not finish");
}
