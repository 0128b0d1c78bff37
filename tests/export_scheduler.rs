mod support;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pointsdesk::clock::ManualClock;
use pointsdesk::config::ExportSettings;
use pointsdesk::export::{ExportScheduler, FORCE_DELAY};
use support::exporter::{RecordingExporter, settle};

const INTERVAL: Duration = Duration::from_secs(10);
const MIN_GAP: Duration = Duration::from_secs(3);

fn harness() -> (ExportScheduler, Arc<RecordingExporter>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let exporter = RecordingExporter::new(clock.clone());
    let scheduler = ExportScheduler::new(
        ExportSettings {
            enabled: true,
            interval_sec: INTERVAL.as_secs_f64(),
            min_gap_sec: MIN_GAP.as_secs_f64(),
        },
        Some(PathBuf::from("roster.xlsx")),
        exporter.clone(),
        clock.clone(),
    );
    (scheduler, exporter, clock)
}

/// Advance in small steps, draining the worker at every step.
fn run_for(scheduler: &mut ExportScheduler, clock: &ManualClock, total: Duration) {
    let step = Duration::from_millis(50);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        clock.advance(step);
        elapsed += step;
        settle(scheduler);
    }
}

#[test]
fn burst_of_marks_exports_once() {
    let (mut scheduler, exporter, clock) = harness();
    for _ in 0..20 {
        scheduler.mark_dirty(false);
        clock.advance(Duration::from_millis(100));
        scheduler.poll();
    }
    assert_eq!(exporter.call_count(), 0);

    run_for(&mut scheduler, &clock, INTERVAL);
    assert_eq!(exporter.call_count(), 1);
    assert!(!scheduler.is_dirty());

    run_for(&mut scheduler, &clock, INTERVAL * 2);
    assert_eq!(exporter.call_count(), 1);
}

#[test]
fn fifty_rapid_marks_arm_the_timer_once() {
    let (mut scheduler, _exporter, _clock) = harness();
    for _ in 0..50 {
        scheduler.mark_dirty(false);
    }
    assert_eq!(scheduler.state().timer().arm_count(), 1);
    assert!(scheduler.state().timer().is_armed());
}

#[test]
fn marks_during_a_running_export_wait_for_it() {
    let (mut scheduler, exporter, clock) = harness();
    exporter.hold();
    scheduler.mark_dirty(false);
    clock.advance(INTERVAL);
    scheduler.poll();
    exporter.wait_for_calls(1);
    assert!(scheduler.worker_running());

    scheduler.mark_dirty(false);
    clock.advance(INTERVAL);
    scheduler.poll();
    scheduler.mark_dirty(true);
    clock.advance(FORCE_DELAY);
    scheduler.poll();
    assert_eq!(exporter.call_count(), 1);
    assert!(scheduler.worker_running());
    assert!(scheduler.next_deadline().is_some());

    exporter.release();
    settle(&mut scheduler);
    // The finished export predates the last marks.
    assert!(scheduler.is_dirty());

    run_for(&mut scheduler, &clock, INTERVAL + MIN_GAP);
    assert_eq!(exporter.call_count(), 2);
    assert_eq!(exporter.max_concurrent(), 1);
    assert!(!scheduler.is_dirty());
}

#[test]
fn repeated_forced_exports_respect_minimum_gap() {
    let (mut scheduler, exporter, clock) = harness();
    for _ in 0..40 {
        scheduler.mark_dirty(true);
        clock.advance(Duration::from_millis(250));
        settle(&mut scheduler);
    }
    run_for(&mut scheduler, &clock, MIN_GAP);

    let calls = exporter.call_times();
    assert!(calls.len() >= 3, "expected several exports, got {calls:?}");
    for pair in calls.windows(2) {
        assert!(
            pair[1] - pair[0] >= MIN_GAP,
            "exports too close together: {calls:?}"
        );
    }
}

#[test]
fn forced_export_after_recent_success_waits_for_gap() {
    let (mut scheduler, exporter, clock) = harness();
    scheduler.mark_dirty(true);
    clock.advance(FORCE_DELAY);
    settle(&mut scheduler);
    assert_eq!(exporter.call_count(), 1);
    let first_success = clock.elapsed();

    clock.advance(Duration::from_secs(1));
    scheduler.mark_dirty(true);
    run_for(&mut scheduler, &clock, Duration::from_secs(5));

    let calls = exporter.call_times();
    assert_eq!(calls.len(), 2);
    assert!(calls[1] >= first_success + MIN_GAP);
}

#[test]
fn dirty_state_flushes_within_interval_plus_gap() {
    let (mut scheduler, exporter, clock) = harness();
    scheduler.mark_dirty(true);
    clock.advance(FORCE_DELAY);
    settle(&mut scheduler);

    scheduler.mark_dirty(false);
    let marked_at = clock.elapsed();
    run_for(&mut scheduler, &clock, INTERVAL + MIN_GAP);

    let calls = exporter.call_times();
    assert_eq!(calls.len(), 2);
    assert!(calls[1] - marked_at <= INTERVAL + MIN_GAP);
    assert!(!scheduler.is_dirty());
}

#[test]
fn failures_stay_dirty_until_a_later_success() {
    let (mut scheduler, exporter, clock) = harness();
    exporter.set_failing(true);
    scheduler.mark_dirty(false);
    run_for(&mut scheduler, &clock, INTERVAL);
    assert_eq!(exporter.call_count(), 1);
    assert!(scheduler.is_dirty());
    assert_eq!(scheduler.stats().failed, 1);

    run_for(&mut scheduler, &clock, INTERVAL * 2);
    assert_eq!(exporter.call_count(), 1);

    exporter.set_failing(false);
    scheduler.mark_dirty(false);
    run_for(&mut scheduler, &clock, INTERVAL);
    assert_eq!(exporter.call_count(), 2);
    assert!(!scheduler.is_dirty());
}
