#![deny(missing_docs)]

//! Entry point for the headless points admin station.
use std::io::BufRead;
use std::sync::{
    Arc,
    mpsc::{self, RecvTimeoutError},
};
use std::time::{Duration, Instant};

use pointsdesk::clock::SystemClock;
use pointsdesk::sheet::RosterSheetExporter;
use pointsdesk::station::{AdminStation, Command, CommandFlow};
use pointsdesk::store::PointsStore;
use pointsdesk::{config, logging};

/// Longest the loop sleeps without checking timers.
const MAX_IDLE: Duration = Duration::from_millis(250);

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let settings = config::load_or_default().map_err(|err| err.to_string())?;
    if let Err(err) = logging::init(&settings.actor_name) {
        eprintln!("Logging disabled: {err}");
    }

    let db_path = config::resolve_database_path(&settings).map_err(|err| err.to_string())?;
    let store = PointsStore::open(&db_path)
        .map_err(|err| format!("Open database {} failed: {err}", db_path.display()))?;
    let exporter = Arc::new(RosterSheetExporter::new(db_path.clone()));
    let mut station = AdminStation::new(store, &settings, exporter, Arc::new(SystemClock))
        .map_err(|err| format!("Failed to start station: {err}"))?;
    if settings.roster_sheet_path.is_none() {
        tracing::info!("No roster_sheet_path configured; exports are disabled");
    }

    let (tx, rx) = mpsc::channel::<String>();
    std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|err| format!("Failed to start input reader: {err}"))?;

    let _station_span = tracing::info_span!("station", actor = %station.actor()).entered();
    loop {
        station.tick();
        let wait = next_wait(station.next_wakeup());
        match rx.recv_timeout(wait) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };
                match station.execute(command) {
                    CommandFlow::Continue(lines) => {
                        for line in lines {
                            println!("{line}");
                        }
                    }
                    CommandFlow::Quit => break,
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if station.shutdown() {
        println!("Warning: the roster sheet is missing recent changes; run pointsdesk-export");
    }
    Ok(())
}

fn next_wait(deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => deadline
            .saturating_duration_since(Instant::now())
            .min(MAX_IDLE),
        None => MAX_IDLE,
    }
}
