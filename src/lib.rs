//! Admin-station core for the school points system.
/// Application directory resolution.
pub mod app_dirs;
/// Crash-safe file replacement.
pub mod atomic_file;
/// Monotonic time sources.
pub mod clock;
/// TOML station configuration.
pub mod config;
/// Debounced roster export scheduling.
pub mod export;
/// Tracing subscriber setup.
pub mod logging;
/// Max-points allowance policy.
pub mod points_cap;
/// Roster spreadsheet mirror.
pub mod sheet;
/// Admin station session and line commands.
pub mod station;
/// SQLite data store.
pub mod store;
/// Undo/redo history for point changes.
pub mod undo;
