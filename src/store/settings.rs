use rusqlite::{OptionalExtension, params};
use time::Date;

use super::util::map_sql_error;
use super::{PointsStore, StoreError};
use crate::points_cap::{CapEvaluation, MaxPointsConfig};

/// Setting key that toggles automatic roster exports.
pub const SETTING_AUTO_EXPORT_ENABLED: &str = "excel_auto_export_enabled";
/// Setting key holding the export debounce in seconds.
pub const SETTING_AUTO_EXPORT_INTERVAL_SEC: &str = "excel_auto_export_interval_sec";
/// Setting key holding the JSON max-points configuration.
pub const SETTING_MAX_POINTS_CONFIG: &str = "max_points_config";

impl PointsStore {
    /// Read a raw setting value.
    pub fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.connection
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(map_sql_error)
    }

    /// Insert or replace a raw setting value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.connection
            .execute(
                "INSERT INTO settings (key, value, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Boolean setting; accepts `1/0`, `true/false`, `yes/no`, `on/off`.
    pub fn bool_setting(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.setting(key)?.and_then(|value| parse_bool(&value)))
    }

    /// Floating-point setting; unparseable values read as absent.
    pub fn f64_setting(&self, key: &str) -> Result<Option<f64>, StoreError> {
        Ok(self
            .setting(key)?
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite()))
    }

    /// Stored max-points configuration, or the default when unset or malformed.
    pub fn max_points_config(&self) -> Result<MaxPointsConfig, StoreError> {
        let Some(raw) = self.setting(SETTING_MAX_POINTS_CONFIG)? else {
            return Ok(MaxPointsConfig::default());
        };
        if raw.trim().is_empty() {
            return Ok(MaxPointsConfig::default());
        }
        match serde_json::from_str(&raw) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Ignoring malformed {SETTING_MAX_POINTS_CONFIG}: {err}");
                Ok(MaxPointsConfig::default())
            }
        }
    }

    /// Persist the max-points configuration as JSON.
    pub fn set_max_points_config(&self, config: &MaxPointsConfig) -> Result<(), StoreError> {
        let raw = serde_json::to_string(config).map_err(|source| StoreError::MalformedSetting {
            key: SETTING_MAX_POINTS_CONFIG.to_string(),
            source,
        })?;
        self.set_setting(SETTING_MAX_POINTS_CONFIG, &raw)
    }

    /// Check a proposed balance against the configured allowance.
    pub fn evaluate_points_against_max(
        &self,
        proposed_points: i64,
        on: Date,
    ) -> Result<CapEvaluation, StoreError> {
        Ok(self.max_points_config()?.evaluate(proposed_points, on))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
