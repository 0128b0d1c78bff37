//! Max-points policy: how many points a student may hold on a given date.
//!
//! The allowance accrues from `start_date`: a daily amount (overridable per
//! weekday and by dated special rules), a weekly amount per calendar week
//! touched (weeks start on Sunday) and one-off free additions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, format_description::FormatItem, macros::format_description};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// What happens when a write would exceed the allowance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CapPolicy {
    /// No enforcement.
    #[default]
    None,
    /// Callers may warn the operator; writes still go through.
    Warn,
    /// Writes above the allowance are refused by the store.
    Block,
}

impl From<String> for CapPolicy {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "warn" => Self::Warn,
            "block" => Self::Block,
            _ => Self::None,
        }
    }
}

impl From<CapPolicy> for String {
    fn from(policy: CapPolicy) -> Self {
        match policy {
            CapPolicy::None => "none",
            CapPolicy::Warn => "warn",
            CapPolicy::Block => "block",
        }
        .to_string()
    }
}

/// Daily allowance override for an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialDailyRule {
    pub start: String,
    pub end: String,
    /// Allowance for each day in the range; `None` means the config default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_points: Option<i64>,
    #[serde(default)]
    pub note: String,
}

/// One-off allowance granted on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeAddition {
    pub date: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub note: String,
}

/// Persisted max-points configuration (setting `max_points_config`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxPointsConfig {
    /// First day of accrual; missing or invalid means "the evaluated day".
    pub start_date: Option<String>,
    pub daily_points: i64,
    /// Keys are weekday numbers with Monday = "0".
    pub daily_points_by_weekday: Option<BTreeMap<String, i64>>,
    pub daily_special_rules: Vec<SpecialDailyRule>,
    pub weekly_points: i64,
    pub free_additions: Vec<FreeAddition>,
    pub policy: CapPolicy,
    pub warn_within_points: i64,
}

/// Outcome class of a proposed balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStatus {
    Ok,
    Near,
    Exceed,
}

/// Result of checking a proposed balance against the allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapEvaluation {
    pub status: CapStatus,
    pub max_allowed: i64,
    pub proposed_points: i64,
    pub policy: CapPolicy,
    pub warn_within_points: i64,
}

impl CapEvaluation {
    /// True when the store must refuse the write.
    pub fn blocks(&self) -> bool {
        self.policy == CapPolicy::Block && self.status == CapStatus::Exceed
    }
}

impl MaxPointsConfig {
    /// Total allowance on `on`, never negative.
    pub fn max_allowed(&self, on: Date) -> i64 {
        let start = self.start_date.as_deref().and_then(parse_date).unwrap_or(on);
        if on < start {
            return 0;
        }

        let mut total = 0i64;
        let mut day = start;
        while day <= on {
            total += self.daily_for(day);
            match day.next_day() {
                Some(next) => day = next,
                None => break,
            }
        }

        let weeks = (week_start_sunday(on) - week_start_sunday(start)).whole_days() / 7 + 1;
        total += self.weekly_points * weeks;

        total += self
            .free_additions
            .iter()
            .filter(|addition| parse_date(&addition.date).is_some_and(|date| date <= on))
            .map(|addition| addition.points)
            .sum::<i64>();
        total.max(0)
    }

    /// Check `proposed_points` against the allowance on `on`.
    pub fn evaluate(&self, proposed_points: i64, on: Date) -> CapEvaluation {
        let max_allowed = self.max_allowed(on);
        let warn_within = self.warn_within_points;
        let status = if proposed_points > max_allowed {
            CapStatus::Exceed
        } else if warn_within > 0 && proposed_points >= (max_allowed - warn_within).max(0) {
            CapStatus::Near
        } else {
            CapStatus::Ok
        };
        CapEvaluation {
            status,
            max_allowed,
            proposed_points,
            policy: self.policy,
            warn_within_points: warn_within,
        }
    }

    // Precedence: dated special rule, then weekday rule, then default.
    fn daily_for(&self, day: Date) -> i64 {
        for rule in &self.daily_special_rules {
            let (Some(start), Some(end)) = (parse_date(&rule.start), parse_date(&rule.end)) else {
                continue;
            };
            if start <= day && day <= end {
                return rule.daily_points.unwrap_or(self.daily_points);
            }
        }
        if let Some(by_weekday) = &self.daily_points_by_weekday {
            let key = day.weekday().number_days_from_monday().to_string();
            return by_weekday.get(&key).copied().unwrap_or(self.daily_points);
        }
        self.daily_points
    }
}

/// Parse a `YYYY-MM-DD` date, returning `None` for anything else.
pub fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), DATE_FORMAT).ok()
}

/// Today's date in local time, falling back to UTC.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

fn week_start_sunday(day: Date) -> Date {
    day - Duration::days(i64::from(day.weekday().number_days_from_sunday()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn config(start: &str) -> MaxPointsConfig {
        MaxPointsConfig {
            start_date: Some(start.to_string()),
            ..MaxPointsConfig::default()
        }
    }

    #[test]
    fn daily_points_accrue_inclusively() {
        let cfg = MaxPointsConfig {
            daily_points: 10,
            ..config("2025-09-01")
        };
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 01)), 10);
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 05)), 50);
        assert_eq!(cfg.max_allowed(date!(2025 - 08 - 31)), 0);
    }

    #[test]
    fn weekly_points_count_sunday_weeks_touched() {
        // 2025-09-06 is a Saturday, 2025-09-07 a Sunday.
        let cfg = MaxPointsConfig {
            weekly_points: 100,
            ..config("2025-09-06")
        };
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 06)), 100);
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 07)), 200);
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 13)), 200);
    }

    #[test]
    fn special_rules_override_weekday_rules() {
        let mut by_weekday = BTreeMap::new();
        // Monday
        by_weekday.insert("0".to_string(), 20);
        let cfg = MaxPointsConfig {
            daily_points: 5,
            daily_points_by_weekday: Some(by_weekday),
            daily_special_rules: vec![SpecialDailyRule {
                start: "2025-09-08".into(),
                end: "2025-09-08".into(),
                daily_points: Some(0),
                note: "trip".into(),
            }],
            ..config("2025-09-07")
        };
        // Sun 5 + Mon (special) 0 + Tue 5
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 09)), 10);
        // following Monday uses the weekday rule
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 15)), 10 + 5 * 4 + 5 + 20);
    }

    #[test]
    fn special_rule_without_amount_uses_default_daily_points() {
        let cfg: MaxPointsConfig = serde_json::from_str(
            r#"{
                "start_date": "2025-09-07",
                "daily_points": 5,
                "daily_points_by_weekday": {"0": 20},
                "daily_special_rules": [
                    {"start": "2025-09-08", "end": "2025-09-08", "note": "assembly"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.daily_special_rules[0].daily_points, None);
        // Sun 5 + Mon (special, no amount) 5 rather than the weekday 20
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 08)), 10);
    }

    #[test]
    fn free_additions_apply_from_their_date() {
        let cfg = MaxPointsConfig {
            free_additions: vec![
                FreeAddition {
                    date: "2025-09-03".into(),
                    points: 30,
                    note: String::new(),
                },
                FreeAddition {
                    date: "not a date".into(),
                    points: 999,
                    note: String::new(),
                },
            ],
            ..config("2025-09-01")
        };
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 02)), 0);
        assert_eq!(cfg.max_allowed(date!(2025 - 09 - 03)), 30);
    }

    #[test]
    fn evaluation_statuses() {
        let cfg = MaxPointsConfig {
            daily_points: 100,
            warn_within_points: 10,
            policy: CapPolicy::Block,
            ..config("2025-09-01")
        };
        let on = date!(2025 - 09 - 01);
        assert_eq!(cfg.evaluate(50, on).status, CapStatus::Ok);
        assert_eq!(cfg.evaluate(95, on).status, CapStatus::Near);
        let exceed = cfg.evaluate(101, on);
        assert_eq!(exceed.status, CapStatus::Exceed);
        assert!(exceed.blocks());

        let warn_only = MaxPointsConfig {
            policy: CapPolicy::Warn,
            ..cfg
        };
        assert!(!warn_only.evaluate(101, on).blocks());
    }

    #[test]
    fn unknown_policy_strings_mean_none() {
        let cfg: MaxPointsConfig =
            serde_json::from_str(r#"{"policy": "BLOCK", "daily_points": 3}"#).unwrap();
        assert_eq!(cfg.policy, CapPolicy::Block);
        let cfg: MaxPointsConfig = serde_json::from_str(r#"{"policy": "strict"}"#).unwrap();
        assert_eq!(cfg.policy, CapPolicy::None);
    }
}
