//! Data models module
//!
//! Defines the core data structures shared by both endpoints:
//! - ProcessInfo: immutable snapshot of one detected process
//! - PolicyRule: regex-based closure rule (current scheme)
//! - AppPolicy / TimeWindow: legacy substring + time-window scheme
//! - PolicyConfiguration: the root policy document
//!
//! Wire and file representations use PascalCase field names; all fields
//! carry serde defaults so partially-edited policy files still parse.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a running process, created fresh on every detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessInfo {
    pub process_id: i32,
    pub process_name: String,
    #[serde(default)]
    pub window_title: String,
    #[serde(default)]
    pub executable_path: String,
    pub detected_at: DateTime<Utc>,
}

impl ProcessInfo {
    /// Build a snapshot stamped with the current UTC time
    pub fn detected(
        process_id: i32,
        process_name: impl Into<String>,
        window_title: impl Into<String>,
        executable_path: impl Into<String>,
    ) -> Self {
        Self {
            process_id,
            process_name: process_name.into(),
            window_title: window_title.into(),
            executable_path: executable_path.into(),
            detected_at: Utc::now(),
        }
    }
}

/// Regex-based rule for closing processes. Rules are evaluated in list
/// order; the first enabled match wins. An empty or missing pattern never
/// matches anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PolicyRule {
    pub name: String,
    pub process_name_regex: Option<String>,
    pub window_title_regex: Option<String>,
    pub enabled: bool,
}

impl Default for PolicyRule {
    fn default() -> Self {
        Self {
            name: String::new(),
            process_name_regex: None,
            window_title_regex: None,
            enabled: true,
        }
    }
}

/// Action applied by a legacy application policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyAction {
    #[default]
    Allow,
    Block,
    TimeRestricted,
}

/// Day of week, serialized by full name for human-editable policy files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Sun => Weekday::Sunday,
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
        }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Weekday::Saturday | Weekday::Sunday)
    }
}

/// Daily time span during which a time-restricted application is allowed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
}

/// Legacy application policy, matched by case-insensitive substring on the
/// process name or executable path. Retained for configurations written
/// before regex rules existed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AppPolicy {
    pub application_name: String,
    pub executable_path: String,
    pub action: PolicyAction,
    pub allowed_time_windows: Vec<TimeWindow>,
    /// Accepted and round-tripped for older policy files; not enforced
    pub max_usage_minutes_per_day: u32,
    pub block_on_weekdays: bool,
    pub block_on_weekends: bool,
}

/// Root policy document. When `rules` is non-empty it fully supersedes the
/// legacy `policies` list; the two schemes are never combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PolicyConfiguration {
    pub enable_monitoring: bool,
    pub check_interval_seconds: u32,
    pub log_activity: bool,
    pub rules: Vec<PolicyRule>,
    pub policies: Vec<AppPolicy>,
}

impl Default for PolicyConfiguration {
    fn default() -> Self {
        Self {
            enable_monitoring: true,
            check_interval_seconds: 5,
            log_activity: true,
            rules: Vec::new(),
            policies: Vec::new(),
        }
    }
}

impl PolicyConfiguration {
    /// Configuration synthesized when no policy file exists yet
    pub fn starter() -> Self {
        Self {
            rules: vec![PolicyRule {
                name: "Example Blocked App".to_string(),
                process_name_regex: Some("^example$".to_string()),
                window_title_regex: None,
                enabled: true,
            }],
            ..Self::default()
        }
    }

    /// Fallback configuration used when the policy file cannot be parsed;
    /// monitoring stays off until a valid file is loaded
    pub fn disabled() -> Self {
        Self {
            enable_monitoring: false,
            ..Self::default()
        }
    }

    /// Effective monitoring interval, clamped to at least one second
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.check_interval_seconds.max(1)))
    }
}
