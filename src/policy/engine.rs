//! Rule matching against detected processes
//!
//! Two schemes share one entry point: regex rules (current) and legacy
//! substring/time-window policies. A non-empty rule list fully supersedes
//! the legacy list; the two are never combined for one decision.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local};
use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::constants::LEGACY_POLICY_REASON;
use crate::models::{AppPolicy, PolicyAction, PolicyConfiguration, PolicyRule, ProcessInfo, Weekday};

struct CompiledRule {
    index: usize,
    process_name: Option<Regex>,
    window_title: Option<Regex>,
}

pub struct PolicyEngine {
    config: Arc<PolicyConfiguration>,
    compiled: Vec<CompiledRule>,
}

impl PolicyEngine {
    /// Compile the enabled rules of one snapshot. Invalid patterns are
    /// logged and treated as never-matching rather than failing the tick.
    pub fn from_config(config: Arc<PolicyConfiguration>) -> Self {
        let compiled = config
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.enabled)
            .map(|(index, rule)| CompiledRule {
                index,
                process_name: compile_pattern(&rule.name, rule.process_name_regex.as_deref()),
                window_title: compile_pattern(&rule.name, rule.window_title_regex.as_deref()),
            })
            .collect();

        Self { config, compiled }
    }

    pub fn has_rules(&self) -> bool {
        !self.config.rules.is_empty()
    }

    /// First enabled rule matching the process name, or (foreground only)
    /// the window title. List order decides ties.
    pub fn match_rule(&self, process: &ProcessInfo, is_foreground: bool) -> Option<&PolicyRule> {
        for rule in &self.compiled {
            let name_match = rule
                .process_name
                .as_ref()
                .is_some_and(|regex| regex.is_match(&process.process_name));
            let title_match = is_foreground
                && rule
                    .window_title
                    .as_ref()
                    .is_some_and(|regex| regex.is_match(&process.window_title));

            if name_match || title_match {
                return Some(&self.config.rules[rule.index]);
            }
        }
        None
    }

    /// Legacy decision, consulted only when no rules are defined
    pub fn should_block_legacy(&self, process: &ProcessInfo, now: DateTime<Local>) -> bool {
        let Some(policy) = self
            .config
            .policies
            .iter()
            .find(|policy| policy_matches(policy, process))
        else {
            return false;
        };

        match policy.action {
            PolicyAction::Block => true,
            PolicyAction::TimeRestricted => !is_within_allowed_time(policy, now),
            PolicyAction::Allow => false,
        }
    }

    /// Combined decision honoring scheme precedence. Returns the reason
    /// string recorded for the enforcement action.
    pub fn violation(
        &self,
        process: &ProcessInfo,
        is_foreground: bool,
        now: DateTime<Local>,
    ) -> Option<String> {
        if self.has_rules() {
            return self
                .match_rule(process, is_foreground)
                .map(|rule| rule.name.clone());
        }
        self.should_block_legacy(process, now)
            .then(|| LEGACY_POLICY_REASON.to_string())
    }
}

fn compile_pattern(rule_name: &str, pattern: Option<&str>) -> Option<Regex> {
    let pattern = pattern?;
    if pattern.is_empty() {
        return None;
    }
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!("rule '{rule_name}' has an invalid pattern, ignoring it: {err}");
            None
        }
    }
}

fn policy_matches(policy: &AppPolicy, process: &ProcessInfo) -> bool {
    contains_ignore_case(&process.process_name, &policy.application_name)
        || contains_ignore_case(&process.executable_path, &policy.executable_path)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether the current local time falls inside an allowed window for a
/// time-restricted policy. Blanket weekday/weekend blocks win over windows.
fn is_within_allowed_time(policy: &AppPolicy, now: DateTime<Local>) -> bool {
    let today = Weekday::from_chrono(now.weekday());
    let current = now.time();

    if policy.block_on_weekdays && !today.is_weekend() {
        return false;
    }
    if policy.block_on_weekends && today.is_weekend() {
        return false;
    }
    if policy.allowed_time_windows.is_empty() {
        return false;
    }

    policy.allowed_time_windows.iter().any(|window| {
        window.days_of_week.contains(&today)
            && current >= window.start_time
            && current <= window.end_time
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn process(name: &str, title: &str) -> ProcessInfo {
        ProcessInfo::detected(42, name, title, format!("/usr/bin/{name}"))
    }

    fn rule(name: &str, process_pattern: Option<&str>, title_pattern: Option<&str>) -> PolicyRule {
        PolicyRule {
            name: name.to_string(),
            process_name_regex: process_pattern.map(String::from),
            window_title_regex: title_pattern.map(String::from),
            enabled: true,
        }
    }

    fn engine_with_rules(rules: Vec<PolicyRule>) -> PolicyEngine {
        PolicyEngine::from_config(Arc::new(PolicyConfiguration {
            rules,
            ..PolicyConfiguration::default()
        }))
    }

    fn engine_with_policies(policies: Vec<AppPolicy>) -> PolicyEngine {
        PolicyEngine::from_config(Arc::new(PolicyConfiguration {
            policies,
            ..PolicyConfiguration::default()
        }))
    }

    /// Tuesday 2024-01-02 at the given time
    fn tuesday_at(hour: u32, minute: u32) -> DateTime<Local> {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        Local.from_local_datetime(&date.and_time(time)).unwrap()
    }

    /// Saturday 2024-01-06 at the given time
    fn saturday_at(hour: u32, minute: u32) -> DateTime<Local> {
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        Local.from_local_datetime(&date.and_time(time)).unwrap()
    }

    // ==================== match_rule tests ====================

    #[test]
    fn test_matching_rule_is_returned() {
        let engine = engine_with_rules(vec![rule("Block Game", Some("^game$"), None)]);
        let matched = engine.match_rule(&process("game", ""), false);
        assert_eq!(matched.map(|r| r.name.as_str()), Some("Block Game"));
    }

    #[test]
    fn test_non_matching_process_returns_none() {
        let engine = engine_with_rules(vec![rule("Block Game", Some("^game$"), None)]);
        assert!(engine.match_rule(&process("notgame", ""), false).is_none());
    }

    #[test]
    fn test_first_of_multiple_matches_wins() {
        let engine = engine_with_rules(vec![
            rule("First", Some("game"), None),
            rule("Second", Some("^game$"), None),
        ]);
        let matched = engine.match_rule(&process("game", ""), false);
        assert_eq!(matched.map(|r| r.name.as_str()), Some("First"));
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let mut disabled = rule("Disabled", Some("^game$"), None);
        disabled.enabled = false;
        let engine = engine_with_rules(vec![disabled, rule("Enabled", Some("^game$"), None)]);
        let matched = engine.match_rule(&process("game", ""), false);
        assert_eq!(matched.map(|r| r.name.as_str()), Some("Enabled"));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let engine = engine_with_rules(vec![rule("Block Game", Some("^game$"), None)]);
        assert!(engine.match_rule(&process("GAME", ""), false).is_some());
    }

    #[test]
    fn test_window_title_only_matches_foreground() {
        let engine = engine_with_rules(vec![rule("Title", None, Some("minecraft"))]);
        let target = process("java", "Minecraft 1.20");
        assert!(engine.match_rule(&target, false).is_none());
        assert!(engine.match_rule(&target, true).is_some());
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let engine = engine_with_rules(vec![rule("Empty", Some(""), Some(""))]);
        assert!(engine.match_rule(&process("anything", "anything"), true).is_none());
    }

    #[test]
    fn test_invalid_pattern_is_treated_as_non_matching() {
        let engine = engine_with_rules(vec![
            rule("Broken", Some("(unclosed"), None),
            rule("Valid", Some("^game$"), None),
        ]);
        let matched = engine.match_rule(&process("game", ""), false);
        assert_eq!(matched.map(|r| r.name.as_str()), Some("Valid"));
    }

    // ==================== Legacy policy tests ====================

    fn blocking_policy(name: &str) -> AppPolicy {
        AppPolicy {
            application_name: name.to_string(),
            action: PolicyAction::Block,
            ..AppPolicy::default()
        }
    }

    #[test]
    fn test_legacy_block_matches_substring_of_name() {
        let engine = engine_with_policies(vec![blocking_policy("game")]);
        assert!(engine.should_block_legacy(&process("MyGameLauncher", ""), tuesday_at(12, 0)));
    }

    #[test]
    fn test_legacy_matches_executable_path() {
        let policy = AppPolicy {
            application_name: "no-such-name".to_string(),
            executable_path: "/opt/games".to_string(),
            action: PolicyAction::Block,
            ..AppPolicy::default()
        };
        let engine = engine_with_policies(vec![policy]);
        let target = ProcessInfo::detected(9, "launcher", "", "/opt/games/bin/launcher");
        assert!(engine.should_block_legacy(&target, tuesday_at(12, 0)));
    }

    #[test]
    fn test_legacy_allow_action_never_blocks() {
        let engine = engine_with_policies(vec![AppPolicy {
            application_name: "editor".to_string(),
            action: PolicyAction::Allow,
            ..AppPolicy::default()
        }]);
        assert!(!engine.should_block_legacy(&process("editor", ""), tuesday_at(12, 0)));
    }

    #[test]
    fn test_legacy_empty_needles_never_match() {
        let engine = engine_with_policies(vec![AppPolicy {
            action: PolicyAction::Block,
            ..AppPolicy::default()
        }]);
        assert!(!engine.should_block_legacy(&process("anything", ""), tuesday_at(12, 0)));
    }

    #[test]
    fn test_time_restricted_blocks_outside_window() {
        let engine = engine_with_policies(vec![AppPolicy {
            application_name: "game".to_string(),
            action: PolicyAction::TimeRestricted,
            allowed_time_windows: vec![weekend_afternoon_window()],
            ..AppPolicy::default()
        }]);
        // Saturday morning: outside the 14:00-18:00 window
        assert!(engine.should_block_legacy(&process("game", ""), saturday_at(9, 0)));
        // Saturday afternoon: inside the window
        assert!(!engine.should_block_legacy(&process("game", ""), saturday_at(15, 30)));
    }

    #[test]
    fn test_time_restricted_blanket_weekday_block_wins() {
        let engine = engine_with_policies(vec![AppPolicy {
            application_name: "game".to_string(),
            action: PolicyAction::TimeRestricted,
            block_on_weekdays: true,
            allowed_time_windows: vec![all_day_every_day_window()],
            ..AppPolicy::default()
        }]);
        assert!(engine.should_block_legacy(&process("game", ""), tuesday_at(12, 0)));
        assert!(!engine.should_block_legacy(&process("game", ""), saturday_at(12, 0)));
    }

    #[test]
    fn test_time_restricted_without_windows_always_blocks() {
        let engine = engine_with_policies(vec![AppPolicy {
            application_name: "game".to_string(),
            action: PolicyAction::TimeRestricted,
            ..AppPolicy::default()
        }]);
        assert!(engine.should_block_legacy(&process("game", ""), saturday_at(15, 0)));
    }

    // ==================== Precedence tests ====================

    #[test]
    fn test_rules_supersede_legacy_policies() {
        // The legacy policy would block this process, but a rule list is
        // present so it must never be consulted.
        let engine = PolicyEngine::from_config(Arc::new(PolicyConfiguration {
            rules: vec![rule("Unrelated", Some("^other$"), None)],
            policies: vec![blocking_policy("game")],
            ..PolicyConfiguration::default()
        }));
        assert!(engine.violation(&process("game", ""), false, tuesday_at(12, 0)).is_none());
    }

    #[test]
    fn test_violation_reports_rule_name() {
        let engine = engine_with_rules(vec![rule("Block Game", Some("^game$"), None)]);
        assert_eq!(
            engine.violation(&process("game", ""), false, tuesday_at(12, 0)),
            Some("Block Game".to_string())
        );
    }

    #[test]
    fn test_violation_reports_legacy_reason() {
        let engine = engine_with_policies(vec![blocking_policy("game")]);
        assert_eq!(
            engine.violation(&process("game", ""), false, tuesday_at(12, 0)),
            Some(LEGACY_POLICY_REASON.to_string())
        );
    }

    fn weekend_afternoon_window() -> crate::models::TimeWindow {
        crate::models::TimeWindow {
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            days_of_week: vec![Weekday::Saturday, Weekday::Sunday],
        }
    }

    fn all_day_every_day_window() -> crate::models::TimeWindow {
        crate::models::TimeWindow {
            start_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            days_of_week: vec![
                Weekday::Sunday,
                Weekday::Monday,
                Weekday::Tuesday,
                Weekday::Wednesday,
                Weekday::Thursday,
                Weekday::Friday,
                Weekday::Saturday,
            ],
        }
    }
}
