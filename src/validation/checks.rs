//! Validation records and the player snapshot they are computed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quest::{PlayerQuestRecord, WorldState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    AlreadyActive,
    Repeatable,
    Cooldown,
    Prerequisites,
    Level,
    Badges,
    Inventory,
    Region,
    Temporal,
    PartySize,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::AlreadyActive => "already_active",
            CheckKind::Repeatable => "repeatable",
            CheckKind::Cooldown => "cooldown",
            CheckKind::Prerequisites => "prerequisites",
            CheckKind::Level => "level",
            CheckKind::Badges => "badges",
            CheckKind::Inventory => "inventory",
            CheckKind::Region => "region",
            CheckKind::Temporal => "temporal",
            CheckKind::PartySize => "party_size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Passed,
    Failed,
    /// The check applies to this quest but is switched off
    NotConfigured,
}

/// Outcome of one check, with enough detail to explain a failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub kind: CheckKind,
    pub state: CheckState,
    /// A failed required check makes the quest untakeable
    pub required: bool,
    pub current: Option<String>,
    pub expected: Option<String>,
    pub message: String,
    pub suggestion: Option<String>,
}

impl CheckRecord {
    fn new(kind: CheckKind, state: CheckState, message: impl Into<String>) -> Self {
        Self {
            kind,
            state,
            required: true,
            current: None,
            expected: None,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn passed(kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(kind, CheckState::Passed, message)
    }

    pub fn failed(kind: CheckKind, message: impl Into<String>) -> Self {
        Self::new(kind, CheckState::Failed, message)
    }

    pub fn not_configured(kind: CheckKind) -> Self {
        let mut record = Self::new(
            kind,
            CheckState::NotConfigured,
            format!("{} check is not enabled", kind.as_str()),
        );
        record.required = false;
        record
    }

    pub fn with_values(mut self, current: impl ToString, expected: impl ToString) -> Self {
        self.current = Some(current.to_string());
        self.expected = Some(expected.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Advisory only; failing it does not block the quest
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.state == CheckState::Failed
    }

    pub fn is_blocking(&self) -> bool {
        self.required && self.is_failure()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub quest_id: String,
    pub valid: bool,
    pub checks: Vec<CheckRecord>,
    pub failed_checks: Vec<CheckRecord>,
    /// Minutes until a repeatable quest comes off cooldown
    pub cooldown_remaining: Option<i64>,
    pub level_required: Option<u32>,
    pub recommendations: Vec<String>,
    pub missing_prerequisites: Vec<String>,
}

impl ValidationResult {
    pub fn from_checks(quest_id: &str, checks: Vec<CheckRecord>) -> Self {
        let failed_checks: Vec<CheckRecord> =
            checks.iter().filter(|c| c.is_failure()).cloned().collect();
        let recommendations = failed_checks
            .iter()
            .filter_map(|c| c.suggestion.clone())
            .collect();
        Self {
            quest_id: quest_id.to_string(),
            valid: !checks.iter().any(|c| c.is_blocking()),
            checks,
            failed_checks,
            cooldown_remaining: None,
            level_required: None,
            recommendations,
            missing_prerequisites: Vec::new(),
        }
    }

    /// Messages of the checks that block the quest
    pub fn reasons(&self) -> Vec<String> {
        self.failed_checks
            .iter()
            .filter(|c| c.required)
            .map(|c| c.message.clone())
            .collect()
    }

    pub fn check(&self, kind: CheckKind) -> Option<&CheckRecord> {
        self.checks.iter().find(|c| c.kind == kind)
    }
}

/// What the validator knows about the player beyond their quest record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerProfile {
    pub level: u32,
    pub badges: Vec<String>,
    /// None when the inventory system did not report it
    pub free_inventory_slots: Option<u32>,
    /// Region the player is currently in
    pub location: Option<String>,
    pub party_size: u32,
    pub world: WorldState,
    pub last_login: Option<DateTime<Utc>>,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            level: 1,
            badges: Vec::new(),
            free_inventory_slots: None,
            location: None,
            party_size: 1,
            world: WorldState::default(),
            last_login: None,
        }
    }
}

/// Everything a validation run looks at, taken at one point in time
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub player_id: String,
    pub profile: PlayerProfile,
    pub record: PlayerQuestRecord,
}

impl PlayerSnapshot {
    pub fn new(profile: PlayerProfile, record: PlayerQuestRecord) -> Self {
        Self {
            player_id: record.player_id.clone(),
            profile,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_failures_do_not_block() {
        let checks = vec![
            CheckRecord::passed(CheckKind::Level, "ok"),
            CheckRecord::failed(CheckKind::Inventory, "bag is full")
                .optional()
                .with_suggestion("Free up bag space"),
            CheckRecord::not_configured(CheckKind::Badges),
        ];
        let result = ValidationResult::from_checks("q", checks);
        assert!(result.valid);
        assert_eq!(result.failed_checks.len(), 1);
        assert_eq!(result.recommendations, vec!["Free up bag space"]);
        assert!(result.reasons().is_empty());
    }

    #[test]
    fn test_required_failure_blocks() {
        let checks = vec![CheckRecord::failed(CheckKind::Level, "Level too low").with_values(3, 5)];
        let result = ValidationResult::from_checks("q", checks);
        assert!(!result.valid);
        assert_eq!(result.reasons(), vec!["Level too low"]);
        assert_eq!(result.failed_checks[0].current.as_deref(), Some("3"));
    }
}
