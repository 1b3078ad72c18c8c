//! Quest State Tracking
//!
//! Per-player quest progress and the `PlayerQuestRecord` aggregate that the
//! persistence layer stores as one document.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definition::{QuestDefinition, QuestStep};

/// Status of a quest for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Quest is active and in progress
    Active,
    /// All objectives complete, rewards withheld until turn-in
    ReadyToComplete,
    Completed,
    Failed,
    /// Quest was abandoned by player
    Abandoned,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Active => "active",
            QuestStatus::ReadyToComplete => "ready_to_complete",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
            QuestStatus::Abandoned => "abandoned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(QuestStatus::Active),
            "ready_to_complete" => Some(QuestStatus::ReadyToComplete),
            "completed" => Some(QuestStatus::Completed),
            "failed" => Some(QuestStatus::Failed),
            "abandoned" => Some(QuestStatus::Abandoned),
            _ => None,
        }
    }
}

/// Progress on a single objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveProgress {
    pub objective_id: String,
    pub current_amount: u32,
    pub required_amount: u32,
    pub completed: bool,
}

impl ObjectiveProgress {
    pub fn new(objective_id: &str, required_amount: u32) -> Self {
        Self {
            objective_id: objective_id.to_string(),
            current_amount: 0,
            required_amount,
            completed: false,
        }
    }

    /// Add progress, clamped to the requirement. Returns true if newly completed.
    pub fn add_progress(&mut self, amount: u32) -> bool {
        if self.completed {
            return false;
        }
        self.current_amount = self
            .current_amount
            .saturating_add(amount)
            .min(self.required_amount);
        if self.current_amount >= self.required_amount {
            self.completed = true;
            true
        } else {
            false
        }
    }

    pub fn progress_percent(&self) -> f32 {
        if self.required_amount == 0 {
            return 1.0;
        }
        self.current_amount as f32 / self.required_amount as f32
    }
}

/// One active quest for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerQuestProgress {
    pub quest_id: String,
    pub status: QuestStatus,
    /// Only ever increases
    pub current_step_index: usize,
    /// Progress on each objective (keyed by objective_id)
    pub objectives: HashMap<String, ObjectiveProgress>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlayerQuestProgress {
    pub fn new(definition: &QuestDefinition, now: DateTime<Utc>) -> Self {
        let mut progress = Self {
            quest_id: definition.id.clone(),
            status: QuestStatus::Active,
            current_step_index: 0,
            objectives: HashMap::new(),
            started_at: now,
            completed_at: None,
        };
        if let Some(step) = definition.step(0) {
            progress.init_step(step);
        }
        progress
    }

    /// Reset the objectives of `step` to zero/incomplete
    pub fn init_step(&mut self, step: &QuestStep) {
        for objective in &step.objectives {
            self.objectives.insert(
                objective.id.clone(),
                ObjectiveProgress::new(&objective.id, objective.required_amount),
            );
        }
    }

    pub fn objective(&self, objective_id: &str) -> Option<&ObjectiveProgress> {
        self.objectives.get(objective_id)
    }

    /// Every objective of `step` is completed
    pub fn is_step_complete(&self, step: &QuestStep) -> bool {
        step.objectives.iter().all(|o| {
            self.objectives
                .get(&o.id)
                .map(|p| p.completed)
                .unwrap_or(false)
        })
    }

    /// Progress entries for `step`, in definition order
    pub fn step_objectives(&self, step: &QuestStep) -> Vec<ObjectiveProgress> {
        step.objectives
            .iter()
            .filter_map(|o| self.objectives.get(&o.id).cloned())
            .collect()
    }

    pub fn mark_ready(&mut self) {
        self.status = QuestStatus::ReadyToComplete;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = QuestStatus::Completed;
        self.completed_at = Some(now);
    }

    pub fn fail(&mut self, now: DateTime<Utc>) {
        self.status = QuestStatus::Failed;
        self.completed_at = Some(now);
    }

    pub fn abandon(&mut self, now: DateTime<Utc>) {
        self.status = QuestStatus::Abandoned;
        self.completed_at = Some(now);
    }

    /// Get duration in seconds
    pub fn duration_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.completed_at.unwrap_or(now);
        (end - self.started_at).num_seconds()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            QuestStatus::Completed | QuestStatus::Failed | QuestStatus::Abandoned
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedQuest {
    pub quest_id: String,
    pub completed_at: DateTime<Utc>,
    pub step_count: usize,
    pub times_completed: u32,
}

/// Latest completion of a repeatable quest, for cooldown lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestCompletion {
    pub quest_id: String,
    pub completed_at: DateTime<Utc>,
}

/// All quest state for a single player; the unit of persistence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerQuestRecord {
    pub player_id: String,
    /// Optimistic-concurrency token, bumped by the repository on save
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub active_quests: Vec<PlayerQuestProgress>,
    #[serde(default)]
    pub completed_quests: Vec<CompletedQuest>,
    #[serde(default)]
    pub last_quest_completions: Vec<QuestCompletion>,
}

impl PlayerQuestRecord {
    pub fn new(player_id: &str) -> Self {
        Self {
            player_id: player_id.to_string(),
            ..Default::default()
        }
    }

    /// Start a new quest at step 0
    pub fn start_quest(&mut self, definition: &QuestDefinition, now: DateTime<Utc>) {
        self.active_quests
            .push(PlayerQuestProgress::new(definition, now));
    }

    pub fn get_quest(&self, quest_id: &str) -> Option<&PlayerQuestProgress> {
        self.active_quests.iter().find(|p| p.quest_id == quest_id)
    }

    pub fn get_quest_mut(&mut self, quest_id: &str) -> Option<&mut PlayerQuestProgress> {
        self.active_quests.iter_mut().find(|p| p.quest_id == quest_id)
    }

    pub fn is_quest_active(&self, quest_id: &str) -> bool {
        self.get_quest(quest_id).is_some()
    }

    pub fn is_quest_completed(&self, quest_id: &str) -> bool {
        self.completed_quests.iter().any(|c| c.quest_id == quest_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_quests.len()
    }

    /// Remove a quest from the active list
    pub fn remove_active(&mut self, quest_id: &str) -> Option<PlayerQuestProgress> {
        let index = self.active_quests.iter().position(|p| p.quest_id == quest_id)?;
        Some(self.active_quests.remove(index))
    }

    /// Move an active quest to the completed list. Repeatable quests also
    /// refresh their cooldown entry.
    pub fn complete_quest(
        &mut self,
        definition: &QuestDefinition,
        now: DateTime<Utc>,
    ) -> Option<PlayerQuestProgress> {
        let mut progress = self.remove_active(&definition.id)?;
        progress.complete(now);

        match self
            .completed_quests
            .iter_mut()
            .find(|c| c.quest_id == definition.id)
        {
            Some(entry) => {
                entry.completed_at = now;
                entry.step_count = definition.step_count();
                entry.times_completed += 1;
            }
            None => self.completed_quests.push(CompletedQuest {
                quest_id: definition.id.clone(),
                completed_at: now,
                step_count: definition.step_count(),
                times_completed: 1,
            }),
        }

        if definition.is_repeatable {
            self.last_quest_completions
                .retain(|c| c.quest_id != definition.id);
            self.last_quest_completions.push(QuestCompletion {
                quest_id: definition.id.clone(),
                completed_at: now,
            });
        }

        Some(progress)
    }

    /// When the quest was last completed (cooldown entry first, then history)
    pub fn last_completed_at(&self, quest_id: &str) -> Option<DateTime<Utc>> {
        self.last_quest_completions
            .iter()
            .find(|c| c.quest_id == quest_id)
            .map(|c| c.completed_at)
            .or_else(|| {
                self.completed_quests
                    .iter()
                    .find(|c| c.quest_id == quest_id)
                    .map(|c| c.completed_at)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn two_step_quest(repeatable: bool) -> QuestDefinition {
        let content = format!(
            r#"
[quest]
id = "first_hunt"
name = "First Hunt"
is_repeatable = {}

[[quest.steps]]
[[quest.steps.objectives]]
id = "kill_rattata"
type = "defeat"
target = "rattata"
required_amount = 5

[[quest.steps.objectives]]
id = "collect_tails"
type = "collect"
target = "rattata_tail"
required_amount = 3

[[quest.steps]]
[[quest.steps.objectives]]
id = "report"
type = "talk"
target = "ranger"
"#,
            repeatable
        );
        QuestDefinition::from_toml_str(&content).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_objective_progress() {
        let mut obj = ObjectiveProgress::new("defeat_rattata", 5);
        assert!(!obj.completed);

        assert!(!obj.add_progress(3));
        assert_eq!(obj.current_amount, 3);

        assert!(obj.add_progress(7));
        assert!(obj.completed);
        assert_eq!(obj.current_amount, 5);

        // Can't add more after complete
        assert!(!obj.add_progress(1));
        assert_eq!(obj.current_amount, 5);
    }

    #[test]
    fn test_new_progress_initializes_first_step_only() {
        let quest = two_step_quest(false);
        let progress = PlayerQuestProgress::new(&quest, now());
        assert_eq!(progress.current_step_index, 0);
        assert_eq!(progress.objectives.len(), 2);
        assert!(progress.objective("report").is_none());
        assert!(!progress.is_step_complete(quest.step(0).unwrap()));
    }

    #[test]
    fn test_step_completion() {
        let quest = two_step_quest(false);
        let step = quest.step(0).unwrap();
        let mut progress = PlayerQuestProgress::new(&quest, now());
        for obj in progress.objectives.values_mut() {
            obj.add_progress(10);
        }
        assert!(progress.is_step_complete(step));
        let listed = progress.step_objectives(step);
        assert_eq!(listed[0].objective_id, "kill_rattata");
        assert_eq!(listed[1].objective_id, "collect_tails");
    }

    #[test]
    fn test_complete_quest_moves_record() {
        let quest = two_step_quest(false);
        let mut record = PlayerQuestRecord::new("ash");
        record.start_quest(&quest, now());
        assert!(record.is_quest_active("first_hunt"));

        let done = record.complete_quest(&quest, now()).unwrap();
        assert_eq!(done.status, QuestStatus::Completed);
        assert!(!record.is_quest_active("first_hunt"));
        assert!(record.is_quest_completed("first_hunt"));
        assert_eq!(record.completed_quests[0].step_count, 2);
        // Non-repeatable quests keep no cooldown entry
        assert!(record.last_quest_completions.is_empty());
    }

    #[test]
    fn test_repeatable_completion_refreshes_cooldown() {
        let quest = two_step_quest(true);
        let mut record = PlayerQuestRecord::new("ash");

        record.start_quest(&quest, now());
        record.complete_quest(&quest, now());

        let later = now() + chrono::Duration::days(2);
        record.start_quest(&quest, later);
        record.complete_quest(&quest, later);

        assert_eq!(record.completed_quests.len(), 1);
        assert_eq!(record.completed_quests[0].times_completed, 2);
        assert_eq!(record.last_quest_completions.len(), 1);
        assert_eq!(record.last_completed_at("first_hunt"), Some(later));
    }

    #[test]
    fn test_status_strings() {
        for status in [
            QuestStatus::Active,
            QuestStatus::ReadyToComplete,
            QuestStatus::Completed,
            QuestStatus::Failed,
            QuestStatus::Abandoned,
        ] {
            assert_eq!(QuestStatus::from_str(status.as_str()), Some(status));
        }
    }
}
