//! Progress tracking: turning gameplay events into objective, step and
//! quest progress.

pub mod matcher;
pub mod tracker;

use serde::Serialize;

pub use matcher::matches_objective;
pub use tracker::ProgressTracker;

use crate::quest::ObjectiveProgress;
use crate::rewards::RewardDistributionResult;

/// What one event did to one quest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestUpdateResult {
    pub quest_id: String,
    pub quest_name: String,
    pub objective_id: String,
    pub objective_description: String,
    pub current_amount: u32,
    pub required_amount: u32,
    pub objective_completed: bool,
    pub step_completed: bool,
    /// Id of the step that just completed
    pub completed_step_id: Option<String>,
    /// Step index after this update
    pub current_step_index: usize,
    pub total_steps: usize,
    /// Objectives of the newly started step, if the quest advanced
    pub new_objectives: Vec<ObjectiveProgress>,
    pub quest_completed: bool,
    pub auto_completed: bool,
    /// Finished, waiting for turn-in at the quest giver
    pub requires_npc_return: bool,
    pub step_rewards: Option<RewardDistributionResult>,
    pub quest_rewards: Option<RewardDistributionResult>,
}

impl QuestUpdateResult {
    pub fn progress_text(&self) -> String {
        format!("{}/{}", self.current_amount, self.required_amount)
    }
}
