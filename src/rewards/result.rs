//! Outcome records of a reward distribution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::quest::QuestReward;

/// A reward that was applied to the player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributedReward {
    pub distribution_id: Uuid,
    /// The reward as actually applied (gold may have been capped)
    pub reward: QuestReward,
    pub distributed_at: DateTime<Utc>,
    pub claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedReward {
    pub reward: QuestReward,
    pub reason: String,
    pub can_retry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardDistributionResult {
    pub request_id: Uuid,
    pub player_id: String,
    pub distributed_rewards: Vec<DistributedReward>,
    pub failed_rewards: Vec<FailedReward>,
    pub total_rewards: usize,
    /// Monetary value of what was actually distributed
    pub total_value: i64,
    pub distribution_time_ms: u64,
}

impl RewardDistributionResult {
    pub fn new(player_id: &str, total_rewards: usize) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            player_id: player_id.to_string(),
            distributed_rewards: Vec::new(),
            failed_rewards: Vec::new(),
            total_rewards,
            total_value: 0,
            distribution_time_ms: 0,
        }
    }

    pub fn record_success(&mut self, reward: QuestReward, at: DateTime<Utc>) {
        self.total_value += reward.monetary_value();
        self.distributed_rewards.push(DistributedReward {
            distribution_id: Uuid::new_v4(),
            reward,
            distributed_at: at,
            claimed: true,
        });
    }

    pub fn record_failure(&mut self, reward: QuestReward, reason: impl Into<String>, can_retry: bool) {
        self.failed_rewards.push(FailedReward {
            reward,
            reason: reason.into(),
            can_retry,
        });
    }

    pub fn is_success(&self) -> bool {
        self.failed_rewards.is_empty()
    }

    pub fn retryable_failures(&self) -> impl Iterator<Item = &FailedReward> {
        self.failed_rewards.iter().filter(|f| f.can_retry)
    }

    /// Human-readable list of what was granted
    pub fn summary(&self) -> Vec<String> {
        self.distributed_rewards
            .iter()
            .map(|d| d.reward.describe())
            .collect()
    }
}
