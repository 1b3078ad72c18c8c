//! Bounded per-player distribution and failure history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use super::result::{FailedReward, RewardDistributionResult};

/// Failures of one distribution request still awaiting a retry decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub request_id: Uuid,
    pub player_id: String,
    pub failed_at: DateTime<Utc>,
    pub failures: Vec<FailedReward>,
    /// Retry rounds already run for this request
    pub retry_rounds: u32,
}

impl FailureRecord {
    pub fn has_retryable(&self) -> bool {
        self.failures.iter().any(|f| f.can_retry)
    }
}

pub struct RewardHistory {
    distributions: DashMap<String, VecDeque<RewardDistributionResult>>,
    failures: DashMap<String, VecDeque<FailureRecord>>,
    limit: usize,
}

impl RewardHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            distributions: DashMap::new(),
            failures: DashMap::new(),
            limit: limit.max(1),
        }
    }

    fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, limit: usize) {
        queue.push_back(item);
        while queue.len() > limit {
            queue.pop_front();
        }
    }

    pub fn record_distribution(&self, result: &RewardDistributionResult) {
        let mut entries = self
            .distributions
            .entry(result.player_id.clone())
            .or_default();
        Self::push_bounded(&mut *entries, result.clone(), self.limit);
    }

    pub fn record_failures(&self, result: &RewardDistributionResult, at: DateTime<Utc>) {
        if result.failed_rewards.is_empty() {
            return;
        }
        self.store_failure(FailureRecord {
            request_id: result.request_id,
            player_id: result.player_id.clone(),
            failed_at: at,
            failures: result.failed_rewards.clone(),
            retry_rounds: 0,
        });
    }

    /// Put a (possibly shrunk) failure record back. Empty records are dropped.
    pub fn store_failure(&self, record: FailureRecord) {
        if record.failures.is_empty() {
            return;
        }
        let mut entries = self.failures.entry(record.player_id.clone()).or_default();
        Self::push_bounded(&mut *entries, record, self.limit);
    }

    /// Remove and return a failure record so it can be retried
    pub fn take_failure(&self, player_id: &str, request_id: Uuid) -> Option<FailureRecord> {
        let mut entries = self.failures.get_mut(player_id)?;
        let pos = entries.iter().position(|r| r.request_id == request_id)?;
        entries.remove(pos)
    }

    pub fn distributions(&self, player_id: &str) -> Vec<RewardDistributionResult> {
        self.distributions
            .get(player_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn failures(&self, player_id: &str) -> Vec<FailureRecord> {
        self.failures
            .get(player_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::QuestReward;

    fn failed_result(player: &str) -> RewardDistributionResult {
        let mut result = RewardDistributionResult::new(player, 1);
        result.record_failure(QuestReward::gold(5), "down", true);
        result
    }

    #[test]
    fn test_history_is_bounded() {
        let history = RewardHistory::new(2);
        for _ in 0..3 {
            history.record_distribution(&RewardDistributionResult::new("ash", 0));
        }
        assert_eq!(history.distributions("ash").len(), 2);
        assert!(history.distributions("misty").is_empty());
    }

    #[test]
    fn test_take_failure_removes_record() {
        let history = RewardHistory::new(10);
        let result = failed_result("ash");
        history.record_failures(&result, Utc::now());
        history.record_failures(&RewardDistributionResult::new("ash", 0), Utc::now());
        assert_eq!(history.failures("ash").len(), 1);

        let record = history.take_failure("ash", result.request_id).unwrap();
        assert!(record.has_retryable());
        assert!(history.failures("ash").is_empty());
        assert!(history.take_failure("ash", result.request_id).is_none());
    }
}
