//! Reward Distributor
//!
//! Applies reward bundles to the external player systems through the
//! `RewardSink` port, keeping a record of every success and failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::history::{FailureRecord, RewardHistory};
use super::result::{FailedReward, RewardDistributionResult};
use super::validation::validate_reward;
use crate::clock::Clock;
use crate::config::RewardConfig;
use crate::error::SinkError;
use crate::ports::RewardSink;
use crate::quest::{QuestReward, RewardKind, RewardType};

/// Source of uniform rolls in `0.0..1.0` for chance-gated rewards
pub type RollFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Result of trying to apply a single reward
enum ApplyOutcome {
    Applied(QuestReward),
    /// A reward condition was not met; nothing was sent to the sink
    Skipped(String),
    Failed { reason: String, can_retry: bool },
}

pub struct RewardDistributor {
    config: RewardConfig,
    sink: Arc<dyn RewardSink>,
    /// Handlers for the non-economy reward types
    extensions: HashMap<RewardType, Arc<dyn RewardSink>>,
    clock: Arc<dyn Clock>,
    roll: RollFn,
    history: RewardHistory,
}

impl RewardDistributor {
    pub fn new(config: RewardConfig, sink: Arc<dyn RewardSink>, clock: Arc<dyn Clock>) -> Self {
        let history = RewardHistory::new(config.history_limit);
        Self {
            config,
            sink,
            extensions: HashMap::new(),
            clock,
            roll: Arc::new(|| rand::thread_rng().gen_range(0.0..1.0)),
            history,
        }
    }

    /// Register the system that applies a non-core reward type
    pub fn with_extension(mut self, reward_type: RewardType, sink: Arc<dyn RewardSink>) -> Self {
        self.extensions.insert(reward_type, sink);
        self
    }

    pub fn with_roll(mut self, roll: RollFn) -> Self {
        self.roll = roll;
        self
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Apply a bundle of rewards to a player.
    ///
    /// Never fails as a whole: every reward ends up either in
    /// `distributed_rewards` or in `failed_rewards`.
    pub async fn distribute_rewards(
        &self,
        player_id: &str,
        rewards: &[QuestReward],
    ) -> RewardDistributionResult {
        let started = Instant::now();
        let mut result = RewardDistributionResult::new(player_id, rewards.len());

        if rewards.is_empty() {
            return result;
        }

        let mut valid = Vec::with_capacity(rewards.len());
        let mut invalid = Vec::new();
        for reward in rewards {
            match validate_reward(reward) {
                Ok(()) => valid.push(reward),
                Err(reason) => invalid.push((reward, reason)),
            }
        }

        if self.config.strict_validation && !invalid.is_empty() {
            warn!(
                player_id,
                request_id = %result.request_id,
                invalid = invalid.len(),
                "Rejecting reward bundle, strict validation failed"
            );
            let first_reason = invalid[0].1.clone();
            for (reward, reason) in invalid {
                result.record_failure(reward.clone(), format!("Invalid reward: {}", reason), false);
            }
            for reward in valid {
                result.record_failure(
                    reward.clone(),
                    format!("Bundle rejected: {}", first_reason),
                    false,
                );
            }
            return self.finish(result, started);
        }

        for (reward, reason) in invalid {
            debug!(player_id, "Skipping invalid reward: {}", reason);
            result.record_failure(reward.clone(), format!("Invalid reward: {}", reason), false);
        }

        if !self.config.strict_validation && valid.len() <= self.config.batch_size {
            self.apply_batch(player_id, &valid, &mut result).await;
        } else {
            self.apply_sequential(player_id, &valid, &mut result).await;
        }

        self.finish(result, started)
    }

    /// Small bundles: apply everything, report as one unit
    async fn apply_batch(
        &self,
        player_id: &str,
        rewards: &[&QuestReward],
        result: &mut RewardDistributionResult,
    ) {
        debug!(player_id, count = rewards.len(), "Distributing reward batch");
        for reward in rewards {
            self.record_outcome(result, reward, self.apply_one(player_id, reward).await);
        }
    }

    /// Large or strict bundles: one at a time, strict mode stops at the first
    /// failure. Rewards already applied stay applied.
    async fn apply_sequential(
        &self,
        player_id: &str,
        rewards: &[&QuestReward],
        result: &mut RewardDistributionResult,
    ) {
        let mut remaining = rewards.iter();
        while let Some(reward) = remaining.next() {
            let outcome = self.apply_one(player_id, reward).await;
            let stop = self.config.strict_validation && matches!(outcome, ApplyOutcome::Failed { .. });
            self.record_outcome(result, reward, outcome);

            if stop {
                let skipped: Vec<_> = remaining.collect();
                warn!(
                    player_id,
                    request_id = %result.request_id,
                    skipped = skipped.len(),
                    "Stopping strict distribution after failure"
                );
                for reward in skipped {
                    result.record_failure(
                        (*reward).clone(),
                        "Not applied: earlier reward in bundle failed",
                        true,
                    );
                }
                break;
            }
        }
    }

    fn record_outcome(
        &self,
        result: &mut RewardDistributionResult,
        reward: &QuestReward,
        outcome: ApplyOutcome,
    ) {
        match outcome {
            ApplyOutcome::Applied(applied) => result.record_success(applied, self.clock.now()),
            ApplyOutcome::Skipped(reason) => result.record_failure(reward.clone(), reason, false),
            ApplyOutcome::Failed { reason, can_retry } => {
                result.record_failure(reward.clone(), reason, can_retry)
            }
        }
    }

    fn finish(
        &self,
        mut result: RewardDistributionResult,
        started: Instant,
    ) -> RewardDistributionResult {
        result.distribution_time_ms = started.elapsed().as_millis() as u64;
        self.history.record_distribution(&result);
        self.history.record_failures(&result, self.clock.now());

        info!(
            player_id = %result.player_id,
            request_id = %result.request_id,
            distributed = result.distributed_rewards.len(),
            failed = result.failed_rewards.len(),
            total_value = result.total_value,
            "Distributed rewards"
        );
        result
    }

    fn conditions_met(&self, reward: &QuestReward, now: DateTime<Utc>) -> Result<(), String> {
        let Some(conditions) = &reward.conditions else {
            return Ok(());
        };
        if let Some(expires_at) = conditions.expires_at {
            if now >= expires_at {
                return Err(format!("Reward expired at {}", expires_at));
            }
        }
        if let Some(chance) = conditions.chance {
            let roll = (self.roll)();
            if roll >= chance {
                return Err(format!("Chance roll missed ({:.2} >= {:.2})", roll, chance));
            }
        }
        Ok(())
    }

    /// Cap gold at the inflation ceiling
    fn cap(&self, player_id: &str, reward: &QuestReward) -> QuestReward {
        match &reward.kind {
            RewardKind::Gold { amount } if *amount > self.config.max_gold_per_distribution => {
                warn!(
                    player_id,
                    requested = amount,
                    cap = self.config.max_gold_per_distribution,
                    "Capping gold reward"
                );
                QuestReward {
                    kind: RewardKind::Gold {
                        amount: self.config.max_gold_per_distribution,
                    },
                    conditions: reward.conditions.clone(),
                }
            }
            _ => reward.clone(),
        }
    }

    fn sink_for(&self, reward_type: RewardType) -> Option<&Arc<dyn RewardSink>> {
        if reward_type.is_core() {
            Some(&self.sink)
        } else {
            self.extensions.get(&reward_type)
        }
    }

    async fn call_sink(
        &self,
        sink: &Arc<dyn RewardSink>,
        player_id: &str,
        reward: &QuestReward,
    ) -> Result<(), SinkError> {
        let timeout = self.config.sink_timeout();
        match tokio::time::timeout(timeout, sink.apply(player_id, reward)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn apply_one(&self, player_id: &str, reward: &QuestReward) -> ApplyOutcome {
        if let Err(reason) = self.conditions_met(reward, self.clock.now()) {
            debug!(player_id, reward = %reward.describe(), "{}", reason);
            return ApplyOutcome::Skipped(reason);
        }
        self.deliver(player_id, reward).await
    }

    /// Send a reward whose conditions already passed to its sink
    async fn deliver(&self, player_id: &str, reward: &QuestReward) -> ApplyOutcome {
        let reward_type = reward.reward_type();
        let Some(sink) = self.sink_for(reward_type) else {
            warn!(player_id, "No handler configured for {} rewards", reward_type.as_str());
            return ApplyOutcome::Failed {
                reason: format!("No handler configured for {} rewards", reward_type.as_str()),
                can_retry: false,
            };
        };

        let applied = self.cap(player_id, reward);
        match self.call_sink(sink, player_id, &applied).await {
            Ok(()) => ApplyOutcome::Applied(applied),
            Err(e) => {
                warn!(player_id, reward = %applied.describe(), "Reward failed: {}", e);
                ApplyOutcome::Failed {
                    reason: e.to_string(),
                    can_retry: e.is_retryable(),
                }
            }
        }
    }

    /// Re-apply the retryable failures of an earlier distribution.
    ///
    /// Each reward is attempted up to `max_retry_attempts` times with
    /// exponential backoff between attempts. Rewards that succeed are
    /// removed from the failure history; the rest stay there under the
    /// original request id. Returns `None` if there is nothing recorded
    /// for `request_id`.
    pub async fn retry_failed(
        &self,
        player_id: &str,
        request_id: Uuid,
    ) -> Option<RewardDistributionResult> {
        let mut record = self.history.take_failure(player_id, request_id)?;
        let started = Instant::now();

        let (retryable, permanent): (Vec<_>, Vec<_>) =
            record.failures.drain(..).partition(|f| f.can_retry);
        record.failures = permanent;
        record.retry_rounds += 1;

        let mut result = RewardDistributionResult::new(player_id, retryable.len());
        info!(
            player_id,
            %request_id,
            retry_request_id = %result.request_id,
            count = retryable.len(),
            "Retrying failed rewards"
        );

        for failed in retryable {
            match self.apply_with_backoff(player_id, &failed.reward).await {
                ApplyOutcome::Applied(applied) => result.record_success(applied, self.clock.now()),
                ApplyOutcome::Skipped(reason) => {
                    result.record_failure(failed.reward.clone(), reason.clone(), false);
                    record.failures.push(FailedReward {
                        reward: failed.reward,
                        reason,
                        can_retry: false,
                    });
                }
                ApplyOutcome::Failed { reason, can_retry } => {
                    result.record_failure(failed.reward.clone(), reason.clone(), can_retry);
                    record.failures.push(FailedReward {
                        reward: failed.reward,
                        reason,
                        can_retry,
                    });
                }
            }
        }

        result.distribution_time_ms = started.elapsed().as_millis() as u64;
        self.history.record_distribution(&result);
        self.history.store_failure(record);
        Some(result)
    }

    async fn apply_with_backoff(&self, player_id: &str, reward: &QuestReward) -> ApplyOutcome {
        let attempts = self.config.max_retry_attempts.max(1);
        let mut outcome = ApplyOutcome::Failed {
            reason: "not attempted".to_string(),
            can_retry: true,
        };

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.config.retry_base_delay(), attempt - 1);
                debug!(player_id, attempt, ?delay, "Backing off before reward retry");
                tokio::time::sleep(delay).await;
            }
            // Conditions were settled when the reward first reached the sink
            outcome = self.deliver(player_id, reward).await;
            match outcome {
                ApplyOutcome::Failed { can_retry: true, .. } => continue,
                _ => break,
            }
        }
        outcome
    }

    pub fn distribution_history(&self, player_id: &str) -> Vec<RewardDistributionResult> {
        self.history.distributions(player_id)
    }

    pub fn failure_history(&self, player_id: &str) -> Vec<FailureRecord> {
        self.history.failures(player_id)
    }
}

/// `base * 2^attempt`, saturating
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ports::MockRewardSink;
    use crate::quest::RewardConditions;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn config() -> RewardConfig {
        RewardConfig {
            retry_base_delay_ms: 1,
            ..RewardConfig::default()
        }
    }

    fn distributor(config: RewardConfig, sink: impl RewardSink + 'static) -> RewardDistributor {
        RewardDistributor::new(config, Arc::new(sink), Arc::new(FixedClock::epoch()))
    }

    /// Records what was applied
    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<QuestReward>>,
    }

    #[async_trait::async_trait]
    impl RewardSink for RecordingSink {
        async fn apply(&self, _player_id: &str, reward: &QuestReward) -> Result<(), SinkError> {
            self.applied.lock().unwrap().push(reward.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_gold_is_capped() {
        let sink = Arc::new(RecordingSink::default());
        let distributor =
            RewardDistributor::new(config(), sink.clone(), Arc::new(FixedClock::epoch()));

        let result = distributor
            .distribute_rewards("ash", &[QuestReward::gold(2_000_000)])
            .await;

        assert_eq!(result.distributed_rewards.len(), 1);
        assert_eq!(result.distributed_rewards[0].reward, QuestReward::gold(1_000_000));
        assert_eq!(result.total_value, 1_000_000);
        assert_eq!(sink.applied.lock().unwrap()[0], QuestReward::gold(1_000_000));
    }

    #[tokio::test]
    async fn test_counts_always_add_up() {
        let mut sink = MockRewardSink::new();
        sink.expect_apply().returning(|_, reward| match reward.kind {
            RewardKind::Item { .. } => Err(SinkError::Rejected("inventory full".into())),
            _ => Ok(()),
        });
        let distributor = distributor(config(), sink);

        let rewards = vec![
            QuestReward::gold(100),
            QuestReward::item("potion", 2),
            QuestReward::gold(0),
            RewardKind::Badge {
                badge_id: "boulder".into(),
            }
            .into(),
            QuestReward::experience(50),
        ];
        let result = distributor.distribute_rewards("ash", &rewards).await;

        assert_eq!(result.total_rewards, 5);
        assert_eq!(
            result.distributed_rewards.len() + result.failed_rewards.len(),
            result.total_rewards
        );
        assert_eq!(result.distributed_rewards.len(), 2);

        let item = result
            .failed_rewards
            .iter()
            .find(|f| f.reward.reward_type() == RewardType::Item)
            .unwrap();
        assert!(!item.can_retry);

        let badge = result
            .failed_rewards
            .iter()
            .find(|f| f.reward.reward_type() == RewardType::Badge)
            .unwrap();
        assert!(badge.reason.contains("No handler"));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_whole_bundle() {
        let mut sink = MockRewardSink::new();
        sink.expect_apply().never();
        let distributor = distributor(
            RewardConfig {
                strict_validation: true,
                ..config()
            },
            sink,
        );

        let result = distributor
            .distribute_rewards("ash", &[QuestReward::gold(100), QuestReward::item("", 1)])
            .await;

        assert!(result.distributed_rewards.is_empty());
        assert_eq!(result.failed_rewards.len(), 2);
    }

    #[tokio::test]
    async fn test_strict_mode_stops_at_first_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut sink = MockRewardSink::new();
        sink.expect_apply().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                Err(SinkError::Unavailable("economy down".into()))
            } else {
                Ok(())
            }
        });
        let distributor = distributor(
            RewardConfig {
                strict_validation: true,
                ..config()
            },
            sink,
        );

        let rewards = vec![
            QuestReward::gold(1),
            QuestReward::gold(2),
            QuestReward::gold(3),
        ];
        let result = distributor.distribute_rewards("ash", &rewards).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.distributed_rewards.len(), 1);
        assert_eq!(result.failed_rewards.len(), 2);
        assert!(result.failed_rewards.iter().all(|f| f.can_retry));
    }

    #[tokio::test]
    async fn test_extension_handles_badges() {
        let mut core = MockRewardSink::new();
        core.expect_apply().never();
        let mut badges = MockRewardSink::new();
        badges.expect_apply().times(1).returning(|_, _| Ok(()));

        let distributor = distributor(config(), core)
            .with_extension(RewardType::Badge, Arc::new(badges));
        let result = distributor
            .distribute_rewards(
                "ash",
                &[RewardKind::Badge {
                    badge_id: "boulder".into(),
                }
                .into()],
            )
            .await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_conditions_are_failures_not_errors() {
        let mut sink = MockRewardSink::new();
        sink.expect_apply().times(1).returning(|_, _| Ok(()));
        let distributor = distributor(config(), sink).with_roll(Arc::new(|| 0.5));

        let mut lucky = QuestReward::gold(10);
        lucky.conditions = Some(RewardConditions {
            chance: Some(0.9),
            expires_at: None,
        });
        let mut unlucky = QuestReward::gold(20);
        unlucky.conditions = Some(RewardConditions {
            chance: Some(0.1),
            expires_at: None,
        });
        let mut expired = QuestReward::gold(30);
        expired.conditions = Some(RewardConditions {
            chance: None,
            expires_at: Some(FixedClock::epoch().now() - chrono::Duration::days(1)),
        });

        let result = distributor
            .distribute_rewards("ash", &[lucky, unlucky, expired])
            .await;
        assert_eq!(result.distributed_rewards.len(), 1);
        assert_eq!(result.failed_rewards.len(), 2);
        assert!(result.failed_rewards.iter().all(|f| !f.can_retry));
    }

    #[tokio::test]
    async fn test_sink_timeout_is_retryable_failure() {
        struct SlowSink;

        #[async_trait::async_trait]
        impl RewardSink for SlowSink {
            async fn apply(&self, _: &str, _: &QuestReward) -> Result<(), SinkError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
        }

        let distributor = distributor(
            RewardConfig {
                sink_timeout_ms: 10,
                ..config()
            },
            SlowSink,
        );
        let result = distributor
            .distribute_rewards("ash", &[QuestReward::gold(5)])
            .await;
        assert_eq!(result.failed_rewards.len(), 1);
        assert!(result.failed_rewards[0].can_retry);
        assert!(result.failed_rewards[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_retry_failed_with_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut sink = MockRewardSink::new();
        // Initial attempt and first retry fail, second retry succeeds
        sink.expect_apply().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SinkError::Unavailable("economy down".into()))
            } else {
                Ok(())
            }
        });
        let distributor = distributor(config(), sink);

        let first = distributor
            .distribute_rewards("ash", &[QuestReward::gold(5)])
            .await;
        assert_eq!(first.failed_rewards.len(), 1);
        assert_eq!(distributor.failure_history("ash").len(), 1);

        let retry = distributor
            .retry_failed("ash", first.request_id)
            .await
            .unwrap();
        assert_eq!(retry.distributed_rewards.len(), 1);
        assert_eq!(retry.total_rewards, 1);
        assert_ne!(retry.request_id, first.request_id);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert!(distributor.failure_history("ash").is_empty());
        assert_eq!(distributor.distribution_history("ash").len(), 2);
        assert!(distributor.retry_failed("ash", first.request_id).await.is_none());
    }

    #[tokio::test]
    async fn test_retry_does_not_reroll_chance() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut sink = MockRewardSink::new();
        sink.expect_apply().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SinkError::Unavailable("economy down".into()))
            } else {
                Ok(())
            }
        });

        // Wins the first roll, every later roll would miss
        let rolls = Arc::new(AtomicU32::new(0));
        let roll_counter = rolls.clone();
        let distributor = distributor(config(), sink).with_roll(Arc::new(move || {
            if roll_counter.fetch_add(1, Ordering::SeqCst) == 0 {
                0.05
            } else {
                0.95
            }
        }));

        let mut candy = QuestReward::item("rare_candy", 1);
        candy.conditions = Some(RewardConditions {
            chance: Some(0.1),
            expires_at: None,
        });

        let first = distributor.distribute_rewards("ash", &[candy]).await;
        assert!(first.failed_rewards[0].can_retry);

        let retry = distributor
            .retry_failed("ash", first.request_id)
            .await
            .unwrap();
        assert_eq!(retry.distributed_rewards.len(), 1);
        assert_eq!(rolls.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_keeps_permanent_failures() {
        let mut sink = MockRewardSink::new();
        sink.expect_apply()
            .returning(|_, _| Err(SinkError::Rejected("unknown item".into())));
        let distributor = distributor(config(), sink);

        let first = distributor
            .distribute_rewards("ash", &[QuestReward::item("missingno", 1)])
            .await;
        let retry = distributor
            .retry_failed("ash", first.request_id)
            .await
            .unwrap();

        assert_eq!(retry.total_rewards, 0);
        let history = distributor.failure_history("ash");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].retry_rounds, 1);
        assert!(!history[0].has_retryable());
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(200);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(1_600));
    }
}
