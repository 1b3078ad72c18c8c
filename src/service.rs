//! Quest Service
//!
//! The command surface of the engine: accept, progress, turn in, abandon
//! and fail quests. Composes the registry, validator, progress tracker,
//! reward distributor and notifier over one shared record writer.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::QuestError;
use crate::notify::{ClientNotifier, templates};
use crate::ports::{NotificationTransport, PlayerQuestRepository, RewardSink};
use crate::progress::{ProgressTracker, QuestUpdateResult};
use crate::quest::{
    PlayerQuestRecord, QuestDefinition, QuestProgressEvent, QuestRegistry, QuestStatus,
};
use crate::rewards::{RewardDistributionResult, RewardDistributor};
use crate::store::{Mutation, RecordWriter};
use crate::validation::{
    CheckKind, CheckRecord, PlayerProfile, PlayerSnapshot, ValidationResult, Validator,
};

pub struct QuestService {
    registry: Arc<QuestRegistry>,
    writer: Arc<RecordWriter>,
    validator: Validator,
    tracker: ProgressTracker,
    distributor: Arc<RewardDistributor>,
    notifier: Arc<ClientNotifier>,
    clock: Arc<dyn Clock>,
}

impl QuestService {
    pub fn new(
        config: &EngineConfig,
        registry: Arc<QuestRegistry>,
        repository: Arc<dyn PlayerQuestRepository>,
        sink: Arc<dyn RewardSink>,
        transport: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let distributor = Arc::new(RewardDistributor::new(
            config.rewards.clone(),
            sink,
            clock.clone(),
        ));
        let notifier = Arc::new(ClientNotifier::new(
            config.notifier.clone(),
            transport,
            clock.clone(),
        ));
        Self::from_parts(config, registry, repository, distributor, notifier, clock)
    }

    /// Build around an already configured distributor and notifier
    pub fn from_parts(
        config: &EngineConfig,
        registry: Arc<QuestRegistry>,
        repository: Arc<dyn PlayerQuestRepository>,
        distributor: Arc<RewardDistributor>,
        notifier: Arc<ClientNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let writer = Arc::new(RecordWriter::new(
            repository,
            config.engine.max_save_retries,
        ));
        let tracker = ProgressTracker::new(
            registry.clone(),
            writer.clone(),
            distributor.clone(),
            notifier.clone(),
            clock.clone(),
        );
        Self {
            validator: Validator::new(config.validator.clone(), clock.clone()),
            registry,
            writer,
            tracker,
            distributor,
            notifier,
            clock,
        }
    }

    pub fn registry(&self) -> &Arc<QuestRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<ClientNotifier> {
        &self.notifier
    }

    pub fn distributor(&self) -> &Arc<RewardDistributor> {
        &self.distributor
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub async fn load_record(&self, player_id: &str) -> Result<PlayerQuestRecord, QuestError> {
        self.writer.load(player_id).await
    }

    /// Validate and, if allowed, start a quest at its first step.
    ///
    /// A refusal is not an error: the returned result has `valid == false`
    /// and the player is told why.
    pub async fn accept_quest(
        &self,
        player_id: &str,
        quest_id: &str,
        profile: PlayerProfile,
    ) -> Result<ValidationResult, QuestError> {
        let definition = self.definition(quest_id)?;
        let loaded = self.writer.load(player_id).await;
        let record = self.checked(player_id, "accept", loaded).await?;

        let snapshot = PlayerSnapshot::new(profile, record);
        let mut result = self.validator.can_take_quest(&definition, &snapshot).await;

        if !result.valid {
            info!(
                player_id,
                quest_id,
                failed = ?result.reasons(),
                "Quest not available"
            );
            self.notifier
                .notify(
                    player_id,
                    templates::quest_unavailable(
                        player_id,
                        &definition,
                        &result.reasons(),
                        &result.recommendations,
                    ),
                )
                .await;
            return Ok(result);
        }

        let now = self.clock.now();
        let started = self
            .writer
            .update(player_id, |record| {
                // Another command may have started it since validation
                if record.is_quest_active(&definition.id) {
                    return Ok(Mutation::Unchanged(false));
                }
                record.start_quest(&definition, now);
                Ok(Mutation::Changed(true))
            })
            .await;
        let started = self.checked(player_id, "accept", started).await?;

        if !started {
            warn!(player_id, quest_id, "Quest was started concurrently");
            result = ValidationResult::from_checks(
                &definition.id,
                vec![CheckRecord::failed(
                    CheckKind::AlreadyActive,
                    "Quest is already in progress",
                )],
            );
            return Ok(result);
        }

        self.validator.invalidate_player(player_id);
        info!(player_id, quest_id, "Quest accepted");
        self.notifier
            .notify(player_id, templates::quest_started(player_id, &definition))
            .await;
        Ok(result)
    }

    /// Apply a gameplay event to the player's active quests
    pub async fn progress(
        &self,
        player_id: &str,
        event: &QuestProgressEvent,
    ) -> Result<Vec<QuestUpdateResult>, QuestError> {
        let results = self.tracker.update_progress(player_id, event).await?;
        if results.iter().any(|r| r.quest_completed) {
            self.validator.invalidate_player(player_id);
        }
        Ok(results)
    }

    /// Complete a quest that is waiting for turn-in and hand out its
    /// quest-level rewards
    pub async fn turn_in_quest(
        &self,
        player_id: &str,
        quest_id: &str,
    ) -> Result<RewardDistributionResult, QuestError> {
        let definition = self.definition(quest_id)?;
        let now = self.clock.now();

        let updated = self
            .writer
            .update(player_id, |record| {
                match record.get_quest(&definition.id).map(|p| p.status) {
                    None => Err(QuestError::NotActive {
                        player_id: player_id.to_string(),
                        quest_id: definition.id.clone(),
                    }),
                    Some(QuestStatus::ReadyToComplete) => {
                        record.complete_quest(&definition, now);
                        Ok(Mutation::Changed(()))
                    }
                    Some(_) => Err(QuestError::NotReadyToComplete {
                        player_id: player_id.to_string(),
                        quest_id: definition.id.clone(),
                    }),
                }
            })
            .await;
        self.checked(player_id, "turn_in", updated).await?;

        self.validator.invalidate_player(player_id);
        info!(player_id, quest_id, "Quest turned in");

        let rewards = self
            .distributor
            .distribute_rewards(player_id, &definition.rewards)
            .await;

        let message = templates::with_rewards(
            templates::quest_completed(player_id, &definition.id, &definition.name),
            [&rewards],
        );
        self.notifier.notify(player_id, message).await;
        Ok(rewards)
    }

    pub async fn abandon_quest(&self, player_id: &str, quest_id: &str) -> Result<(), QuestError> {
        let definition = self.definition(quest_id)?;
        let now = self.clock.now();

        let duration = self
            .writer
            .update(player_id, |record| {
                let mut progress = record.remove_active(&definition.id).ok_or_else(|| {
                    QuestError::NotActive {
                        player_id: player_id.to_string(),
                        quest_id: definition.id.clone(),
                    }
                })?;
                progress.abandon(now);
                Ok(Mutation::Changed(progress.duration_secs(now)))
            })
            .await;
        let duration = self.checked(player_id, "abandon", duration).await?;

        self.validator.invalidate_player(player_id);
        info!(player_id, quest_id, "Quest abandoned after {}s", duration);
        self.notifier
            .notify(player_id, templates::quest_abandoned(player_id, &definition))
            .await;
        Ok(())
    }

    pub async fn fail_quest(
        &self,
        player_id: &str,
        quest_id: &str,
        reason: &str,
    ) -> Result<(), QuestError> {
        let definition = self.definition(quest_id)?;
        let now = self.clock.now();

        let updated = self
            .writer
            .update(player_id, |record| {
                let mut progress = record.remove_active(&definition.id).ok_or_else(|| {
                    QuestError::NotActive {
                        player_id: player_id.to_string(),
                        quest_id: definition.id.clone(),
                    }
                })?;
                progress.fail(now);
                Ok(Mutation::Changed(()))
            })
            .await;
        self.checked(player_id, "fail", updated).await?;

        self.validator.invalidate_player(player_id);
        info!(player_id, quest_id, reason, "Quest failed");
        self.notifier
            .notify(
                player_id,
                templates::quest_failed(player_id, &definition, reason),
            )
            .await;
        Ok(())
    }

    /// Ids of every quest the player could accept right now
    pub async fn available_quests(
        &self,
        profile: PlayerProfile,
        record: PlayerQuestRecord,
    ) -> Vec<String> {
        let snapshot = PlayerSnapshot::new(profile, record);
        let definitions = self.registry.all();
        let parallel = self.validator.max_parallel() > 1;

        self.validator
            .validate_many(&definitions, &snapshot, parallel)
            .await
            .into_iter()
            .filter(|result| result.valid)
            .map(|result| result.quest_id)
            .collect()
    }

    /// Retry the failed rewards of an earlier distribution for `quest_id`
    pub async fn retry_rewards(
        &self,
        player_id: &str,
        quest_id: &str,
        request_id: Uuid,
    ) -> Option<RewardDistributionResult> {
        let result = self.distributor.retry_failed(player_id, request_id).await?;

        let messages = templates::rewards_received(player_id, quest_id, &result)
            .into_iter()
            .chain(templates::reward_failed(player_id, quest_id, &result));
        for message in messages {
            self.notifier.notify(player_id, message).await;
        }
        Some(result)
    }

    /// Drop expired cache, rate-limit and lock entries
    pub fn maintenance(&self) {
        self.validator.cleanup_cache();
        self.notifier.cleanup();
        self.writer.prune_locks();
    }

    fn definition(&self, quest_id: &str) -> Result<Arc<QuestDefinition>, QuestError> {
        self.registry
            .get(quest_id)
            .ok_or_else(|| QuestError::UnknownQuest(quest_id.to_string()))
    }

    /// Log a failed operation; system failures also reach the player
    async fn checked<T>(
        &self,
        player_id: &str,
        operation: &str,
        result: Result<T, QuestError>,
    ) -> Result<T, QuestError> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        match &error {
            QuestError::Storage(_) | QuestError::ConflictRetriesExhausted { .. } => {
                error!(player_id, operation, "Quest operation failed: {}", error);
                self.notifier
                    .notify(
                        player_id,
                        templates::system_message(
                            player_id,
                            "Your quest log could not be updated. Please try again.",
                        ),
                    )
                    .await;
            }
            _ => warn!(player_id, operation, "Quest operation rejected: {}", error),
        }
        Err(error)
    }
}
