//! Progress Tracker
//!
//! Matches gameplay events against a player's active quest objectives,
//! advances steps and completes quests. State changes are saved first;
//! rewards and notifications follow once the save is committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::QuestUpdateResult;
use super::matcher::matches_objective;
use crate::clock::Clock;
use crate::error::QuestError;
use crate::notify::{ClientNotifier, templates};
use crate::quest::{
    PlayerQuestRecord, QuestDefinition, QuestProgressEvent, QuestRegistry, QuestReward,
    QuestStatus,
};
use crate::rewards::RewardDistributor;
use crate::store::{Mutation, RecordWriter};

/// An update plus the rewards owed once it is saved
struct PendingUpdate {
    result: QuestUpdateResult,
    step_rewards: Vec<QuestReward>,
    quest_rewards: Vec<QuestReward>,
    giver_npc: Option<String>,
}

pub struct ProgressTracker {
    registry: Arc<QuestRegistry>,
    writer: Arc<RecordWriter>,
    distributor: Arc<RewardDistributor>,
    notifier: Arc<ClientNotifier>,
    clock: Arc<dyn Clock>,
}

impl ProgressTracker {
    pub fn new(
        registry: Arc<QuestRegistry>,
        writer: Arc<RecordWriter>,
        distributor: Arc<RewardDistributor>,
        notifier: Arc<ClientNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            writer,
            distributor,
            notifier,
            clock,
        }
    }

    /// Apply one gameplay event to all of the player's active quests.
    ///
    /// At most one objective per quest advances. All changes are written in
    /// a single save; quests the event did not touch produce no result.
    pub async fn update_progress(
        &self,
        player_id: &str,
        event: &QuestProgressEvent,
    ) -> Result<Vec<QuestUpdateResult>, QuestError> {
        let now = self.clock.now();

        let pending = self
            .writer
            .update(player_id, |record| {
                let updates = self.apply_event(record, event, now);
                if updates.is_empty() {
                    Ok(Mutation::Unchanged(updates))
                } else {
                    Ok(Mutation::Changed(updates))
                }
            })
            .await;

        let pending = match pending {
            Ok(pending) => pending,
            Err(e) => {
                error!(
                    player_id,
                    event = event.event_type(),
                    "Failed to update quest progress: {}",
                    e
                );
                self.notifier
                    .notify(
                        player_id,
                        templates::system_message(
                            player_id,
                            "Quest progress could not be saved. Please try again.",
                        ),
                    )
                    .await;
                return Err(e);
            }
        };

        if pending.is_empty() {
            debug!(player_id, event = event.event_type(), "Event matched no objectives");
        }

        let mut results = Vec::with_capacity(pending.len());
        for update in pending {
            let result = self.settle(player_id, update).await;
            results.push(result);
        }
        Ok(results)
    }

    /// Distribute what the committed update earned and tell the player
    async fn settle(&self, player_id: &str, update: PendingUpdate) -> QuestUpdateResult {
        let PendingUpdate {
            mut result,
            step_rewards,
            quest_rewards,
            giver_npc,
        } = update;

        if !step_rewards.is_empty() {
            result.step_rewards = Some(
                self.distributor
                    .distribute_rewards(player_id, &step_rewards)
                    .await,
            );
        }
        if !quest_rewards.is_empty() {
            result.quest_rewards = Some(
                self.distributor
                    .distribute_rewards(player_id, &quest_rewards)
                    .await,
            );
        }

        self.notifier
            .notify(
                player_id,
                templates::from_update(player_id, &result, giver_npc.as_deref()),
            )
            .await;
        result
    }

    /// Mutate the record for one event. Pure with respect to everything but
    /// `record`, so it can be re-run after a version conflict.
    fn apply_event(
        &self,
        record: &mut PlayerQuestRecord,
        event: &QuestProgressEvent,
        now: DateTime<Utc>,
    ) -> Vec<PendingUpdate> {
        let mut updates = Vec::new();
        let mut finished = Vec::new();

        // Nothing to credit
        if event.action.amount() == 0 {
            return updates;
        }

        for progress in record.active_quests.iter_mut() {
            if progress.status != QuestStatus::Active {
                continue;
            }
            let Some(definition) = self.registry.get(&progress.quest_id) else {
                warn!(
                    player_id = %record.player_id,
                    quest_id = %progress.quest_id,
                    "Active quest has no definition"
                );
                continue;
            };
            let Some(step) = definition.step(progress.current_step_index) else {
                warn!(
                    quest_id = %progress.quest_id,
                    step = progress.current_step_index,
                    "Active quest points past its last step"
                );
                continue;
            };

            // First matching incomplete objective wins
            let matched = step.objectives.iter().find(|objective| {
                progress
                    .objective(&objective.id)
                    .is_some_and(|p| !p.completed)
                    && matches_objective(objective, event)
            });
            let Some(objective) = matched else {
                continue;
            };
            let Some(objective_progress) = progress.objectives.get_mut(&objective.id) else {
                continue;
            };

            let objective_completed = objective_progress.add_progress(event.action.amount());
            let current_amount = objective_progress.current_amount;
            let required_amount = objective_progress.required_amount;

            debug!(
                player_id = %record.player_id,
                quest_id = %definition.id,
                objective_id = %objective.id,
                "Objective progress {}/{}",
                current_amount,
                required_amount
            );

            let mut pending = PendingUpdate {
                result: QuestUpdateResult {
                    quest_id: definition.id.clone(),
                    quest_name: definition.name.clone(),
                    objective_id: objective.id.clone(),
                    objective_description: objective.description.clone(),
                    current_amount,
                    required_amount,
                    objective_completed,
                    step_completed: false,
                    completed_step_id: None,
                    current_step_index: progress.current_step_index,
                    total_steps: definition.step_count(),
                    new_objectives: Vec::new(),
                    quest_completed: false,
                    auto_completed: false,
                    requires_npc_return: false,
                    step_rewards: None,
                    quest_rewards: None,
                },
                step_rewards: Vec::new(),
                quest_rewards: Vec::new(),
                giver_npc: definition.giver_npc.clone(),
            };

            if progress.is_step_complete(step) {
                pending.result.step_completed = true;
                pending.result.completed_step_id = Some(step.id.clone());
                pending.step_rewards = step.rewards.clone();
                progress.current_step_index += 1;
                pending.result.current_step_index = progress.current_step_index;

                match definition.step(progress.current_step_index) {
                    Some(next) => {
                        progress.init_step(next);
                        pending.result.new_objectives = progress.step_objectives(next);
                        info!(
                            player_id = %record.player_id,
                            quest_id = %definition.id,
                            "Advanced to step {}/{}",
                            progress.current_step_index + 1,
                            definition.step_count()
                        );
                    }
                    None if definition.auto_complete => {
                        pending.result.quest_completed = true;
                        pending.result.auto_completed = true;
                        pending.quest_rewards = definition.rewards.clone();
                        finished.push(definition.clone());
                    }
                    None => {
                        progress.mark_ready();
                        pending.result.requires_npc_return = true;
                        info!(
                            player_id = %record.player_id,
                            quest_id = %definition.id,
                            "Quest ready to turn in"
                        );
                    }
                }
            }

            updates.push(pending);
        }

        for definition in finished {
            complete(record, &definition, now);
        }

        updates
    }
}

fn complete(record: &mut PlayerQuestRecord, definition: &QuestDefinition, now: DateTime<Utc>) {
    if record.complete_quest(definition, now).is_some() {
        info!(
            player_id = %record.player_id,
            quest_id = %definition.id,
            "Quest auto-completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::{NotifierConfig, RewardConfig};
    use crate::error::{RepoError, SinkError, TransportError};
    use crate::notify::ChannelType;
    use crate::ports::{
        MockPlayerQuestRepository, NotificationTransport, PlayerQuestRepository, RewardSink,
    };
    use crate::quest::{ProgressAction, QuestDefinition};
    use crate::store::InMemoryQuestRepository;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Mutex;

    const CATCH_FIRST: &str = r#"
[quest]
id = "catch_first_pokemon"
name = "Catch Your First Pokemon"
auto_complete = true

[[quest.steps]]
[[quest.steps.objectives]]
id = "catch_any"
type = "catch"
target = "any"
required_amount = 1

[[quest.rewards]]
type = "item"
item_id = "poke_ball"
amount = 5
"#;

    const BERRIES: &str = r#"
[quest]
id = "berry_picking"
name = "Berry Picking"
giver_npc = "farmer_joe"

[[quest.steps]]
id = "gather"
[[quest.steps.objectives]]
id = "oran"
type = "collect"
target = "oran_berry"
required_amount = 5

[[quest.steps.objectives]]
id = "pecha"
type = "collect"
target = "pecha_berry"
required_amount = 2

[[quest.steps.rewards]]
type = "experience"
amount = 50

[[quest.steps]]
id = "return"
[[quest.steps.objectives]]
id = "talk_joe"
type = "talk"
target = "farmer_joe"

[[quest.rewards]]
type = "gold"
amount = 300
"#;

    /// Two objectives on the same target in one step
    const DOUBLE: &str = r#"
[quest]
id = "double"
name = "Double"

[[quest.steps]]
[[quest.steps.objectives]]
id = "first"
type = "collect"
target = "potion"
required_amount = 1

[[quest.steps.objectives]]
id = "second"
type = "collect"
target = "potion"
required_amount = 1
"#;

    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<QuestReward>>,
    }

    #[async_trait::async_trait]
    impl RewardSink for RecordingSink {
        async fn apply(&self, _: &str, reward: &QuestReward) -> Result<(), SinkError> {
            self.applied.lock().unwrap().push(reward.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait::async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn send(
            &self,
            _: &str,
            _: ChannelType,
            payload: &serde_json::Value,
        ) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    struct Harness {
        tracker: ProgressTracker,
        repo: Arc<InMemoryQuestRepository>,
        sink: Arc<RecordingSink>,
        transport: Arc<RecordingTransport>,
        registry: Arc<QuestRegistry>,
        clock: Arc<FixedClock>,
    }

    impl Harness {
        fn new(quests: &[&str]) -> Self {
            let repo = Arc::new(InMemoryQuestRepository::new());
            Self::with_repo(quests, repo.clone(), repo)
        }

        fn with_repo(
            quests: &[&str],
            repo: Arc<InMemoryQuestRepository>,
            storage: Arc<dyn PlayerQuestRepository>,
        ) -> Self {
            let registry = Arc::new(QuestRegistry::from_definitions(
                quests
                    .iter()
                    .map(|q| QuestDefinition::from_toml_str(q).unwrap()),
            ));
            let clock = Arc::new(FixedClock::epoch());
            let sink = Arc::new(RecordingSink::default());
            let transport = Arc::new(RecordingTransport::default());
            let distributor = Arc::new(RewardDistributor::new(
                RewardConfig::default(),
                sink.clone(),
                clock.clone(),
            ));
            let notifier = Arc::new(ClientNotifier::new(
                NotifierConfig::default(),
                transport.clone(),
                clock.clone(),
            ));
            let tracker = ProgressTracker::new(
                registry.clone(),
                Arc::new(RecordWriter::new(storage, 3)),
                distributor,
                notifier,
                clock.clone(),
            );
            Self {
                tracker,
                repo,
                sink,
                transport,
                registry,
                clock,
            }
        }

        async fn start(&self, player_id: &str, quest_id: &str) {
            let mut record = self.repo.load(player_id).await.unwrap();
            let definition = self.registry.get(quest_id).unwrap();
            record.start_quest(&definition, self.clock.now());
            self.repo.save(&record).await.unwrap();
        }

        fn record(&self, player_id: &str) -> PlayerQuestRecord {
            self.repo.get(player_id).unwrap()
        }

        fn applied(&self) -> Vec<QuestReward> {
            self.sink.applied.lock().unwrap().clone()
        }

        fn sent_types(&self) -> Vec<String> {
            self.transport
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|p| p["type"].as_str().unwrap().to_string())
                .collect()
        }
    }

    fn collect(item_id: &str, amount: u32) -> QuestProgressEvent {
        QuestProgressEvent::new(ProgressAction::Collect {
            item_id: item_id.into(),
            amount,
        })
    }

    #[tokio::test]
    async fn test_catch_first_pokemon_auto_completes() {
        let h = Harness::new(&[CATCH_FIRST]);
        h.start("ash", "catch_first_pokemon").await;

        let event = QuestProgressEvent::new(ProgressAction::Catch {
            pokemon_id: "25".into(),
        });
        let results = h.tracker.update_progress("ash", &event).await.unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.quest_completed);
        assert!(result.auto_completed);
        assert!(!result.requires_npc_return);

        let record = h.record("ash");
        assert!(record.active_quests.is_empty());
        assert!(record.is_quest_completed("catch_first_pokemon"));

        assert_eq!(h.applied(), vec![QuestReward::item("poke_ball", 5)]);
        assert!(result.quest_rewards.as_ref().unwrap().is_success());
        assert_eq!(h.sent_types(), vec!["quest_completed"]);
        let payload = h.transport.sent.lock().unwrap()[0].clone();
        assert_eq!(payload["data"]["rewards"][0], "5x poke_ball");
    }

    #[tokio::test]
    async fn test_step_advance_and_turn_in_pending() {
        let h = Harness::new(&[BERRIES]);
        h.start("ash", "berry_picking").await;

        let results = h
            .tracker
            .update_progress("ash", &collect("oran_berry", 3))
            .await
            .unwrap();
        assert_eq!(results[0].current_amount, 3);
        assert!(!results[0].step_completed);

        // Overshoot is clamped
        let results = h
            .tracker
            .update_progress("ash", &collect("oran_berry", 10))
            .await
            .unwrap();
        assert_eq!(results[0].current_amount, 5);
        assert!(results[0].objective_completed);
        assert!(!results[0].step_completed);
        assert_eq!(h.record("ash").active_quests[0].current_step_index, 0);

        let results = h
            .tracker
            .update_progress("ash", &collect("pecha_berry", 2))
            .await
            .unwrap();
        let result = &results[0];
        assert!(result.step_completed);
        assert_eq!(result.completed_step_id.as_deref(), Some("gather"));
        assert_eq!(result.current_step_index, 1);
        assert_eq!(result.new_objectives.len(), 1);
        assert_eq!(result.new_objectives[0].objective_id, "talk_joe");
        assert_eq!(h.applied(), vec![QuestReward::experience(50)]);

        let talk = QuestProgressEvent::new(ProgressAction::Talk {
            npc_id: "farmer_joe".into(),
        });
        let results = h.tracker.update_progress("ash", &talk).await.unwrap();
        let result = &results[0];
        assert!(result.requires_npc_return);
        assert!(!result.quest_completed);
        assert!(result.quest_rewards.is_none());

        // Quest-level gold is held back until turn-in
        assert_eq!(h.applied(), vec![QuestReward::experience(50)]);
        let record = h.record("ash");
        assert_eq!(record.active_quests[0].status, QuestStatus::ReadyToComplete);
        assert!(!record.is_quest_completed("berry_picking"));
        assert!(h.sent_types().contains(&"quest_ready_to_complete".to_string()));

        // Further events do nothing to a quest waiting for turn-in
        let results = h.tracker.update_progress("ash", &talk).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_one_event_credits_first_matching_objective() {
        let h = Harness::new(&[DOUBLE]);
        h.start("ash", "double").await;

        let results = h
            .tracker
            .update_progress("ash", &collect("potion", 1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].objective_id, "first");

        let record = h.record("ash");
        let progress = record.get_quest("double").unwrap();
        assert!(progress.objective("first").unwrap().completed);
        assert!(!progress.objective("second").unwrap().completed);

        let results = h
            .tracker
            .update_progress("ash", &collect("potion", 1))
            .await
            .unwrap();
        assert_eq!(results[0].objective_id, "second");
    }

    #[tokio::test]
    async fn test_unmatched_event_writes_nothing() {
        let h = Harness::new(&[BERRIES]);
        h.start("ash", "berry_picking").await;
        let version = h.record("ash").version;

        let results = h
            .tracker
            .update_progress("ash", &collect("rare_candy", 1))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(h.record("ash").version, version);
        assert!(h.sent_types().is_empty());
    }

    #[tokio::test]
    async fn test_zero_amount_event_is_ignored() {
        let h = Harness::new(&[BERRIES]);
        h.start("ash", "berry_picking").await;
        let version = h.record("ash").version;

        let results = h
            .tracker
            .update_progress("ash", &collect("oran_berry", 0))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(h.record("ash").version, version);
        assert!(h.sent_types().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let mut storage = MockPlayerQuestRepository::new();
        storage
            .expect_load()
            .returning(|_| Err(RepoError::Database("disk on fire".into())));
        let h = Harness::with_repo(
            &[BERRIES],
            Arc::new(InMemoryQuestRepository::new()),
            Arc::new(storage),
        );

        let err = h
            .tracker
            .update_progress("ash", &collect("oran_berry", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, QuestError::Storage(_)));
        assert_eq!(h.sent_types(), vec!["system_message"]);
        assert!(h.applied().is_empty());
    }

    #[tokio::test]
    async fn test_amounts_never_exceed_requirement() {
        let h = Harness::new(&[BERRIES]);
        h.start("ash", "berry_picking").await;

        let mut rng = StdRng::seed_from_u64(7);
        let items = ["oran_berry", "pecha_berry", "rare_candy"];
        let mut last_step = 0;

        for _ in 0..40 {
            let item = items[rng.gen_range(0..items.len())];
            let amount = rng.gen_range(1..4);
            h.tracker
                .update_progress("ash", &collect(item, amount))
                .await
                .unwrap();

            let record = h.record("ash");
            let progress = record.get_quest("berry_picking").unwrap();
            assert!(progress.current_step_index >= last_step);
            last_step = progress.current_step_index;
            for objective in progress.objectives.values() {
                assert!(objective.current_amount <= objective.required_amount);
            }
        }

        // Collect events alone finish the first step and nothing more
        assert_eq!(last_step, 1);
    }
}
