//! Worker pool for quest commands.
//!
//! Each worker owns a queue. Commands are routed by a hash of the player
//! id, so one player's commands run in submission order while different
//! players are processed concurrently.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::QuestError;
use crate::progress::QuestUpdateResult;
use crate::quest::QuestProgressEvent;
use crate::rewards::RewardDistributionResult;
use crate::service::QuestService;
use crate::validation::{PlayerProfile, ValidationResult};

/// Commands accepted by the runner, one JSON object per line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum QuestCommand {
    Accept {
        player_id: String,
        quest_id: String,
        #[serde(default)]
        profile: PlayerProfile,
    },
    Event {
        player_id: String,
        event: QuestProgressEvent,
    },
    TurnIn {
        player_id: String,
        quest_id: String,
    },
    Abandon {
        player_id: String,
        quest_id: String,
    },
    Fail {
        player_id: String,
        quest_id: String,
        reason: String,
    },
    RetryRewards {
        player_id: String,
        quest_id: String,
        request_id: Uuid,
    },
}

impl QuestCommand {
    pub fn player_id(&self) -> &str {
        match self {
            QuestCommand::Accept { player_id, .. }
            | QuestCommand::Event { player_id, .. }
            | QuestCommand::TurnIn { player_id, .. }
            | QuestCommand::Abandon { player_id, .. }
            | QuestCommand::Fail { player_id, .. }
            | QuestCommand::RetryRewards { player_id, .. } => player_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuestCommand::Accept { .. } => "accept",
            QuestCommand::Event { .. } => "event",
            QuestCommand::TurnIn { .. } => "turn_in",
            QuestCommand::Abandon { .. } => "abandon",
            QuestCommand::Fail { .. } => "fail",
            QuestCommand::RetryRewards { .. } => "retry_rewards",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Validation { result: ValidationResult },
    Progress { updates: Vec<QuestUpdateResult> },
    Rewards { result: RewardDistributionResult },
    Done,
    /// No failed distribution was recorded under that request id
    NothingToRetry,
}

type Reply = oneshot::Sender<Result<CommandOutcome, QuestError>>;

struct Job {
    command: QuestCommand,
    reply: Reply,
}

pub struct WorkerPool {
    senders: Vec<mpsc::Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(service: Arc<QuestService>, worker_count: usize, queue_size: usize) -> Self {
        let worker_count = worker_count.max(1);
        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let (tx, rx) = mpsc::channel(queue_size.max(1));
            senders.push(tx);
            handles.push(tokio::spawn(worker_task(worker_id, service.clone(), rx)));
        }

        info!("Started quest worker pool with {} workers", worker_count);
        Self { senders, handles }
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    /// Worker that owns a player's commands
    pub fn worker_for(&self, player_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        player_id.hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }

    /// Queue a command and return the receiver for its outcome without
    /// waiting for it to run
    pub async fn dispatch(
        &self,
        command: QuestCommand,
    ) -> Result<oneshot::Receiver<Result<CommandOutcome, QuestError>>, QuestError> {
        let worker = self.worker_for(command.player_id());
        let (reply, rx) = oneshot::channel();
        self.senders[worker]
            .send(Job { command, reply })
            .await
            .map_err(|_| QuestError::WorkerUnavailable)?;
        Ok(rx)
    }

    /// Queue a command and wait for its outcome
    pub async fn submit(&self, command: QuestCommand) -> Result<CommandOutcome, QuestError> {
        let rx = self.dispatch(command).await?;
        rx.await.map_err(|_| QuestError::WorkerUnavailable)?
    }

    /// Stop accepting commands and wait for queued ones to finish
    pub async fn shutdown(self) {
        drop(self.senders);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("Quest worker ended abnormally: {}", e);
            }
        }
        info!("Quest worker pool stopped");
    }
}

async fn worker_task(worker_id: usize, service: Arc<QuestService>, mut rx: mpsc::Receiver<Job>) {
    debug!("Quest worker {} started", worker_id);

    while let Some(Job { command, reply }) = rx.recv().await {
        debug!(
            worker_id,
            player_id = command.player_id(),
            command = command.name(),
            "Processing command"
        );
        let outcome = execute(&service, command).await;
        // The submitter may have gone away
        let _ = reply.send(outcome);
    }

    debug!("Quest worker {} shutting down", worker_id);
}

/// Run one command against the service
pub async fn execute(
    service: &QuestService,
    command: QuestCommand,
) -> Result<CommandOutcome, QuestError> {
    match command {
        QuestCommand::Accept {
            player_id,
            quest_id,
            profile,
        } => {
            let result = service.accept_quest(&player_id, &quest_id, profile).await?;
            Ok(CommandOutcome::Validation { result })
        }
        QuestCommand::Event { player_id, event } => {
            let updates = service.progress(&player_id, &event).await?;
            Ok(CommandOutcome::Progress { updates })
        }
        QuestCommand::TurnIn {
            player_id,
            quest_id,
        } => {
            let result = service.turn_in_quest(&player_id, &quest_id).await?;
            Ok(CommandOutcome::Rewards { result })
        }
        QuestCommand::Abandon {
            player_id,
            quest_id,
        } => {
            service.abandon_quest(&player_id, &quest_id).await?;
            Ok(CommandOutcome::Done)
        }
        QuestCommand::Fail {
            player_id,
            quest_id,
            reason,
        } => {
            service.fail_quest(&player_id, &quest_id, &reason).await?;
            Ok(CommandOutcome::Done)
        }
        QuestCommand::RetryRewards {
            player_id,
            quest_id,
            request_id,
        } => Ok(
            match service
                .retry_rewards(&player_id, &quest_id, request_id)
                .await
            {
                Some(result) => CommandOutcome::Rewards { result },
                None => CommandOutcome::NothingToRetry,
            },
        ),
    }
}
