//! Port traits for the external collaborators of the quest engine.
//!
//! These are injected into the components at construction:
//! - Storage of the per-player quest document
//! - The player economy/inventory/collection systems that apply rewards
//! - The connection that pushes messages to a client

use async_trait::async_trait;

use crate::error::{RepoError, SinkError, TransportError};
use crate::notify::ChannelType;
use crate::quest::{PlayerQuestRecord, QuestReward};

/// Per-player quest document storage with optimistic concurrency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerQuestRepository: Send + Sync {
    /// Load a player's record. Unknown players get an empty record with
    /// version 0.
    async fn load(&self, player_id: &str) -> Result<PlayerQuestRecord, RepoError>;

    /// Save a record previously loaded at `record.version`. Fails with
    /// `RepoError::Conflict` if someone else saved in between. Returns the
    /// new version.
    async fn save(&self, record: &PlayerQuestRecord) -> Result<u64, RepoError>;
}

/// Applies one reward to an external player-state system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RewardSink: Send + Sync {
    async fn apply(&self, player_id: &str, reward: &QuestReward) -> Result<(), SinkError>;
}

/// Pushes a rendered message to a connected client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(
        &self,
        player_id: &str,
        channel: ChannelType,
        payload: &serde_json::Value,
    ) -> Result<(), TransportError>;
}
