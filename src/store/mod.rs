//! Quest record persistence: repository adapters plus the serialized
//! read-modify-write helper every mutation goes through.

pub mod locks;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

pub use locks::PlayerLocks;
pub use memory::InMemoryQuestRepository;
pub use sqlite::SqliteQuestRepository;

use crate::error::{QuestError, RepoError};
use crate::ports::PlayerQuestRepository;
use crate::quest::PlayerQuestRecord;

/// Outcome of a record mutation closure
pub enum Mutation<T> {
    /// Nothing changed, skip the write
    Unchanged(T),
    /// Record was modified and must be saved
    Changed(T),
}

/// Serializes writes per player (in-process lock) and retries on version
/// conflicts from other writers of the same store.
pub struct RecordWriter {
    repository: Arc<dyn PlayerQuestRepository>,
    locks: PlayerLocks,
    max_retries: u32,
}

impl RecordWriter {
    pub fn new(repository: Arc<dyn PlayerQuestRepository>, max_retries: u32) -> Self {
        Self {
            repository,
            locks: PlayerLocks::new(),
            max_retries,
        }
    }

    pub fn repository(&self) -> &Arc<dyn PlayerQuestRepository> {
        &self.repository
    }

    /// Take the player's write lock
    pub async fn lock(&self, player_id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(player_id).await
    }

    pub async fn load(&self, player_id: &str) -> Result<PlayerQuestRecord, QuestError> {
        Ok(self.repository.load(player_id).await?)
    }

    /// Load, mutate and save the player's record under the player lock.
    /// The closure may run more than once if the save hits a conflict, so
    /// it must only touch the record it is given.
    pub async fn update<T, F>(&self, player_id: &str, mut mutate: F) -> Result<T, QuestError>
    where
        F: FnMut(&mut PlayerQuestRecord) -> Result<Mutation<T>, QuestError>,
    {
        let _guard = self.locks.lock(player_id).await;
        let mut attempt = 0;

        loop {
            let mut record = self.repository.load(player_id).await?;
            let value = match mutate(&mut record)? {
                Mutation::Unchanged(value) => return Ok(value),
                Mutation::Changed(value) => value,
            };

            match self.repository.save(&record).await {
                Ok(version) => {
                    debug!(player_id, version, "Saved quest record");
                    return Ok(value);
                }
                Err(RepoError::Conflict { expected, found }) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        player_id,
                        expected, found, attempt, "Quest record changed underneath us, retrying"
                    );
                }
                Err(RepoError::Conflict { .. }) => {
                    return Err(QuestError::ConflictRetriesExhausted {
                        player_id: player_id.to_string(),
                        attempts: attempt + 1,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Release lock entries for idle players
    pub fn prune_locks(&self) {
        self.locks.prune();
    }
}
