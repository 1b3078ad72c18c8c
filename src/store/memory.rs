//! In-memory quest record storage for development and testing.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::RepoError;
use crate::ports::PlayerQuestRepository;
use crate::quest::PlayerQuestRecord;

#[derive(Debug, Default)]
pub struct InMemoryQuestRepository {
    records: DashMap<String, PlayerQuestRecord>,
}

impl InMemoryQuestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored record without going through the port
    pub fn get(&self, player_id: &str) -> Option<PlayerQuestRecord> {
        self.records.get(player_id).map(|r| r.clone())
    }
}

#[async_trait]
impl PlayerQuestRepository for InMemoryQuestRepository {
    async fn load(&self, player_id: &str) -> Result<PlayerQuestRecord, RepoError> {
        Ok(self
            .records
            .get(player_id)
            .map(|r| r.clone())
            .unwrap_or_else(|| PlayerQuestRecord::new(player_id)))
    }

    async fn save(&self, record: &PlayerQuestRecord) -> Result<u64, RepoError> {
        let mut entry = self
            .records
            .entry(record.player_id.clone())
            .or_insert_with(|| PlayerQuestRecord::new(&record.player_id));

        if entry.version != record.version {
            return Err(RepoError::Conflict {
                expected: record.version,
                found: entry.version,
            });
        }

        let mut stored = record.clone();
        stored.version = record.version + 1;
        let version = stored.version;
        *entry = stored;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_player_gets_empty_record() {
        let repo = InMemoryQuestRepository::new();
        let record = repo.load("ash").await.unwrap();
        assert_eq!(record.player_id, "ash");
        assert_eq!(record.version, 0);
        assert!(record.active_quests.is_empty());
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let repo = InMemoryQuestRepository::new();
        let record = repo.load("ash").await.unwrap();
        assert_eq!(repo.save(&record).await.unwrap(), 1);

        let reloaded = repo.load("ash").await.unwrap();
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let repo = InMemoryQuestRepository::new();
        let first = repo.load("ash").await.unwrap();
        let second = repo.load("ash").await.unwrap();

        repo.save(&first).await.unwrap();
        let err = repo.save(&second).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict { expected: 0, found: 1 }));
    }
}
