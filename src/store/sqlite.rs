//! SQLite-backed quest record storage.
//!
//! Each player's `PlayerQuestRecord` is stored as one JSON document with a
//! version column; saves only succeed against the version they loaded.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::RepoError;
use crate::ports::PlayerQuestRepository;
use crate::quest::PlayerQuestRecord;

pub struct SqliteQuestRepository {
    pool: SqlitePool,
}

impl SqliteQuestRepository {
    pub async fn new(database_url: &str) -> Result<Self, RepoError> {
        // In-memory databases are per-connection, so they get a single one
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS player_quest_records (
                player_id TEXT PRIMARY KEY NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                record_json TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Quest record migrations complete");
        Ok(())
    }
}

#[async_trait]
impl PlayerQuestRepository for SqliteQuestRepository {
    async fn load(&self, player_id: &str) -> Result<PlayerQuestRecord, RepoError> {
        let row = sqlx::query(
            "SELECT version, record_json FROM player_quest_records WHERE player_id = ?",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(PlayerQuestRecord::new(player_id));
        };

        let version: i64 = row.get("version");
        let json: String = row.get("record_json");
        let mut record: PlayerQuestRecord = serde_json::from_str(&json)?;
        record.player_id = player_id.to_string();
        record.version = version as u64;
        Ok(record)
    }

    async fn save(&self, record: &PlayerQuestRecord) -> Result<u64, RepoError> {
        let new_version = record.version + 1;
        let mut stored = record.clone();
        stored.version = new_version;
        let json = serde_json::to_string(&stored)?;

        let result = if record.version == 0 {
            sqlx::query(
                "INSERT INTO player_quest_records (player_id, version, record_json) VALUES (?, ?, ?)
                 ON CONFLICT(player_id) DO NOTHING",
            )
            .bind(&record.player_id)
            .bind(new_version as i64)
            .bind(&json)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"UPDATE player_quest_records SET
                    version = ?, record_json = ?, updated_at = CURRENT_TIMESTAMP
                WHERE player_id = ? AND version = ?"#,
            )
            .bind(new_version as i64)
            .bind(&json)
            .bind(&record.player_id)
            .bind(record.version as i64)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 1 {
            return Ok(new_version);
        }

        let found: Option<i64> =
            sqlx::query("SELECT version FROM player_quest_records WHERE player_id = ?")
                .bind(&record.player_id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| row.get("version"));

        Err(RepoError::Conflict {
            expected: record.version,
            found: found.unwrap_or(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::QuestDefinition;
    use chrono::Utc;

    async fn repo() -> SqliteQuestRepository {
        SqliteQuestRepository::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_document() {
        let repo = repo().await;
        let quest = QuestDefinition::from_toml_str(
            r#"
[quest]
id = "talk_to_oak"
name = "Meet the Professor"

[[quest.steps]]
[[quest.steps.objectives]]
id = "talk"
type = "talk"
target = "prof_oak"
"#,
        )
        .unwrap();

        let mut record = repo.load("ash").await.unwrap();
        record.start_quest(&quest, Utc::now());
        let version = repo.save(&record).await.unwrap();
        assert_eq!(version, 1);

        let loaded = repo.load("ash").await.unwrap();
        assert_eq!(loaded.version, 1);
        assert!(loaded.is_quest_active("talk_to_oak"));
    }

    #[tokio::test]
    async fn test_conflicting_saves() {
        let repo = repo().await;
        let first = repo.load("ash").await.unwrap();
        let second = repo.load("ash").await.unwrap();

        repo.save(&first).await.unwrap();
        let err = repo.save(&second).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict { expected: 0, found: 1 }));

        let mut current = repo.load("ash").await.unwrap();
        assert_eq!(repo.save(&current).await.unwrap(), 2);
        current.version = 1;
        assert!(matches!(
            repo.save(&current).await,
            Err(RepoError::Conflict { expected: 1, found: 2 })
        ));
    }
}
