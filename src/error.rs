//! Error types for the quest engine.
//!
//! Port errors describe failures of the external collaborators (storage,
//! reward sinks, transports). `QuestError` is the structured system error
//! returned by the public service operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found")]
    NotFound,
    #[error("Version conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        RepoError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(e: serde_json::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The external system refused the reward (inventory full, unknown item...)
    #[error("Reward rejected: {0}")]
    Rejected(String),
    #[error("Reward system unavailable: {0}")]
    Unavailable(String),
    #[error("Reward system timed out after {0}ms")]
    Timeout(u64),
}

impl SinkError {
    /// Whether re-applying the same reward later may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SinkError::Rejected(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Player {0} is not connected")]
    Disconnected(String),
    #[error("Transport rejected message: {0}")]
    Rejected(String),
    #[error("Delivery timed out after {0}ms")]
    Timeout(u64),
}

/// Errors raised while loading quest content
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("Invalid objective type '{value}' in quest '{quest_id}'")]
    UnknownObjectiveType { quest_id: String, value: String },
    #[error("Quest '{0}' has no steps")]
    NoSteps(String),
    #[error("Step {step} of quest '{quest_id}' has no objectives")]
    EmptyStep { quest_id: String, step: usize },
    #[error("Objective '{objective_id}' in quest '{quest_id}' needs a positive required_amount")]
    ZeroAmount { quest_id: String, objective_id: String },
    #[error("Duplicate objective id '{objective_id}' in quest '{quest_id}'")]
    DuplicateObjective { quest_id: String, objective_id: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Structured failure of a quest service operation
#[derive(Debug, Error)]
pub enum QuestError {
    #[error("Unknown quest '{0}'")]
    UnknownQuest(String),
    #[error("Quest '{quest_id}' is not active for player {player_id}")]
    NotActive { player_id: String, quest_id: String },
    #[error("Quest '{quest_id}' is not ready to complete for player {player_id}")]
    NotReadyToComplete { player_id: String, quest_id: String },
    #[error("Storage error: {0}")]
    Storage(#[from] RepoError),
    #[error("Gave up saving quest state for player {player_id} after {attempts} conflicts")]
    ConflictRetriesExhausted { player_id: String, attempts: u32 },
    #[error("Worker pool is shut down")]
    WorkerUnavailable,
}
