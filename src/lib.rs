//! Quest lifecycle engine: objective progress tracking, acceptance
//! validation, reward distribution and client notifications.

pub mod adapters;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod ports;
pub mod progress;
pub mod quest;
pub mod rewards;
pub mod service;
pub mod store;
pub mod validation;
pub mod worker;

pub use config::EngineConfig;
pub use error::QuestError;
pub use service::QuestService;
pub use worker::{CommandOutcome, QuestCommand, WorkerPool};
