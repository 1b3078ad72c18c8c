//! Quest System Module
//!
//! Quest content (TOML definitions), per-player quest state, gameplay
//! events and reward definitions.

pub mod definition;
pub mod events;
pub mod registry;
pub mod reward;
pub mod state;

pub use definition::{
    ObjectiveConditions, ObjectiveType, QuestConfig, QuestDefinition, QuestMetadata,
    QuestObjective, QuestStep, ANY_TARGET,
};
pub use events::{
    EventContext, PokemonInfo, ProgressAction, QuestProgressEvent, Season, TimeOfDay, Weather,
    WorldState,
};
pub use registry::QuestRegistry;
pub use reward::{QuestReward, Rarity, RewardConditions, RewardKind, RewardType};
pub use state::{
    CompletedQuest, ObjectiveProgress, PlayerQuestProgress, PlayerQuestRecord, QuestCompletion,
    QuestStatus,
};
