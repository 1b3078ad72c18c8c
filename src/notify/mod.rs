//! Client notifications: message model, templates, throttling and
//! delivery to connected players.

pub mod message;
pub mod notifier;
pub mod preferences;
pub mod queue;
pub mod rate_limit;
pub mod stats;
pub mod templates;

pub use message::{
    ChannelType, DisplayOptions, MessageAction, MessageType, Priority, QuestClientMessage, Theme,
};
pub use notifier::{BatchResult, ClientNotifier, HistoryEntry};
pub use preferences::{ChannelPreference, NotificationPreferences};
pub use stats::{NotificationStats, TypeStats};
