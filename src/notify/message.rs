//! Player-facing quest messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle tag of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    QuestStarted,
    QuestUnavailable,
    ObjectiveProgress,
    ObjectiveCompleted,
    StepCompleted,
    QuestReadyToComplete,
    QuestCompleted,
    QuestFailed,
    QuestAbandoned,
    RewardReceived,
    RewardFailed,
    Achievement,
    SystemMessage,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::QuestStarted => "quest_started",
            MessageType::QuestUnavailable => "quest_unavailable",
            MessageType::ObjectiveProgress => "objective_progress",
            MessageType::ObjectiveCompleted => "objective_completed",
            MessageType::StepCompleted => "step_completed",
            MessageType::QuestReadyToComplete => "quest_ready_to_complete",
            MessageType::QuestCompleted => "quest_completed",
            MessageType::QuestFailed => "quest_failed",
            MessageType::QuestAbandoned => "quest_abandoned",
            MessageType::RewardReceived => "reward_received",
            MessageType::RewardFailed => "reward_failed",
            MessageType::Achievement => "achievement",
            MessageType::SystemMessage => "system_message",
        }
    }

    /// Queue priority bonus on top of the display priority. Milestones
    /// outrank progress pings.
    pub fn priority_bonus(&self) -> u32 {
        match self {
            MessageType::QuestCompleted | MessageType::Achievement => 8,
            MessageType::QuestReadyToComplete => 6,
            MessageType::RewardReceived => 5,
            MessageType::StepCompleted | MessageType::QuestFailed => 4,
            MessageType::QuestStarted | MessageType::RewardFailed => 3,
            MessageType::ObjectiveCompleted | MessageType::SystemMessage => 2,
            MessageType::QuestUnavailable | MessageType::QuestAbandoned => 1,
            MessageType::ObjectiveProgress => 0,
        }
    }
}

/// Presentation surface on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Toast,
    Modal,
    Banner,
    Popup,
    Sidebar,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Toast => "toast",
            ChannelType::Modal => "modal",
            ChannelType::Banner => "banner",
            ChannelType::Popup => "popup",
            ChannelType::Sidebar => "sidebar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Info,
    Success,
    Warning,
    Error,
    Reward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn weight(&self) -> u32 {
        match self {
            Priority::Low => 10,
            Priority::Normal => 20,
            Priority::High => 30,
            Priority::Urgent => 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub channel: ChannelType,
    pub theme: Theme,
    /// None = stays until dismissed
    pub duration_ms: Option<u64>,
    pub priority: Priority,
    pub persistent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

impl DisplayOptions {
    pub fn new(channel: ChannelType, theme: Theme, priority: Priority) -> Self {
        Self {
            channel,
            theme,
            duration_ms: Some(4_000),
            priority,
            persistent: false,
            animation: None,
            sound: None,
        }
    }
}

/// Button or link attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAction {
    pub id: String,
    pub label: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl MessageAction {
    pub fn new(id: &str, label: &str, action: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            action: action.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestClientMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub player_id: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub display: DisplayOptions,
    #[serde(default)]
    pub actions: Vec<MessageAction>,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl QuestClientMessage {
    pub fn new(
        message_type: MessageType,
        player_id: &str,
        title: impl Into<String>,
        message: impl Into<String>,
        display: DisplayOptions,
    ) -> Self {
        Self {
            message_type,
            player_id: player_id.to_string(),
            title: title.into(),
            message: message.into(),
            quest_id: None,
            objective_id: None,
            step_id: None,
            display,
            actions: Vec::new(),
            data: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn for_quest(mut self, quest_id: &str) -> Self {
        self.quest_id = Some(quest_id.to_string());
        self
    }

    pub fn with_action(mut self, action: MessageAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Queue ordering weight
    pub fn queue_priority(&self) -> u32 {
        self.display.priority.weight() + self.message_type.priority_bonus()
    }

    /// Identity used for duplicate suppression
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            message_type: self.message_type,
            message: self.message.clone(),
            quest_id: self.quest_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub message_type: MessageType,
    pub message: String,
    pub quest_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_outranks_progress() {
        let display = DisplayOptions::new(ChannelType::Toast, Theme::Info, Priority::Normal);
        let progress = QuestClientMessage::new(
            MessageType::ObjectiveProgress,
            "ash",
            "Progress",
            "1/5",
            display.clone(),
        );
        let completed =
            QuestClientMessage::new(MessageType::QuestCompleted, "ash", "Done", "!", display);
        assert!(completed.queue_priority() > progress.queue_priority());
    }

    #[test]
    fn test_serialized_shape() {
        let message = QuestClientMessage::new(
            MessageType::QuestStarted,
            "ash",
            "Quest Started",
            "Catch Your First Pokemon",
            DisplayOptions::new(ChannelType::Banner, Theme::Info, Priority::High),
        )
        .for_quest("catch_first_pokemon")
        .with_action(MessageAction::new("track", "Track", "track_quest").with_param("quest_id", "catch_first_pokemon"));

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "quest_started");
        assert_eq!(json["display"]["channel"], "banner");
        assert_eq!(json["display"]["priority"], "high");
        assert_eq!(json["actions"][0]["params"]["quest_id"], "catch_first_pokemon");
        assert!(json.get("objective_id").is_none());
    }
}
