//! Per-player notification preferences.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::message::{ChannelType, MessageType, QuestClientMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPreference {
    pub enabled: bool,
    /// Overrides the message's display duration
    pub duration_ms: Option<u64>,
    pub sound: bool,
}

impl Default for ChannelPreference {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: None,
            sound: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub channels: HashMap<ChannelType, ChannelPreference>,
    pub muted_types: HashSet<MessageType>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            channels: HashMap::new(),
            muted_types: HashSet::new(),
        }
    }
}

impl NotificationPreferences {
    /// Apply the player's display preferences. Returns `None` if the player
    /// does not want this message at all.
    pub fn personalize(&self, mut message: QuestClientMessage) -> Option<QuestClientMessage> {
        // System messages always get through
        if message.message_type != MessageType::SystemMessage {
            if !self.enabled || self.muted_types.contains(&message.message_type) {
                return None;
            }
        }

        if let Some(channel) = self.channels.get(&message.display.channel) {
            if !channel.enabled && message.message_type != MessageType::SystemMessage {
                return None;
            }
            if let Some(duration) = channel.duration_ms {
                message.display.duration_ms = Some(duration);
            }
            if !channel.sound {
                message.display.sound = None;
            }
        }

        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::message::{DisplayOptions, Priority, Theme};

    fn toast(message_type: MessageType) -> QuestClientMessage {
        let mut display = DisplayOptions::new(ChannelType::Toast, Theme::Info, Priority::Normal);
        display.sound = Some("ding".to_string());
        QuestClientMessage::new(message_type, "ash", "Title", "Body", display)
    }

    #[test]
    fn test_defaults_pass_through() {
        let prefs = NotificationPreferences::default();
        let message = toast(MessageType::ObjectiveProgress);
        assert_eq!(prefs.personalize(message.clone()), Some(message));
    }

    #[test]
    fn test_channel_overrides() {
        let mut prefs = NotificationPreferences::default();
        prefs.channels.insert(
            ChannelType::Toast,
            ChannelPreference {
                enabled: true,
                duration_ms: Some(1_500),
                sound: false,
            },
        );

        let out = prefs.personalize(toast(MessageType::ObjectiveProgress)).unwrap();
        assert_eq!(out.display.duration_ms, Some(1_500));
        assert_eq!(out.display.sound, None);
    }

    #[test]
    fn test_muted_and_disabled() {
        let mut prefs = NotificationPreferences::default();
        prefs.muted_types.insert(MessageType::ObjectiveProgress);
        assert!(prefs.personalize(toast(MessageType::ObjectiveProgress)).is_none());
        assert!(prefs.personalize(toast(MessageType::QuestCompleted)).is_some());

        prefs.enabled = false;
        assert!(prefs.personalize(toast(MessageType::QuestCompleted)).is_none());
        assert!(prefs.personalize(toast(MessageType::SystemMessage)).is_some());
    }
}
