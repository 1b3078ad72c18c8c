//! Quest reward definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_count() -> i64 {
    1
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Reward category, used to route rewards to the system that applies them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Gold,
    Item,
    Pokemon,
    Experience,
    Badge,
    Title,
    Access,
    Recipe,
    Move,
    Unlock,
    Boost,
    Cosmetic,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Gold => "gold",
            RewardType::Item => "item",
            RewardType::Pokemon => "pokemon",
            RewardType::Experience => "experience",
            RewardType::Badge => "badge",
            RewardType::Title => "title",
            RewardType::Access => "access",
            RewardType::Recipe => "recipe",
            RewardType::Move => "move",
            RewardType::Unlock => "unlock",
            RewardType::Boost => "boost",
            RewardType::Cosmetic => "cosmetic",
        }
    }

    /// Economy rewards handled by the core reward sink. Everything else
    /// needs a registered extension.
    pub fn is_core(&self) -> bool {
        matches!(
            self,
            RewardType::Gold | RewardType::Item | RewardType::Pokemon | RewardType::Experience
        )
    }
}

/// Type-specific reward payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardKind {
    Gold {
        amount: i64,
    },
    Item {
        item_id: String,
        #[serde(default = "default_count")]
        amount: i64,
    },
    Pokemon {
        pokemon_id: u32,
        #[serde(default)]
        level: Option<u32>,
        #[serde(default)]
        shiny: bool,
        #[serde(default)]
        rarity: Option<Rarity>,
    },
    Experience {
        amount: i64,
    },
    Badge {
        badge_id: String,
    },
    Title {
        title_id: String,
    },
    Access {
        area_id: String,
        #[serde(default)]
        temporary: bool,
        #[serde(default)]
        duration_minutes: Option<u32>,
    },
    Recipe {
        recipe_id: String,
    },
    Move {
        move_id: String,
        #[serde(default)]
        pokemon_id: Option<u32>,
    },
    Unlock {
        feature_id: String,
    },
    Boost {
        boost_id: String,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        #[serde(default)]
        temporary: bool,
        #[serde(default)]
        duration_minutes: Option<u32>,
    },
    Cosmetic {
        cosmetic_id: String,
        #[serde(default)]
        rarity: Option<Rarity>,
        #[serde(default)]
        temporary: bool,
        #[serde(default)]
        duration_minutes: Option<u32>,
    },
}

/// Optional gates evaluated when the reward is distributed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConditions {
    /// Probability in `0.0..=1.0` that the reward is granted
    pub chance: Option<f64>,
    /// Reward is no longer granted after this instant
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestReward {
    #[serde(flatten)]
    pub kind: RewardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<RewardConditions>,
}

impl From<RewardKind> for QuestReward {
    fn from(kind: RewardKind) -> Self {
        Self {
            kind,
            conditions: None,
        }
    }
}

impl QuestReward {
    pub fn gold(amount: i64) -> Self {
        RewardKind::Gold { amount }.into()
    }

    pub fn experience(amount: i64) -> Self {
        RewardKind::Experience { amount }.into()
    }

    pub fn item(item_id: &str, amount: i64) -> Self {
        RewardKind::Item {
            item_id: item_id.to_string(),
            amount,
        }
        .into()
    }

    pub fn reward_type(&self) -> RewardType {
        match &self.kind {
            RewardKind::Gold { .. } => RewardType::Gold,
            RewardKind::Item { .. } => RewardType::Item,
            RewardKind::Pokemon { .. } => RewardType::Pokemon,
            RewardKind::Experience { .. } => RewardType::Experience,
            RewardKind::Badge { .. } => RewardType::Badge,
            RewardKind::Title { .. } => RewardType::Title,
            RewardKind::Access { .. } => RewardType::Access,
            RewardKind::Recipe { .. } => RewardType::Recipe,
            RewardKind::Move { .. } => RewardType::Move,
            RewardKind::Unlock { .. } => RewardType::Unlock,
            RewardKind::Boost { .. } => RewardType::Boost,
            RewardKind::Cosmetic { .. } => RewardType::Cosmetic,
        }
    }

    /// Monetary-equivalent value (only gold counts today)
    pub fn monetary_value(&self) -> i64 {
        match &self.kind {
            RewardKind::Gold { amount } => *amount,
            _ => 0,
        }
    }

    /// Inventory slots this reward would occupy
    pub fn inventory_footprint(&self) -> u32 {
        match &self.kind {
            RewardKind::Item { .. } => 1,
            _ => 0,
        }
    }

    /// Short human-readable label, e.g. "500 gold" or "3x potion"
    pub fn describe(&self) -> String {
        match &self.kind {
            RewardKind::Gold { amount } => format!("{} gold", amount),
            RewardKind::Experience { amount } => format!("{} XP", amount),
            RewardKind::Item { item_id, amount } => format!("{}x {}", amount, item_id),
            RewardKind::Pokemon { pokemon_id, .. } => format!("Pokemon #{}", pokemon_id),
            RewardKind::Badge { badge_id } => format!("Badge: {}", badge_id),
            RewardKind::Title { title_id } => format!("Title: {}", title_id),
            RewardKind::Access { area_id, .. } => format!("Access: {}", area_id),
            RewardKind::Recipe { recipe_id } => format!("Recipe: {}", recipe_id),
            RewardKind::Move { move_id, .. } => format!("Move: {}", move_id),
            RewardKind::Unlock { feature_id } => format!("Unlocked: {}", feature_id),
            RewardKind::Boost { boost_id, .. } => format!("Boost: {}", boost_id),
            RewardKind::Cosmetic { cosmetic_id, .. } => format!("Cosmetic: {}", cosmetic_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_json_flattened() {
        let reward: QuestReward = serde_json::from_str(
            r#"{"type":"item","item_id":"potion","amount":3,"conditions":{"chance":0.5}}"#,
        )
        .unwrap();
        assert_eq!(reward.reward_type(), RewardType::Item);
        assert_eq!(reward.inventory_footprint(), 1);
        assert_eq!(reward.conditions.as_ref().and_then(|c| c.chance), Some(0.5));
        assert_eq!(reward.describe(), "3x potion");
    }

    #[test]
    fn test_reward_defaults() {
        let reward: QuestReward =
            serde_json::from_str(r#"{"type":"boost","boost_id":"xp_boost"}"#).unwrap();
        match reward.kind {
            RewardKind::Boost {
                multiplier,
                temporary,
                ..
            } => {
                assert_eq!(multiplier, 1.0);
                assert!(!temporary);
            }
            other => panic!("unexpected reward {:?}", other),
        }
        assert!(!RewardType::Boost.is_core());
        assert!(RewardType::Gold.is_core());
    }

    #[test]
    fn test_monetary_value() {
        assert_eq!(QuestReward::gold(250).monetary_value(), 250);
        assert_eq!(QuestReward::experience(250).monetary_value(), 0);
    }
}
