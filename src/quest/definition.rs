//! Quest Definition Structures
//!
//! These structures are deserialized from TOML quest files and resolved
//! into immutable `QuestDefinition`s.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::events::{Season, TimeOfDay, Weather};
use super::reward::QuestReward;
use crate::error::DefinitionError;

/// A quest definition loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestFile {
    pub quest: RawQuest,
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// NPC that offers the quest and accepts turn-ins
    #[serde(default)]
    pub giver_npc: Option<String>,
    /// Quests that must be completed first
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub is_repeatable: bool,
    #[serde(default)]
    pub cooldown_hours: Option<u32>,
    /// Distribute quest rewards as soon as the last step completes
    #[serde(default)]
    pub auto_complete: bool,
    #[serde(default)]
    pub config: QuestConfig,
    #[serde(default)]
    pub metadata: QuestMetadata,
    #[serde(default)]
    pub steps: Vec<RawStep>,
    /// Quest-level rewards, granted on completion
    #[serde(default)]
    pub rewards: Vec<QuestReward>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    pub id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objectives: Vec<RawObjective>,
    #[serde(default)]
    pub rewards: Vec<QuestReward>,
}

/// Raw objective as it appears in TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawObjective {
    pub id: String,
    #[serde(rename = "type")]
    pub objective_type: String,
    pub target: String,
    #[serde(default = "default_amount", alias = "count")]
    pub required_amount: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: ObjectiveConditions,
}

fn default_amount() -> u32 {
    1
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// Objective types supported by the quest system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveType {
    Collect,
    Defeat,
    Talk,
    Reach,
    Deliver,
    Catch,
    Encounter,
    Use,
    Win,
    Explore,
}

impl ObjectiveType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "collect" | "collect_item" => Some(ObjectiveType::Collect),
            "defeat" | "kill" | "kill_monster" => Some(ObjectiveType::Defeat),
            "talk" | "talk_to" => Some(ObjectiveType::Talk),
            "reach" | "reach_location" | "location" => Some(ObjectiveType::Reach),
            "deliver" => Some(ObjectiveType::Deliver),
            "catch" => Some(ObjectiveType::Catch),
            "encounter" => Some(ObjectiveType::Encounter),
            "use" | "use_item" => Some(ObjectiveType::Use),
            "win" | "win_battle" => Some(ObjectiveType::Win),
            "explore" => Some(ObjectiveType::Explore),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveType::Collect => "collect",
            ObjectiveType::Defeat => "defeat",
            ObjectiveType::Talk => "talk",
            ObjectiveType::Reach => "reach",
            ObjectiveType::Deliver => "deliver",
            ObjectiveType::Catch => "catch",
            ObjectiveType::Encounter => "encounter",
            ObjectiveType::Use => "use",
            ObjectiveType::Win => "win",
            ObjectiveType::Explore => "explore",
        }
    }

    /// Whether the target may be the `"any"` wildcard
    pub fn allows_wildcard(&self) -> bool {
        matches!(
            self,
            ObjectiveType::Catch | ObjectiveType::Encounter | ObjectiveType::Defeat
        )
    }
}

/// Wildcard objective target
pub const ANY_TARGET: &str = "any";

/// Extra requirements checked against the event context at progress time.
/// Empty lists and `None` mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveConditions {
    pub weather: Vec<Weather>,
    pub time_of_day: Vec<TimeOfDay>,
    pub season: Vec<Season>,
    /// Pokemon must have at least one of these types
    pub pokemon_types: Vec<String>,
    pub min_pokemon_level: Option<u32>,
    pub shiny: Option<bool>,
    pub location: Option<String>,
    /// Recipient for deliver objectives
    pub npc_id: Option<String>,
}

impl ObjectiveConditions {
    pub fn is_empty(&self) -> bool {
        *self == ObjectiveConditions::default()
    }
}

/// A resolved quest objective
#[derive(Debug, Clone, Serialize)]
pub struct QuestObjective {
    pub id: String,
    pub objective_type: ObjectiveType,
    /// Target entity/item/npc/location ID, or `"any"`
    pub target: String,
    pub required_amount: u32,
    pub description: String,
    pub conditions: ObjectiveConditions,
}

impl QuestObjective {
    pub fn from_raw(quest_id: &str, raw: &RawObjective) -> Result<Self, DefinitionError> {
        let objective_type = ObjectiveType::from_str(&raw.objective_type).ok_or_else(|| {
            DefinitionError::UnknownObjectiveType {
                quest_id: quest_id.to_string(),
                value: raw.objective_type.clone(),
            }
        })?;

        if raw.required_amount == 0 {
            return Err(DefinitionError::ZeroAmount {
                quest_id: quest_id.to_string(),
                objective_id: raw.id.clone(),
            });
        }

        Ok(Self {
            id: raw.id.clone(),
            objective_type,
            target: raw.target.clone(),
            required_amount: raw.required_amount,
            description: raw.description.clone(),
            conditions: raw.conditions.clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestStep {
    pub id: String,
    pub description: String,
    pub objectives: Vec<QuestObjective>,
    /// Distributed when every objective of the step completes
    pub rewards: Vec<QuestReward>,
}

/// Who may take the quest and where
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    pub min_level: Option<u32>,
    pub max_level: Option<u32>,
    /// Region the player must currently be in
    pub region_lock: Option<String>,
    pub required_badges: Vec<String>,
    pub time_of_day: Vec<TimeOfDay>,
    pub weather: Vec<Weather>,
    pub seasons: Vec<Season>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestMetadata {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub min_party_size: Option<u32>,
    pub max_party_size: Option<u32>,
}

/// A fully resolved quest definition
#[derive(Debug, Clone, Serialize)]
pub struct QuestDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub giver_npc: Option<String>,
    pub prerequisites: Vec<String>,
    pub is_repeatable: bool,
    pub cooldown_hours: Option<u32>,
    pub auto_complete: bool,
    pub config: QuestConfig,
    pub metadata: QuestMetadata,
    pub steps: Vec<QuestStep>,
    pub rewards: Vec<QuestReward>,
}

impl QuestDefinition {
    /// Create a QuestDefinition from raw TOML data
    pub fn from_raw(raw: &RawQuest) -> Result<Self, DefinitionError> {
        if raw.steps.is_empty() {
            return Err(DefinitionError::NoSteps(raw.id.clone()));
        }

        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(raw.steps.len());
        for (index, raw_step) in raw.steps.iter().enumerate() {
            if raw_step.objectives.is_empty() {
                return Err(DefinitionError::EmptyStep {
                    quest_id: raw.id.clone(),
                    step: index,
                });
            }

            let objectives = raw_step
                .objectives
                .iter()
                .map(|o| QuestObjective::from_raw(&raw.id, o))
                .collect::<Result<Vec<_>, _>>()?;

            for objective in &objectives {
                if !seen.insert(objective.id.clone()) {
                    return Err(DefinitionError::DuplicateObjective {
                        quest_id: raw.id.clone(),
                        objective_id: objective.id.clone(),
                    });
                }
            }

            steps.push(QuestStep {
                id: raw_step
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("step_{}", index + 1)),
                description: raw_step.description.clone(),
                objectives,
                rewards: raw_step.rewards.clone(),
            });
        }

        Ok(Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            description: raw.description.clone(),
            giver_npc: raw.giver_npc.clone(),
            prerequisites: raw.prerequisites.clone(),
            is_repeatable: raw.is_repeatable,
            cooldown_hours: raw.cooldown_hours,
            auto_complete: raw.auto_complete,
            config: raw.config.clone(),
            metadata: raw.metadata.clone(),
            steps,
            rewards: raw.rewards.clone(),
        })
    }

    /// Parse a single `[quest]` TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, DefinitionError> {
        let raw: RawQuestFile = toml::from_str(content).map_err(|e| DefinitionError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        Self::from_raw(&raw.quest)
    }

    pub fn step(&self, index: usize) -> Option<&QuestStep> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get objective by ID (any step)
    pub fn get_objective(&self, id: &str) -> Option<&QuestObjective> {
        self.steps
            .iter()
            .flat_map(|s| s.objectives.iter())
            .find(|o| o.id == id)
    }

    /// Inventory slots needed for every item this quest can grant
    pub fn reward_footprint(&self) -> u32 {
        self.steps
            .iter()
            .flat_map(|s| s.rewards.iter())
            .chain(self.rewards.iter())
            .map(|r| r.inventory_footprint())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::reward::RewardType;

    const CATCH_QUEST: &str = r#"
[quest]
id = "catch_first_pokemon"
name = "Catch Your First Pokemon"
auto_complete = true

[[quest.steps]]
[[quest.steps.objectives]]
id = "catch_any"
type = "catch"
target = "any"

[[quest.steps.rewards]]
type = "item"
item_id = "poke_ball"
amount = 5

[[quest.rewards]]
type = "gold"
amount = 100
"#;

    #[test]
    fn test_objective_type_parsing() {
        assert_eq!(ObjectiveType::from_str("kill_monster"), Some(ObjectiveType::Defeat));
        assert_eq!(ObjectiveType::from_str("collect_item"), Some(ObjectiveType::Collect));
        assert_eq!(ObjectiveType::from_str("talk_to"), Some(ObjectiveType::Talk));
        assert_eq!(ObjectiveType::from_str("reach_location"), Some(ObjectiveType::Reach));
        assert_eq!(ObjectiveType::from_str("Catch"), Some(ObjectiveType::Catch));
        assert_eq!(ObjectiveType::from_str("invalid"), None);
    }

    #[test]
    fn test_parse_quest() {
        let quest = QuestDefinition::from_toml_str(CATCH_QUEST).unwrap();
        assert_eq!(quest.step_count(), 1);
        assert!(quest.auto_complete);
        assert!(!quest.is_repeatable);

        let step = quest.step(0).unwrap();
        assert_eq!(step.id, "step_1");
        assert_eq!(step.objectives[0].required_amount, 1);
        assert_eq!(step.objectives[0].target, ANY_TARGET);
        assert_eq!(step.rewards[0].reward_type(), RewardType::Item);
        assert_eq!(quest.rewards[0].monetary_value(), 100);
        assert_eq!(quest.reward_footprint(), 1);
    }

    #[test]
    fn test_rejects_unknown_objective_type() {
        let content = CATCH_QUEST.replace("type = \"catch\"", "type = \"dance\"");
        let err = QuestDefinition::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownObjectiveType { .. }));
    }

    #[test]
    fn test_rejects_duplicate_objectives() {
        let content = r#"
[quest]
id = "dupes"
name = "Dupes"

[[quest.steps]]
[[quest.steps.objectives]]
id = "a"
type = "talk"
target = "oak"

[[quest.steps]]
[[quest.steps.objectives]]
id = "a"
type = "talk"
target = "elm"
"#;
        let err = QuestDefinition::from_toml_str(content).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateObjective { .. }));
    }

    #[test]
    fn test_rejects_empty_quest() {
        let err = QuestDefinition::from_toml_str("[quest]\nid = \"x\"\nname = \"X\"\n").unwrap_err();
        assert!(matches!(err, DefinitionError::NoSteps(_)));
    }
}
