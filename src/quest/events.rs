//! Quest Event Types
//!
//! Gameplay events that can advance quest objectives, plus the world
//! context extended objective conditions are checked against.

use serde::{Deserialize, Serialize};

use super::definition::ObjectiveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    Sunny,
    Cloudy,
    Rain,
    Storm,
    Snow,
    Fog,
    Sandstorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Day,
    Evening,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

/// Current world conditions as seen by one player
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldState {
    pub weather: Option<Weather>,
    pub time_of_day: Option<TimeOfDay>,
    pub season: Option<Season>,
}

/// Attributes of the pokemon involved in an event (caught, encountered,
/// defeated)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PokemonInfo {
    pub species_id: String,
    pub types: Vec<String>,
    pub level: u32,
    pub shiny: bool,
}

/// World/battle context attached to an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventContext {
    #[serde(flatten)]
    pub world: WorldState,
    pub location_id: Option<String>,
    pub pokemon: Option<PokemonInfo>,
}

fn default_amount() -> u32 {
    1
}

/// The gameplay action behind an event, one variant per objective type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressAction {
    /// Player picked up items
    Collect {
        item_id: String,
        #[serde(default = "default_amount")]
        amount: u32,
    },
    /// Player defeated a trainer or a wild pokemon
    Defeat {
        target_id: String,
        #[serde(default)]
        wild: bool,
        #[serde(default = "default_amount")]
        amount: u32,
    },
    Talk {
        npc_id: String,
    },
    Reach {
        location_id: String,
    },
    /// Player handed items to an NPC
    Deliver {
        item_id: String,
        npc_id: String,
        #[serde(default = "default_amount")]
        amount: u32,
    },
    Catch {
        pokemon_id: String,
    },
    Encounter {
        pokemon_id: String,
    },
    Use {
        item_id: String,
        #[serde(default = "default_amount")]
        amount: u32,
    },
    /// Player won a battle against an opponent
    Win {
        opponent_id: String,
    },
    Explore {
        area_id: String,
    },
}

impl ProgressAction {
    pub fn objective_type(&self) -> ObjectiveType {
        match self {
            ProgressAction::Collect { .. } => ObjectiveType::Collect,
            ProgressAction::Defeat { .. } => ObjectiveType::Defeat,
            ProgressAction::Talk { .. } => ObjectiveType::Talk,
            ProgressAction::Reach { .. } => ObjectiveType::Reach,
            ProgressAction::Deliver { .. } => ObjectiveType::Deliver,
            ProgressAction::Catch { .. } => ObjectiveType::Catch,
            ProgressAction::Encounter { .. } => ObjectiveType::Encounter,
            ProgressAction::Use { .. } => ObjectiveType::Use,
            ProgressAction::Win { .. } => ObjectiveType::Win,
            ProgressAction::Explore { .. } => ObjectiveType::Explore,
        }
    }

    /// The id an objective's `target` is compared against
    pub fn target_id(&self) -> &str {
        match self {
            ProgressAction::Collect { item_id, .. } => item_id,
            ProgressAction::Defeat { target_id, .. } => target_id,
            ProgressAction::Talk { npc_id } => npc_id,
            ProgressAction::Reach { location_id } => location_id,
            ProgressAction::Deliver { item_id, .. } => item_id,
            ProgressAction::Catch { pokemon_id } => pokemon_id,
            ProgressAction::Encounter { pokemon_id } => pokemon_id,
            ProgressAction::Use { item_id, .. } => item_id,
            ProgressAction::Win { opponent_id } => opponent_id,
            ProgressAction::Explore { area_id } => area_id,
        }
    }

    pub fn amount(&self) -> u32 {
        match self {
            ProgressAction::Collect { amount, .. }
            | ProgressAction::Defeat { amount, .. }
            | ProgressAction::Deliver { amount, .. }
            | ProgressAction::Use { amount, .. } => *amount,
            _ => 1,
        }
    }

    pub fn npc_id(&self) -> Option<&str> {
        match self {
            ProgressAction::Talk { npc_id } | ProgressAction::Deliver { npc_id, .. } => {
                Some(npc_id)
            }
            _ => None,
        }
    }
}

/// A gameplay event submitted for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestProgressEvent {
    #[serde(flatten)]
    pub action: ProgressAction,
    #[serde(default)]
    pub context: EventContext,
}

impl QuestProgressEvent {
    pub fn new(action: ProgressAction) -> Self {
        Self {
            action,
            context: EventContext::default(),
        }
    }

    pub fn with_context(mut self, context: EventContext) -> Self {
        self.context = context;
        self
    }

    /// Event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        self.action.objective_type().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event: QuestProgressEvent =
            serde_json::from_str(r#"{"type":"catch","pokemon_id":"25"}"#).unwrap();
        assert_eq!(
            event.action,
            ProgressAction::Catch {
                pokemon_id: "25".to_string()
            }
        );
        assert_eq!(event.action.amount(), 1);
        assert_eq!(event.event_type(), "catch");
    }

    #[test]
    fn test_event_with_context() {
        let event: QuestProgressEvent = serde_json::from_str(
            r#"{
                "type": "collect",
                "item_id": "oran_berry",
                "amount": 3,
                "context": {"weather": "rain", "time_of_day": "night", "location_id": "route_1"}
            }"#,
        )
        .unwrap();
        assert_eq!(event.action.amount(), 3);
        assert_eq!(event.action.target_id(), "oran_berry");
        assert_eq!(event.context.world.weather, Some(Weather::Rain));
        assert_eq!(event.context.world.time_of_day, Some(TimeOfDay::Night));
        assert_eq!(event.context.location_id.as_deref(), Some("route_1"));
    }

    #[test]
    fn test_deliver_exposes_npc() {
        let action = ProgressAction::Deliver {
            item_id: "parcel".into(),
            npc_id: "prof_oak".into(),
            amount: 1,
        };
        assert_eq!(action.npc_id(), Some("prof_oak"));
        assert_eq!(action.objective_type(), ObjectiveType::Deliver);
    }
}
