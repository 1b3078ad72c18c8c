//! Feature-flagged requirement checks.
//!
//! Each check is a pluggable `RequirementCheck`. The validator only runs a
//! check for quests it applies to; a check that applies but is switched off
//! reports `NotConfigured` instead of passing silently.

use async_trait::async_trait;

use super::checks::{CheckKind, CheckRecord, PlayerSnapshot};
use crate::quest::QuestDefinition;

#[async_trait]
pub trait RequirementCheck: Send + Sync {
    fn kind(&self) -> CheckKind;

    /// Whether the quest has a requirement this check evaluates
    fn applies_to(&self, definition: &QuestDefinition) -> bool;

    async fn evaluate(&self, definition: &QuestDefinition, snapshot: &PlayerSnapshot)
    -> CheckRecord;
}

/// Player owns every badge the quest asks for
pub struct BadgeCheck;

#[async_trait]
impl RequirementCheck for BadgeCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Badges
    }

    fn applies_to(&self, definition: &QuestDefinition) -> bool {
        !definition.config.required_badges.is_empty()
    }

    async fn evaluate(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> CheckRecord {
        let missing: Vec<&String> = definition
            .config
            .required_badges
            .iter()
            .filter(|b| !snapshot.profile.badges.contains(b))
            .collect();

        if missing.is_empty() {
            return CheckRecord::passed(self.kind(), "All required badges owned");
        }
        let names = missing
            .iter()
            .map(|b| b.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        CheckRecord::failed(self.kind(), format!("Missing badges: {}", names))
            .with_values(
                snapshot.profile.badges.len(),
                definition.config.required_badges.len(),
            )
            .with_suggestion(format!("Earn the {} badge(s) first", names))
    }
}

/// Enough free bag slots for the item rewards. Advisory only.
pub struct InventoryCheck;

#[async_trait]
impl RequirementCheck for InventoryCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Inventory
    }

    fn applies_to(&self, definition: &QuestDefinition) -> bool {
        definition.reward_footprint() > 0
    }

    async fn evaluate(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> CheckRecord {
        let needed = definition.reward_footprint();
        let Some(free) = snapshot.profile.free_inventory_slots else {
            return CheckRecord::not_configured(self.kind());
        };

        if free >= needed {
            CheckRecord::passed(self.kind(), "Enough inventory space")
                .with_values(free, needed)
                .optional()
        } else {
            CheckRecord::failed(
                self.kind(),
                format!("Rewards need {} free slots, you have {}", needed, free),
            )
            .with_values(free, needed)
            .with_suggestion("Free up some inventory space before finishing")
            .optional()
        }
    }
}

/// Quest is locked to a region the player must be in
pub struct RegionCheck;

#[async_trait]
impl RequirementCheck for RegionCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Region
    }

    fn applies_to(&self, definition: &QuestDefinition) -> bool {
        definition.config.region_lock.is_some()
    }

    async fn evaluate(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> CheckRecord {
        let Some(region) = &definition.config.region_lock else {
            return CheckRecord::passed(self.kind(), "No region lock");
        };
        let current = snapshot.profile.location.as_deref().unwrap_or("unknown");

        if current == region {
            CheckRecord::passed(self.kind(), format!("In {}", region))
        } else {
            CheckRecord::failed(self.kind(), format!("Only available in {}", region))
                .with_values(current, region)
                .with_suggestion(format!("Travel to {}", region))
        }
    }
}

/// Time of day, weather and season windows
pub struct TemporalCheck;

#[async_trait]
impl RequirementCheck for TemporalCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::Temporal
    }

    fn applies_to(&self, definition: &QuestDefinition) -> bool {
        let config = &definition.config;
        !config.time_of_day.is_empty() || !config.weather.is_empty() || !config.seasons.is_empty()
    }

    async fn evaluate(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> CheckRecord {
        let config = &definition.config;
        let world = &snapshot.profile.world;

        if !config.time_of_day.is_empty()
            && !world.time_of_day.is_some_and(|t| config.time_of_day.contains(&t))
        {
            return CheckRecord::failed(self.kind(), "Not available at this time of day")
                .with_values(format!("{:?}", world.time_of_day), format!("{:?}", config.time_of_day))
                .with_suggestion("Come back at a different time of day");
        }
        if !config.weather.is_empty() && !world.weather.is_some_and(|w| config.weather.contains(&w))
        {
            return CheckRecord::failed(self.kind(), "Not available in this weather")
                .with_values(format!("{:?}", world.weather), format!("{:?}", config.weather))
                .with_suggestion("Wait for the weather to change");
        }
        if !config.seasons.is_empty() && !world.season.is_some_and(|s| config.seasons.contains(&s))
        {
            return CheckRecord::failed(self.kind(), "Not available this season")
                .with_values(format!("{:?}", world.season), format!("{:?}", config.seasons));
        }
        CheckRecord::passed(self.kind(), "Conditions are right")
    }
}

/// Party size within the quest's bounds
pub struct PartySizeCheck;

#[async_trait]
impl RequirementCheck for PartySizeCheck {
    fn kind(&self) -> CheckKind {
        CheckKind::PartySize
    }

    fn applies_to(&self, definition: &QuestDefinition) -> bool {
        definition.metadata.min_party_size.is_some() || definition.metadata.max_party_size.is_some()
    }

    async fn evaluate(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> CheckRecord {
        let size = snapshot.profile.party_size;
        let min = definition.metadata.min_party_size.unwrap_or(1);
        let max = definition.metadata.max_party_size.unwrap_or(u32::MAX);
        let expected = match definition.metadata.max_party_size {
            Some(max) => format!("{}-{}", min, max),
            None => format!("{}+", min),
        };

        if size < min {
            CheckRecord::failed(self.kind(), format!("Needs a party of at least {}", min))
                .with_values(size, expected)
                .with_suggestion("Invite more players to your party")
        } else if size > max {
            CheckRecord::failed(self.kind(), format!("Party can have at most {} members", max))
                .with_values(size, expected)
                .with_suggestion("Reduce your party size")
        } else {
            CheckRecord::passed(self.kind(), "Party size ok").with_values(size, expected)
        }
    }
}
