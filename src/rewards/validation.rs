//! Structural checks run on a reward bundle before anything is applied.

use crate::quest::{QuestReward, RewardKind};

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

fn positive(field: &str, value: i64) -> Result<(), String> {
    if value <= 0 {
        Err(format!("{} must be positive, got {}", field, value))
    } else {
        Ok(())
    }
}

fn duration_set(temporary: bool, duration_minutes: Option<u32>) -> Result<(), String> {
    match (temporary, duration_minutes) {
        (true, None) | (true, Some(0)) => Err("temporary reward needs a duration".to_string()),
        _ => Ok(()),
    }
}

/// Returns the reason the reward is malformed, if it is
pub fn validate_reward(reward: &QuestReward) -> Result<(), String> {
    match &reward.kind {
        RewardKind::Gold { amount } => positive("gold amount", *amount)?,
        RewardKind::Experience { amount } => positive("experience amount", *amount)?,
        RewardKind::Item { item_id, amount } => {
            non_empty("item_id", item_id)?;
            positive("item amount", *amount)?;
        }
        RewardKind::Pokemon {
            pokemon_id, level, ..
        } => {
            if *pokemon_id == 0 {
                return Err("pokemon_id must be positive".to_string());
            }
            if let Some(level) = level {
                if *level == 0 || *level > 100 {
                    return Err(format!("pokemon level {} out of range 1-100", level));
                }
            }
        }
        RewardKind::Badge { badge_id } => non_empty("badge_id", badge_id)?,
        RewardKind::Title { title_id } => non_empty("title_id", title_id)?,
        RewardKind::Access {
            area_id,
            temporary,
            duration_minutes,
        } => {
            non_empty("area_id", area_id)?;
            duration_set(*temporary, *duration_minutes)?;
        }
        RewardKind::Recipe { recipe_id } => non_empty("recipe_id", recipe_id)?,
        RewardKind::Move { move_id, .. } => non_empty("move_id", move_id)?,
        RewardKind::Unlock { feature_id } => non_empty("feature_id", feature_id)?,
        RewardKind::Boost {
            boost_id,
            multiplier,
            temporary,
            duration_minutes,
        } => {
            non_empty("boost_id", boost_id)?;
            if !multiplier.is_finite() || *multiplier <= 0.0 {
                return Err(format!("boost multiplier must be positive, got {}", multiplier));
            }
            duration_set(*temporary, *duration_minutes)?;
        }
        RewardKind::Cosmetic {
            cosmetic_id,
            temporary,
            duration_minutes,
            ..
        } => {
            non_empty("cosmetic_id", cosmetic_id)?;
            duration_set(*temporary, *duration_minutes)?;
        }
    }

    if let Some(conditions) = &reward.conditions {
        if let Some(chance) = conditions.chance {
            if !(0.0..=1.0).contains(&chance) {
                return Err(format!("chance {} outside 0.0-1.0", chance));
            }
        }
    }

    Ok(())
}
