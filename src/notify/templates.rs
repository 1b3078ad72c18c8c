//! Builders for the player-facing messages of each lifecycle event.

use super::message::{
    ChannelType, DisplayOptions, MessageAction, MessageType, Priority, QuestClientMessage, Theme,
};
use crate::progress::QuestUpdateResult;
use crate::quest::QuestDefinition;
use crate::rewards::RewardDistributionResult;

fn display(channel: ChannelType, theme: Theme, priority: Priority) -> DisplayOptions {
    DisplayOptions::new(channel, theme, priority)
}

fn sticky(mut options: DisplayOptions) -> DisplayOptions {
    options.duration_ms = None;
    options.persistent = true;
    options
}

pub fn quest_started(player_id: &str, definition: &QuestDefinition) -> QuestClientMessage {
    let mut options = display(ChannelType::Banner, Theme::Info, Priority::High);
    options.duration_ms = Some(5_000);
    options.sound = Some("quest_start".to_string());

    let first_objective = definition
        .step(0)
        .and_then(|step| step.objectives.first())
        .map(|objective| objective.description.clone())
        .unwrap_or_default();

    QuestClientMessage::new(
        MessageType::QuestStarted,
        player_id,
        "Quest Started",
        definition.name.clone(),
        options,
    )
    .for_quest(&definition.id)
    .with_action(
        MessageAction::new("track", "Track", "track_quest").with_param("quest_id", definition.id.clone()),
    )
    .with_data("description", definition.description.clone())
    .with_data("first_objective", first_objective)
    .with_data("total_steps", definition.step_count())
}

/// `reasons` are the failed-check messages, `suggestions` the hints
pub fn quest_unavailable(
    player_id: &str,
    definition: &QuestDefinition,
    reasons: &[String],
    suggestions: &[String],
) -> QuestClientMessage {
    let text = if reasons.is_empty() {
        format!("{} is not available right now", definition.name)
    } else {
        reasons.join("; ")
    };
    QuestClientMessage::new(
        MessageType::QuestUnavailable,
        player_id,
        format!("Can't start {}", definition.name),
        text,
        display(ChannelType::Toast, Theme::Warning, Priority::Normal),
    )
    .for_quest(&definition.id)
    .with_data("suggestions", suggestions.to_vec())
}

pub fn objective_progress(player_id: &str, update: &QuestUpdateResult) -> QuestClientMessage {
    let mut options = display(ChannelType::Sidebar, Theme::Info, Priority::Low);
    options.duration_ms = Some(3_000);

    let mut message = QuestClientMessage::new(
        MessageType::ObjectiveProgress,
        player_id,
        update.quest_name.clone(),
        format!("{} {}", update.objective_description, update.progress_text()),
        options,
    )
    .for_quest(&update.quest_id)
    .with_data("current", update.current_amount)
    .with_data("required", update.required_amount);
    message.objective_id = Some(update.objective_id.clone());
    message
}

pub fn objective_completed(player_id: &str, update: &QuestUpdateResult) -> QuestClientMessage {
    let mut message = QuestClientMessage::new(
        MessageType::ObjectiveCompleted,
        player_id,
        "Objective Complete",
        update.objective_description.clone(),
        display(ChannelType::Toast, Theme::Success, Priority::Normal),
    )
    .for_quest(&update.quest_id);
    message.objective_id = Some(update.objective_id.clone());
    message
}

pub fn step_completed(player_id: &str, update: &QuestUpdateResult) -> QuestClientMessage {
    let mut options = display(ChannelType::Banner, Theme::Success, Priority::High);
    options.animation = Some("step_complete".to_string());

    let mut message = QuestClientMessage::new(
        MessageType::StepCompleted,
        player_id,
        update.quest_name.clone(),
        format!(
            "Step {} of {} complete",
            update.current_step_index, update.total_steps
        ),
        options,
    )
    .for_quest(&update.quest_id)
    .with_data("current_step_index", update.current_step_index)
    .with_data(
        "new_objectives",
        serde_json::to_value(&update.new_objectives).unwrap_or_default(),
    );
    message.step_id = update.completed_step_id.clone();
    message
}

pub fn quest_ready(
    player_id: &str,
    update: &QuestUpdateResult,
    giver_npc: Option<&str>,
) -> QuestClientMessage {
    let text = match giver_npc {
        Some(npc) => format!("Return to {} to complete {}", npc, update.quest_name),
        None => format!("{} is ready to turn in", update.quest_name),
    };
    let mut action = MessageAction::new("turn_in", "Turn In", "turn_in_quest")
        .with_param("quest_id", update.quest_id.clone());
    if let Some(npc) = giver_npc {
        action = action.with_param("npc_id", npc);
    }

    QuestClientMessage::new(
        MessageType::QuestReadyToComplete,
        player_id,
        "Quest Ready",
        text,
        sticky(display(ChannelType::Popup, Theme::Success, Priority::High)),
    )
    .for_quest(&update.quest_id)
    .with_action(action)
}

pub fn quest_completed(player_id: &str, quest_id: &str, quest_name: &str) -> QuestClientMessage {
    let mut options = sticky(display(ChannelType::Modal, Theme::Reward, Priority::Urgent));
    options.animation = Some("celebrate".to_string());
    options.sound = Some("quest_complete".to_string());

    QuestClientMessage::new(
        MessageType::QuestCompleted,
        player_id,
        "Quest Complete!",
        quest_name.to_string(),
        options,
    )
    .for_quest(quest_id)
    .with_action(MessageAction::new("close", "Continue", "dismiss"))
}

pub fn quest_failed(player_id: &str, definition: &QuestDefinition, reason: &str) -> QuestClientMessage {
    QuestClientMessage::new(
        MessageType::QuestFailed,
        player_id,
        format!("{} Failed", definition.name),
        reason.to_string(),
        display(ChannelType::Modal, Theme::Error, Priority::High),
    )
    .for_quest(&definition.id)
}

pub fn quest_abandoned(player_id: &str, definition: &QuestDefinition) -> QuestClientMessage {
    QuestClientMessage::new(
        MessageType::QuestAbandoned,
        player_id,
        "Quest Abandoned",
        definition.name.clone(),
        display(ChannelType::Toast, Theme::Warning, Priority::Normal),
    )
    .for_quest(&definition.id)
}

/// `None` if nothing was distributed
pub fn rewards_received(
    player_id: &str,
    quest_id: &str,
    result: &RewardDistributionResult,
) -> Option<QuestClientMessage> {
    if result.distributed_rewards.is_empty() {
        return None;
    }
    let summary = result.summary();
    Some(
        QuestClientMessage::new(
            MessageType::RewardReceived,
            player_id,
            "Rewards",
            summary.join(", "),
            display(ChannelType::Toast, Theme::Reward, Priority::High),
        )
        .for_quest(quest_id)
        .with_data("rewards", summary)
        .with_data("total_value", result.total_value),
    )
}

/// `None` if nothing failed
pub fn reward_failed(
    player_id: &str,
    quest_id: &str,
    result: &RewardDistributionResult,
) -> Option<QuestClientMessage> {
    if result.failed_rewards.is_empty() {
        return None;
    }
    let text = format!(
        "{} reward(s) could not be delivered",
        result.failed_rewards.len()
    );
    let mut message = QuestClientMessage::new(
        MessageType::RewardFailed,
        player_id,
        "Reward Problem",
        text,
        display(ChannelType::Toast, Theme::Error, Priority::High),
    )
    .for_quest(quest_id)
    .with_data(
        "reasons",
        result
            .failed_rewards
            .iter()
            .map(|f| f.reason.clone())
            .collect::<Vec<_>>(),
    );
    if result.retryable_failures().next().is_some() {
        message = message.with_action(
            MessageAction::new("retry", "Retry", "retry_rewards")
                .with_param("request_id", result.request_id.to_string()),
        );
    }
    Some(message)
}

pub fn system_message(player_id: &str, text: impl Into<String>) -> QuestClientMessage {
    QuestClientMessage::new(
        MessageType::SystemMessage,
        player_id,
        "System",
        text,
        display(ChannelType::Banner, Theme::Error, Priority::Urgent),
    )
}

/// Fold distribution outcomes into a lifecycle message so the player gets
/// one notification per update
pub fn with_rewards<'a>(
    mut message: QuestClientMessage,
    results: impl IntoIterator<Item = &'a RewardDistributionResult>,
) -> QuestClientMessage {
    let mut granted = Vec::new();
    let mut failed = Vec::new();
    let mut total_value = 0;
    let mut retryable = Vec::new();

    for result in results {
        granted.extend(result.summary());
        failed.extend(result.failed_rewards.iter().map(|f| f.reason.clone()));
        total_value += result.total_value;
        if result.retryable_failures().next().is_some() {
            retryable.push(result.request_id);
        }
    }
    if granted.is_empty() && failed.is_empty() {
        return message;
    }

    if !granted.is_empty() {
        message.message = format!("{} (Rewards: {})", message.message, granted.join(", "));
        message = message
            .with_data("rewards", granted)
            .with_data("total_value", total_value);
    }
    if !failed.is_empty() {
        message.message = format!(
            "{}. {} reward(s) could not be delivered",
            message.message,
            failed.len()
        );
        message = message.with_data("failed_rewards", failed);
    }
    for request_id in retryable {
        message = message.with_action(
            MessageAction::new("retry", "Retry", "retry_rewards")
                .with_param("request_id", request_id.to_string()),
        );
    }
    message
}

/// The single message a progress update produces, carrying any step or
/// quest rewards it earned
pub fn from_update(
    player_id: &str,
    update: &QuestUpdateResult,
    giver_npc: Option<&str>,
) -> QuestClientMessage {
    let message = if update.quest_completed {
        quest_completed(player_id, &update.quest_id, &update.quest_name)
    } else if update.requires_npc_return {
        quest_ready(player_id, update, giver_npc)
    } else if update.step_completed {
        step_completed(player_id, update)
    } else if update.objective_completed {
        objective_completed(player_id, update)
    } else {
        objective_progress(player_id, update)
    };

    with_rewards(
        message,
        [&update.step_rewards, &update.quest_rewards].into_iter().flatten(),
    )
}
