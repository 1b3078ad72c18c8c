//! Quest Validator
//!
//! Decides whether a player can take a quest right now. Every check is run
//! and recorded (unless early exit is on), so a refusal always comes with
//! the list of reasons and suggestions.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::debug;

use super::cache::{CacheKey, ValidationCache};
use super::checks::{CheckKind, CheckRecord, PlayerSnapshot, ValidationResult};
use super::extended::{
    BadgeCheck, InventoryCheck, PartySizeCheck, RegionCheck, RequirementCheck, TemporalCheck,
};
use crate::clock::Clock;
use crate::config::ValidatorConfig;
use crate::quest::QuestDefinition;

/// A requirement check and whether it is switched on
struct ExtendedCheck {
    check: Arc<dyn RequirementCheck>,
    enabled: bool,
}

pub struct Validator {
    config: ValidatorConfig,
    clock: Arc<dyn Clock>,
    checks: Vec<ExtendedCheck>,
    cache: ValidationCache,
}

impl Validator {
    pub fn new(config: ValidatorConfig, clock: Arc<dyn Clock>) -> Self {
        let flags = &config.extended;
        let defaults: [(Arc<dyn RequirementCheck>, bool); 5] = [
            (Arc::new(BadgeCheck), flags.badges),
            (Arc::new(InventoryCheck), flags.inventory),
            (Arc::new(RegionCheck), flags.region),
            (Arc::new(TemporalCheck), flags.temporal),
            (Arc::new(PartySizeCheck), flags.party_size),
        ];
        let checks = defaults
            .into_iter()
            .map(|(check, enabled)| ExtendedCheck { check, enabled })
            .collect();

        Self {
            cache: ValidationCache::new(config.cache_ttl()),
            config,
            clock,
            checks,
        }
    }

    /// Add a custom requirement check to the end of the chain
    pub fn with_check(mut self, check: Arc<dyn RequirementCheck>) -> Self {
        self.checks.push(ExtendedCheck {
            check,
            enabled: true,
        });
        self
    }

    pub async fn can_take_quest(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> ValidationResult {
        let now = self.clock.now();
        let key = CacheKey::new(&definition.id, snapshot);

        if self.config.cache_enabled {
            if let Some(cached) = self.cache.get(&key, now) {
                debug!(player_id = %snapshot.player_id, quest_id = %definition.id, "Validation cache hit");
                return cached;
            }
        }

        let result = self.run_checks(definition, snapshot).await;

        // A cooldown answer changes with the clock alone
        if self.config.cache_enabled && result.cooldown_remaining.is_none() {
            self.cache.insert(key, result.clone(), now);
        }
        debug!(
            player_id = %snapshot.player_id,
            quest_id = %definition.id,
            valid = result.valid,
            failed = result.failed_checks.len(),
            "Validated quest"
        );
        result
    }

    async fn run_checks(
        &self,
        definition: &QuestDefinition,
        snapshot: &PlayerSnapshot,
    ) -> ValidationResult {
        let now = self.clock.now();
        let record = &snapshot.record;
        let profile = &snapshot.profile;
        let early_exit = self.config.early_exit;

        let mut checks = Vec::new();
        let mut cooldown_remaining = None;
        let mut level_required = None;
        let mut missing_prerequisites = Vec::new();

        macro_rules! push {
            ($check:expr) => {{
                let check: CheckRecord = $check;
                let blocking = check.is_blocking();
                checks.push(check);
                if blocking && early_exit {
                    return self.finish(
                        definition,
                        checks,
                        cooldown_remaining,
                        level_required,
                        missing_prerequisites,
                    );
                }
            }};
        }

        // 1. Not already active
        push!(match record.get_quest(&definition.id) {
            Some(_) => CheckRecord::failed(CheckKind::AlreadyActive, "Quest is already in progress")
                .with_suggestion(match &definition.giver_npc {
                    Some(npc) => format!("Finish it or turn it in to {}", npc),
                    None => "Finish the quest you already have".to_string(),
                }),
            None => CheckRecord::passed(CheckKind::AlreadyActive, "Quest is not active"),
        });

        // 2. Repeatable or never completed
        let completed = record.is_quest_completed(&definition.id);
        push!(if completed && !definition.is_repeatable {
            CheckRecord::failed(CheckKind::Repeatable, "Quest already completed")
        } else {
            CheckRecord::passed(CheckKind::Repeatable, "Quest can be taken")
        });

        // 3. Cooldown
        if let (true, Some(hours)) = (definition.is_repeatable, definition.cooldown_hours) {
            let check = match record.last_completed_at(&definition.id) {
                Some(last) => {
                    let cooldown = chrono::Duration::hours(hours as i64);
                    let elapsed = now - last;
                    if elapsed < cooldown {
                        let remaining = cooldown - elapsed;
                        // Round up to whole minutes
                        let minutes = (remaining.num_seconds() + 59) / 60;
                        cooldown_remaining = Some(minutes);
                        CheckRecord::failed(
                            CheckKind::Cooldown,
                            format!("Available again in {}", format_minutes(minutes)),
                        )
                        .with_values(elapsed.num_minutes(), cooldown.num_minutes())
                        .with_suggestion(format!("Come back in {}", format_minutes(minutes)))
                    } else {
                        CheckRecord::passed(CheckKind::Cooldown, "Cooldown has expired")
                    }
                }
                None => CheckRecord::passed(CheckKind::Cooldown, "Never completed"),
            };
            push!(check);
        }

        // 4. Prerequisites
        if !definition.prerequisites.is_empty() {
            missing_prerequisites = definition
                .prerequisites
                .iter()
                .filter(|id| !record.is_quest_completed(id))
                .cloned()
                .collect();
            let total = definition.prerequisites.len();
            let check = if missing_prerequisites.is_empty() {
                CheckRecord::passed(CheckKind::Prerequisites, "All prerequisites completed")
            } else {
                CheckRecord::failed(
                    CheckKind::Prerequisites,
                    format!("Missing prerequisites: {}", missing_prerequisites.join(", ")),
                )
                .with_values(total - missing_prerequisites.len(), total)
                .with_suggestion(format!("Complete {} first", missing_prerequisites.join(", ")))
            };
            push!(check);
        }

        // 5. Level
        let (min_level, max_level) = (definition.config.min_level, definition.config.max_level);
        if min_level.is_some() || max_level.is_some() {
            let level = profile.level;
            let expected = match (min_level, max_level) {
                (Some(min), Some(max)) => format!("{}-{}", min, max),
                (Some(min), None) => format!("{}+", min),
                (None, Some(max)) => format!("<= {}", max),
                (None, None) => String::new(),
            };
            let check = match (min_level, max_level) {
                (Some(min), _) if level < min => {
                    level_required = Some(min);
                    CheckRecord::failed(CheckKind::Level, format!("Requires level {}", min))
                        .with_values(level, expected)
                        .with_suggestion(format!("Gain {} more level(s)", min - level))
                }
                (_, Some(max)) if level > max => {
                    CheckRecord::failed(CheckKind::Level, format!("Only for level {} and below", max))
                        .with_values(level, expected)
                }
                _ => CheckRecord::passed(CheckKind::Level, "Level requirement met")
                    .with_values(level, expected),
            };
            push!(check);
        }

        // 6. Extended, feature-flagged
        for extended in &self.checks {
            if !extended.check.applies_to(definition) {
                continue;
            }
            let check = if extended.enabled {
                extended.check.evaluate(definition, snapshot).await
            } else {
                CheckRecord::not_configured(extended.check.kind())
            };
            push!(check);
        }

        self.finish(
            definition,
            checks,
            cooldown_remaining,
            level_required,
            missing_prerequisites,
        )
    }

    fn finish(
        &self,
        definition: &QuestDefinition,
        checks: Vec<CheckRecord>,
        cooldown_remaining: Option<i64>,
        level_required: Option<u32>,
        missing_prerequisites: Vec<String>,
    ) -> ValidationResult {
        let mut result = ValidationResult::from_checks(&definition.id, checks);
        result.cooldown_remaining = cooldown_remaining;
        result.level_required = level_required;
        result.missing_prerequisites = missing_prerequisites;
        result
    }

    /// Validate several quests for one player, results in input order.
    /// With `parallel`, up to `max_parallel` validations run at once.
    pub async fn validate_many(
        &self,
        definitions: &[Arc<QuestDefinition>],
        snapshot: &PlayerSnapshot,
        parallel: bool,
    ) -> Vec<ValidationResult> {
        if !parallel {
            let mut results = Vec::with_capacity(definitions.len());
            for definition in definitions {
                results.push(self.can_take_quest(definition, snapshot).await);
            }
            return results;
        }

        stream::iter(definitions)
            .map(|definition| self.can_take_quest(definition, snapshot))
            .buffered(self.config.max_parallel.max(1))
            .collect()
            .await
    }

    pub fn max_parallel(&self) -> usize {
        self.config.max_parallel
    }

    pub fn invalidate_player(&self, player_id: &str) {
        self.cache.invalidate_player(player_id);
    }

    pub fn cleanup_cache(&self) {
        self.cache.cleanup(self.clock.now());
    }
}

fn format_minutes(minutes: i64) -> String {
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{}m", minutes)
    }
}
