//! TTL cache of validation results keyed by a player snapshot fingerprint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::checks::{PlayerSnapshot, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub quest_id: String,
    pub player_id: String,
    /// Hash of every snapshot input a check can read
    pub fingerprint: u64,
}

impl CacheKey {
    pub fn new(quest_id: &str, snapshot: &PlayerSnapshot) -> Self {
        Self {
            quest_id: quest_id.to_string(),
            player_id: snapshot.player_id.clone(),
            fingerprint: fingerprint(snapshot),
        }
    }
}

/// Profile fields plus the quest-record state the checks look at
fn fingerprint(snapshot: &PlayerSnapshot) -> u64 {
    let mut hasher = DefaultHasher::new();
    snapshot.profile.hash(&mut hasher);

    let record = &snapshot.record;
    record.version.hash(&mut hasher);
    for progress in &record.active_quests {
        progress.quest_id.hash(&mut hasher);
        progress.status.hash(&mut hasher);
        progress.current_step_index.hash(&mut hasher);
    }
    for completed in &record.completed_quests {
        completed.quest_id.hash(&mut hasher);
        completed.completed_at.hash(&mut hasher);
    }
    hasher.finish()
}

pub struct ValidationCache {
    entries: DashMap<CacheKey, (ValidationResult, DateTime<Utc>)>,
    ttl: Duration,
}

impl ValidationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<ValidationResult> {
        {
            let entry = self.entries.get(key)?;
            let (result, stored_at) = entry.value();
            if now - *stored_at < self.ttl {
                return Some(result.clone());
            }
        }
        // Expired; the read guard is gone before removing
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: CacheKey, result: ValidationResult, now: DateTime<Utc>) {
        self.entries.insert(key, (result, now));
    }

    /// Drop everything cached for a player (their quest state changed)
    pub fn invalidate_player(&self, player_id: &str) {
        self.entries.retain(|key, _| key.player_id != player_id);
    }

    pub fn cleanup(&self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, stored_at)| now - *stored_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
