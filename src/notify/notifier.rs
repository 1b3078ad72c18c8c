//! Client Notifier
//!
//! Delivers `QuestClientMessage`s to players. Each message goes through
//! duplicate suppression, the per-player rate limit and the player's
//! display preferences, then is either sent right away or queued for the
//! flush timer depending on the configured delivery mode.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::message::QuestClientMessage;
use super::preferences::NotificationPreferences;
use super::queue::{MessageQueues, QueuedMessage};
use super::rate_limit::{DuplicateFilter, RateLimiter};
use super::stats::{NotificationStats, StatsRecorder};
use crate::clock::Clock;
use crate::config::{DeliveryMode, NotifierConfig};
use crate::error::TransportError;
use crate::ports::NotificationTransport;

/// One delivery attempt, kept for replay and debugging
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub message: QuestClientMessage,
    pub delivered: bool,
    pub attempted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub total: usize,
    /// Delivered, queued or benignly suppressed
    pub accepted: usize,
    /// Throttled or failed
    pub rejected: usize,
    /// Per-message outcome, in input order
    pub results: Vec<bool>,
}

pub struct ClientNotifier {
    config: NotifierConfig,
    transport: Arc<dyn NotificationTransport>,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    duplicates: DuplicateFilter,
    preferences: DashMap<String, NotificationPreferences>,
    queues: MessageQueues,
    stats: StatsRecorder,
    history: DashMap<String, VecDeque<HistoryEntry>>,
    /// Rotates which player the flush starts with
    flush_cursor: AtomicUsize,
}

impl ClientNotifier {
    pub fn new(
        config: NotifierConfig,
        transport: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            limiter: RateLimiter::per_minute(config.max_per_minute),
            duplicates: DuplicateFilter::new(config.duplicate_window()),
            queues: MessageQueues::bounded(config.max_queue_per_player),
            config,
            transport,
            clock,
            preferences: DashMap::new(),
            stats: StatsRecorder::new(),
            history: DashMap::new(),
            flush_cursor: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn set_preferences(&self, player_id: &str, preferences: NotificationPreferences) {
        self.preferences.insert(player_id.to_string(), preferences);
    }

    pub fn preferences(&self, player_id: &str) -> NotificationPreferences {
        self.preferences
            .get(player_id)
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Deliver (or queue) one message.
    ///
    /// Returns true if the message was delivered, queued, or suppressed as a
    /// duplicate / by preferences. Returns false if it was throttled or the
    /// transport failed.
    pub async fn notify(&self, player_id: &str, mut message: QuestClientMessage) -> bool {
        let now = self.clock.now();
        message.player_id = player_id.to_string();
        message.created_at = now;

        let key = message.dedup_key();
        if self.duplicates.check_and_mark(player_id, &key, now) {
            debug!(player_id, kind = message.message_type.as_str(), "Suppressed duplicate message");
            self.stats.record_suppressed();
            return true;
        }

        let Some(message) = self.preferences(player_id).personalize(message) else {
            debug!(player_id, "Message muted by player preferences");
            self.stats.record_suppressed();
            return true;
        };

        match self.config.mode {
            DeliveryMode::Immediate => {
                if !self.limiter.try_acquire(player_id, now) {
                    self.throttle(player_id, &message);
                    return false;
                }
                match self.deliver(&message).await {
                    Ok(()) => true,
                    Err(_) => {
                        self.limiter.release(player_id, now);
                        self.duplicates.forget(player_id, &key);
                        false
                    }
                }
            }
            DeliveryMode::Queued => {
                if self.limiter.is_limited(player_id, now) {
                    self.throttle(player_id, &message);
                    return false;
                }
                self.stats.record_queued();
                if let Some(dropped) = self.queues.push(message) {
                    self.drop_queued(&dropped);
                }
                true
            }
        }
    }

    fn drop_queued(&self, entry: &QueuedMessage) {
        let message = &entry.message;
        warn!(
            player_id = %message.player_id,
            kind = message.message_type.as_str(),
            "Notification queue full, dropping lowest-priority message"
        );
        self.duplicates.forget(&message.player_id, &message.dedup_key());
        self.stats.record_dropped();
    }

    fn throttle(&self, player_id: &str, message: &QuestClientMessage) {
        debug!(
            player_id,
            kind = message.message_type.as_str(),
            "Rate limited, dropping message"
        );
        self.duplicates.forget(player_id, &message.dedup_key());
        self.stats.record_throttled();
    }

    /// Notify each message to its own `player_id`
    pub async fn notify_batch(&self, messages: Vec<QuestClientMessage>) -> BatchResult {
        let mut batch = BatchResult {
            total: messages.len(),
            ..Default::default()
        };
        for message in messages {
            let player_id = message.player_id.clone();
            let ok = self.notify(&player_id, message).await;
            if ok {
                batch.accepted += 1;
            } else {
                batch.rejected += 1;
            }
            batch.results.push(ok);
        }
        batch
    }

    async fn send(&self, message: &QuestClientMessage) -> Result<(), TransportError> {
        let payload = serde_json::to_value(message)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        let timeout = self.config.delivery_timeout();
        match tokio::time::timeout(
            timeout,
            self.transport
                .send(&message.player_id, message.display.channel, &payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// One transport attempt, recorded in stats and history
    async fn deliver(&self, message: &QuestClientMessage) -> Result<(), TransportError> {
        let started = Instant::now();
        let result = self.send(message).await;
        let elapsed = started.elapsed();

        self.stats
            .record_delivery(message.message_type, result.is_ok(), elapsed);
        if let Err(e) = &result {
            warn!(
                player_id = %message.player_id,
                kind = message.message_type.as_str(),
                "Delivery failed: {}",
                e
            );
        }
        self.record_history(HistoryEntry {
            message: message.clone(),
            delivered: result.is_ok(),
            attempted_at: self.clock.now(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    fn record_history(&self, entry: HistoryEntry) {
        let limit = self.config.history_limit.max(1);
        let mut entries = self
            .history
            .entry(entry.message.player_id.clone())
            .or_default();
        entries.push_back(entry);
        while entries.len() > limit {
            entries.pop_front();
        }
    }

    pub fn history(&self, player_id: &str) -> Vec<HistoryEntry> {
        self.history
            .get(player_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> NotificationStats {
        self.stats.snapshot()
    }

    pub fn queued(&self, player_id: &str) -> usize {
        self.queues.len(player_id)
    }

    fn retry_delay(&self, attempts: u32) -> Duration {
        let base = Duration::from_millis(self.config.retry_base_delay_ms);
        base.saturating_mul(2u32.saturating_pow(attempts.saturating_sub(1)))
    }

    /// Drain queued messages: up to `batch_size` per player, players taken
    /// round-robin starting one further each tick. A player at the rate
    /// limit keeps the rest of their queue for a later tick. Returns the
    /// number of messages delivered.
    pub async fn flush_queues(&self) -> usize {
        let players = self.queues.players();
        if players.is_empty() {
            return 0;
        }

        let start = self.flush_cursor.fetch_add(1, Ordering::Relaxed) % players.len();
        let mut delivered = 0;

        for i in 0..players.len() {
            let player_id = &players[(start + i) % players.len()];
            delivered += self.flush_player(player_id).await;
        }

        self.queues.prune();
        delivered
    }

    async fn flush_player(&self, player_id: &str) -> usize {
        let mut delivered = 0;

        for _ in 0..self.config.batch_size {
            let now = self.clock.now();
            if !self.limiter.try_acquire(player_id, now) {
                debug!(player_id, queued = self.queues.len(player_id), "Rate limit reached, deferring queue");
                break;
            }
            let Some(mut entry) = self.queues.pop_due(player_id, now) else {
                self.limiter.release(player_id, now);
                break;
            };

            match self.deliver(&entry.message).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    self.limiter.release(player_id, now);
                    self.handle_failed_entry(&mut entry, now);
                }
            }
        }

        delivered
    }

    fn handle_failed_entry(&self, entry: &mut QueuedMessage, now: DateTime<Utc>) {
        entry.attempts += 1;
        if entry.attempts <= self.config.max_delivery_retries {
            let delay = self.retry_delay(entry.attempts);
            entry.not_before = chrono::Duration::from_std(delay)
                .ok()
                .map(|d| now + d);
            debug!(
                player_id = %entry.message.player_id,
                attempts = entry.attempts,
                ?delay,
                "Requeueing failed message"
            );
            if let Some(dropped) = self.queues.requeue(entry.clone()) {
                self.drop_queued(&dropped);
            }
        } else {
            warn!(
                player_id = %entry.message.player_id,
                kind = entry.message.message_type.as_str(),
                "Giving up on message after {} attempts",
                entry.attempts
            );
            self.duplicates
                .forget(&entry.message.player_id, &entry.message.dedup_key());
        }
    }

    /// Drop expired rate-limit and duplicate entries
    pub fn cleanup(&self) {
        let now = self.clock.now();
        self.limiter.cleanup(now);
        self.duplicates.cleanup(now);
    }

    /// Spawn the periodic queue flush
    pub fn start_flush_loop(self: Arc<Self>) -> JoinHandle<()> {
        let interval_duration = self.config.flush_interval();
        info!("Starting notification flush loop every {:?}", interval_duration);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            let mut ticks: u64 = 0;
            loop {
                interval.tick().await;
                let delivered = self.flush_queues().await;
                if delivered > 0 {
                    debug!(delivered, "Flushed notification queues");
                }
                ticks += 1;
                // Periodic housekeeping
                if ticks % 120 == 0 {
                    self.cleanup();
                }
            }
        })
    }
}
