//! Delivery statistics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use super::message::MessageType;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeStats {
    pub delivered: u64,
    pub failed: u64,
    pub avg_delivery_ms: f64,
}

/// Point-in-time copy of the notifier counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationStats {
    pub delivered: u64,
    pub failed: u64,
    /// Rejected by the per-minute cap
    pub throttled: u64,
    /// Duplicates and preference-muted messages
    pub suppressed: u64,
    pub queued: u64,
    /// Pushed out of a full per-player queue
    pub dropped: u64,
    pub by_type: HashMap<MessageType, TypeStats>,
}

#[derive(Debug, Default)]
struct TypeCounter {
    delivered: u64,
    failed: u64,
    total_delivery_ms: f64,
}

#[derive(Debug, Default)]
pub struct StatsRecorder {
    delivered: AtomicU64,
    failed: AtomicU64,
    throttled: AtomicU64,
    suppressed: AtomicU64,
    queued: AtomicU64,
    dropped: AtomicU64,
    by_type: DashMap<MessageType, TypeCounter>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivery(&self, message_type: MessageType, success: bool, elapsed: Duration) {
        let mut counter = self.by_type.entry(message_type).or_default();
        if success {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            counter.delivered += 1;
            counter.total_delivery_ms += elapsed.as_secs_f64() * 1_000.0;
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            counter.failed += 1;
        }
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> NotificationStats {
        let by_type = self
            .by_type
            .iter()
            .map(|entry| {
                let counter = entry.value();
                let avg = if counter.delivered > 0 {
                    counter.total_delivery_ms / counter.delivered as f64
                } else {
                    0.0
                };
                (
                    *entry.key(),
                    TypeStats {
                        delivered: counter.delivered,
                        failed: counter.failed,
                        avg_delivery_ms: avg,
                    },
                )
            })
            .collect();

        NotificationStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            by_type,
        }
    }
}
