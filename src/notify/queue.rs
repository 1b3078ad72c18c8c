//! Per-player priority queues drained by the flush timer.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::message::QuestClientMessage;

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub priority: u32,
    /// Insertion order, FIFO among equal priorities
    pub seq: u64,
    pub message: QuestClientMessage,
    /// Failed delivery attempts so far
    pub attempts: u32,
    /// Not eligible for delivery before this instant (retry backoff)
    pub not_before: Option<DateTime<Utc>>,
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedMessage {}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedMessage {
    // Max-heap: higher priority first, then lower seq first
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct MessageQueues {
    queues: DashMap<String, BinaryHeap<QueuedMessage>>,
    next_seq: AtomicU64,
    /// 0 means unbounded
    max_per_player: usize,
}

impl MessageQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(max_per_player: usize) -> Self {
        Self {
            max_per_player,
            ..Self::default()
        }
    }

    /// Queue a message. Returns the entry dropped to make room, which may be
    /// the new message itself when everything queued outranks it.
    pub fn push(&self, message: QuestClientMessage) -> Option<QueuedMessage> {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.insert(QueuedMessage {
            priority: message.queue_priority(),
            seq,
            message,
            attempts: 0,
            not_before: None,
        })
    }

    /// Put a message back after a failed delivery. Keeps its original seq.
    pub fn requeue(&self, entry: QueuedMessage) -> Option<QueuedMessage> {
        self.insert(entry)
    }

    fn insert(&self, entry: QueuedMessage) -> Option<QueuedMessage> {
        let mut heap = self
            .queues
            .entry(entry.message.player_id.clone())
            .or_default();
        heap.push(entry);
        if self.max_per_player == 0 || heap.len() <= self.max_per_player {
            return None;
        }

        // Lowest priority, newest among equals
        let mut entries = std::mem::take(&mut *heap).into_vec();
        let lowest = entries
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.cmp(b.1))
            .map(|(index, _)| index);
        let dropped = lowest.map(|index| entries.swap_remove(index));
        *heap = BinaryHeap::from(entries);
        dropped
    }

    /// Pop the highest-priority message that is due. Messages still in
    /// backoff stay queued.
    pub fn pop_due(&self, player_id: &str, now: DateTime<Utc>) -> Option<QueuedMessage> {
        let mut heap = self.queues.get_mut(player_id)?;
        let mut waiting = Vec::new();
        let mut found = None;

        while let Some(entry) = heap.pop() {
            match entry.not_before {
                Some(at) if at > now => waiting.push(entry),
                _ => {
                    found = Some(entry);
                    break;
                }
            }
        }
        heap.extend(waiting);
        found
    }

    /// Players with anything queued, sorted so the flush order is stable
    pub fn players(&self) -> Vec<String> {
        let mut players: Vec<String> = self
            .queues
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        players.sort();
        players
    }

    pub fn len(&self, player_id: &str) -> usize {
        self.queues.get(player_id).map(|heap| heap.len()).unwrap_or(0)
    }

    pub fn total_len(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Drop empty heaps
    pub fn prune(&self) {
        self.queues.retain(|_, heap| !heap.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::message::{ChannelType, DisplayOptions, MessageType, Priority, Theme};
    use chrono::Duration;

    fn message(player: &str, message_type: MessageType, text: &str) -> QuestClientMessage {
        QuestClientMessage::new(
            message_type,
            player,
            "t",
            text,
            DisplayOptions::new(ChannelType::Toast, Theme::Info, Priority::Normal),
        )
    }

    #[test]
    fn test_priority_then_fifo() {
        let queues = MessageQueues::new();
        queues.push(message("ash", MessageType::ObjectiveProgress, "a"));
        queues.push(message("ash", MessageType::QuestCompleted, "b"));
        queues.push(message("ash", MessageType::ObjectiveProgress, "c"));

        let now = Utc::now();
        let order: Vec<String> = std::iter::from_fn(|| queues.pop_due("ash", now))
            .map(|entry| entry.message.message)
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_backoff_entries_wait() {
        let queues = MessageQueues::new();
        let now = Utc::now();
        queues.push(message("ash", MessageType::ObjectiveProgress, "fresh"));

        let mut retry = queues.pop_due("ash", now).unwrap();
        retry.attempts = 1;
        retry.not_before = Some(now + Duration::seconds(2));
        queues.requeue(retry);
        queues.push(message("ash", MessageType::ObjectiveProgress, "later"));

        assert_eq!(queues.pop_due("ash", now).unwrap().message.message, "later");
        assert!(queues.pop_due("ash", now).is_none());
        assert_eq!(queues.len("ash"), 1);

        let due = queues.pop_due("ash", now + Duration::seconds(2)).unwrap();
        assert_eq!(due.message.message, "fresh");
        assert_eq!(due.attempts, 1);
    }

    #[test]
    fn test_bounded_queue_drops_lowest_priority() {
        let queues = MessageQueues::bounded(2);
        assert!(queues.push(message("ash", MessageType::ObjectiveProgress, "a")).is_none());
        assert!(queues.push(message("ash", MessageType::QuestCompleted, "done")).is_none());

        // Newest of the lowest priority goes first
        let dropped = queues
            .push(message("ash", MessageType::ObjectiveProgress, "b"))
            .unwrap();
        assert_eq!(dropped.message.message, "b");
        assert_eq!(queues.len("ash"), 2);

        let dropped = queues
            .push(message("ash", MessageType::QuestStarted, "start"))
            .unwrap();
        assert_eq!(dropped.message.message, "a");

        let now = Utc::now();
        let order: Vec<String> = std::iter::from_fn(|| queues.pop_due("ash", now))
            .map(|entry| entry.message.message)
            .collect();
        assert_eq!(order, vec!["done", "start"]);

        // Other players have their own bound
        assert!(queues.push(message("misty", MessageType::ObjectiveProgress, "m")).is_none());
    }

    #[test]
    fn test_players_listing() {
        let queues = MessageQueues::new();
        queues.push(message("misty", MessageType::QuestStarted, "x"));
        queues.push(message("ash", MessageType::QuestStarted, "y"));
        assert_eq!(queues.players(), vec!["ash", "misty"]);
        assert_eq!(queues.total_len(), 2);
    }
}
