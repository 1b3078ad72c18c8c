//! Per-player write serialization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per player. Holding the guard makes the caller the
/// single writer of that player's quest record within this process.
#[derive(Debug, Default)]
pub struct PlayerLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, player_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await
        let lock = self
            .locks
            .entry(player_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody is holding or waiting on
    pub fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_player_serialized() {
        let locks = Arc::new(PlayerLocks::new());
        let guard = locks.lock("ash").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("ash").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_players_independent() {
        let locks = PlayerLocks::new();
        let _ash = locks.lock("ash").await;
        let misty = tokio::time::timeout(Duration::from_millis(100), locks.lock("misty")).await;
        assert!(misty.is_ok());
    }

    #[tokio::test]
    async fn test_prune_released() {
        let locks = PlayerLocks::new();
        {
            let _guard = locks.lock("ash").await;
            locks.prune();
            assert_eq!(locks.len(), 1);
        }
        locks.prune();
        assert!(locks.is_empty());
    }
}
