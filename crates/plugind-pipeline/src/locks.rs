// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-plugin run serialization.
//!
//! Runs touching the same `(namespace, name)` queue on one async mutex;
//! runs for different plugins never contend. Entries nobody holds or waits
//! on are dropped on the next `lock` call.

use std::sync::Arc;

use dashmap::DashMap;
use plugind_core::PluginKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<PluginKey, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`; released when the guard drops.
    pub async fn lock(&self, key: &PluginKey) -> OwnedMutexGuard<()> {
        // Holders and waiters own a clone, so a count of one means idle.
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_waits_for_release() {
        let locks = Arc::new(KeyLocks::new());
        let key = PluginKey::new("official", "admin-ui");

        let guard = locks.lock(&key).await;
        let contender = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&key).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locks = KeyLocks::new();
        for name in ["a", "b", "c"] {
            drop(locks.lock(&PluginKey::new("official", name)).await);
        }
        let held = locks.lock(&PluginKey::new("official", "d")).await;
        assert_eq!(locks.tracked(), 1);

        drop(held);
        let _e = locks.lock(&PluginKey::new("official", "e")).await;
        assert_eq!(locks.tracked(), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyLocks::new();
        let _a = locks.lock(&PluginKey::new("official", "a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&PluginKey::new("official", "b"))).await;
        assert!(b.is_ok());
    }
}
