//! Per-key async mutexes.
//!
//! A [`KeyedLocks`] hands out one `tokio` mutex per id, so work on different
//! cards never contends while two writers on the same card run one at a time.
//! Entries nobody holds or waits on are pruned on the next acquisition.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct KeyedLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    fn slot(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|key, slot| *key == id || Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(id).or_default())
    }

    pub(crate) async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        self.slot(id).lock_owned().await
    }

    /// Lock every id in ascending order.
    pub(crate) async fn lock_all(&self, ids: &[Uuid]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::default());
        let id = Uuid::new_v4();

        let guard = locks.lock(id).await;
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let locks = KeyedLocks::default();
        let _a = locks.lock(Uuid::new_v4()).await;
        let _b = locks.lock(Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn released_slots_are_pruned() {
        let locks = KeyedLocks::default();
        for _ in 0..8 {
            let _guard = locks.lock(Uuid::new_v4()).await;
        }
        let _guard = locks.lock(Uuid::new_v4()).await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn lock_all_dedups_ids() {
        let locks = KeyedLocks::default();
        let id = Uuid::new_v4();
        let guards = locks.lock_all(&[id, id]).await;
        assert_eq!(guards.len(), 1);
    }
}
