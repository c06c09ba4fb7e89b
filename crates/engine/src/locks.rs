//! Per-record advisory locks.
//!
//! Runs that target the same record are serialized so their field writes
//! don't interleave. Locks are process-local; they do not coordinate with
//! other engine instances or with writers outside the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Key = (Uuid, Uuid);

#[derive(Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of a run. Dropping it releases the record.
pub struct RecordGuard<'a> {
    owner: &'a RecordLocks,
    key: Key,
    guard: Option<OwnedMutexGuard<()>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other run holds `(tenant_id, record_id)`, then take it.
    pub async fn acquire(&self, tenant_id: Uuid, record_id: Uuid) -> RecordGuard<'_> {
        let key = (tenant_id, record_id);
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        RecordGuard { owner: self, key, guard: Some(guard) }
    }

    /// Number of records that currently have a lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map itself still references the mutex: nobody is waiting.
        if locks.get(&self.key).is_some_and(|m| Arc::strong_count(m) == 1) {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_record_is_serialized() {
        let locks = Arc::new(RecordLocks::new());
        let tenant = Uuid::new_v4();
        let record = Uuid::new_v4();

        let first = locks.acquire(tenant, record).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(tenant, record).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_records_do_not_block() {
        let locks = RecordLocks::new();
        let tenant = Uuid::new_v4();
        let _a = locks.acquire(tenant, Uuid::new_v4()).await;
        let _b = locks.acquire(tenant, Uuid::new_v4()).await;
        assert_eq!(locks.len(), 2);
    }
}
