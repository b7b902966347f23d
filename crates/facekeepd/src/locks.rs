//! Per-identity serialization of profile writes.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One async mutex per identity id, created on demand and dropped when idle.
#[derive(Clone, Default)]
pub struct IdentityLocks {
    map: Arc<LockMap>,
}

/// Held while a profile is being read-modified-written.
pub struct IdentityGuard {
    id: String,
    map: Arc<LockMap>,
    _guard: OwnedMutexGuard<()>,
}

impl IdentityLocks {
    pub async fn lock(&self, id: &str) -> IdentityGuard {
        let mutex = self.map.entry(id.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        IdentityGuard {
            id: id.to_string(),
            map: Arc::clone(&self.map),
            _guard: guard,
        }
    }

    /// Identities that currently have a lock entry.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map.len()
    }
}

impl Drop for IdentityGuard {
    fn drop(&mut self) {
        // Two references left means the map and this guard: nobody is waiting.
        self.map
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
