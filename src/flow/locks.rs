//! Per-user serialization of event handling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Keyed async mutex. Events for one user run one at a time; different
/// users never wait on each other. Entries are dropped once nobody holds
/// or waits on them.
#[derive(Default)]
pub struct UserLocks {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

/// Held while an event for `user` is being handled.
pub struct UserGuard {
    user: String,
    slot: Slot,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user: &str) -> UserGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(user.to_string()).or_default().clone()
        };
        let guard = slot.clone().lock_owned().await;
        UserGuard {
            user: user.to_string(),
            slot,
            slots: self.slots.clone(),
            guard: Some(guard),
        }
    }

    /// Users with a live lock entry.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Map entry plus our own handle: nobody else is waiting.
        if Arc::strong_count(&self.slot) <= 2 {
            slots.remove(&self.user);
        }
    }
}
