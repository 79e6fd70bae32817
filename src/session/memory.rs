//! In-memory session and cooldown store with lazy TTL expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::DatabaseError;

use super::model::Session;
use super::store::{CooldownStore, SessionStore};

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Entry<T> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local store. Sessions are kept as JSON so that a decode failure
/// behaves like it would in a durable backend.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Entry<String>>>,
    cooldowns: RwLock<HashMap<String, Entry<()>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, e| e.is_live(now));
            removed += before - sessions.len();
        }
        {
            let mut cooldowns = self.cooldowns.write().await;
            let before = cooldowns.len();
            cooldowns.retain(|_, e| e.is_live(now));
            removed += before - cooldowns.len();
        }
        if removed > 0 {
            debug!(count = removed, "Purged expired entries");
        }
        removed
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    /// Drop all entries.
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
        self.cooldowns.write().await.clear();
        info!("Memory store cleared");
    }

    #[cfg(test)]
    pub(crate) async fn insert_raw(&self, user_id: &str, raw: &str, ttl: Duration) {
        self.sessions.write().await.insert(
            user_id.to_string(),
            Entry {
                value: raw.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, DatabaseError> {
        let now = Instant::now();
        let raw = {
            let sessions = self.sessions.read().await;
            match sessions.get(user_id) {
                Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
                Some(_) => None,
                None => return Ok(None),
            }
        };

        let Some(raw) = raw else {
            self.sessions.write().await.remove(user_id);
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| DatabaseError::Corrupt {
                key: user_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn set(
        &self,
        user_id: &str,
        session: &Session,
        ttl: Duration,
    ) -> Result<(), DatabaseError> {
        let value = serde_json::to_string(session)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.sessions.write().await.insert(
            user_id.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.sessions.write().await.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl CooldownStore for MemoryStore {
    async fn set(&self, user_id: &str, ttl: Duration) -> Result<(), DatabaseError> {
        self.cooldowns.write().await.insert(
            user_id.to_string(),
            Entry {
                value: (),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn has(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let now = Instant::now();
        let live = match self.cooldowns.read().await.get(user_id) {
            Some(entry) => entry.is_live(now),
            None => return Ok(false),
        };
        if !live {
            self.cooldowns.write().await.remove(user_id);
        }
        Ok(live)
    }

    async fn delete(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.cooldowns.write().await.remove(user_id);
        Ok(())
    }
}

/// Spawn a background task that periodically purges expired entries.
pub fn spawn_sweep_task(store: Arc<MemoryStore>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            store.purge_expired().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn session_roundtrip_and_delete() {
        let store = MemoryStore::new();
        let session = Session::new("u1");
        SessionStore::set(&*store, "u1", &session, LONG).await.unwrap();

        let loaded = SessionStore::get(&*store, "u1").await.unwrap();
        assert_eq!(loaded, Some(session));

        SessionStore::delete(&*store, "u1").await.unwrap();
        assert!(SessionStore::get(&*store, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_absent() {
        let store = MemoryStore::new();
        SessionStore::set(&*store, "u1", &Session::new("u1"), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(SessionStore::get(&*store, "u1").await.unwrap().is_none());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn corrupt_session_reports_error() {
        let store = MemoryStore::new();
        store.insert_raw("u1", "{not json", LONG).await;
        let err = SessionStore::get(&*store, "u1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn cooldown_expires_independently() {
        let store = MemoryStore::new();
        CooldownStore::set(&*store, "u1", Duration::from_millis(10))
            .await
            .unwrap();
        SessionStore::set(&*store, "u1", &Session::new("u1"), LONG)
            .await
            .unwrap();
        assert!(store.has("u1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!store.has("u1").await.unwrap());
        assert!(SessionStore::get(&*store, "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let store = MemoryStore::new();
        SessionStore::set(&*store, "old", &Session::new("old"), Duration::from_millis(5))
            .await
            .unwrap();
        SessionStore::set(&*store, "new", &Session::new("new"), LONG)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.session_count().await, 1);
    }
}
