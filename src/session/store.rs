//! Session and cooldown store interfaces.
//!
//! Both stores own their expiry: an entry past its TTL is never returned.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DatabaseError;

use super::model::Session;

/// Per-user conversation state with idle expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session. Undecodable records yield `DatabaseError::Corrupt`.
    async fn get(&self, user_id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Write a session, resetting its TTL.
    async fn set(&self, user_id: &str, session: &Session, ttl: Duration)
    -> Result<(), DatabaseError>;

    async fn delete(&self, user_id: &str) -> Result<(), DatabaseError>;
}

/// Short-lived per-user marker gating re-engagement after a lead.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn set(&self, user_id: &str, ttl: Duration) -> Result<(), DatabaseError>;

    async fn has(&self, user_id: &str) -> Result<bool, DatabaseError>;

    async fn delete(&self, user_id: &str) -> Result<(), DatabaseError>;
}
