//! libSQL backend: durable sessions, cooldowns, leads and suppliers.
//!
//! Supports local file and in-memory databases. Expiry is stored as a
//! fixed-width RFC 3339 UTC timestamp so that string comparison orders it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::leads::{Lead, Supplier};
use crate::session::{CooldownStore, Session, SessionStore};
use crate::store::migrations;
use crate::store::traits::{LeadRepository, SupplierDirectory};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Insert or replace a supplier.
    pub async fn upsert_supplier(&self, supplier: &Supplier) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO suppliers (id, phone, service_id, zone, active) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (id) DO UPDATE SET phone = ?2, service_id = ?3, zone = ?4, active = ?5",
                params![
                    supplier.id.as_str(),
                    supplier.phone.as_str(),
                    supplier.service_id.as_str(),
                    supplier.zone as i64,
                    supplier.active as i64
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_supplier: {e}")))?;
        Ok(())
    }

    /// Leads for a phone number, newest first.
    pub async fn leads_for_phone(&self, phone: &str) -> Result<Vec<Lead>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = ?1 ORDER BY created_at DESC"),
                params![phone],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("leads_for_phone: {e}")))?;

        let mut leads = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("leads_for_phone: {e}")))?
        {
            leads.push(row_to_lead(&row)?);
        }
        Ok(leads)
    }

    /// Delete expired sessions and cooldowns. Returns the number removed.
    pub async fn purge_expired(&self) -> Result<u64, DatabaseError> {
        let now = timestamp(Duration::ZERO);
        let sessions = self
            .conn()
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now.as_str()])
            .await
            .map_err(|e| DatabaseError::Query(format!("purge sessions: {e}")))?;
        let cooldowns = self
            .conn()
            .execute("DELETE FROM cooldowns WHERE expires_at <= ?1", params![now.as_str()])
            .await
            .map_err(|e| DatabaseError::Query(format!("purge cooldowns: {e}")))?;
        Ok(sessions + cooldowns)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width UTC timestamp `ttl` from now.
fn timestamp(ttl: Duration) -> String {
    let at = Utc::now()
        + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100));
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const LEAD_COLUMNS: &str =
    "id, phone, city, zone, service_id, service, urgency, lang, campaign_id, lead_score, created_at";

/// Map a libsql Row to a Lead. Column order matches LEAD_COLUMNS.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let get_text = |i: i32| -> Result<String, DatabaseError> {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Serialization(format!("lead column {i}: {e}")))
    };
    let get_int = |i: i32| -> Result<i64, DatabaseError> {
        row.get::<i64>(i)
            .map_err(|e| DatabaseError::Serialization(format!("lead column {i}: {e}")))
    };

    let id_str = get_text(0)?;
    let lang_str = get_text(7)?;
    let created_str = get_text(10)?;

    Ok(Lead {
        id: id_str
            .parse()
            .map_err(|e| DatabaseError::Serialization(format!("lead id {id_str}: {e}")))?,
        phone: get_text(1)?,
        city: get_text(2)?,
        zone: get_int(3)? as u8,
        service_id: get_text(4)?,
        service: get_text(5)?,
        urgency: get_text(6)?,
        lang: serde_json::from_value(serde_json::Value::String(lang_str))
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        campaign_id: row.get::<String>(8).ok(),
        lead_score: get_int(9)? as u8,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::Serialization(format!("created_at: {e}")))?,
    })
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, DatabaseError> {
        let now = timestamp(Duration::ZERO);
        let mut rows = self
            .conn()
            .query(
                "SELECT data, expires_at FROM sessions WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?
        else {
            return Ok(None);
        };

        let expires_at: String = row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;
        if expires_at <= now {
            debug!(user = %user_id, "Session expired");
            SessionStore::delete(self, user_id).await?;
            return Ok(None);
        }

        let data: String = row.get(0).map_err(|e| DatabaseError::Corrupt {
            key: user_id.to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&data)
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
        let data = serde_json::to_string(session)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let expires_at = timestamp(ttl);
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO sessions (user_id, data, expires_at, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id) DO UPDATE SET data = ?2, expires_at = ?3, updated_at = ?4",
                params![user_id, data, expires_at, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_session: {e}")))?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl CooldownStore for LibSqlBackend {
    async fn set(&self, user_id: &str, ttl: Duration) -> Result<(), DatabaseError> {
        let expires_at = timestamp(ttl);
        self.conn()
            .execute(
                "INSERT INTO cooldowns (user_id, expires_at) VALUES (?1, ?2)
                 ON CONFLICT (user_id) DO UPDATE SET expires_at = ?2",
                params![user_id, expires_at],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_cooldown: {e}")))?;
        Ok(())
    }

    async fn has(&self, user_id: &str) -> Result<bool, DatabaseError> {
        let now = timestamp(Duration::ZERO);
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM cooldowns WHERE user_id = ?1 AND expires_at > ?2",
                params![user_id, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("has_cooldown: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("has_cooldown: {e}"))),
        }
    }

    async fn delete(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM cooldowns WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_cooldown: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl LeadRepository for LibSqlBackend {
    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO leads ({LEAD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    lead.id.to_string(),
                    lead.phone.as_str(),
                    lead.city.as_str(),
                    lead.zone as i64,
                    lead.service_id.as_str(),
                    lead.service.as_str(),
                    lead.urgency.as_str(),
                    lead.lang.to_string(),
                    opt_text(lead.campaign_id.as_deref()),
                    lead.lead_score as i64,
                    lead.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_lead: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SupplierDirectory for LibSqlBackend {
    async fn query(&self, service_id: &str) -> Result<Vec<Supplier>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, phone, service_id, zone, active FROM suppliers
                 WHERE service_id = ?1 AND active = 1 ORDER BY id",
                params![service_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("query_suppliers: {e}")))?;

        let mut suppliers = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("query_suppliers: {e}")))?
        {
            let zone: i64 = row
                .get(3)
                .map_err(|e| DatabaseError::Serialization(format!("supplier zone: {e}")))?;
            let active: i64 = row.get(4).unwrap_or(1);
            suppliers.push(Supplier {
                id: row
                    .get(0)
                    .map_err(|e| DatabaseError::Serialization(format!("supplier id: {e}")))?,
                phone: row
                    .get(1)
                    .map_err(|e| DatabaseError::Serialization(format!("supplier phone: {e}")))?,
                service_id: row
                    .get(2)
                    .map_err(|e| DatabaseError::Serialization(format!("supplier service: {e}")))?,
                zone: zone as u8,
                active: active != 0,
            });
        }
        Ok(suppliers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Urgency;

    fn supplier(id: &str, service: &str, zone: u8, active: bool) -> Supplier {
        Supplier {
            id: id.into(),
            phone: format!("tel-{id}"),
            service_id: service.into(),
            zone,
            active,
        }
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let mut session = Session::new("u1");
        session.zone = Some(5);
        SessionStore::set(&db, "u1", &session, Duration::from_secs(60))
            .await
            .unwrap();

        let loaded = SessionStore::get(&db, "u1").await.unwrap().unwrap();
        assert_eq!(loaded, session);

        session.zone_confirmed = true;
        SessionStore::set(&db, "u1", &session, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(SessionStore::get(&db, "u1").await.unwrap().unwrap().zone_confirmed);

        SessionStore::delete(&db, "u1").await.unwrap();
        assert!(SessionStore::get(&db, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_absent() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        SessionStore::set(&db, "u1", &Session::new("u1"), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(SessionStore::get(&db, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_session_is_reported() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.conn()
            .execute(
                "INSERT INTO sessions (user_id, data, expires_at) VALUES ('u1', 'garbage', '9999-12-31T00:00:00.000Z')",
                (),
            )
            .await
            .unwrap();
        let err = SessionStore::get(&db, "u1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn cooldown_lifecycle() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(!db.has("u1").await.unwrap());
        CooldownStore::set(&db, "u1", Duration::from_secs(60)).await.unwrap();
        assert!(db.has("u1").await.unwrap());
        CooldownStore::delete(&db, "u1").await.unwrap();
        assert!(!db.has("u1").await.unwrap());

        CooldownStore::set(&db, "u2", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!db.has("u2").await.unwrap());
        assert_eq!(db.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lead_insert_and_read_back() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let mut s = Session::new("50255550000");
        s.zone = Some(10);
        s.zone_confirmed = true;
        s.service_id = Some("srv_plomero".into());
        s.urgency = Some(Urgency::Now);
        s.campaign_id = Some("123".into());
        let lead = Lead::from_session(&s).unwrap();

        db.insert_lead(&lead).await.unwrap();
        let leads = db.leads_for_phone("50255550000").await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].id, lead.id);
        assert_eq!(leads[0].lead_score, 90);
        assert_eq!(leads[0].campaign_id.as_deref(), Some("123"));

        // Same id twice violates the primary key.
        assert!(db.insert_lead(&lead).await.is_err());
    }

    #[tokio::test]
    async fn supplier_query_filters() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.upsert_supplier(&supplier("a", "srv_plomero", 10, true)).await.unwrap();
        db.upsert_supplier(&supplier("b", "srv_plomero", 11, false)).await.unwrap();
        db.upsert_supplier(&supplier("c", "srv_pintor", 10, true)).await.unwrap();

        let found = db.query("srv_plomero").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");

        db.upsert_supplier(&supplier("b", "srv_plomero", 11, true)).await.unwrap();
        assert_eq!(db.query("srv_plomero").await.unwrap().len(), 2);
    }
}
