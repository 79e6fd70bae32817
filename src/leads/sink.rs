//! Lead persistence with a local fallback log and admin alert.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::delivery::{MessageGateway, OutboundMessage};
use crate::store::LeadRepository;

use super::model::Lead;

/// Records leads. Implementations never fail loudly.
#[async_trait]
pub trait LeadSink: Send + Sync {
    /// Returns `true` when the lead reached durable storage.
    async fn save(&self, lead: &Lead) -> bool;
}

/// One line of the fallback log.
#[derive(Serialize)]
struct FallbackRecord<'a> {
    #[serde(flatten)]
    lead: &'a Lead,
    failed_at: String,
    reason: &'a str,
}

/// Append-only newline-delimited JSON file.
#[derive(Debug, Clone)]
pub struct FallbackLog {
    path: PathBuf,
}

impl FallbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record for `lead`.
    pub async fn append(&self, lead: &Lead, reason: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let record = FallbackRecord {
            lead,
            failed_at: Utc::now().to_rfc3339(),
            reason,
        };
        let mut line = serde_json::to_string(&record).map_err(std::io::Error::other)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Durable lead sink that degrades to the fallback log.
pub struct PersistenceGateway {
    repository: Option<Arc<dyn LeadRepository>>,
    fallback: FallbackLog,
    gateway: Arc<dyn MessageGateway>,
    admin_phone: Option<String>,
}

impl PersistenceGateway {
    pub fn new(
        repository: Option<Arc<dyn LeadRepository>>,
        fallback: FallbackLog,
        gateway: Arc<dyn MessageGateway>,
        admin_phone: Option<String>,
    ) -> Self {
        Self {
            repository,
            fallback,
            gateway,
            admin_phone,
        }
    }

    async fn degrade(&self, lead: &Lead, reason: &str) {
        match self.fallback.append(lead, reason).await {
            Ok(()) => info!(
                lead_id = %lead.id,
                path = %self.fallback.path().display(),
                "Lead written to fallback log"
            ),
            Err(e) => error!(
                lead_id = %lead.id,
                error = %e,
                lead = ?lead,
                "Fallback log write failed"
            ),
        }

        let Some(ref admin) = self.admin_phone else {
            return;
        };
        let alert = OutboundMessage::text(format!(
            "⚠️ Lead no guardado en la base de datos ({reason}).\n{}",
            lead.summary()
        ));
        if let Err(e) = self.gateway.send(admin, &alert).await {
            warn!(lead_id = %lead.id, error = %e, "Admin alert failed");
        }
    }
}

#[async_trait]
impl LeadSink for PersistenceGateway {
    async fn save(&self, lead: &Lead) -> bool {
        let Some(ref repo) = self.repository else {
            self.degrade(lead, "no durable store configured").await;
            return false;
        };

        match repo.insert_lead(lead).await {
            Ok(()) => {
                info!(lead_id = %lead.id, score = lead.lead_score, "Lead saved");
                true
            }
            Err(e) => {
                warn!(lead_id = %lead.id, error = %e, "Lead insert failed");
                self.degrade(lead, &e.to_string()).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;
    use crate::delivery::DeliveryOutcome;
    use crate::error::{DatabaseError, DeliveryError};
    use crate::session::{Session, Urgency};

    struct Repo {
        fail: bool,
        saved: Mutex<Vec<Lead>>,
    }

    #[async_trait]
    impl LeadRepository for Repo {
        async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
            if self.fail {
                return Err(DatabaseError::Query("disk full".into()));
            }
            self.saved.lock().await.push(lead.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl MessageGateway for Outbox {
        async fn send(
            &self,
            to: &str,
            message: &OutboundMessage,
        ) -> Result<DeliveryOutcome, DeliveryError> {
            self.0
                .lock()
                .await
                .push((to.to_string(), message.body().to_string()));
            Ok(DeliveryOutcome::Sent)
        }
    }

    fn lead() -> Lead {
        let mut s = Session::new("50255550000");
        s.zone = Some(14);
        s.zone_confirmed = true;
        s.service_id = Some("srv_cerrajero".into());
        s.urgency = Some(Urgency::Later);
        Lead::from_session(&s).unwrap()
    }

    #[tokio::test]
    async fn saves_to_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = Arc::new(Repo {
            fail: false,
            saved: Mutex::new(Vec::new()),
        });
        let outbox = Arc::new(Outbox::default());
        let sink = PersistenceGateway::new(
            Some(repo.clone()),
            FallbackLog::new(tmp.path().join("fallback.jsonl")),
            outbox.clone(),
            Some("admin".into()),
        );

        assert!(sink.save(&lead()).await);
        assert_eq!(repo.saved.lock().await.len(), 1);
        assert!(!tmp.path().join("fallback.jsonl").exists());
        assert!(outbox.0.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failure_writes_fallback_and_alerts_admin() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("fallback.jsonl");
        let outbox = Arc::new(Outbox::default());
        let sink = PersistenceGateway::new(
            Some(Arc::new(Repo {
                fail: true,
                saved: Mutex::new(Vec::new()),
            })),
            FallbackLog::new(&path),
            outbox.clone(),
            Some("admin".into()),
        );

        let lead = lead();
        assert!(!sink.save(&lead).await);
        assert!(!sink.save(&lead).await);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record["phone"], "50255550000");
        assert_eq!(record["zone"], 14);
        assert_eq!(record["lead_score"], lead.lead_score);
        assert!(record["failed_at"].is_string());

        let alerts = outbox.0.lock().await;
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].0, "admin");
        assert!(alerts[0].1.contains("Cerrajería"));
    }

    #[tokio::test]
    async fn no_admin_means_no_alert() {
        let tmp = tempfile::tempdir().unwrap();
        let outbox = Arc::new(Outbox::default());
        let sink = PersistenceGateway::new(
            None,
            FallbackLog::new(tmp.path().join("f.jsonl")),
            outbox.clone(),
            None,
        );
        assert!(!sink.save(&lead()).await);
        assert!(tmp.path().join("f.jsonl").exists());
        assert!(outbox.0.lock().await.is_empty());
    }
}
