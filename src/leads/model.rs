//! Lead and supplier records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog;
use crate::session::{Lang, Session};

use super::scoring::score_lead;

/// Immutable record of a completed intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub phone: String,
    /// City display name.
    pub city: String,
    pub zone: u8,
    pub service_id: String,
    /// Service display label.
    pub service: String,
    /// Urgency display label.
    pub urgency: String,
    pub lang: Lang,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub lead_score: u8,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Build a scored lead from a session that has zone, service and urgency.
    pub fn from_session(session: &Session) -> Option<Self> {
        let zone = session.zone?;
        let service = catalog::service(session.service_id.as_deref()?)?;
        let urgency = session.urgency?;
        Some(Self {
            id: Uuid::new_v4(),
            phone: session.user_id.clone(),
            city: session.city_name().to_string(),
            zone,
            service_id: service.id.to_string(),
            service: service.label.to_string(),
            urgency: urgency.label().to_string(),
            lang: session.lang,
            campaign_id: session.campaign_id.clone(),
            lead_score: score_lead(urgency, service.id, zone),
            created_at: Utc::now(),
        })
    }

    /// Text used when notifying suppliers and admins.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Servicio: {}", self.service),
            format!("Ciudad: {}", self.city),
            format!("Zona: {}", self.zone),
            format!("Urgencia: {}", self.urgency),
            format!("Teléfono: {}", self.phone),
            format!("Prioridad: {}/100", self.lead_score),
        ];
        if let Some(ref cid) = self.campaign_id {
            lines.push(format!("Campaña: {cid}"));
        }
        lines.join("\n")
    }
}

/// A party eligible to receive leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub phone: String,
    pub service_id: String,
    pub zone: u8,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Urgency;

    fn complete_session() -> Session {
        let mut s = Session::new("50255551234");
        s.city = Some("city_guatemala".into());
        s.zone = Some(10);
        s.zone_confirmed = true;
        s.service_id = Some("srv_plomero".into());
        s.urgency = Some(Urgency::Now);
        s.campaign_id = Some("cmp-9".into());
        s
    }

    #[test]
    fn lead_from_complete_session() {
        let lead = Lead::from_session(&complete_session()).unwrap();
        assert_eq!(lead.phone, "50255551234");
        assert_eq!(lead.city, "Ciudad de Guatemala");
        assert_eq!(lead.service, "Plomería");
        assert_eq!(lead.urgency, "Ahora");
        assert_eq!(lead.lead_score, 90);
        assert_eq!(lead.campaign_id.as_deref(), Some("cmp-9"));
    }

    #[test]
    fn incomplete_session_yields_none() {
        let mut s = complete_session();
        s.urgency = None;
        assert!(Lead::from_session(&s).is_none());
    }

    #[test]
    fn summary_mentions_campaign() {
        let lead = Lead::from_session(&complete_session()).unwrap();
        let text = lead.summary();
        assert!(text.contains("Zona: 10"));
        assert!(text.contains("Campaña: cmp-9"));
    }

    #[test]
    fn supplier_defaults_active() {
        let s: Supplier = serde_json::from_str(
            r#"{"id":"s1","phone":"502111","service_id":"srv_plomero","zone":3}"#,
        )
        .unwrap();
        assert!(s.active);
    }
}
