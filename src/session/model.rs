//! Per-user conversation session.

use serde::{Deserialize, Serialize};

use crate::catalog;

/// Coarse conversation state. In-progress sessions are further
/// distinguished by which fields are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    #[default]
    Menu,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Now,
    Later,
}

impl Urgency {
    /// Label used on leads and in confirmation cards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Now => "Ahora",
            Self::Later => "Más tarde",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Technician,
}

/// Where the intake came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Ad,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lang {
    #[default]
    Es,
    En,
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Es => write!(f, "es"),
            Self::En => write!(f, "en"),
        }
    }
}

/// Partial lead assembled from free text, awaiting explicit confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

/// A field the free-text path still needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Service,
    Zone,
    Urgency,
}

impl PendingLead {
    /// First missing field, in the order service → zone → urgency.
    pub fn first_missing(&self) -> Option<MissingField> {
        if self.service_id.is_none() {
            Some(MissingField::Service)
        } else if self.zone.is_none() {
            Some(MissingField::Zone)
        } else if self.urgency.is_none() {
            Some(MissingField::Urgency)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    /// Fill fields that are still empty from `other`.
    pub fn fill_from(&mut self, other: &PendingLead) {
        if self.service_id.is_none() {
            self.service_id.clone_from(&other.service_id);
        }
        if self.zone.is_none() {
            self.zone = other.zone;
        }
        if self.urgency.is_none() {
            self.urgency = other.urgency;
        }
    }
}

/// Conversation state for one user.
///
/// Owned exclusively by the state machine; stores treat it as an opaque
/// JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zone: Option<u8>,
    #[serde(default)]
    pub zone_confirmed: bool,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub state: FlowState,
    #[serde(default)]
    pub last_confirmation: Option<String>,
    #[serde(default)]
    pub final_acked: bool,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub ad_lock_city: bool,
    #[serde(default)]
    pub lang: Lang,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub pending_confirm: Option<PendingLead>,
}

impl Session {
    /// A fresh in-progress session with every field unset.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            city: None,
            zone: None,
            zone_confirmed: false,
            service_id: None,
            urgency: None,
            started: false,
            state: FlowState::Menu,
            last_confirmation: None,
            final_acked: false,
            source: Source::None,
            ad_lock_city: false,
            lang: Lang::Es,
            campaign_id: None,
            role: None,
            pending_confirm: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == FlowState::Done
    }

    /// Set the zone, unconfirmed. Clears the fields that depend on it.
    pub fn choose_zone(&mut self, zone: u8) {
        self.zone = Some(zone);
        self.zone_confirmed = false;
        self.service_id = None;
        self.urgency = None;
    }

    /// Forget the zone and everything that depends on it.
    pub fn clear_zone(&mut self) {
        self.zone = None;
        self.zone_confirmed = false;
        self.service_id = None;
        self.urgency = None;
    }

    /// Known fields as a partial lead, for merging with free-text results.
    pub fn known_fields(&self) -> PendingLead {
        PendingLead {
            service_id: self.service_id.clone(),
            zone: if self.zone_confirmed { self.zone } else { None },
            urgency: self.urgency,
        }
    }

    /// City display name, falling back to the default city.
    pub fn city_name(&self) -> &'static str {
        self.city
            .as_deref()
            .and_then(catalog::city)
            .or_else(catalog::default_city)
            .map(|c| c.name)
            .unwrap_or("")
    }

    /// Check the structural invariants. Returns a description of the first
    /// violated one.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.zone_confirmed && self.zone.is_none() {
            return Err("zone_confirmed without zone");
        }
        if self.service_id.is_some() && !self.zone_confirmed {
            return Err("service without confirmed zone");
        }
        if self.urgency.is_some() && self.service_id.is_none() {
            return Err("urgency without service");
        }
        if self.state == FlowState::Done && self.urgency.is_none() {
            return Err("done without urgency");
        }
        if self.ad_lock_city && self.city.is_none() {
            return Err("ad-locked city missing");
        }
        if let Some(zone) = self.zone {
            if !catalog::is_valid_zone(zone as i64) {
                return Err("zone out of range");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_blank_menu() {
        let s = Session::new("50255550000");
        assert_eq!(s.state, FlowState::Menu);
        assert!(!s.started);
        assert!(s.role.is_none());
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn choose_zone_clears_dependants() {
        let mut s = Session::new("u");
        s.zone = Some(3);
        s.zone_confirmed = true;
        s.service_id = Some("srv_pintor".into());
        s.urgency = Some(Urgency::Later);
        s.choose_zone(7);
        assert_eq!(s.zone, Some(7));
        assert!(!s.zone_confirmed);
        assert!(s.service_id.is_none());
        assert!(s.urgency.is_none());
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn invariants_detect_violations() {
        let mut s = Session::new("u");
        s.zone_confirmed = true;
        assert!(s.check_invariants().is_err());

        let mut s = Session::new("u");
        s.service_id = Some("srv_plomero".into());
        assert!(s.check_invariants().is_err());

        let mut s = Session::new("u");
        s.state = FlowState::Done;
        assert!(s.check_invariants().is_err());
    }

    #[test]
    fn known_fields_ignore_unconfirmed_zone() {
        let mut s = Session::new("u");
        s.zone = Some(4);
        assert_eq!(s.known_fields().zone, None);
        s.zone_confirmed = true;
        assert_eq!(s.known_fields().zone, Some(4));
    }

    #[test]
    fn pending_missing_order() {
        let mut p = PendingLead::default();
        assert_eq!(p.first_missing(), Some(MissingField::Service));
        p.service_id = Some("srv_plomero".into());
        assert_eq!(p.first_missing(), Some(MissingField::Zone));
        p.zone = Some(10);
        assert_eq!(p.first_missing(), Some(MissingField::Urgency));
        p.urgency = Some(Urgency::Now);
        assert!(p.is_complete());
    }

    #[test]
    fn session_deserializes_with_missing_fields() {
        let s: Session = serde_json::from_str(r#"{"user_id":"u","state":"done"}"#).unwrap();
        assert_eq!(s.state, FlowState::Done);
        assert!(s.check_invariants().is_err());
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Urgency::Now).unwrap(), "\"now\"");
        assert_eq!(serde_json::to_string(&Role::Technician).unwrap(), "\"technician\"");
        assert_eq!(serde_json::to_string(&Source::Ad).unwrap(), "\"ad\"");
    }
}
