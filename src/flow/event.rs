//! Inbound events and the selection ids carried by interactive replies.

use serde::{Deserialize, Serialize};

use crate::session::Urgency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Text,
    Interactive,
    /// Images, audio, locations and anything else the flow cannot read.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractiveReply {
    /// `list_reply` or `button_reply`.
    #[serde(rename = "type", default)]
    pub reply_type: String,
    pub id: String,
}

/// One message from a user, as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<InteractiveReply>,
}

/// What an event carries, once its shape has been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventContent<'a> {
    Text(&'a str),
    Selection(&'a str),
    Unsupported,
}

impl InboundEvent {
    pub fn text(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            kind: EventType::Text,
            text: Some(TextBody { body: body.into() }),
            interactive: None,
        }
    }

    /// An interactive reply. Ids of list rows and buttons share one namespace.
    pub fn selection(from: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            kind: EventType::Interactive,
            text: None,
            interactive: Some(InteractiveReply {
                reply_type: "button_reply".into(),
                id: id.into(),
            }),
        }
    }

    pub fn content(&self) -> EventContent<'_> {
        match (self.kind, &self.text, &self.interactive) {
            (EventType::Text, Some(t), _) => EventContent::Text(&t.body),
            (EventType::Interactive, _, Some(i)) => EventContent::Selection(&i.id),
            _ => EventContent::Unsupported,
        }
    }
}

/// A parsed interactive id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    RoleClient,
    RoleTechnician,
    City(String),
    ZoneGroup(u8),
    Zone(u8),
    ZoneOk,
    ZoneChange,
    Service(String),
    Urgency(Urgency),
    AdOk,
    AdChange,
    FreeTextService(String),
    FreeTextUrgency(Urgency),
    FreeTextConfirm,
    FreeTextChange,
    FinalAck,
    Unknown(String),
}

impl Selection {
    pub fn parse(id: &str) -> Self {
        let id = id.trim();
        match id {
            "role_client" => return Self::RoleClient,
            "role_technician" => return Self::RoleTechnician,
            "zone_ok" => return Self::ZoneOk,
            "zone_change" => return Self::ZoneChange,
            "urg_now" => return Self::Urgency(Urgency::Now),
            "urg_later" => return Self::Urgency(Urgency::Later),
            "ad_ok" => return Self::AdOk,
            "ad_change" => return Self::AdChange,
            "ft_urg_now" => return Self::FreeTextUrgency(Urgency::Now),
            "ft_urg_later" => return Self::FreeTextUrgency(Urgency::Later),
            "ft_confirm" => return Self::FreeTextConfirm,
            "ft_change" => return Self::FreeTextChange,
            "final_ack" => return Self::FinalAck,
            _ => {}
        }

        if id.starts_with("city_") {
            return Self::City(id.to_string());
        }
        if id.starts_with("srv_") {
            return Self::Service(id.to_string());
        }
        if let Some(service) = id.strip_prefix("ft_") {
            if service.starts_with("srv_") {
                return Self::FreeTextService(service.to_string());
            }
        }
        if let Some(n) = id.strip_prefix("zgrp_").and_then(|n| n.parse().ok()) {
            return Self::ZoneGroup(n);
        }
        if let Some(n) = id.strip_prefix("zone_").and_then(|n| n.parse().ok()) {
            return Self::Zone(n);
        }
        Self::Unknown(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_normalized_shape() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"from":"502","type":"interactive","interactive":{"type":"list_reply","id":"zone_10"}}"#,
        )
        .unwrap();
        assert_eq!(ev.content(), EventContent::Selection("zone_10"));

        let ev: InboundEvent =
            serde_json::from_str(r#"{"from":"502","type":"text","text":{"body":"hola"}}"#).unwrap();
        assert_eq!(ev.content(), EventContent::Text("hola"));

        let ev: InboundEvent = serde_json::from_str(r#"{"from":"502","type":"image"}"#).unwrap();
        assert_eq!(ev.kind, EventType::Other);
        assert_eq!(ev.content(), EventContent::Unsupported);
    }

    #[test]
    fn text_type_without_body_is_unsupported() {
        let ev: InboundEvent = serde_json::from_str(r#"{"from":"502","type":"text"}"#).unwrap();
        assert_eq!(ev.content(), EventContent::Unsupported);
    }

    #[test]
    fn parses_selection_ids() {
        assert_eq!(Selection::parse("role_client"), Selection::RoleClient);
        assert_eq!(Selection::parse("city_guatemala"), Selection::City("city_guatemala".into()));
        assert_eq!(Selection::parse("zgrp_3"), Selection::ZoneGroup(3));
        assert_eq!(Selection::parse("zone_14"), Selection::Zone(14));
        assert_eq!(Selection::parse("zone_ok"), Selection::ZoneOk);
        assert_eq!(Selection::parse("srv_plomero"), Selection::Service("srv_plomero".into()));
        assert_eq!(
            Selection::parse("ft_srv_pintor"),
            Selection::FreeTextService("srv_pintor".into())
        );
        assert_eq!(Selection::parse("urg_later"), Selection::Urgency(Urgency::Later));
        assert_eq!(Selection::parse("ft_urg_now"), Selection::FreeTextUrgency(Urgency::Now));
        assert_eq!(Selection::parse("final_ack"), Selection::FinalAck);
    }

    #[test]
    fn malformed_ids_are_unknown() {
        assert!(matches!(Selection::parse("zone_abc"), Selection::Unknown(_)));
        assert!(matches!(Selection::parse("zgrp_"), Selection::Unknown(_)));
        assert!(matches!(Selection::parse("ft_other"), Selection::Unknown(_)));
        assert!(matches!(Selection::parse(""), Selection::Unknown(_)));
    }
}
