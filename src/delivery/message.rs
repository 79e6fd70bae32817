//! Structured outbound messages.

use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// Reply buttons allowed per message.
pub const MAX_BUTTONS: usize = 3;
/// Rows allowed per list message.
pub const MAX_LIST_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub id: String,
    pub title: String,
}

impl Button {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }
}

/// A message the gateway can deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    Buttons {
        body: String,
        buttons: Vec<Button>,
    },
    List {
        body: String,
        button_label: String,
        rows: Vec<ListRow>,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn buttons(body: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self::Buttons {
            body: body.into(),
            buttons,
        }
    }

    pub fn list(body: impl Into<String>, button_label: impl Into<String>, rows: Vec<ListRow>) -> Self {
        Self::List {
            body: body.into(),
            button_label: button_label.into(),
            rows,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text { body } | Self::Buttons { body, .. } | Self::List { body, .. } => body,
        }
    }

    /// Interactive ids offered by this message.
    pub fn choice_ids(&self) -> Vec<&str> {
        match self {
            Self::Text { .. } => Vec::new(),
            Self::Buttons { buttons, .. } => buttons.iter().map(|b| b.id.as_str()).collect(),
            Self::List { rows, .. } => rows.iter().map(|r| r.id.as_str()).collect(),
        }
    }

    /// Check provider limits before sending.
    pub fn validate(&self) -> Result<(), DeliveryError> {
        match self {
            Self::Text { body } if body.trim().is_empty() => {
                Err(DeliveryError::InvalidMessage("empty text body".into()))
            }
            Self::Buttons { buttons, .. } if buttons.is_empty() || buttons.len() > MAX_BUTTONS => {
                Err(DeliveryError::InvalidMessage(format!(
                    "{} buttons (1..={MAX_BUTTONS} allowed)",
                    buttons.len()
                )))
            }
            Self::List { rows, .. } if rows.is_empty() || rows.len() > MAX_LIST_ROWS => {
                Err(DeliveryError::InvalidMessage(format!(
                    "{} list rows (1..={MAX_LIST_ROWS} allowed)",
                    rows.len()
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_limits() {
        assert!(OutboundMessage::text("hola").validate().is_ok());
        assert!(OutboundMessage::text("  ").validate().is_err());

        let four = (0..4).map(|i| Button::new(format!("b{i}"), "x")).collect();
        assert!(OutboundMessage::buttons("pick", four).validate().is_err());

        let eleven = (0..11).map(|i| ListRow::new(format!("r{i}"), "x")).collect();
        assert!(OutboundMessage::list("pick", "Ver", eleven).validate().is_err());
    }

    #[test]
    fn choice_ids_follow_order() {
        let msg = OutboundMessage::buttons(
            "ok?",
            vec![Button::new("zone_ok", "Sí"), Button::new("zone_change", "Cambiar")],
        );
        assert_eq!(msg.choice_ids(), vec!["zone_ok", "zone_change"]);
        assert_eq!(msg.body(), "ok?");
    }
}
