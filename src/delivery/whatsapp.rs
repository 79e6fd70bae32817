//! WhatsApp Cloud API transport.
//!
//! Maps `OutboundMessage` to the `/messages` payloads: plain text, reply
//! buttons and single-section lists.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::error::DeliveryError;

use super::{DeliveryOutcome, MessageGateway, OutboundMessage};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Provider truncates button titles beyond this.
const BUTTON_TITLE_MAX: usize = 20;
/// Provider truncates list row titles beyond this.
const ROW_TITLE_MAX: usize = 24;

/// WhatsApp transport. Sends immediately and surfaces failures.
pub struct WhatsAppClient {
    token: SecretString,
    phone_number_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppClient {
    pub fn new(token: SecretString, phone_number_id: String) -> Self {
        Self {
            token,
            phone_number_id,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at another API root (tests, proxies).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.phone_number_id)
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Build the Cloud API request body for one message.
pub fn to_payload(to: &str, message: &OutboundMessage) -> Value {
    let base = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
    });

    let body = match message {
        OutboundMessage::Text { body } => json!({
            "type": "text",
            "text": { "body": body, "preview_url": false },
        }),
        OutboundMessage::Buttons { body, buttons } => json!({
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": {
                    "buttons": buttons.iter().map(|b| json!({
                        "type": "reply",
                        "reply": { "id": b.id, "title": truncate(&b.title, BUTTON_TITLE_MAX) },
                    })).collect::<Vec<_>>(),
                },
            },
        }),
        OutboundMessage::List {
            body,
            button_label,
            rows,
        } => json!({
            "type": "interactive",
            "interactive": {
                "type": "list",
                "body": { "text": body },
                "action": {
                    "button": truncate(button_label, BUTTON_TITLE_MAX),
                    "sections": [{
                        "title": truncate(button_label, ROW_TITLE_MAX),
                        "rows": rows.iter().map(|r| {
                            let mut row = json!({ "id": r.id, "title": truncate(&r.title, ROW_TITLE_MAX) });
                            if let Some(ref d) = r.description {
                                row["description"] = json!(d);
                            }
                            row
                        }).collect::<Vec<_>>(),
                    }],
                },
            },
        }),
    };

    let mut payload = base;
    if let (Some(obj), Some(extra)) = (payload.as_object_mut(), body.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    payload
}

/// Map a non-2xx response. Client errors other than rate limiting are final.
fn status_error(to: &str, status: StatusCode, body: &str) -> DeliveryError {
    let reason = truncate(body, 300);
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        DeliveryError::Rejected {
            to: to.to_string(),
            status: status.as_u16(),
            reason,
        }
    } else {
        DeliveryError::SendFailed {
            to: to.to_string(),
            reason: format!("HTTP {status}: {reason}"),
        }
    }
}

#[async_trait]
impl MessageGateway for WhatsAppClient {
    async fn send(
        &self,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        message.validate()?;

        let resp = self
            .client
            .post(self.messages_url())
            .bearer_auth(self.token.expose_secret())
            .json(&to_payload(to, message))
            .send()
            .await
            .map_err(|e| DeliveryError::SendFailed {
                to: to.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            tracing::warn!(to = %to, status = ?status, "WhatsApp send rejected");
            return Err(status_error(to, status, &err));
        }

        tracing::debug!(to = %to, "WhatsApp message sent");
        Ok(DeliveryOutcome::Sent)
    }
}
