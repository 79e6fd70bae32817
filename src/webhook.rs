//! HTTP surface: provider verification, inbound messages and health.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::flow::event::{EventType, InteractiveReply, TextBody};
use crate::flow::{InboundEvent, IntakeEngine};

/// Shared state for webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub engine: Arc<IntakeEngine>,
    pub verify_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

// ── Cloud API envelope ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: ChangeValue,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    /// Absent on delivery-status callbacks.
    #[serde(default)]
    messages: Vec<CloudMessage>,
}

#[derive(Debug, Deserialize)]
struct CloudMessage {
    from: String,
    #[serde(rename = "type")]
    kind: EventType,
    #[serde(default)]
    text: Option<TextBody>,
    #[serde(default)]
    interactive: Option<CloudInteractive>,
}

#[derive(Debug, Deserialize)]
struct CloudInteractive {
    #[serde(rename = "type")]
    reply_type: String,
    #[serde(default)]
    button_reply: Option<ReplyId>,
    #[serde(default)]
    list_reply: Option<ReplyId>,
}

#[derive(Debug, Deserialize)]
struct ReplyId {
    id: String,
}

impl From<CloudMessage> for InboundEvent {
    fn from(msg: CloudMessage) -> Self {
        let interactive = msg.interactive.and_then(|i| {
            let id = i.button_reply.or(i.list_reply)?.id;
            Some(InteractiveReply {
                reply_type: i.reply_type,
                id,
            })
        });
        Self {
            from: msg.from,
            kind: msg.kind,
            text: msg.text,
            interactive,
        }
    }
}

/// Pull inbound events out of a webhook body. Accepts the normalized event
/// shape or the Cloud API envelope. Anything else yields no events.
pub fn extract_events(payload: &Value) -> Vec<InboundEvent> {
    if payload.get("from").is_some() {
        return match serde_json::from_value::<InboundEvent>(payload.clone()) {
            Ok(event) => vec![event],
            Err(e) => {
                warn!(error = %e, "Malformed inbound event");
                Vec::new()
            }
        };
    }

    match serde_json::from_value::<Envelope>(payload.clone()) {
        Ok(envelope) => envelope
            .entry
            .into_iter()
            .flat_map(|e| e.changes)
            .flat_map(|c| c.value.messages)
            .map(InboundEvent::from)
            .collect(),
        Err(e) => {
            warn!(error = %e, "Unrecognised webhook payload");
            Vec::new()
        }
    }
}

/// GET /webhook
///
/// Echoes `hub.challenge` when the mode is `subscribe` and the token matches.
async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let expected = state.verify_token.as_deref();
    match (params.mode.as_deref(), params.verify_token.as_deref(), expected) {
        (Some("subscribe"), Some(given), Some(expected)) if given == expected => {
            info!("Webhook verified");
            (StatusCode::OK, params.challenge.unwrap_or_default())
        }
        _ => {
            warn!(mode = ?params.mode, "Webhook verification refused");
            (StatusCode::FORBIDDEN, String::new())
        }
    }
}

/// POST /webhook
///
/// Always answers 200 so the provider does not redeliver; each event is
/// handled on its own task.
async fn receive(State(state): State<WebhookState>, body: Bytes) -> impl IntoResponse {
    let events = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => extract_events(&payload),
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Webhook body is not JSON");
            Vec::new()
        }
    };
    debug!(count = events.len(), "Webhook events received");

    for event in events {
        let engine = Arc::clone(&state.engine);
        tokio::spawn(async move {
            engine.handle(&event).await;
        });
    }
    (StatusCode::OK, "EVENT_RECEIVED")
}

async fn health() -> &'static str {
    "ok"
}

/// Build the webhook routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::EventContent;

    #[test]
    fn extracts_normalized_event() {
        let payload = serde_json::json!({
            "from": "502",
            "type": "text",
            "text": {"body": "hola"}
        });
        let events = extract_events(&payload);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content(), EventContent::Text("hola"));
    }

    #[test]
    fn extracts_cloud_envelope() {
        let payload = serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [
                            {"from": "502A", "id": "m1", "type": "text", "text": {"body": "hola"}},
                            {"from": "502B", "id": "m2", "type": "interactive",
                             "interactive": {"type": "list_reply", "list_reply": {"id": "zone_10", "title": "Zona 10"}}},
                            {"from": "502C", "id": "m3", "type": "interactive",
                             "interactive": {"type": "button_reply", "button_reply": {"id": "zone_ok", "title": "Sí"}}},
                            {"from": "502D", "id": "m4", "type": "image", "image": {"id": "x"}}
                        ]
                    }
                }]
            }]
        });
        let events = extract_events(&payload);
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].from, "502A");
        assert_eq!(events[1].content(), EventContent::Selection("zone_10"));
        assert_eq!(events[2].content(), EventContent::Selection("zone_ok"));
        assert_eq!(events[3].content(), EventContent::Unsupported);
    }

    #[test]
    fn status_callbacks_carry_no_events() {
        let payload = serde_json::json!({
            "entry": [{"changes": [{"value": {"statuses": [{"id": "m1", "status": "read"}]}}]}]
        });
        assert!(extract_events(&payload).is_empty());
        assert!(extract_events(&serde_json::json!([1, 2])).is_empty());
    }
}
