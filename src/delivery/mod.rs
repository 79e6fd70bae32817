//! Outbound delivery: one `send` contract, two strategies.
//!
//! The direct strategy is the transport itself; the queued strategy wraps a
//! transport with bounded retries and a bounded worker pool. The strategy is
//! picked once at startup and injected wherever messages are sent.

pub mod message;
pub mod queue;
pub mod whatsapp;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::error::DeliveryError;

pub use message::{Button, ListRow, OutboundMessage};
pub use queue::{QueueConfig, QueuedGateway};
pub use whatsapp::WhatsAppClient;

/// What happened to a message handed to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the provider.
    Sent,
    /// Accepted for background delivery.
    Queued,
}

/// Sends structured messages to a user.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(
        &self,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryOutcome, DeliveryError>;
}

/// Delivery strategy selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    #[default]
    Direct,
    Queued,
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "queued" | "queue" => Ok(Self::Queued),
            other => Err(format!("unknown delivery mode '{other}' (expected direct|queued)")),
        }
    }
}

/// Wrap a transport in the chosen strategy.
pub fn build_gateway(
    mode: DeliveryMode,
    transport: Arc<dyn MessageGateway>,
    queue: QueueConfig,
) -> Arc<dyn MessageGateway> {
    match mode {
        DeliveryMode::Direct => transport,
        DeliveryMode::Queued => QueuedGateway::start(transport, queue),
    }
}

/// Transport that only logs. Used when no provider credentials are set.
#[derive(Debug, Default)]
pub struct LogGateway;

#[async_trait]
impl MessageGateway for LogGateway {
    async fn send(
        &self,
        to: &str,
        message: &OutboundMessage,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        message.validate()?;
        info!(
            to = %to,
            body = %message.body().chars().take(120).collect::<String>(),
            choices = ?message.choice_ids(),
            "Outbound message (log transport)"
        );
        Ok(DeliveryOutcome::Sent)
    }
}
