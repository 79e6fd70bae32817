//! IntakeEngine: runs the state machine against the stores and executes
//! its side effects.
//!
//! Every failure is absorbed here: `handle` logs and carries on, so the
//! transport can always acknowledge the inbound event.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::delivery::MessageGateway;
use crate::error::DatabaseError;
use crate::leads::{LeadSink, SupplierRouter};
use crate::session::{CooldownStore, Session, SessionStore};

use super::event::InboundEvent;
use super::locks::UserLocks;
use super::machine::{Effect, TransitionContext, transition};

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub session_ttl: Duration,
    pub cooldown_ttl: Duration,
    pub reset_keyword: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(24 * 60 * 60),
            cooldown_ttl: Duration::from_secs(10 * 60),
            reset_keyword: "reiniciar".into(),
        }
    }
}

pub struct IntakeEngine {
    sessions: Arc<dyn SessionStore>,
    cooldowns: Arc<dyn CooldownStore>,
    gateway: Arc<dyn MessageGateway>,
    sink: Arc<dyn LeadSink>,
    router: Arc<SupplierRouter>,
    settings: EngineSettings,
    locks: UserLocks,
}

impl IntakeEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        cooldowns: Arc<dyn CooldownStore>,
        gateway: Arc<dyn MessageGateway>,
        sink: Arc<dyn LeadSink>,
        router: Arc<SupplierRouter>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            sessions,
            cooldowns,
            gateway,
            sink,
            router,
            settings,
            locks: UserLocks::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Process one inbound event to completion.
    pub async fn handle(&self, event: &InboundEvent) {
        let user = event.from.trim();
        if user.is_empty() {
            warn!("Dropping event without sender");
            return;
        }
        let trimmed;
        let event = if user.len() == event.from.len() {
            event
        } else {
            trimmed = InboundEvent {
                from: user.to_string(),
                ..event.clone()
            };
            &trimmed
        };
        let _guard = self.locks.lock(user).await;

        let session = self.load_session(user).await;
        let cooldown_active = match self.cooldowns.has(user).await {
            Ok(active) => active,
            Err(e) => {
                error!(user = %user, error = %e, "Cooldown lookup failed");
                false
            }
        };

        let ctx = TransitionContext {
            cooldown_active,
            reset_keyword: &self.settings.reset_keyword,
        };
        let outcome = transition(session, event, &ctx);

        if let Some(ref next) = outcome.next {
            if let Err(e) = self.sessions.set(user, next, self.settings.session_ttl).await {
                error!(user = %user, error = %e, "Session write failed");
            }
        }

        for effect in outcome.effects {
            self.execute(user, effect).await;
        }
    }

    /// Read the stored session. Missing, unreadable and inconsistent
    /// sessions all count as absent.
    async fn load_session(&self, user: &str) -> Option<Session> {
        match self.sessions.get(user).await {
            Ok(Some(session)) => match session.check_invariants() {
                Ok(()) => Some(session),
                Err(violation) => {
                    warn!(user = %user, violation, "Discarding inconsistent session");
                    None
                }
            },
            Ok(None) => None,
            Err(DatabaseError::Corrupt { reason, .. }) => {
                warn!(user = %user, reason = %reason, "Discarding corrupt session");
                None
            }
            Err(e) => {
                error!(user = %user, error = %e, "Session lookup failed");
                None
            }
        }
    }

    async fn execute(&self, user: &str, effect: Effect) {
        match effect {
            Effect::Send { to, message } => {
                if let Err(e) = self.gateway.send(&to, &message).await {
                    error!(user = %user, error = %e, transient = e.is_transient(), "Send failed");
                }
            }
            Effect::EmitLead(lead) => {
                let persisted = self.sink.save(&lead).await;
                let notified = self.router.route(&lead).await;
                info!(
                    user = %user,
                    lead_id = %lead.id,
                    score = lead.lead_score,
                    persisted,
                    suppliers = notified.len(),
                    "Lead emitted"
                );
            }
            Effect::ArmCooldown => {
                if let Err(e) = self.cooldowns.set(user, self.settings.cooldown_ttl).await {
                    error!(user = %user, error = %e, "Cooldown arm failed");
                }
            }
            Effect::ClearCooldown => {
                if let Err(e) = self.cooldowns.delete(user).await {
                    error!(user = %user, error = %e, "Cooldown clear failed");
                } else {
                    debug!(user = %user, "Cooldown cleared");
                }
            }
        }
    }
}
