//! Conversation state machine.
//!
//! `transition` is pure: it takes the stored session (if any) and one event
//! and returns the session to store plus the side effects to run, in order.
//! All I/O lives in the engine.

use tracing::debug;

use crate::catalog;
use crate::delivery::OutboundMessage;
use crate::leads::Lead;
use crate::parsing::{parse_ad_prefill, parse_free_text};
use crate::session::{FlowState, PendingLead, Role, Session, Source};

use super::event::{EventContent, InboundEvent, Selection};
use super::prompts;

/// Facts the transition needs from outside the session.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub cooldown_active: bool,
    pub reset_keyword: &'a str,
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send { to: String, message: OutboundMessage },
    /// Persist the lead, then route it to suppliers.
    EmitLead(Lead),
    ArmCooldown,
    ClearCooldown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Session to store. `None` leaves the stored session untouched.
    pub next: Option<Session>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn idle() -> Self {
        Self {
            next: None,
            effects: Vec::new(),
        }
    }

    /// Outbound messages in send order.
    pub fn messages(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Send { message, .. } => Some(message),
            _ => None,
        })
    }

    pub fn lead(&self) -> Option<&Lead> {
        self.effects.iter().find_map(|e| match e {
            Effect::EmitLead(lead) => Some(lead),
            _ => None,
        })
    }
}

/// Why a selection was refused. The session is left as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    CityLocked,
    RoleRequired,
    CityRequired,
    ZoneRequired,
    ZoneNotConfirmed,
    ServiceRequired,
    NotAnAdIntake,
    NothingPending,
    PendingIncomplete,
    NotFinished,
    UnknownOption,
}

impl Rejection {
    pub fn notice(&self) -> &'static str {
        match self {
            Self::CityLocked => "La ciudad de esta solicitud ya está definida.",
            Self::RoleRequired => "Primero cuéntanos si necesitas un servicio.",
            Self::CityRequired => "Primero elige tu ciudad.",
            Self::ZoneRequired => "Primero elige tu zona.",
            Self::ZoneNotConfirmed => "Primero confirma tu zona.",
            Self::ServiceRequired => "Primero elige el servicio.",
            Self::NotAnAdIntake => "Esa opción ya no está disponible.",
            Self::NothingPending => "No hay ninguna solicitud por confirmar.",
            Self::PendingIncomplete => "Aún faltan datos para tu solicitud.",
            Self::NotFinished => "Tu solicitud aún no está completa.",
            Self::UnknownOption => "No reconocimos esa opción.",
        }
    }
}

/// Accumulates effects for one user.
struct Outbox {
    to: String,
    effects: Vec<Effect>,
}

impl Outbox {
    fn new(to: &str) -> Self {
        Self {
            to: to.to_string(),
            effects: Vec::new(),
        }
    }

    fn send(&mut self, message: OutboundMessage) {
        self.effects.push(Effect::Send {
            to: self.to.clone(),
            message,
        });
    }

    fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn write(self, session: Session) -> Transition {
        Transition {
            next: Some(session),
            effects: self.effects,
        }
    }
}

/// Decide the next session and side effects for one event.
pub fn transition(
    session: Option<Session>,
    event: &InboundEvent,
    ctx: &TransitionContext<'_>,
) -> Transition {
    let user = event.from.as_str();
    let mut out = Outbox::new(user);
    let content = event.content();

    if let EventContent::Text(body) = content {
        if is_reset(body, ctx.reset_keyword) {
            debug!(user = %user, "Reset requested");
            out.push(Effect::ClearCooldown);
            out.send(prompts::start_card());
            return out.write(Session::new(user));
        }
    }

    let session = session.unwrap_or_else(|| Session::new(user));

    if session.is_done() {
        return after_completion(session, ctx, out);
    }

    match content {
        EventContent::Text(body) => on_text(session, body, out),
        EventContent::Selection(id) => on_selection(session, Selection::parse(id), out),
        EventContent::Unsupported => {
            out.send(prompts::recovery(&session));
            out.write(session)
        }
    }
}

fn is_reset(body: &str, keyword: &str) -> bool {
    !keyword.is_empty() && body.trim().to_lowercase() == keyword.trim().to_lowercase()
}

/// A completed session replays its confirmation once per cooldown window and
/// restarts once the window has passed.
fn after_completion(mut session: Session, ctx: &TransitionContext<'_>, mut out: Outbox) -> Transition {
    if !ctx.cooldown_active {
        debug!(user = %session.user_id, "Cooldown expired, restarting intake");
        out.send(prompts::start_card());
        return out.write(Session::new(session.user_id));
    }
    if session.final_acked {
        return Transition::idle();
    }
    let text = session
        .last_confirmation
        .clone()
        .unwrap_or_else(|| prompts::final_text(&session));
    out.send(prompts::final_card(&text));
    session.final_acked = true;
    out.write(session)
}

fn on_text(mut session: Session, body: &str, mut out: Outbox) -> Transition {
    let first_text = !session.started;
    session.started = true;

    if first_text {
        if let Some(ad) = parse_ad_prefill(body).filter(|ad| ad.is_actionable()) {
            debug!(user = %session.user_id, campaign = ?ad.campaign_id, "Ad prefill applied");
            session.source = Source::Ad;
            session.role = Some(Role::Client);
            session.city = ad.city;
            session.ad_lock_city = true;
            session.zone = ad.zone;
            session.zone_confirmed = true;
            session.service_id = ad.service_id;
            session.urgency = None;
            session.lang = ad.lang;
            session.campaign_id = ad.campaign_id;
            out.send(prompts::ad_confirm(&session));
            return out.write(session);
        }
    }

    let intent = parse_free_text(body);
    if intent.is_empty() {
        out.send(prompts::recovery(&session));
        return out.write(session);
    }

    let mut pending = intent.into_pending();
    if let Some(ref existing) = session.pending_confirm {
        pending.fill_from(existing);
    }
    pending.fill_from(&session.known_fields());
    debug!(user = %session.user_id, missing = ?pending.first_missing(), "Free-text intake");

    out.send(prompts::free_text_step(&pending, &session));
    session.pending_confirm = Some(pending);
    session.final_acked = false;
    out.write(session)
}

fn on_selection(session: Session, selection: Selection, mut out: Outbox) -> Transition {
    if let Selection::Unknown(ref id) = selection {
        debug!(user = %session.user_id, id = %id, "Unknown selection");
        out.send(prompts::recovery(&session));
        return out.write(session);
    }

    let mut next = session.clone();
    match apply_selection(&mut next, selection, &mut out) {
        Ok(()) => {
            next.final_acked = false;
            out.write(next)
        }
        Err(rejection) => {
            debug!(user = %session.user_id, ?rejection, "Selection rejected");
            out.effects.clear();
            out.send(OutboundMessage::text(rejection.notice()));
            out.send(prompts::recovery(&session));
            out.write(session)
        }
    }
}

/// Apply an accepted selection to `s` and queue the next prompt.
fn apply_selection(s: &mut Session, selection: Selection, out: &mut Outbox) -> Result<(), Rejection> {
    match selection {
        Selection::RoleClient => {
            s.role = Some(Role::Client);
            s.started = true;
            if s.ad_lock_city {
                out.send(prompts::zone_groups(s.city_name()));
            } else {
                out.send(prompts::city_list());
            }
        }
        Selection::RoleTechnician => {
            s.role = Some(Role::Technician);
            s.started = true;
            out.send(prompts::technician_notice());
        }
        Selection::City(id) => {
            if s.ad_lock_city {
                return Err(Rejection::CityLocked);
            }
            if s.role != Some(Role::Client) {
                return Err(Rejection::RoleRequired);
            }
            let city = catalog::city(&id).ok_or(Rejection::UnknownOption)?;
            if s.city.as_deref() != Some(city.id) {
                s.clear_zone();
            }
            s.city = Some(city.id.to_string());
            out.send(prompts::zone_groups(city.name));
        }
        Selection::ZoneGroup(group) => {
            if s.city.is_none() {
                return Err(Rejection::CityRequired);
            }
            let list = prompts::zone_list(group).ok_or(Rejection::UnknownOption)?;
            out.send(list);
        }
        Selection::Zone(zone) => {
            if s.city.is_none() {
                return Err(Rejection::CityRequired);
            }
            if !catalog::is_valid_zone(zone as i64) {
                return Err(Rejection::UnknownOption);
            }
            s.choose_zone(zone);
            out.send(prompts::zone_confirm(zone));
        }
        Selection::ZoneOk => {
            if s.zone.is_none() {
                return Err(Rejection::ZoneRequired);
            }
            s.zone_confirmed = true;
            out.send(prompts::service_list());
        }
        Selection::ZoneChange => {
            if s.city.is_none() {
                return Err(Rejection::CityRequired);
            }
            s.clear_zone();
            out.send(prompts::zone_groups(s.city_name()));
        }
        Selection::Service(id) => {
            if !s.zone_confirmed {
                return Err(Rejection::ZoneNotConfirmed);
            }
            let service = catalog::service(&id).ok_or(Rejection::UnknownOption)?;
            s.service_id = Some(service.id.to_string());
            s.urgency = None;
            out.send(prompts::urgency_question(service.label));
        }
        Selection::Urgency(urgency) => {
            if s.service_id.is_none() {
                return Err(Rejection::ServiceRequired);
            }
            s.urgency = Some(urgency);
            complete(s, out)?;
        }
        Selection::AdOk => {
            if s.source != Source::Ad {
                return Err(Rejection::NotAnAdIntake);
            }
            let service = s
                .service_id
                .as_deref()
                .and_then(catalog::service)
                .ok_or(Rejection::ServiceRequired)?;
            out.send(prompts::urgency_question(service.label));
        }
        Selection::AdChange => {
            if s.source != Source::Ad {
                return Err(Rejection::NotAnAdIntake);
            }
            s.clear_zone();
            out.send(prompts::zone_groups(s.city_name()));
        }
        Selection::FreeTextService(id) => {
            let service = catalog::service(&id).ok_or(Rejection::UnknownOption)?;
            let pending = s.pending_confirm.as_mut().ok_or(Rejection::NothingPending)?;
            pending.service_id = Some(service.id.to_string());
            let pending = pending.clone();
            out.send(prompts::free_text_step(&pending, s));
        }
        Selection::FreeTextUrgency(urgency) => {
            let pending = s.pending_confirm.as_mut().ok_or(Rejection::NothingPending)?;
            pending.urgency = Some(urgency);
            let pending = pending.clone();
            out.send(prompts::free_text_step(&pending, s));
        }
        Selection::FreeTextConfirm => {
            let pending = s.pending_confirm.take().ok_or(Rejection::NothingPending)?;
            apply_pending(s, pending)?;
            complete(s, out)?;
        }
        Selection::FreeTextChange => {
            if s.pending_confirm.take().is_none() {
                return Err(Rejection::NothingPending);
            }
            out.send(prompts::recovery(s));
        }
        Selection::FinalAck => return Err(Rejection::NotFinished),
        Selection::Unknown(_) => return Err(Rejection::UnknownOption),
    }
    Ok(())
}

/// Move a complete free-text intake onto the session.
fn apply_pending(s: &mut Session, pending: PendingLead) -> Result<(), Rejection> {
    let (Some(service_id), Some(zone), Some(urgency)) =
        (pending.service_id, pending.zone, pending.urgency)
    else {
        return Err(Rejection::PendingIncomplete);
    };
    if s.city.is_none() {
        s.city = catalog::default_city().map(|c| c.id.to_string());
    }
    // A confirmed service request is a client intake, whatever was picked before.
    s.role = Some(Role::Client);
    s.zone = Some(zone);
    s.zone_confirmed = true;
    s.service_id = Some(service_id);
    s.urgency = Some(urgency);
    Ok(())
}

/// Emit the lead and close the intake.
fn complete(s: &mut Session, out: &mut Outbox) -> Result<(), Rejection> {
    let lead = Lead::from_session(s).ok_or(Rejection::ServiceRequired)?;
    debug!(user = %s.user_id, lead = %lead.id, score = lead.lead_score, "Intake complete");
    let text = prompts::final_text(s);
    out.push(Effect::EmitLead(lead));
    out.send(prompts::final_card(&text));
    out.push(Effect::ArmCooldown);
    s.state = FlowState::Done;
    s.last_confirmation = Some(text);
    s.pending_confirm = None;
    Ok(())
}
