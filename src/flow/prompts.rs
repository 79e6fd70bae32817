//! Cards and questions sent to the user at each step of the intake.

use crate::catalog;
use crate::delivery::{Button, ListRow, OutboundMessage};
use crate::session::{MissingField, PendingLead, Session};

/// Role choice. Doubles as the start card.
pub fn start_card() -> OutboundMessage {
    OutboundMessage::buttons(
        "¡Hola! Te ayudamos a encontrar un técnico de confianza.\n¿Qué necesitas?",
        vec![
            Button::new("role_client", "Necesito un servicio"),
            Button::new("role_technician", "Soy técnico"),
        ],
    )
}

pub fn technician_notice() -> OutboundMessage {
    OutboundMessage::text(
        "¡Gracias por tu interés! El registro de técnicos se hace con nuestro equipo. \
         Te contactaremos para completar tu alta.\nSi necesitas un servicio, escribe \"reiniciar\".",
    )
}

pub fn city_list() -> OutboundMessage {
    let rows = catalog::CITIES
        .iter()
        .map(|c| ListRow::new(c.id, c.name))
        .collect();
    OutboundMessage::list("¿En qué ciudad necesitas el servicio?", "Ver ciudades", rows)
}

pub fn zone_groups(city_name: &str) -> OutboundMessage {
    let rows = (1..=catalog::zone_group_count())
        .filter_map(|g| {
            let zones = catalog::zone_group(g)?;
            Some(ListRow::new(
                format!("zgrp_{g}"),
                format!("Zonas {}-{}", zones.start(), zones.end()),
            ))
        })
        .collect();
    OutboundMessage::list(
        format!("{city_name}: ¿en qué grupo de zonas estás?"),
        "Ver zonas",
        rows,
    )
}

/// Exact zones of one group. `None` for an unknown group.
pub fn zone_list(group: u8) -> Option<OutboundMessage> {
    let rows = catalog::zone_group(group)?
        .map(|z| ListRow::new(format!("zone_{z}"), format!("Zona {z}")))
        .collect();
    Some(OutboundMessage::list("Elige tu zona:", "Elegir zona", rows))
}

pub fn zone_confirm(zone: u8) -> OutboundMessage {
    OutboundMessage::buttons(
        format!("Elegiste la zona {zone}. ¿Es correcto?"),
        vec![
            Button::new("zone_ok", "Sí, correcto"),
            Button::new("zone_change", "Cambiar zona"),
        ],
    )
}

fn service_rows(prefix: &str) -> Vec<ListRow> {
    catalog::SERVICES
        .iter()
        .map(|s| ListRow::new(format!("{prefix}{}", s.id), s.label))
        .collect()
}

pub fn service_list() -> OutboundMessage {
    OutboundMessage::list("¿Qué servicio necesitas?", "Ver servicios", service_rows(""))
}

pub fn urgency_question(service_label: &str) -> OutboundMessage {
    OutboundMessage::buttons(
        format!("{service_label}: ¿para cuándo lo necesitas?"),
        vec![
            Button::new("urg_now", "Ahora"),
            Button::new("urg_later", "Más tarde"),
        ],
    )
}

/// Summary of a prefilled ad intake.
pub fn ad_confirm(session: &Session) -> OutboundMessage {
    let service = session
        .service_id
        .as_deref()
        .and_then(catalog::service)
        .map_or("", |s| s.label);
    let zone = session.zone.map(|z| z.to_string()).unwrap_or_default();
    OutboundMessage::buttons(
        format!(
            "Buscas {service} en la zona {zone}, {}.\n¿Confirmamos?",
            session.city_name()
        ),
        vec![
            Button::new("ad_ok", "Confirmar"),
            Button::new("ad_change", "Cambiar zona"),
        ],
    )
}

/// Question for the first field the free-text intake still lacks, or the
/// confirmation card once it is complete.
pub fn free_text_step(pending: &PendingLead, session: &Session) -> OutboundMessage {
    match pending.first_missing() {
        Some(MissingField::Service) => OutboundMessage::list(
            "Entendido. ¿Qué servicio necesitas?",
            "Ver servicios",
            service_rows("ft_"),
        ),
        Some(MissingField::Zone) => OutboundMessage::text(
            "¿En qué zona estás? Escribe por ejemplo: zona 10",
        ),
        Some(MissingField::Urgency) => OutboundMessage::buttons(
            "¿Para cuándo lo necesitas?",
            vec![
                Button::new("ft_urg_now", "Ahora"),
                Button::new("ft_urg_later", "Más tarde"),
            ],
        ),
        None => free_text_confirm(pending, session),
    }
}

fn free_text_confirm(pending: &PendingLead, session: &Session) -> OutboundMessage {
    let service = pending
        .service_id
        .as_deref()
        .and_then(catalog::service)
        .map_or("", |s| s.label);
    let zone = pending.zone.map(|z| z.to_string()).unwrap_or_default();
    let urgency = pending.urgency.map_or("", |u| u.label());
    OutboundMessage::buttons(
        format!(
            "Esto es lo que entendimos:\nServicio: {service}\nZona: {zone}, {}\nUrgencia: {urgency}\n¿Es correcto?",
            session.city_name()
        ),
        vec![
            Button::new("ft_confirm", "Sí, enviar"),
            Button::new("ft_change", "Corregir"),
        ],
    )
}

/// Text of the completion card. Also used to rebuild a missing snapshot.
pub fn final_text(session: &Session) -> String {
    let service = session
        .service_id
        .as_deref()
        .and_then(catalog::service)
        .map_or("", |s| s.label);
    let zone = session.zone.map(|z| z.to_string()).unwrap_or_default();
    let urgency = session.urgency.map_or("", |u| u.label());
    format!(
        "¡Listo! Recibimos tu solicitud.\nServicio: {service}\nZona: {zone}, {}\nUrgencia: {urgency}\n\
         Un técnico te contactará pronto.",
        session.city_name()
    )
}

pub fn final_card(text: &str) -> OutboundMessage {
    OutboundMessage::buttons(text, vec![Button::new("final_ack", "Entendido")])
}

/// Re-ask whatever the session lacks first, so the user is never left
/// without a next step.
pub fn recovery(session: &Session) -> OutboundMessage {
    use crate::session::Role;

    if let Some(ref pending) = session.pending_confirm {
        return free_text_step(pending, session);
    }
    match session.role {
        None => return start_card(),
        Some(Role::Technician) => return technician_notice(),
        Some(Role::Client) => {}
    }
    if session.city.is_none() {
        return city_list();
    }
    let Some(zone) = session.zone else {
        return zone_groups(session.city_name());
    };
    if !session.zone_confirmed {
        return zone_confirm(zone);
    }
    let Some(service) = session.service_id.as_deref().and_then(catalog::service) else {
        return service_list();
    };
    if session.urgency.is_none() {
        return urgency_question(service.label);
    }
    final_card(
        session
            .last_confirmation
            .as_deref()
            .unwrap_or(&final_text(session)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, Urgency};

    fn client_session() -> Session {
        let mut s = Session::new("u");
        s.role = Some(Role::Client);
        s
    }

    #[test]
    fn every_card_is_deliverable() {
        let mut s = client_session();
        s.city = Some("city_guatemala".into());
        s.zone = Some(10);
        s.service_id = Some("srv_plomero".into());
        let cards = [
            start_card(),
            technician_notice(),
            city_list(),
            zone_groups("X"),
            zone_list(5).unwrap(),
            zone_confirm(3),
            service_list(),
            urgency_question("Plomería"),
            ad_confirm(&s),
            final_card("ok"),
        ];
        for card in cards {
            card.validate().unwrap();
        }
    }

    #[test]
    fn zone_list_covers_group() {
        let card = zone_list(3).unwrap();
        assert_eq!(
            card.choice_ids(),
            vec!["zone_11", "zone_12", "zone_13", "zone_14", "zone_15"]
        );
        assert!(zone_list(0).is_none());
        assert!(zone_list(6).is_none());
    }

    #[test]
    fn free_text_asks_in_order() {
        let s = client_session();
        let mut p = PendingLead::default();
        assert!(free_text_step(&p, &s).choice_ids().contains(&"ft_srv_plomero"));
        p.service_id = Some("srv_plomero".into());
        assert!(free_text_step(&p, &s).body().contains("zona"));
        p.zone = Some(10);
        assert_eq!(free_text_step(&p, &s).choice_ids(), vec!["ft_urg_now", "ft_urg_later"]);
        p.urgency = Some(Urgency::Now);
        let card = free_text_step(&p, &s);
        assert_eq!(card.choice_ids(), vec!["ft_confirm", "ft_change"]);
        assert!(card.body().contains("Plomería"));
        assert!(card.body().contains("Ahora"));
    }

    #[test]
    fn recovery_follows_canonical_order() {
        let mut s = Session::new("u");
        assert_eq!(recovery(&s), start_card());
        s.role = Some(Role::Client);
        assert_eq!(recovery(&s), city_list());
        s.city = Some("city_guatemala".into());
        assert_eq!(recovery(&s).choice_ids()[0], "zgrp_1");
        s.zone = Some(4);
        assert_eq!(recovery(&s), zone_confirm(4));
        s.zone_confirmed = true;
        assert_eq!(recovery(&s), service_list());
        s.service_id = Some("srv_pintor".into());
        assert_eq!(recovery(&s), urgency_question("Pintura"));
    }

    #[test]
    fn final_text_mentions_fields() {
        let mut s = client_session();
        s.zone = Some(14);
        s.zone_confirmed = true;
        s.service_id = Some("srv_electricista".into());
        s.urgency = Some(Urgency::Later);
        let text = final_text(&s);
        assert!(text.contains("Electricidad"));
        assert!(text.contains("14"));
        assert!(text.contains("Más tarde"));
        assert!(text.contains("Ciudad de Guatemala"));
    }
}
