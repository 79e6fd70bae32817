//! Keyword extraction of service, zone and urgency from arbitrary text.

use std::sync::LazyLock;

use regex::Regex;

use crate::catalog;
use crate::session::{PendingLead, Urgency};

static ZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bzona\s*(\d{1,2})\b").expect("valid zone regex"));

static URGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(urgente|urgencia|emergencia|ahora|ahorita|ya|hoy|inmediato|lo antes posible|asap|urgent|now)\b",
    )
    .expect("valid urgency regex")
});

static LATER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\b(despu[eé]s|luego|ma[nñ]ana|otro d[ií]a|la otra semana|later|tomorrow)\b|\bm[aá]s tarde\b)",
    )
    .expect("valid later regex")
});

/// Fields recognised in one message. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeTextIntent {
    pub service_id: Option<String>,
    pub zone: Option<u8>,
    pub urgency: Option<Urgency>,
}

impl FreeTextIntent {
    pub fn is_empty(&self) -> bool {
        self.service_id.is_none() && self.zone.is_none() && self.urgency.is_none()
    }

    pub fn into_pending(self) -> PendingLead {
        PendingLead {
            service_id: self.service_id,
            zone: self.zone,
            urgency: self.urgency,
        }
    }
}

pub fn parse_free_text(text: &str) -> FreeTextIntent {
    let text = text.to_lowercase();
    FreeTextIntent {
        service_id: detect_service(&text).map(str::to_string),
        zone: detect_zone(&text),
        urgency: detect_urgency(&text),
    }
}

/// Labels first, then synonyms, each in catalog order.
fn detect_service(text: &str) -> Option<&'static str> {
    catalog::SERVICES
        .iter()
        .find(|s| text.contains(&s.label.to_lowercase()))
        .or_else(|| {
            catalog::SERVICES
                .iter()
                .find(|s| s.synonyms.iter().any(|syn| text.contains(syn)))
        })
        .map(|s| s.id)
}

fn detect_zone(text: &str) -> Option<u8> {
    let caps = ZONE.captures(text)?;
    let zone: i64 = caps.get(1)?.as_str().parse().ok()?;
    catalog::is_valid_zone(zone).then_some(zone as u8)
}

fn detect_urgency(text: &str) -> Option<Urgency> {
    if URGENT.is_match(text) {
        Some(Urgency::Now)
    } else if LATER.is_match(text) {
        Some(Urgency::Later)
    } else {
        None
    }
}
