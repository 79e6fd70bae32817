//! Ad-prefill tag parser.
//!
//! Click-to-chat ads append a tag such as
//! `#ad city=city_guatemala&zone=14&service=electricista&lang=en&cid=123`
//! to the first message. Keys are aliased and values are percent-decoded.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::catalog;
use crate::session::Lang;

use super::resolve_service;

static AD_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)#ad[\s:]+(\S+)\s*$").expect("valid ad tag regex"));

/// Structured intake carried by an ad tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdPrefill {
    /// City id.
    pub city: Option<String>,
    pub zone: Option<u8>,
    pub service_id: Option<String>,
    pub lang: Lang,
    pub campaign_id: Option<String>,
}

impl AdPrefill {
    /// Only a fully resolved prefill may drive the conversation.
    pub fn is_actionable(&self) -> bool {
        self.city.is_some() && self.zone.is_some() && self.service_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdKey {
    City,
    Zone,
    Service,
    Lang,
    Campaign,
}

impl AdKey {
    fn parse(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "city" | "ciudad" | "c" => Some(Self::City),
            "zone" | "zona" | "z" => Some(Self::Zone),
            "service" | "servicio" | "s" => Some(Self::Service),
            "lang" | "idioma" => Some(Self::Lang),
            "cid" | "campaign" => Some(Self::Campaign),
            _ => None,
        }
    }
}

/// Parse a trailing ad tag. Returns `None` when the text carries no tag.
pub fn parse_ad_prefill(text: &str) -> Option<AdPrefill> {
    let caps = AD_TAG.captures(text)?;
    let query = caps.get(1)?.as_str();

    let mut city_raw: Option<String> = None;
    let mut prefill = AdPrefill {
        city: None,
        zone: None,
        service_id: None,
        lang: Lang::Es,
        campaign_id: None,
    };

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let Some(key) = AdKey::parse(&key) else {
            debug!(key = %key, "Ignoring unknown ad tag key");
            continue;
        };
        let value = value.trim();
        match key {
            AdKey::City => city_raw = Some(value.to_lowercase()),
            AdKey::Zone => match value.parse::<i64>() {
                Ok(zone) if catalog::is_valid_zone(zone) => prefill.zone = Some(zone as u8),
                _ => debug!(value = %value, "Discarding invalid ad zone"),
            },
            AdKey::Service => match resolve_service(&value.to_lowercase()) {
                Some(service) => prefill.service_id = Some(service.id.to_string()),
                None => debug!(value = %value, "Unknown ad service"),
            },
            AdKey::Lang => {
                prefill.lang = if value == "en" { Lang::En } else { Lang::Es };
            }
            AdKey::Campaign => {
                if !value.is_empty() {
                    prefill.campaign_id = Some(value.to_string());
                }
            }
        }
    }

    prefill.city = city_raw
        .as_deref()
        .and_then(resolve_city)
        .or_else(catalog::default_city)
        .map(|c| c.id.to_string());

    Some(prefill)
}

fn resolve_city(value: &str) -> Option<&'static catalog::City> {
    catalog::city(value)
        .or_else(|| catalog::city(&format!("city_{value}")))
        .or_else(|| catalog::CITIES.iter().find(|c| c.name.to_lowercase() == value))
}
