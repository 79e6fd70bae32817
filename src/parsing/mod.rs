//! Best-effort extraction of intake fields from inbound text.

pub mod ad_prefill;
pub mod free_text;

pub use ad_prefill::{AdPrefill, parse_ad_prefill};
pub use free_text::{FreeTextIntent, parse_free_text};

use crate::catalog::{self, Service};

/// Resolve a case-folded value to a service: exact id, then label, then synonym.
pub(crate) fn resolve_service(value: &str) -> Option<&'static Service> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(s) = catalog::service(value) {
        return Some(s);
    }
    let prefixed = format!("srv_{value}");
    if let Some(s) = catalog::service(&prefixed) {
        return Some(s);
    }
    catalog::SERVICES
        .iter()
        .find(|s| s.label.to_lowercase() == value)
        .or_else(|| {
            catalog::SERVICES
                .iter()
                .find(|s| s.synonyms.iter().any(|syn| *syn == value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ids_labels_and_synonyms() {
        assert_eq!(resolve_service("srv_plomero").unwrap().id, "srv_plomero");
        assert_eq!(resolve_service("plomero").unwrap().id, "srv_plomero");
        assert_eq!(resolve_service("cerrajería").unwrap().id, "srv_cerrajero");
        assert_eq!(resolve_service("electricista").unwrap().id, "srv_electricista");
        assert_eq!(resolve_service("limpieza").unwrap().id, "srv_limpieza");
        assert!(resolve_service("jardinero").is_none());
        assert!(resolve_service("").is_none());
    }
}
