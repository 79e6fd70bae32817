//! Static catalog of cities, zones and services.
//!
//! Service order matters: both parsers scan services in catalog order and the
//! first match wins.

/// Lowest valid zone number.
pub const MIN_ZONE: u8 = 1;
/// Highest valid zone number.
pub const MAX_ZONE: u8 = 25;
/// Zones shown per zone-group list.
pub const ZONES_PER_GROUP: u8 = 5;

/// A city the intake operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct City {
    pub id: &'static str,
    pub name: &'static str,
}

/// A service a client can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Service {
    pub id: &'static str,
    pub label: &'static str,
    /// Lowercase keywords, plain-ASCII and accented variants.
    pub synonyms: &'static [&'static str],
}

pub static CITIES: &[City] = &[City {
    id: "city_guatemala",
    name: "Ciudad de Guatemala",
}];

pub static SERVICES: &[Service] = &[
    Service {
        id: "srv_plomero",
        label: "Plomería",
        synonyms: &[
            "plomero", "plomeria", "plomería", "fontanero", "fontaneria", "fontanería", "fuga",
            "tuberia", "tubería",
        ],
    },
    Service {
        id: "srv_electricista",
        label: "Electricidad",
        synonyms: &[
            "electricista", "electrico", "eléctrico", "electrica", "eléctrica", "corto circuito",
            "cortocircuito",
        ],
    },
    Service {
        id: "srv_cerrajero",
        label: "Cerrajería",
        synonyms: &["cerrajero", "cerrajeria", "cerrajería", "chapa", "llaves"],
    },
    Service {
        id: "srv_aire",
        label: "Aire acondicionado",
        synonyms: &["aire acondicionado", "climatizacion", "climatización", "a/c"],
    },
    Service {
        id: "srv_pintor",
        label: "Pintura",
        synonyms: &["pintor", "pintar"],
    },
    Service {
        id: "srv_limpieza",
        label: "Limpieza",
        synonyms: &["limpiar", "limpiador", "limpiadora"],
    },
];

/// Services that score as high priority.
pub static HIGH_PRIORITY_SERVICES: &[&str] = &["srv_plomero", "srv_electricista", "srv_cerrajero"];

/// Zones that score as high value.
pub static HIGH_VALUE_ZONES: &[u8] = &[9, 10, 14, 15, 16];

/// Look up a city by id.
pub fn city(id: &str) -> Option<&'static City> {
    CITIES.iter().find(|c| c.id == id)
}

/// The city used when none is given, if exactly one is configured.
pub fn default_city() -> Option<&'static City> {
    match CITIES {
        [only] => Some(only),
        _ => None,
    }
}

/// Look up a service by id.
pub fn service(id: &str) -> Option<&'static Service> {
    SERVICES.iter().find(|s| s.id == id)
}

/// Whether a zone number is in range.
pub fn is_valid_zone(zone: i64) -> bool {
    (MIN_ZONE as i64..=MAX_ZONE as i64).contains(&zone)
}

/// Number of zone groups.
pub fn zone_group_count() -> u8 {
    MAX_ZONE.div_ceil(ZONES_PER_GROUP)
}

/// Zones of a 1-based group, or `None` for an unknown group.
pub fn zone_group(group: u8) -> Option<std::ops::RangeInclusive<u8>> {
    if group == 0 || group > zone_group_count() {
        return None;
    }
    let start = (group - 1) * ZONES_PER_GROUP + 1;
    let end = (start + ZONES_PER_GROUP - 1).min(MAX_ZONE);
    Some(start..=end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_city_is_default() {
        let city = default_city().unwrap();
        assert_eq!(city.id, "city_guatemala");
    }

    #[test]
    fn zone_groups_cover_all_zones() {
        let mut covered = Vec::new();
        for g in 1..=zone_group_count() {
            covered.extend(zone_group(g).unwrap());
        }
        assert_eq!(covered, (MIN_ZONE..=MAX_ZONE).collect::<Vec<_>>());
        assert!(zone_group(0).is_none());
        assert!(zone_group(zone_group_count() + 1).is_none());
    }

    #[test]
    fn zone_bounds() {
        assert!(is_valid_zone(1));
        assert!(is_valid_zone(25));
        assert!(!is_valid_zone(0));
        assert!(!is_valid_zone(26));
    }

    #[test]
    fn synonyms_are_lowercase() {
        for s in SERVICES {
            for syn in s.synonyms {
                assert_eq!(*syn, syn.to_lowercase(), "{} synonym {syn}", s.id);
            }
        }
    }

    #[test]
    fn priority_services_exist() {
        for id in HIGH_PRIORITY_SERVICES {
            assert!(service(id).is_some(), "{id} missing from catalog");
        }
    }
}
