//! Lead priority scoring.

use crate::catalog::{HIGH_PRIORITY_SERVICES, HIGH_VALUE_ZONES};
use crate::session::Urgency;

const URGENT_POINTS: u8 = 40;
const PRIORITY_SERVICE_POINTS: u8 = 30;
const HIGH_VALUE_ZONE_POINTS: u8 = 20;
const MAX_SCORE: u8 = 100;

/// Score a lead in `0..=100`. Pure and deterministic.
pub fn score_lead(urgency: Urgency, service_id: &str, zone: u8) -> u8 {
    let mut score: u8 = 0;
    if urgency == Urgency::Now {
        score += URGENT_POINTS;
    }
    if HIGH_PRIORITY_SERVICES.contains(&service_id) {
        score += PRIORITY_SERVICE_POINTS;
    }
    if HIGH_VALUE_ZONES.contains(&zone) {
        score += HIGH_VALUE_ZONE_POINTS;
    }
    score.min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MAX_ZONE, MIN_ZONE, SERVICES};

    #[test]
    fn components_add_up() {
        assert_eq!(score_lead(Urgency::Later, "srv_pintor", 1), 0);
        assert_eq!(score_lead(Urgency::Now, "srv_pintor", 1), 40);
        assert_eq!(score_lead(Urgency::Later, "srv_plomero", 1), 30);
        assert_eq!(score_lead(Urgency::Later, "srv_pintor", 10), 20);
        assert_eq!(score_lead(Urgency::Now, "srv_electricista", 14), 90);
    }

    #[test]
    fn always_within_bounds_and_deterministic() {
        for urgency in [Urgency::Now, Urgency::Later] {
            for service in SERVICES {
                for zone in MIN_ZONE..=MAX_ZONE {
                    let a = score_lead(urgency, service.id, zone);
                    let b = score_lead(urgency, service.id, zone);
                    assert!(a <= 100);
                    assert_eq!(a, b);
                }
            }
        }
    }

    #[test]
    fn unknown_service_scores_no_service_points() {
        assert_eq!(score_lead(Urgency::Now, "srv_unknown", 2), 40);
    }
}
