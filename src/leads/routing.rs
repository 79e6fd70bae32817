//! Supplier routing: pick up to three suppliers by zone proximity and
//! notify each of them.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::delivery::{MessageGateway, OutboundMessage};
use crate::store::SupplierDirectory;

use super::model::{Lead, Supplier};

/// Suppliers notified per lead.
pub const MAX_CANDIDATES: usize = 3;

/// Rank suppliers for a zone: exact zone, then adjacent zones, then the
/// rest. Inactive suppliers are skipped, duplicates keep their first
/// position, and at most `MAX_CANDIDATES` are returned.
pub fn rank_suppliers(suppliers: &[Supplier], zone: u8) -> Vec<&Supplier> {
    let active = || suppliers.iter().filter(|s| s.active);
    let exact = active().filter(|s| s.zone == zone);
    let adjacent = active().filter(|s| s.zone.abs_diff(zone) == 1);
    let others = active().filter(|s| s.zone.abs_diff(zone) > 1);

    let mut seen = HashSet::new();
    exact
        .chain(adjacent)
        .chain(others)
        .filter(|s| seen.insert(s.id.as_str()))
        .take(MAX_CANDIDATES)
        .collect()
}

/// Routes leads to suppliers through the delivery gateway.
pub struct SupplierRouter {
    directory: Arc<dyn SupplierDirectory>,
    gateway: Arc<dyn MessageGateway>,
}

impl SupplierRouter {
    pub fn new(directory: Arc<dyn SupplierDirectory>, gateway: Arc<dyn MessageGateway>) -> Self {
        Self { directory, gateway }
    }

    /// Notify the best suppliers for `lead`. Never fails: returns the ids
    /// that were notified successfully, possibly none.
    pub async fn route(&self, lead: &Lead) -> Vec<String> {
        let suppliers = match self.directory.query(&lead.service_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(lead_id = %lead.id, service = %lead.service_id, error = %e, "Supplier lookup failed");
                return Vec::new();
            }
        };

        let selected = rank_suppliers(&suppliers, lead.zone);
        if selected.is_empty() {
            info!(lead_id = %lead.id, service = %lead.service_id, zone = lead.zone, "No suppliers for lead");
            return Vec::new();
        }

        let message = OutboundMessage::text(format!("🔔 Nuevo cliente\n{}", lead.summary()));
        let sends = selected.iter().map(|supplier| {
            let message = &message;
            async move {
                match self.gateway.send(&supplier.phone, message).await {
                    Ok(_) => Some(supplier.id.clone()),
                    Err(e) => {
                        warn!(
                            lead_id = %lead.id,
                            supplier = %supplier.id,
                            error = %e,
                            "Supplier notification failed"
                        );
                        None
                    }
                }
            }
        });

        let notified: Vec<String> = join_all(sends).await.into_iter().flatten().collect();
        info!(lead_id = %lead.id, notified = ?notified, "Lead routed");
        notified
    }
}
