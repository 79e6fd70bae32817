//! Persistence interfaces for leads and suppliers.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::leads::{Lead, Supplier};

/// Durable lead storage.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError>;
}

/// Read-only view of the supplier roster.
#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    /// Active suppliers offering `service_id`.
    async fn query(&self, service_id: &str) -> Result<Vec<Supplier>, DatabaseError>;
}
