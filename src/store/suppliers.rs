//! Supplier directory backed by a fixed list, loaded from JSON.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::error::{ConfigError, DatabaseError};
use crate::leads::Supplier;

use super::traits::SupplierDirectory;

#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    suppliers: Vec<Supplier>,
}

impl StaticDirectory {
    pub fn new(suppliers: Vec<Supplier>) -> Self {
        Self { suppliers }
    }

    /// Load a JSON array of suppliers.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let suppliers: Vec<Supplier> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                key: "INTAKE_SUPPLIERS_FILE".into(),
                message: format!("{}: {e}", path.display()),
            })?;
        info!(path = %path.display(), count = suppliers.len(), "Suppliers loaded");
        Ok(Self { suppliers })
    }

    pub fn suppliers(&self) -> &[Supplier] {
        &self.suppliers
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }
}

#[async_trait]
impl SupplierDirectory for StaticDirectory {
    async fn query(&self, service_id: &str) -> Result<Vec<Supplier>, DatabaseError> {
        Ok(self
            .suppliers
            .iter()
            .filter(|s| s.active && s.service_id == service_id)
            .cloned()
            .collect())
    }
}
