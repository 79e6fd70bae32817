//! Persistence layer: libSQL storage for sessions, leads and suppliers.

pub mod libsql_backend;
pub mod migrations;
pub mod suppliers;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use suppliers::StaticDirectory;
pub use traits::{LeadRepository, SupplierDirectory};
