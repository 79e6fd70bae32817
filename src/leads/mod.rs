//! Leads: scoring, persistence and supplier routing.

pub mod model;
pub mod routing;
pub mod scoring;
pub mod sink;

pub use model::{Lead, Supplier};
pub use routing::SupplierRouter;
pub use scoring::score_lead;
pub use sink::{FallbackLog, LeadSink, PersistenceGateway};
