//! Conversation sessions and cooldown markers.

pub mod memory;
pub mod model;
pub mod store;

pub use memory::MemoryStore;
pub use model::{FlowState, Lang, MissingField, PendingLead, Role, Session, Source, Urgency};
pub use store::{CooldownStore, SessionStore};
