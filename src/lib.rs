//! Lead intake: conversational service requests over WhatsApp.

pub mod catalog;
pub mod config;
pub mod delivery;
pub mod error;
pub mod flow;
pub mod leads;
pub mod parsing;
pub mod session;
pub mod store;
pub mod webhook;
