//! Conversation flow: inbound events, prompts, the state machine and the
//! engine that drives it.

pub mod engine;
pub mod event;
pub mod locks;
pub mod machine;
pub mod prompts;

pub use engine::{EngineSettings, IntakeEngine};
pub use event::{EventContent, InboundEvent, Selection};
pub use locks::UserLocks;
pub use machine::{Effect, Rejection, Transition, TransitionContext, transition};
