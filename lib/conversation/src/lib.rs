//! Conversation memory for the muaddib relay.
//!
//! This crate provides:
//!
//! - **Turns**: immutable user/assistant messages
//! - **Sessions**: a bounded, time-expiring history per conversation key
//! - **Session Store**: the keyed store with per-key serialization

pub mod message;
pub mod session;

pub use message::{Turn, TurnRole};
pub use session::{Session, SessionConfig, SessionStore};
