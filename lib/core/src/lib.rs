//! Core domain types and capabilities for the muaddib relay.
//!
//! This crate provides the conversation key and chat source model, the
//! shared `Result` alias, and the clock and random-source capabilities that
//! the decision engine takes by injection.

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod random;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, UNKNOWN_IDENTITY};
pub use event::{EventContent, InboundEvent};
pub use id::{ChatSource, ConversationKey, HandlingId, ImageId, ParseIdError, SourceKind};
pub use random::{FixedRandom, RandomSource, SeededRandom};
