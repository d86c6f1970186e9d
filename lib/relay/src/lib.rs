//! Decision logic of the muaddib relay.
//!
//! This crate provides:
//!
//! - **Response policy**: allow-list, mention, individual-chat and sampling rules
//! - **Reply orchestrator**: the text pipeline from decision to delivery
//! - **Image analysis handler**: the pipeline for received images
//! - **Relay**: routes inbound events to the right pipeline

pub mod error;
pub mod image;
pub mod orchestrator;
pub mod policy;
pub mod relay;

#[cfg(test)]
mod testing;

pub use error::RelayError;
pub use image::{ImageAnalysisHandler, ImageOutcome};
pub use orchestrator::{ReplyOrchestrator, ReplyOutcome};
pub use policy::{Decision, PolicyConfig, ResponsePolicy, SkipReason, Trigger};
pub use relay::{EventOutcome, Relay};
