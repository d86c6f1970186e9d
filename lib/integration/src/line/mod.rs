//! LINE Messaging API connector.
//!
//! [`webhook`] verifies and decodes inbound deliveries; [`LineClient`] sends
//! replies and pushes, looks up profiles and downloads message content.

mod client;
pub mod webhook;

pub use client::{LineClient, LineConfig};
pub use webhook::{SIGNATURE_HEADER, WebhookPayload, parse_events, verify_signature};
