//! Messaging platform integration for the muaddib relay.
//!
//! This crate provides:
//!
//! - **Connector traits**: delivery, profile lookup and content download
//! - **LINE connector**: webhook verification and the Messaging API client
//! - **Image store**: bounded-age storage for received images

pub mod connector;
pub mod error;
pub mod image_store;
pub mod line;

pub use connector::{ContentSource, DeliveryGateway, OutboundMessage, ProfileLookup};
pub use error::{ConnectorError, StoreError, WebhookError};
pub use image_store::{DEFAULT_MAX_AGE, ImageStore};
pub use line::{LineClient, LineConfig};
