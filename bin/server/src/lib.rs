//! muaddib webhook server.
//!
//! Receives LINE webhook deliveries and hands each event to the relay.

pub mod app;
pub mod config;
pub mod error;
pub mod webhook;
