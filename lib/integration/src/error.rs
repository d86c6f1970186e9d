//! Error types for the integration crate.
//!
//! - `ConnectorError`: failures talking to the messaging platform
//! - `StoreError`: failures writing received images to disk
//! - `WebhookError`: rejected or unreadable webhook deliveries

use std::fmt;

/// Errors from messaging platform operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Connection to service failed.
    ConnectionFailed { reason: String },
    /// The platform answered with a non-success status.
    ApiError { status: u16, body: String },
    /// Timeout waiting for response.
    Timeout,
    /// The platform returned something unexpected.
    ProtocolError { reason: String },
    /// Invalid connector configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "connection failed: {reason}")
            }
            Self::ApiError { status, body } => {
                write!(f, "platform API returned {status}: {body}")
            }
            Self::Timeout => write!(f, "operation timed out"),
            Self::ProtocolError { reason } => {
                write!(f, "protocol error: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid connector configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for ConnectorError {}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::ConnectionFailed {
                reason: err.to_string(),
            }
        }
    }
}

/// Errors from the image store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The storage directory could not be created.
    CreateDirFailed { path: String, reason: String },
    /// Writing an image failed.
    WriteFailed { path: String, reason: String },
    /// Listing the storage directory failed.
    ListFailed { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDirFailed { path, reason } => {
                write!(f, "failed to create image directory {path}: {reason}")
            }
            Self::WriteFailed { path, reason } => {
                write!(f, "failed to write image {path}: {reason}")
            }
            Self::ListFailed { reason } => {
                write!(f, "failed to list image directory: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from inbound webhook handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// The signature header is missing or does not match the body.
    InvalidSignature,
    /// The body is not a valid webhook payload.
    MalformedPayload { reason: String },
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "invalid webhook signature"),
            Self::MalformedPayload { reason } => {
                write!(f, "malformed webhook payload: {reason}")
            }
        }
    }
}

impl std::error::Error for WebhookError {}
