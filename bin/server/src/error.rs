//! Error types for the server.
//!
//! `ServerError` covers startup; `CallbackError` is the webhook route's
//! rejection and maps onto an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Errors that stop the server from starting or serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Configuration is missing or invalid.
    InvalidConfig { reason: String },
    /// A component could not be built.
    ComponentInit { component: &'static str, reason: String },
    /// The listener could not bind.
    Bind { addr: String, reason: String },
    /// The HTTP server stopped with an error.
    Serve { reason: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::ComponentInit { component, reason } => {
                write!(f, "failed to initialize {component}: {reason}")
            }
            Self::Bind { addr, reason } => write!(f, "failed to bind {addr}: {reason}"),
            Self::Serve { reason } => write!(f, "server error: {reason}"),
        }
    }
}

impl std::error::Error for ServerError {}

/// Rejections from the webhook route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The signature header is missing or wrong.
    InvalidSignature,
    /// The body could not be decoded.
    MalformedPayload(String),
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::MalformedPayload(reason) => write!(f, "malformed payload: {reason}"),
        }
    }
}

impl std::error::Error for CallbackError {}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidSignature => {
                tracing::warn!("webhook signature check failed; verify the channel secret");
            }
            Self::MalformedPayload(reason) => {
                tracing::warn!(reason, "webhook payload rejected");
            }
        }
        (StatusCode::BAD_REQUEST, "Bad Request").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:5000".to_string(),
            reason: "address in use".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:5000"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn callback_errors_are_bad_requests() {
        let response = CallbackError::InvalidSignature.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
