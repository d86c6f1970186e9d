//! Error types for the AI crate.
//!
//! `LlmError` covers everything that can go wrong talking to a completion or
//! image-generation backend. Callers in the relay never surface these to chat
//! users; they log the report and fall back to canned text.

use std::fmt;

/// Errors from completion and image-generation backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The HTTP request could not be sent or did not complete.
    RequestFailed { reason: String },
    /// The backend answered with a non-success status.
    ApiError { status: u16, body: String },
    /// Timeout waiting for response.
    Timeout,
    /// The response body did not have the expected shape.
    ResponseParseFailed { reason: String },
    /// The backend returned no usable content.
    EmptyResponse,
    /// Invalid configuration.
    InvalidConfig { reason: String },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => {
                write!(f, "LLM request failed: {reason}")
            }
            Self::ApiError { status, body } => {
                write!(f, "LLM API returned {status}: {body}")
            }
            Self::Timeout => write!(f, "LLM request timed out"),
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse LLM response: {reason}")
            }
            Self::EmptyResponse => write!(f, "LLM returned no content"),
            Self::InvalidConfig { reason } => {
                write!(f, "invalid LLM configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::RequestFailed {
                reason: err.to_string(),
            }
        }
    }
}
