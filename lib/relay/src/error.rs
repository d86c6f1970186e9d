//! Error types for the relay crate.
//!
//! Handling an event never fails outward; these errors only arise while
//! assembling the relay from configuration.

use std::fmt;

/// Errors building relay components.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    /// The response policy settings are unusable.
    InvalidPolicy { reason: String },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPolicy { reason } => write!(f, "invalid response policy: {reason}"),
        }
    }
}

impl std::error::Error for RelayError {}
