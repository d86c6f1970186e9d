//! Shared error plumbing for the relay crates.
//!
//! Every crate owns its own error enums (`LlmError`, `ConnectorError`,
//! `ServerError`, ...). Fallible operations return them wrapped in a
//! rootcause [`Report`]. A caller in a higher layer re-types a failure into
//! its own enum with `map_err`, keeping the lower report's message as the
//! reason.

use rootcause::Report;

/// Result alias carrying a rootcause [`Report`] of context `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Sentinel identity used when a user's profile cannot be resolved.
///
/// Routing through this value selects a random fallback persona rather than
/// failing the request.
pub const UNKNOWN_IDENTITY: &str = "unknown";
