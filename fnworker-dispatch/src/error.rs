//! Errors raised by the worker itself rather than reported to the host.

use thiserror::Error;

/// Failures of the receive loop and its configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The host side of the outbound channel went away.
    #[error("outbound channel closed")]
    OutboundClosed,

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: {reason}")]
    Config {
        /// Variable name.
        var: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
