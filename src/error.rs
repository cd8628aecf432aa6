//! Canonical error and result types for caller-facing operations.
//!
//! Transport and framing failures never surface here: the bridge reports
//! them to the caller as stream resets. `UpstreamError` only covers calls the
//! caller should not have made.

use thiserror::Error;

/// Local failures returned to the caller without any wire I/O.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// No connection pool is configured for the destination.
    #[error("no connection pool configured for destination")]
    InvalidPool,
    /// The connection is closed; nothing can be sent.
    #[error("upstream connection is not available")]
    NoConnection,
    /// `new_stream` was already called on this adapter.
    #[error("a stream has already been requested from this pool")]
    StreamAlreadyRequested,
}

/// Result type for caller-facing operations.
pub type Result<T, E = UpstreamError> = std::result::Result<T, E>;
