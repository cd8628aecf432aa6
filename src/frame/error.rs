//! Error types raised while validating response framing.
//!
//! - [`FramingError`]: the inbound bytes cannot be Dubbo frames, or the
//!   accumulation buffer outgrew its budget. Always fatal to the stream.
//! - [`EofError`]: end of stream reached inside a header or body.

use thiserror::Error;

use super::header::{HEADER_SIZE, PROTOCOL_ERROR_MESSAGE};

/// Framing violations detected in the response stream.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// The first two bytes of a header are not the Dubbo magic value.
    #[error("{PROTOCOL_ERROR_MESSAGE}")]
    InvalidMagic {
        /// Magic value actually received.
        found: u16,
    },

    /// Buffered response bytes exceed the configured maximum.
    #[error("response buffer exceeds max length: {size} > {max}")]
    BufferOverflow {
        /// Bytes that would have been buffered.
        size: usize,
        /// Configured buffer budget.
        max: usize,
    },
}

/// Premature end of the response stream.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// Stream ended while a header was partially buffered.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },

    /// Stream ended before the declared body was fully received.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Frame bytes received before EOF.
        bytes_received: u64,
        /// Declared frame size.
        expected: u64,
    },
}

impl EofError {
    /// Build a mid-header error for `bytes_received` buffered bytes.
    #[must_use]
    pub fn mid_header(bytes_received: usize) -> Self {
        Self::MidHeader {
            bytes_received,
            header_size: HEADER_SIZE,
        }
    }
}
