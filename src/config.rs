//! Tunables for the bridge and the tokio connection driver.
//!
//! Destination selection and pool sizing belong to the pool collaborator;
//! only buffering and flow-control limits are configured here.

use std::io;

use crate::frame::HEADER_SIZE;

/// Default budget for response bytes held back by the decoder (16 MiB).
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 16 * 1024 * 1024;
/// Default size of a single socket read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;
/// Default pending-write level that raises the high watermark (1 MiB).
pub const DEFAULT_HIGH_WATERMARK: usize = 1024 * 1024;
/// Default pending-write level that clears the high watermark.
pub const DEFAULT_LOW_WATERMARK: usize = DEFAULT_HIGH_WATERMARK / 2;
/// Default depth of the channel carrying connection signals to the bridge.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 64;

/// How validated response bytes are released to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FramingMode {
    /// Forward bytes as they arrive once the frame header has been validated.
    #[default]
    Streaming,
    /// Hold bytes back until the declared body length has been received.
    WholeFrame,
}

/// Settings applied to each [`crate::upstream::TcpUpstream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Release policy for response bytes.
    pub framing: FramingMode,
    /// Upper bound on response bytes held back while framing.
    pub max_buffered_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            framing: FramingMode::Streaming,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
        }
    }
}

impl BridgeConfig {
    /// Select the release policy.
    #[must_use]
    pub fn framing(mut self, framing: FramingMode) -> Self {
        self.framing = framing;
        self
    }

    /// Set the buffer budget. Values below [`HEADER_SIZE`] are raised to it.
    #[must_use]
    pub fn max_buffered_bytes(mut self, max: usize) -> Self {
        self.max_buffered_bytes = max.max(HEADER_SIZE);
        self
    }
}

/// Settings for [`crate::connection::ConnectionDriver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Bytes requested per socket read.
    pub read_chunk_size: usize,
    /// Pending outbound bytes at which the high watermark fires.
    pub high_watermark: usize,
    /// Pending outbound bytes at which the low watermark fires.
    pub low_watermark: usize,
    /// Capacity of the signal channel from the driver to the bridge.
    pub signal_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            high_watermark: DEFAULT_HIGH_WATERMARK,
            low_watermark: DEFAULT_LOW_WATERMARK,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    /// Set the read chunk size (at least one byte).
    #[must_use]
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set both write buffer watermarks.
    #[must_use]
    pub fn watermarks(mut self, low: usize, high: usize) -> Self {
        self.low_watermark = low;
        self.high_watermark = high;
        self
    }

    /// Set the signal channel capacity (at least one slot).
    #[must_use]
    pub fn signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = capacity.max(1);
        self
    }

    /// Check the watermark ordering.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] if the low watermark exceeds
    /// the high watermark or the high watermark is zero.
    pub fn validate(&self) -> io::Result<()> {
        if self.high_watermark == 0 || self.low_watermark > self.high_watermark {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "low watermark must not exceed a non-zero high watermark",
            ));
        }
        Ok(())
    }
}
