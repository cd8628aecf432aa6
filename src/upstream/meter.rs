//! Per-stream byte accounting.

use crate::{
    frame::HEADER_SIZE,
    metrics::{self, Direction},
};

/// Counters owned by a single bridge.
///
/// Values only grow for the lifetime of the stream. Observers read
/// [`BytesMeterSnapshot`] copies; the global metrics facade is updated as the
/// counters move.
#[derive(Debug, Default)]
pub struct BytesMeter {
    snapshot: BytesMeterSnapshot,
}

/// Point-in-time copy of a [`BytesMeter`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BytesMeterSnapshot {
    /// Request bytes handed to the connection.
    pub wire_bytes_sent: u64,
    /// Response bytes received from the connection.
    pub wire_bytes_received: u64,
    /// Response bytes that were frame headers.
    pub header_bytes_received: u64,
    /// Response frame headers validated.
    pub frames_validated: u64,
}

impl BytesMeter {
    /// Record request bytes written.
    pub fn add_wire_bytes_sent(&mut self, bytes: usize) {
        let bytes = bytes as u64;
        self.snapshot.wire_bytes_sent += bytes;
        metrics::add_bytes(Direction::Outbound, bytes);
    }

    /// Record response bytes received.
    pub fn add_wire_bytes_received(&mut self, bytes: usize) {
        let bytes = bytes as u64;
        self.snapshot.wire_bytes_received += bytes;
        metrics::add_bytes(Direction::Inbound, bytes);
    }

    /// Record validated frame headers.
    pub fn add_frames_validated(&mut self, frames: u64) {
        if frames == 0 {
            return;
        }
        self.snapshot.frames_validated += frames;
        self.snapshot.header_bytes_received += frames * HEADER_SIZE as u64;
        metrics::add_frames(frames);
    }

    /// Copy the current counters.
    #[must_use]
    pub fn snapshot(&self) -> BytesMeterSnapshot { self.snapshot }
}
