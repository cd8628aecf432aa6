//! Pooled byte-stream connections as seen by the bridge.
//!
//! [`UpstreamConnection`] is the outbound half the bridge writes to.
//! [`ConnectionSignal`] carries everything the connection reports back:
//! inbound bytes, lifecycle events and write-buffer watermarks. Signals are
//! delivered in the order the connection produced them.
//!
//! [`ConnectionDriver`] provides both halves over any tokio
//! `AsyncRead + AsyncWrite` transport.

mod channel;
mod counter;
mod driver;

use bytes::Bytes;
pub use channel::{ChannelConnection, ConnectionCommand};
pub use counter::active_connection_count;
pub use driver::{ConnectionDriver, DriverExit, connection_pair};

/// How a connection is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseType {
    /// Drop pending writes and close immediately.
    NoFlush,
    /// Flush pending writes before closing.
    FlushWrite,
}

/// Lifecycle events raised by a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Transport established.
    Connected,
    /// Transport established with early data.
    ConnectedZeroRtt,
    /// Peer closed the transport.
    RemoteClose,
    /// Transport closed locally.
    LocalClose,
}

/// Everything a connection reports to its owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Bytes read from the peer. `end_stream` marks a read half-close.
    Data { data: Bytes, end_stream: bool },
    /// Lifecycle event.
    Event(ConnectionEvent),
    /// Pending outbound bytes crossed the high watermark.
    AboveWriteBufferHighWatermark,
    /// Pending outbound bytes fell back to the low watermark.
    BelowWriteBufferLowWatermark,
}

/// Outbound half of a pooled connection.
pub trait UpstreamConnection {
    /// Queue `data` for the peer, half-closing the write side when
    /// `end_stream` is set.
    fn write(&mut self, data: Bytes, end_stream: bool);

    /// Pause (`true`) or resume (`false`) reading. Calls nest.
    fn read_disable(&mut self, disable: bool);

    /// Close the connection. It must not be released to the pool afterwards.
    fn close(&mut self, close_type: CloseType);

    /// Hand the connection back to its pool for reuse by a later stream.
    fn release(&mut self);
}

impl<C: UpstreamConnection + ?Sized> UpstreamConnection for Box<C> {
    fn write(&mut self, data: Bytes, end_stream: bool) { (**self).write(data, end_stream); }

    fn read_disable(&mut self, disable: bool) { (**self).read_disable(disable); }

    fn close(&mut self, close_type: CloseType) { (**self).close(close_type); }

    fn release(&mut self) { (**self).release(); }
}
