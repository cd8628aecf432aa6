//! The generic upstream contract and its Dubbo-over-TCP implementation.
//!
//! A router drives an upstream through [`GenericUpstream`] and hears back
//! through [`UpstreamToDownstream`]. The connection drives the same upstream
//! through [`UpstreamCallbacks`]. [`TcpUpstream`] sits between the two,
//! forwarding request bytes verbatim and validating response framing.

mod meter;
mod pump;
mod tcp;

use std::fmt;

use bytes::Bytes;
use log::debug;
pub use meter::{BytesMeter, BytesMeterSnapshot};
pub use pump::pump_signals;
pub use tcp::TcpUpstream;
use tokio::sync::mpsc;

use crate::{
    connection::{ConnectionEvent, ConnectionSignal},
    error::Result,
};

/// Request header block supplied by the router. The bridge never reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestHeaders(pub Vec<(String, String)>);

/// Request trailer block supplied by the router. The bridge never reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestTrailers(pub Vec<(String, String)>);

/// Why a stream was reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamResetReason {
    /// The stream was reset locally.
    LocalReset,
    /// The connection carrying the stream went away.
    ConnectionTermination,
    /// The backend sent bytes that are not valid protocol traffic.
    ProtocolError,
}

impl fmt::Display for StreamResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalReset => f.write_str("local reset"),
            Self::ConnectionTermination => f.write_str("connection termination"),
            Self::ProtocolError => f.write_str("protocol error"),
        }
    }
}

/// Operations a router performs on an acquired upstream.
pub trait GenericUpstream {
    /// Headers have no wire representation of their own; when `end_stream`
    /// is set the outbound direction is half-closed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::UpstreamError::NoConnection`] once the connection
    /// has been closed.
    fn encode_headers(&mut self, headers: &RequestHeaders, end_stream: bool) -> Result<()>;

    /// Write request bytes verbatim, half-closing after them when
    /// `end_stream` is set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::UpstreamError::NoConnection`] once the connection
    /// has been closed.
    fn encode_data(&mut self, data: Bytes, end_stream: bool) -> Result<()>;

    /// The protocol has no trailers; ends the request if still open.
    fn encode_trailers(&mut self, trailers: &RequestTrailers);

    /// Pause or resume reading from the connection.
    fn read_disable(&mut self, disable: bool);

    /// Abort the stream: close without flushing and never reuse the
    /// connection.
    fn reset_stream(&mut self);

    /// Current byte counters.
    fn bytes_meter(&self) -> BytesMeterSnapshot;
}

/// Notifications a router receives from its upstream.
pub trait UpstreamToDownstream {
    /// Response bytes ready for the client.
    fn decode_data(&mut self, data: Bytes, end_stream: bool);

    /// The stream ended abnormally. Called at most once.
    fn on_reset_stream(&mut self, reason: StreamResetReason, details: &str);

    /// Stop producing request data.
    fn on_above_write_buffer_high_watermark(&mut self);

    /// Request data production may resume.
    fn on_below_write_buffer_low_watermark(&mut self);
}

/// Events the connection delivers to the upstream that owns it.
pub trait UpstreamCallbacks {
    /// Bytes read from the backend.
    fn on_upstream_data(&mut self, data: Bytes, end_stream: bool);

    /// Lifecycle event from the connection.
    fn on_event(&mut self, event: ConnectionEvent);

    /// Outbound buffer crossed its high watermark.
    fn on_above_write_buffer_high_watermark(&mut self);

    /// Outbound buffer drained to its low watermark.
    fn on_below_write_buffer_low_watermark(&mut self);

    /// Dispatch a [`ConnectionSignal`] to the matching callback.
    fn on_signal(&mut self, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::Data { data, end_stream } => self.on_upstream_data(data, end_stream),
            ConnectionSignal::Event(event) => self.on_event(event),
            ConnectionSignal::AboveWriteBufferHighWatermark => {
                self.on_above_write_buffer_high_watermark();
            }
            ConnectionSignal::BelowWriteBufferLowWatermark => {
                self.on_below_write_buffer_low_watermark();
            }
        }
    }
}

/// Notification recorded by the channel-backed [`UpstreamToDownstream`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// See [`UpstreamToDownstream::decode_data`].
    Data { data: Bytes, end_stream: bool },
    /// See [`UpstreamToDownstream::on_reset_stream`].
    Reset {
        reason: StreamResetReason,
        details: String,
    },
    /// See [`UpstreamToDownstream::on_above_write_buffer_high_watermark`].
    AboveWriteBufferHighWatermark,
    /// See [`UpstreamToDownstream::on_below_write_buffer_low_watermark`].
    BelowWriteBufferLowWatermark,
}

impl UpstreamToDownstream for mpsc::UnboundedSender<UpstreamEvent> {
    fn decode_data(&mut self, data: Bytes, end_stream: bool) {
        deliver(self, UpstreamEvent::Data { data, end_stream });
    }

    fn on_reset_stream(&mut self, reason: StreamResetReason, details: &str) {
        deliver(
            self,
            UpstreamEvent::Reset {
                reason,
                details: details.to_owned(),
            },
        );
    }

    fn on_above_write_buffer_high_watermark(&mut self) {
        deliver(self, UpstreamEvent::AboveWriteBufferHighWatermark);
    }

    fn on_below_write_buffer_low_watermark(&mut self) {
        deliver(self, UpstreamEvent::BelowWriteBufferLowWatermark);
    }
}

fn deliver(tx: &mpsc::UnboundedSender<UpstreamEvent>, event: UpstreamEvent) {
    if tx.send(event).is_err() {
        debug!("downstream receiver dropped; discarding upstream event");
    }
}
