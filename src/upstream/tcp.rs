//! Dubbo-over-TCP bridge between a router stream and a pooled connection.

use bytes::Bytes;
use log::{debug, trace, warn};

use super::{
    BytesMeter,
    BytesMeterSnapshot,
    GenericUpstream,
    RequestHeaders,
    RequestTrailers,
    StreamResetReason,
    UpstreamCallbacks,
    UpstreamToDownstream,
};
use crate::{
    config::BridgeConfig,
    connection::{CloseType, ConnectionEvent, UpstreamConnection},
    error::{Result, UpstreamError},
    frame::{DecodeStatus, ResponseDecoder},
    metrics,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectionState {
    /// Usable in both directions.
    Open,
    /// The backend ended its response stream.
    PeerFinished,
    /// Closed locally or by the peer; never returned to the pool.
    Closed,
}

/// Upstream bridging a router stream onto one exclusively owned connection.
///
/// Request bytes are written verbatim. Response bytes pass through a
/// [`ResponseDecoder`] before reaching the caller, so non-Dubbo traffic is
/// rejected as soon as its first header is buffered.
///
/// Dropping the bridge returns the connection to its pool only when it is
/// still open and sits at a response frame boundary; otherwise the
/// connection is closed.
pub struct TcpUpstream<C: UpstreamConnection, D: UpstreamToDownstream> {
    downstream: Option<D>,
    connection: C,
    state: ConnectionState,
    decoder: ResponseDecoder,
    meter: BytesMeter,
    request_complete: bool,
}

impl<C: UpstreamConnection, D: UpstreamToDownstream> TcpUpstream<C, D> {
    /// Take ownership of `connection` on behalf of `downstream`.
    #[must_use]
    pub fn new(downstream: D, connection: C) -> Self {
        Self::with_config(downstream, connection, BridgeConfig::default())
    }

    /// Like [`TcpUpstream::new`] with explicit framing settings.
    #[must_use]
    pub fn with_config(downstream: D, connection: C, config: BridgeConfig) -> Self {
        Self {
            downstream: Some(downstream),
            connection,
            state: ConnectionState::Open,
            decoder: ResponseDecoder::new(config.framing, config.max_buffered_bytes),
            meter: BytesMeter::default(),
            request_complete: false,
        }
    }

    /// Whether the stream has ended, successfully or not. No further caller
    /// callbacks follow once this returns `true`.
    #[must_use]
    pub fn is_finished(&self) -> bool { self.downstream.is_none() }

    /// Whether the outbound direction has been half-closed.
    #[must_use]
    pub fn is_request_complete(&self) -> bool { self.request_complete }

    fn write(&mut self, data: Bytes, end_stream: bool) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(UpstreamError::NoConnection);
        }
        if self.request_complete {
            debug!("ignoring {} request bytes after end of stream", data.len());
            return Ok(());
        }
        self.meter.add_wire_bytes_sent(data.len());
        self.connection.write(data, end_stream);
        self.request_complete = end_stream;
        Ok(())
    }

    fn forward(&mut self, data: Bytes, end_stream: bool) {
        if let Some(downstream) = self.downstream.as_mut() {
            downstream.decode_data(data, end_stream);
        }
        if end_stream {
            self.downstream = None;
        }
    }

    /// Close the connection and report a single reset to the caller.
    fn fail(&mut self, reason: StreamResetReason, details: &str) {
        warn!("resetting dubbo upstream stream: reason={reason}, details={details}");
        metrics::inc_errors("protocol");
        self.connection.close(CloseType::NoFlush);
        self.state = ConnectionState::Closed;
        if let Some(mut downstream) = self.downstream.take() {
            downstream.on_reset_stream(reason, details);
        }
    }
}

impl<C: UpstreamConnection, D: UpstreamToDownstream> GenericUpstream for TcpUpstream<C, D> {
    fn encode_headers(&mut self, _headers: &RequestHeaders, end_stream: bool) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(UpstreamError::NoConnection);
        }
        if end_stream {
            self.write(Bytes::new(), true)?;
        }
        Ok(())
    }

    fn encode_data(&mut self, data: Bytes, end_stream: bool) -> Result<()> {
        self.write(data, end_stream)
    }

    fn encode_trailers(&mut self, _trailers: &RequestTrailers) {
        if self.state != ConnectionState::Closed && !self.request_complete {
            self.connection.write(Bytes::new(), true);
            self.request_complete = true;
        }
    }

    fn read_disable(&mut self, disable: bool) {
        if self.state != ConnectionState::Closed {
            self.connection.read_disable(disable);
        }
    }

    fn reset_stream(&mut self) {
        debug!("dubbo upstream stream reset locally");
        self.downstream = None;
        if self.state != ConnectionState::Closed {
            self.connection.close(CloseType::NoFlush);
            self.state = ConnectionState::Closed;
        }
    }

    fn bytes_meter(&self) -> BytesMeterSnapshot { self.meter.snapshot() }
}

impl<C: UpstreamConnection, D: UpstreamToDownstream> UpstreamCallbacks for TcpUpstream<C, D> {
    fn on_upstream_data(&mut self, data: Bytes, end_stream: bool) {
        if self.is_finished() {
            trace!("discarding {} response bytes after stream end", data.len());
            return;
        }
        self.meter.add_wire_bytes_received(data.len());

        let decoded = match self.decoder.push(&data) {
            Ok(decoded) => decoded,
            Err(err) => {
                self.fail(StreamResetReason::ProtocolError, &err.to_string());
                return;
            }
        };
        self.meter
            .add_frames_validated(decoded.headers_validated);

        if end_stream {
            self.state = ConnectionState::PeerFinished;
            match self.decoder.finish() {
                Ok(()) => self.forward(decoded.data, true),
                Err(eof) => {
                    if !decoded.data.is_empty() {
                        self.forward(decoded.data, false);
                    }
                    self.fail(StreamResetReason::ProtocolError, &eof.to_string());
                }
            }
            return;
        }

        match decoded.status {
            DecodeStatus::Ok => self.forward(decoded.data, false),
            DecodeStatus::NeedMoreData => {
                trace!(
                    "awaiting more response bytes: buffered={}",
                    self.decoder.buffered_len()
                );
            }
            DecodeStatus::InvalidHeader => {}
        }
    }

    fn on_event(&mut self, event: ConnectionEvent) {
        let (reason, details) = match event {
            ConnectionEvent::Connected | ConnectionEvent::ConnectedZeroRtt => {
                debug!("dubbo upstream connection event: {event:?}");
                return;
            }
            ConnectionEvent::RemoteClose => {
                (StreamResetReason::ConnectionTermination, "remote close")
            }
            ConnectionEvent::LocalClose => (StreamResetReason::LocalReset, "local close"),
        };
        self.state = ConnectionState::Closed;
        if let Some(mut downstream) = self.downstream.take() {
            debug!("dubbo upstream connection closed mid-stream: {event:?}");
            downstream.on_reset_stream(reason, details);
        }
    }

    fn on_above_write_buffer_high_watermark(&mut self) {
        if let Some(downstream) = self.downstream.as_mut() {
            downstream.on_above_write_buffer_high_watermark();
        }
    }

    fn on_below_write_buffer_low_watermark(&mut self) {
        if let Some(downstream) = self.downstream.as_mut() {
            downstream.on_below_write_buffer_low_watermark();
        }
    }
}

impl<C: UpstreamConnection, D: UpstreamToDownstream> Drop for TcpUpstream<C, D> {
    fn drop(&mut self) {
        match self.state {
            ConnectionState::Open if self.decoder.is_at_frame_boundary() => {
                self.connection.release();
            }
            ConnectionState::Open | ConnectionState::PeerFinished => {
                self.connection.close(CloseType::NoFlush);
            }
            ConnectionState::Closed => {}
        }
    }
}
