#![doc(html_root_url = "https://docs.rs/dubbo_tcp_upstream/latest")]
//! Public API for the `dubbo_tcp_upstream` library.
//!
//! This crate bridges a router's generic upstream contract onto pooled TCP
//! connections speaking the Dubbo RPC protocol. Request bytes are forwarded
//! verbatim; response bytes are validated against the fixed 16-byte Dubbo
//! header before they reach the caller.
//!
//! - [`pool::TcpConnPool`] acquires a connection and builds the bridge.
//! - [`upstream::TcpUpstream`] forwards bytes and lifecycle events.
//! - [`frame::ResponseDecoder`] runs the frame validation state machine.
//! - [`connection::ConnectionDriver`] runs a pooled transport on tokio.

pub mod byte_order;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod pool;
pub mod upstream;

#[cfg(test)]
mod test_helpers;

pub use config::{BridgeConfig, ConnectionConfig, FramingMode};
pub use connection::{
    ChannelConnection,
    CloseType,
    ConnectionDriver,
    ConnectionEvent,
    ConnectionSignal,
    UpstreamConnection,
    connection_pair,
};
pub use error::{Result, UpstreamError};
pub use frame::{DecodeStatus, FrameHeader, PROTOCOL_ERROR_MESSAGE, ResponseDecoder};
pub use pool::{
    ConnectionPool,
    GenericConnectionPoolCallbacks,
    HostDescription,
    LoadBalancerContext,
    PendingConnection,
    PoolFailureReason,
    PoolOutcome,
    TcpConnPool,
};
pub use upstream::{
    GenericUpstream,
    StreamResetReason,
    TcpUpstream,
    UpstreamCallbacks,
    UpstreamEvent,
    UpstreamToDownstream,
};
