//! Metric helpers for `dubbo_tcp_upstream`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking driven upstream connections.
pub const CONNECTIONS_ACTIVE: &str = "dubbo_upstream_connections_active";
/// Name of the counter tracking bytes moved across the bridge.
pub const BYTES_TOTAL: &str = "dubbo_upstream_bytes_total";
/// Name of the counter tracking validated response frame headers.
pub const FRAMES_VALIDATED: &str = "dubbo_upstream_frames_total";
/// Name of the counter tracking streams reset by the bridge.
pub const ERRORS_TOTAL: &str = "dubbo_upstream_errors_total";

/// Direction of byte flow relative to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Response bytes received from the backend.
    Inbound,
    /// Request bytes sent to the backend.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record `bytes` moved in `direction`.
pub fn add_bytes(direction: Direction, bytes: u64) {
    #[cfg(feature = "metrics")]
    counter!(BYTES_TOTAL, "direction" => direction.as_str()).increment(bytes);
    #[cfg(not(feature = "metrics"))]
    let _ = (direction, bytes);
}

/// Record validated frame headers.
pub fn add_frames(frames: u64) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_VALIDATED).increment(frames);
    #[cfg(not(feature = "metrics"))]
    let _ = frames;
}

/// Record a stream reset caused by a framing or transport error.
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
