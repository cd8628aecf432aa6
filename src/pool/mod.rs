//! Connection acquisition on behalf of a router stream.
//!
//! The pool itself is a collaborator: this module defines the traits it must
//! implement and [`TcpConnPool`], the adapter that turns a pool outcome into
//! a ready [`crate::upstream::TcpUpstream`].
//!
//! ```text
//! caller ── new_stream ──▶ TcpConnPool ── new_connection ──▶ ConnectionPool
//!                              ▲                                   │
//!                              └──────── on_pool_outcome ◀─────────┘
//!                                  Ready  → on_pool_ready(upstream, host)
//!                                  Failed → on_pool_failure(reason, details, host)
//! ```

mod adapter;
mod callbacks;

use std::{fmt, sync::Arc};

pub use adapter::TcpConnPool;
pub use callbacks::{ChannelPoolCallbacks, PoolEvent};
use tokio_util::sync::CancellationToken;

use crate::{
    connection::UpstreamConnection,
    upstream::{TcpUpstream, UpstreamToDownstream},
};

/// Shared, read-only description of the backend a connection belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostDescription {
    cluster: String,
    address: String,
}

impl HostDescription {
    /// Describe `address` as a member of `cluster`.
    #[must_use]
    pub fn new(cluster: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            address: address.into(),
        }
    }

    /// Cluster the host belongs to.
    #[must_use]
    pub fn cluster(&self) -> &str { &self.cluster }

    /// Backend address, usually `host:port`.
    #[must_use]
    pub fn address(&self) -> &str { &self.address }
}

impl fmt::Display for HostDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster, self.address)
    }
}

/// Routing priority used to select a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Regular traffic.
    #[default]
    Default,
    /// Traffic routed to the high-priority pool.
    High,
}

/// Load-balancing hints passed through to the pool untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadBalancerContext {
    /// Consistent-hash key chosen by the router.
    pub hash_key: Option<u64>,
}

/// Why the pool could not deliver a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolFailureReason {
    /// The pool is at capacity.
    Overflow,
    /// The connection failed on the local side.
    LocalConnectionFailure,
    /// The backend refused or dropped the connection.
    RemoteConnectionFailure,
    /// Establishing the connection timed out.
    Timeout,
}

impl fmt::Display for PoolFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Overflow => "overflow",
            Self::LocalConnectionFailure => "local connection failure",
            Self::RemoteConnectionFailure => "remote connection failure",
            Self::Timeout => "timeout",
        };
        f.write_str(text)
    }
}

/// How an outstanding acquisition is abandoned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CancelPolicy {
    /// Abandon the request; the pool keeps any connection it was creating.
    #[default]
    Default,
    /// Abandon the request and let the pool close excess connections.
    CloseExcess,
}

/// Result of one acquisition.
#[derive(Debug)]
pub enum PoolOutcome<C> {
    /// A connection is ready for exclusive use.
    Ready {
        connection: C,
        host: Arc<HostDescription>,
    },
    /// No connection could be provided.
    Failed {
        reason: PoolFailureReason,
        transport_failure_reason: String,
        host: Option<Arc<HostDescription>>,
    },
}

/// Immediate answer from [`ConnectionPool::new_connection`].
#[derive(Debug)]
pub enum PendingConnection<C> {
    /// The pool completed the request inline.
    Complete(PoolOutcome<C>),
    /// The outcome will arrive later; cancelling the token abandons it.
    Pending(CancellationToken),
}

/// Pool of connections to one destination.
pub trait ConnectionPool {
    /// Connection type handed out by the pool.
    type Connection: UpstreamConnection;

    /// Host the pool connects to.
    fn host(&self) -> Arc<HostDescription>;

    /// Request one connection.
    fn new_connection(&mut self, ctx: &LoadBalancerContext) -> PendingConnection<Self::Connection>;

    /// Observe cancellation of a pending request. The default ignores the
    /// policy; the token has already been cancelled when this runs.
    fn on_cancel(&mut self, _policy: CancelPolicy) {}
}

/// Per-worker view of a cluster able to hand out pools.
pub trait ThreadLocalCluster {
    /// Pool type for this cluster.
    type Pool: ConnectionPool;

    /// Pool for `priority`, or `None` when the destination has no TCP pool.
    fn tcp_conn_pool(&self, priority: Priority, ctx: &LoadBalancerContext) -> Option<Self::Pool>;
}

/// Receives the outcome of [`TcpConnPool::new_stream`].
pub trait GenericConnectionPoolCallbacks<C: UpstreamConnection> {
    /// Sink the bridge reports to once built.
    type Downstream: UpstreamToDownstream;

    /// Provide the sink for a bridge about to be built.
    fn upstream_to_downstream(&mut self) -> Self::Downstream;

    /// A bridge is ready on a connection to `host`.
    fn on_pool_ready(&mut self, upstream: TcpUpstream<C, Self::Downstream>, host: Arc<HostDescription>);

    /// Acquisition failed. Arguments are forwarded unchanged from the pool.
    fn on_pool_failure(
        &mut self,
        reason: PoolFailureReason,
        transport_failure_reason: &str,
        host: Option<Arc<HostDescription>>,
    );
}
