//! Adapter requesting one pooled connection per router stream.

use std::sync::Arc;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::{
    CancelPolicy,
    ConnectionPool,
    GenericConnectionPoolCallbacks,
    HostDescription,
    LoadBalancerContext,
    PendingConnection,
    PoolOutcome,
    Priority,
    ThreadLocalCluster,
};
use crate::{
    config::BridgeConfig,
    connection::UpstreamConnection,
    error::{Result, UpstreamError},
    upstream::TcpUpstream,
};

/// Acquires a connection for one stream and builds its [`TcpUpstream`].
///
/// # Examples
///
/// ```ignore
/// let mut adapter = TcpConnPool::new(&cluster, Priority::Default, LoadBalancerContext::default());
/// adapter.new_stream(callbacks)?;
/// // later, on the stream's task:
/// adapter.on_pool_outcome(outcome);
/// ```
pub struct TcpConnPool<P: ConnectionPool, K> {
    pool: Option<P>,
    ctx: LoadBalancerContext,
    config: BridgeConfig,
    callbacks: Option<K>,
    upstream_handle: Option<CancellationToken>,
    requested: bool,
}

impl<P, K> TcpConnPool<P, K>
where
    P: ConnectionPool,
    K: GenericConnectionPoolCallbacks<P::Connection>,
{
    /// Resolve the pool for `priority` from `cluster`.
    #[must_use]
    pub fn new<T>(cluster: &T, priority: Priority, ctx: LoadBalancerContext) -> Self
    where
        T: ThreadLocalCluster<Pool = P>,
    {
        let pool = cluster.tcp_conn_pool(priority, &ctx);
        Self::from_pool(pool, ctx)
    }

    /// Wrap an already resolved pool, or `None` for an unconfigured
    /// destination.
    #[must_use]
    pub fn from_pool(pool: Option<P>, ctx: LoadBalancerContext) -> Self {
        Self {
            pool,
            ctx,
            config: BridgeConfig::default(),
            callbacks: None,
            upstream_handle: None,
            requested: false,
        }
    }

    /// Framing settings for the bridge built on success.
    #[must_use]
    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether a pool exists for the destination.
    #[must_use]
    pub fn valid(&self) -> bool { self.pool.is_some() }

    /// Host of the resolved pool.
    #[must_use]
    pub fn host(&self) -> Option<Arc<HostDescription>> { self.pool.as_ref().map(P::host) }

    /// Whether an acquisition is outstanding.
    #[must_use]
    pub fn has_pending_stream(&self) -> bool { self.upstream_handle.is_some() }

    /// Issue exactly one acquisition, reporting to `callbacks`.
    ///
    /// The pool may complete inline, in which case `callbacks` have been
    /// notified before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::InvalidPool`] when no pool is configured and
    /// [`UpstreamError::StreamAlreadyRequested`] on any later call, whether
    /// the first acquisition is still pending, delivered or cancelled.
    pub fn new_stream(&mut self, callbacks: K) -> Result<()> {
        if self.requested {
            return Err(UpstreamError::StreamAlreadyRequested);
        }
        let Some(pool) = self.pool.as_mut() else {
            return Err(UpstreamError::InvalidPool);
        };
        self.requested = true;
        self.callbacks = Some(callbacks);
        match pool.new_connection(&self.ctx) {
            PendingConnection::Complete(outcome) => self.on_pool_outcome(outcome),
            PendingConnection::Pending(token) => self.upstream_handle = Some(token),
        }
        Ok(())
    }

    /// Abandon an outstanding acquisition.
    ///
    /// Returns `false` when nothing was outstanding, including after the
    /// outcome has been delivered or a previous cancel.
    pub fn cancel_any_pending_stream(&mut self) -> bool {
        let Some(token) = self.upstream_handle.take() else {
            return false;
        };
        token.cancel();
        if let Some(pool) = self.pool.as_mut() {
            pool.on_cancel(CancelPolicy::Default);
        }
        self.callbacks = None;
        debug!("pending upstream connection request cancelled");
        true
    }

    /// Deliver the pool's answer to the caller.
    ///
    /// Outcomes arriving after cancellation are discarded; a connection that
    /// arrives that late goes straight back to the pool.
    pub fn on_pool_outcome(&mut self, outcome: PoolOutcome<P::Connection>) {
        self.upstream_handle = None;
        let Some(mut callbacks) = self.callbacks.take() else {
            debug!("discarding pool outcome for a stream that is no longer waiting");
            if let PoolOutcome::Ready { mut connection, .. } = outcome {
                connection.release();
            }
            return;
        };

        match outcome {
            PoolOutcome::Ready { connection, host } => {
                debug!("upstream connection ready: host={host}");
                let downstream = callbacks.upstream_to_downstream();
                let upstream = TcpUpstream::with_config(downstream, connection, self.config);
                callbacks.on_pool_ready(upstream, host);
            }
            PoolOutcome::Failed {
                reason,
                transport_failure_reason,
                host,
            } => {
                warn!(
                    "upstream connection failed: reason={reason}, details={transport_failure_reason}, \
                     host={host:?}"
                );
                callbacks.on_pool_failure(reason, &transport_failure_reason, host);
            }
        }
    }
}
