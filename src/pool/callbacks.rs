//! Channel-backed [`GenericConnectionPoolCallbacks`].

use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;

use super::{GenericConnectionPoolCallbacks, HostDescription, PoolFailureReason};
use crate::{
    connection::UpstreamConnection,
    upstream::{TcpUpstream, UpstreamToDownstream},
};

/// Pool outcome as delivered to a stream task.
pub enum PoolEvent<C: UpstreamConnection, D: UpstreamToDownstream> {
    /// The bridge is ready.
    Ready {
        upstream: TcpUpstream<C, D>,
        host: Arc<HostDescription>,
    },
    /// Acquisition failed.
    Failure {
        reason: PoolFailureReason,
        transport_failure_reason: String,
        host: Option<Arc<HostDescription>>,
    },
}

/// Forwards pool outcomes over a channel, handing each bridge a clone of
/// `downstream`.
pub struct ChannelPoolCallbacks<C: UpstreamConnection, D: UpstreamToDownstream> {
    downstream: D,
    events: mpsc::UnboundedSender<PoolEvent<C, D>>,
}

impl<C, D> ChannelPoolCallbacks<C, D>
where
    C: UpstreamConnection,
    D: UpstreamToDownstream + Clone,
{
    /// Create callbacks and the receiver their events arrive on.
    #[must_use]
    pub fn new(downstream: D) -> (Self, mpsc::UnboundedReceiver<PoolEvent<C, D>>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { downstream, events }, rx)
    }

    fn send(&self, event: PoolEvent<C, D>) {
        if self.events.send(event).is_err() {
            debug!("pool event receiver dropped");
        }
    }
}

impl<C, D> GenericConnectionPoolCallbacks<C> for ChannelPoolCallbacks<C, D>
where
    C: UpstreamConnection,
    D: UpstreamToDownstream + Clone,
{
    type Downstream = D;

    fn upstream_to_downstream(&mut self) -> D { self.downstream.clone() }

    fn on_pool_ready(&mut self, upstream: TcpUpstream<C, D>, host: Arc<HostDescription>) {
        self.send(PoolEvent::Ready { upstream, host });
    }

    fn on_pool_failure(
        &mut self,
        reason: PoolFailureReason,
        transport_failure_reason: &str,
        host: Option<Arc<HostDescription>>,
    ) {
        self.send(PoolEvent::Failure {
            reason,
            transport_failure_reason: transport_failure_reason.to_owned(),
            host,
        });
    }
}
