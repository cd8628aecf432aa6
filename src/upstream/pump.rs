//! Feed connection signals into a bridge.

use log::debug;
use tokio::sync::mpsc;

use super::{TcpUpstream, UpstreamCallbacks, UpstreamToDownstream};
use crate::connection::{ConnectionSignal, UpstreamConnection};

/// Deliver signals to `upstream` in arrival order until the stream finishes
/// or the connection stops signalling.
///
/// Returns the number of signals delivered.
pub async fn pump_signals<C, D>(
    upstream: &mut TcpUpstream<C, D>,
    signals: &mut mpsc::Receiver<ConnectionSignal>,
) -> usize
where
    C: UpstreamConnection,
    D: UpstreamToDownstream,
{
    let mut delivered = 0;
    while !upstream.is_finished() {
        let Some(signal) = signals.recv().await else {
            debug!("connection signal channel closed");
            break;
        };
        upstream.on_signal(signal);
        delivered += 1;
    }
    delivered
}
