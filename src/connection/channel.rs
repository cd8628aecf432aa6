//! [`UpstreamConnection`] backed by a command channel to a driver task.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use log::debug;
use tokio::sync::mpsc;

use super::{CloseType, UpstreamConnection};

/// Instructions executed by [`super::ConnectionDriver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Write bytes, optionally half-closing the write side afterwards.
    Write { data: Bytes, end_stream: bool },
    /// Adjust the nested read-disable count.
    ReadDisable(bool),
    /// Close the transport.
    Close(CloseType),
    /// Stop driving the transport and hand it back to the pool.
    Release,
}

/// Connection handle owned by the bridge.
///
/// Writes never block: they are queued for the driver, and the queued byte
/// count is shared with it so watermarks reflect data not yet on the wire.
#[derive(Debug)]
pub struct ChannelConnection {
    commands: mpsc::UnboundedSender<ConnectionCommand>,
    pending_write: Arc<AtomicUsize>,
    done: bool,
}

impl ChannelConnection {
    pub(super) fn new(
        commands: mpsc::UnboundedSender<ConnectionCommand>,
        pending_write: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            commands,
            pending_write,
            done: false,
        }
    }

    /// Outbound bytes queued but not yet written.
    #[must_use]
    pub fn pending_write_bytes(&self) -> usize { self.pending_write.load(Ordering::Acquire) }

    fn send(&self, command: ConnectionCommand) {
        if self.commands.send(command).is_err() {
            debug!("connection driver gone; dropping command");
        }
    }
}

impl UpstreamConnection for ChannelConnection {
    fn write(&mut self, data: Bytes, end_stream: bool) {
        if self.done {
            return;
        }
        self.pending_write.fetch_add(data.len(), Ordering::AcqRel);
        self.send(ConnectionCommand::Write { data, end_stream });
    }

    fn read_disable(&mut self, disable: bool) {
        if !self.done {
            self.send(ConnectionCommand::ReadDisable(disable));
        }
    }

    fn close(&mut self, close_type: CloseType) {
        if !self.done {
            self.done = true;
            self.send(ConnectionCommand::Close(close_type));
        }
    }

    fn release(&mut self) {
        if !self.done {
            self.done = true;
            self.send(ConnectionCommand::Release);
        }
    }
}
