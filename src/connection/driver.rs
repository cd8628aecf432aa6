//! Tokio task driving a pooled transport.
//!
//! The driver executes [`ConnectionCommand`]s in order, reads while reads are
//! enabled and reports everything through [`ConnectionSignal`]s. A `biased`
//! `tokio::select!` gives shutdown priority over commands, and commands
//! priority over reads, so a close is never overtaken by inbound data.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use super::{
    ChannelConnection,
    CloseType,
    ConnectionCommand,
    ConnectionEvent,
    ConnectionSignal,
    counter::ActiveConnection,
};
use crate::config::ConnectionConfig;

/// How a driver stopped.
#[derive(Debug)]
pub enum DriverExit<T> {
    /// The owner released the connection; the transport is handed back for
    /// reuse by a later stream.
    Released(T),
    /// The transport was closed locally or by the peer.
    Closed,
}

enum Step {
    Continue,
    Close(CloseType),
    Release,
}

/// Build a connected [`ChannelConnection`] / [`ConnectionDriver`] pair.
///
/// The returned receiver yields the driver's signals; feed them to
/// [`crate::upstream::UpstreamCallbacks::on_signal`].
///
/// # Errors
///
/// Returns an error if `config` has inconsistent watermarks.
pub fn connection_pair<T>(
    io: T,
    config: ConnectionConfig,
    shutdown: CancellationToken,
) -> io::Result<(
    ChannelConnection,
    ConnectionDriver<T>,
    mpsc::Receiver<ConnectionSignal>,
)>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    config.validate()?;
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::channel(config.signal_capacity);
    let pending_write = Arc::new(AtomicUsize::new(0));
    let connection = ChannelConnection::new(command_tx, Arc::clone(&pending_write));
    let driver = ConnectionDriver {
        io,
        commands: command_rx,
        signals: signal_tx,
        pending_write,
        config,
        shutdown,
        read_disabled: 0,
        write_closed: false,
        above_high_watermark: false,
        _active: ActiveConnection::new(),
    };
    Ok((connection, driver, signal_rx))
}

/// Owns a transport on behalf of a [`ChannelConnection`].
pub struct ConnectionDriver<T> {
    io: T,
    commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    signals: mpsc::Sender<ConnectionSignal>,
    pending_write: Arc<AtomicUsize>,
    config: ConnectionConfig,
    shutdown: CancellationToken,
    read_disabled: u32,
    write_closed: bool,
    above_high_watermark: bool,
    _active: ActiveConnection,
}

impl<T> ConnectionDriver<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Drive the transport until it is closed, released or shut down.
    ///
    /// # Errors
    ///
    /// Returns the transport error after reporting
    /// [`ConnectionEvent::RemoteClose`] to the signal receiver.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn run(mut self) -> io::Result<DriverExit<T>> {
        self.emit(ConnectionSignal::Event(ConnectionEvent::Connected))
            .await;
        let mut buf = BytesMut::with_capacity(self.config.read_chunk_size);

        loop {
            buf.reserve(self.config.read_chunk_size);
            let reading = self.read_disabled == 0;
            let step = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    tracing::info!(
                        pending_write = self.pending_write.load(Ordering::Acquire),
                        "connection driver shutdown requested"
                    );
                    Step::Close(CloseType::NoFlush)
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.execute(command).await?,
                    None => Step::Release,
                },
                read = self.io.read_buf(&mut buf), if reading => match read {
                    Ok(0) => {
                        debug!("peer closed upstream connection");
                        self.emit(ConnectionSignal::Data {
                            data: Bytes::new(),
                            end_stream: true,
                        })
                        .await;
                        self.emit(ConnectionSignal::Event(ConnectionEvent::RemoteClose))
                            .await;
                        return Ok(DriverExit::Closed);
                    }
                    Ok(_) => {
                        let data = buf.split().freeze();
                        self.emit(ConnectionSignal::Data {
                            data,
                            end_stream: false,
                        })
                        .await;
                        Step::Continue
                    }
                    Err(err) => return Err(self.fail(err).await),
                },
            };

            match step {
                Step::Continue => {}
                Step::Close(close_type) => return self.close(close_type).await,
                Step::Release => {
                    debug!("upstream connection released to pool");
                    return Ok(DriverExit::Released(self.io));
                }
            }
        }
    }

    async fn execute(&mut self, command: ConnectionCommand) -> io::Result<Step> {
        match command {
            ConnectionCommand::Write { data, end_stream } => {
                self.write(data, end_stream).await?;
                Ok(Step::Continue)
            }
            ConnectionCommand::ReadDisable(true) => {
                self.read_disabled += 1;
                Ok(Step::Continue)
            }
            ConnectionCommand::ReadDisable(false) => {
                self.read_disabled = self.read_disabled.saturating_sub(1);
                Ok(Step::Continue)
            }
            ConnectionCommand::Close(close_type) => Ok(Step::Close(close_type)),
            ConnectionCommand::Release => Ok(Step::Release),
        }
    }

    async fn write(&mut self, data: Bytes, end_stream: bool) -> io::Result<()> {
        let len = data.len();
        if self.pending_write.load(Ordering::Acquire) >= self.config.high_watermark
            && !self.above_high_watermark
        {
            self.above_high_watermark = true;
            self.emit(ConnectionSignal::AboveWriteBufferHighWatermark)
                .await;
        }

        let result = if self.write_closed {
            warn!("dropping {len} bytes written after half-close");
            Ok(())
        } else {
            self.write_through(&data, end_stream).await
        };
        let pending = self
            .pending_write
            .fetch_sub(len, Ordering::AcqRel)
            .saturating_sub(len);
        if let Err(err) = result {
            return Err(self.fail(err).await);
        }

        if self.above_high_watermark && pending <= self.config.low_watermark {
            self.above_high_watermark = false;
            self.emit(ConnectionSignal::BelowWriteBufferLowWatermark)
                .await;
        }
        Ok(())
    }

    async fn write_through(&mut self, data: &[u8], end_stream: bool) -> io::Result<()> {
        self.io.write_all(data).await?;
        self.io.flush().await?;
        if end_stream {
            self.io.shutdown().await?;
            self.write_closed = true;
        }
        Ok(())
    }

    async fn close(mut self, close_type: CloseType) -> io::Result<DriverExit<T>> {
        debug!("closing upstream connection: {close_type:?}");
        if close_type == CloseType::FlushWrite && !self.write_closed {
            if let Err(err) = self.io.shutdown().await {
                debug!("flush on close failed: {err}");
            }
        }
        self.emit(ConnectionSignal::Event(ConnectionEvent::LocalClose))
            .await;
        Ok(DriverExit::Closed)
    }

    async fn fail(&mut self, err: io::Error) -> io::Error {
        tracing::warn!(error = %err, "upstream connection failed");
        self.emit(ConnectionSignal::Event(ConnectionEvent::RemoteClose))
            .await;
        err
    }

    async fn emit(&mut self, signal: ConnectionSignal) {
        if self.signals.send(signal).await.is_err() {
            debug!("connection signal receiver dropped");
        }
    }
}
