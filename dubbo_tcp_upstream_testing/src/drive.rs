//! Run a bridge over a real driver against an in-memory backend.

use bytes::Bytes;
use dubbo_tcp_upstream::{
    BridgeConfig,
    ConnectionConfig,
    GenericUpstream,
    TcpUpstream,
    UpstreamEvent,
    connection::DriverExit,
    connection_pair,
    upstream::{BytesMeterSnapshot, pump_signals},
};
use futures::future::join;
use tokio::{
    io::{self, AsyncReadExt, AsyncWriteExt, DuplexStream, duplex},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

const DEFAULT_CAPACITY: usize = 4096;

/// Everything observed while driving one request.
#[derive(Debug)]
pub struct BridgeOutcome {
    /// Callbacks delivered to the caller, in order.
    pub events: Vec<UpstreamEvent>,
    /// Request bytes the backend read before its write side closed.
    pub backend_received: Vec<u8>,
    /// Final counters of the bridge.
    pub meter: BytesMeterSnapshot,
    /// Whether the driver handed the transport back for reuse.
    pub released: bool,
}

async fn backend(mut server: DuplexStream, responses: Vec<Vec<u8>>) -> io::Result<Vec<u8>> {
    let mut received = Vec::new();
    server.read_to_end(&mut received).await?;
    for chunk in responses {
        // The bridge may hang up mid-response after rejecting a frame.
        if server.write_all(&chunk).await.is_err() {
            return Ok(received);
        }
        tokio::task::yield_now().await;
    }
    let _ = server.shutdown().await;
    Ok(received)
}

/// Send `request` and replay `responses` from the backend, chunk by chunk.
///
/// # Errors
///
/// Returns any I/O error raised by the backend or the driver.
pub async fn drive_bridge(request: Bytes, responses: Vec<Vec<u8>>) -> io::Result<BridgeOutcome> {
    drive_bridge_with(request, responses, BridgeConfig::default(), ConnectionConfig::default())
        .await
}

/// Like [`drive_bridge`] with explicit bridge and connection settings.
///
/// # Errors
///
/// Returns any I/O error raised by the backend or the driver.
pub async fn drive_bridge_with(
    request: Bytes,
    responses: Vec<Vec<u8>>,
    bridge: BridgeConfig,
    connection: ConnectionConfig,
) -> io::Result<BridgeOutcome> {
    let (client, server) = duplex(DEFAULT_CAPACITY);
    let (connection, driver, mut signals) =
        connection_pair(client, connection, CancellationToken::new())?;
    let driver = tokio::spawn(driver.run());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut upstream = TcpUpstream::with_config(tx, connection, bridge);
    upstream
        .encode_data(request, true)
        .map_err(|err| io::Error::new(io::ErrorKind::NotConnected, err))?;

    let pump = async {
        pump_signals(&mut upstream, &mut signals).await;
    };
    let (received, ()) = join(backend(server, responses), pump).await;
    let meter = upstream.bytes_meter();
    drop(upstream);

    let exit = driver
        .await
        .map_err(|err| io::Error::other(err.to_string()))??;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    Ok(BridgeOutcome {
        events,
        backend_received: received?,
        meter,
        released: matches!(exit, DriverExit::Released(_)),
    })
}
